//! Category index and MultiDecoder dependency orderer.
//!
//! Makers are filed by category as they are constructed (MultiDecoder makers
//! under the `Decoder` category, after their relative order among themselves
//! has been resolved here). The resolution itself is Kahn's algorithm over
//! the `subs` edges declared by each MultiDecoder.

use relay_core::PipelineError;
use std::collections::{HashMap, HashSet};

/// Resolves a valid load order for MultiDecoders given their `subs` lists.
///
/// `multis` maps each MultiDecoder's instance name to the sibling decoder
/// names it composes. Names in `subs` that are not themselves MultiDecoder
/// names are assumed to be ordinary decoders (no edge needed — they prepare
/// before any MultiDecoder regardless of order) and must already exist among
/// `known_decoders`, or [`PipelineError::UnknownSubDecoder`] is returned.
///
/// Returns the MultiDecoder names in an order where each one follows every
/// sub it composes.
pub fn order_multi_decoders(
    multis: &HashMap<String, Vec<String>>,
    known_decoders: &HashSet<String>,
) -> Result<Vec<String>, PipelineError> {
    for (name, subs) in multis {
        for sub in subs {
            if !multis.contains_key(sub) && !known_decoders.contains(sub) {
                return Err(PipelineError::UnknownSubDecoder {
                    multi: name.clone(),
                    sub: sub.clone(),
                });
            }
        }
    }

    // Edges: sub -> dependent MultiDecoder, restricted to sub-edges between
    // two MultiDecoders (plain decoders have no ordering constraint of their
    // own — they always prepare before any MultiDecoder).
    let mut in_degree: HashMap<&str, usize> = multis.keys().map(|n| (n.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> =
        multis.keys().map(|n| (n.as_str(), Vec::new())).collect();

    for (name, subs) in multis {
        for sub in subs {
            if let Some(sub_key) = multis.get_key_value(sub).map(|(k, _)| k.as_str()) {
                dependents.get_mut(sub_key).unwrap().push(name.as_str());
                *in_degree.get_mut(name.as_str()).unwrap() += 1;
            }
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&n, _)| n)
        .collect();
    ready.sort();

    let mut order: Vec<String> = Vec::with_capacity(multis.len());
    let mut frontier = ready;
    while !frontier.is_empty() {
        let mut next: Vec<&str> = Vec::new();
        for &name in &frontier {
            order.push(name.to_string());
            for &dep in &dependents[name] {
                let deg = in_degree.get_mut(dep).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    next.push(dep);
                }
            }
        }
        next.sort();
        frontier = next;
    }

    if order.len() != multis.len() {
        let cyclic: Vec<String> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg > 0)
            .map(|(&n, _)| n.to_string())
            .collect();
        return Err(PipelineError::CyclicDependency(cyclic));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn orders_chained_multis_after_their_subs() {
        let mut multis = HashMap::new();
        multis.insert("TopMulti".to_string(), vec!["MidMulti".to_string()]);
        multis.insert("MidMulti".to_string(), vec!["LeafDecoder".to_string()]);
        let known = set(&["LeafDecoder"]);

        let order = order_multi_decoders(&multis, &known).unwrap();
        assert_eq!(order, vec!["MidMulti".to_string(), "TopMulti".to_string()]);
    }

    #[test]
    fn independent_multis_both_appear() {
        let mut multis = HashMap::new();
        multis.insert("A".to_string(), vec!["Leaf".to_string()]);
        multis.insert("B".to_string(), vec!["Leaf".to_string()]);
        let known = set(&["Leaf"]);

        let mut order = order_multi_decoders(&multis, &known).unwrap();
        order.sort();
        assert_eq!(order, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn detects_cycle() {
        let mut multis = HashMap::new();
        multis.insert("A".to_string(), vec!["B".to_string()]);
        multis.insert("B".to_string(), vec!["A".to_string()]);
        let known = HashSet::new();

        let err = order_multi_decoders(&multis, &known).unwrap_err();
        assert!(matches!(err, PipelineError::CyclicDependency(_)));
    }

    #[test]
    fn detects_unknown_sub() {
        let mut multis = HashMap::new();
        multis.insert("A".to_string(), vec!["Ghost".to_string()]);
        let known = HashSet::new();

        let err = order_multi_decoders(&multis, &known).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownSubDecoder { .. }));
    }
}
