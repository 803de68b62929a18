//! Config decoder: splits expanded config text into named sections, each
//! holding its own bag of untyped-but-typed-at-use primitives.

use indexmap::IndexMap;
use relay_core::PipelineError;
use toml::Value;

/// The one section name excluded from plugin processing.
pub const GLOBALS_SECTION: &str = "hekad";

/// A single `[name]` block: its raw key/value primitives, still in
/// `toml::Value` form so later typed deserialization sees the original
/// representation.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub raw: toml::value::Table,
}

/// Parses already env-expanded config text into a name → [`Section`] map,
/// in file order, excluding [`GLOBALS_SECTION`].
///
/// Returns [`PipelineError::DuplicateSection`] if the same top-level name
/// appears twice. The returned map preserves the order sections appeared in
/// `text` — per spec, within-category prepare order follows config
/// insertion order, not name order.
pub fn decode_sections(text: &str) -> Result<IndexMap<String, Section>, PipelineError> {
    let parsed: toml::value::Table = toml::from_str(text).map_err(|e| classify_parse_error(e))?;

    let mut sections = IndexMap::new();
    for (name, value) in parsed {
        if name == GLOBALS_SECTION {
            continue;
        }
        let Value::Table(raw) = value else {
            return Err(PipelineError::InvalidConfig(format!(
                "section '{name}' must be a table"
            )));
        };
        sections.insert(name.clone(), Section { name, raw });
    }
    Ok(sections)
}

/// The daemon-globals section, if present, as a raw table.
pub fn decode_globals(text: &str) -> Result<Option<toml::value::Table>, PipelineError> {
    let parsed: toml::value::Table = toml::from_str(text).map_err(classify_parse_error)?;
    match parsed.get(GLOBALS_SECTION) {
        Some(Value::Table(t)) => Ok(Some(t.clone())),
        Some(_) => Err(PipelineError::InvalidConfig(format!(
            "'{GLOBALS_SECTION}' must be a table"
        ))),
        None => Ok(None),
    }
}

fn classify_parse_error(err: toml::de::Error) -> PipelineError {
    let msg = err.to_string();
    if msg.contains("duplicate key") {
        PipelineError::DuplicateSection(msg)
    } else {
        PipelineError::InvalidConfig(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_globals_section() {
        let text = r#"
            [hekad]
            max_message_loops = 4

            [MyInput]
            type = "TcpInput"
        "#;
        let sections = decode_sections(text).unwrap();
        assert!(!sections.contains_key(GLOBALS_SECTION));
        assert!(sections.contains_key("MyInput"));
    }

    #[test]
    fn empty_config_yields_no_sections() {
        let sections = decode_sections("").unwrap();
        assert!(sections.is_empty());
    }

    #[test]
    fn rejects_duplicate_section() {
        let text = r#"
            [MyInput]
            type = "TcpInput"

            [MyInput]
            type = "TcpInput"
        "#;
        let err = decode_sections(text).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateSection(_)));
    }

    #[test]
    fn preserves_file_order_not_name_order() {
        let text = "[Zebra]\ntype = \"A\"\n[Apple]\ntype = \"B\"\n[Mango]\ntype = \"C\"\n";
        let sections = decode_sections(text).unwrap();
        let names: Vec<&str> = sections.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Zebra", "Apple", "Mango"]);
    }

    #[test]
    fn preserves_typed_primitives() {
        let text = r#"
            [MyFilter]
            type = "SomeFilter"
            ticker_interval = 5
            can_exit = false
            subs = ["a", "b"]
        "#;
        let sections = decode_sections(text).unwrap();
        let section = &sections["MyFilter"];
        assert_eq!(section.raw["ticker_interval"].as_integer(), Some(5));
        assert_eq!(section.raw["can_exit"].as_bool(), Some(false));
        assert!(section.raw["subs"].is_array());
    }
}
