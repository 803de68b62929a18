//! Process-wide plugin registry: type name → factory.
//!
//! Read-only after startup. A missing type name at load time is a fatal
//! per-section error that the orchestrator counts but does not abort on.

use relay_core::{PipelineError, PluginInstance};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use tracing::info;

/// Constructs a fresh, uninitialized plugin instance, already wearing the
/// concrete category trait its factory commits to.
pub type PluginFactory = fn() -> PluginInstance;

/// The process-wide type name → factory map.
pub struct PluginRegistry {
    factories: RwLock<HashMap<String, PluginFactory>>,
}

impl PluginRegistry {
    fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// The single process-wide registry instance.
    pub fn global() -> &'static PluginRegistry {
        static REGISTRY: OnceLock<PluginRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PluginRegistry::new)
    }

    /// Registers a factory under `type_name`. Overwrites any prior
    /// registration under the same name.
    pub fn register(&self, type_name: impl Into<String>, factory: PluginFactory) {
        let type_name = type_name.into();
        self.factories
            .write()
            .unwrap()
            .insert(type_name.clone(), factory);
        info!(plugin_type = %type_name, "plugin type registered");
    }

    /// Looks up the factory registered for `type_name`.
    pub fn lookup(&self, type_name: &str) -> Result<PluginFactory, PipelineError> {
        self.factories
            .read()
            .unwrap()
            .get(type_name)
            .copied()
            .ok_or_else(|| PipelineError::UnknownPluginType(type_name.to_string()))
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.factories.read().unwrap().contains_key(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_noop_input;

    #[test]
    fn lookup_missing_type_is_unknown_plugin_type() {
        let registry = PluginRegistry::new();
        let err = registry.lookup("GhostInput").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPluginType(_)));
    }

    #[test]
    fn registers_and_looks_up() {
        let registry = PluginRegistry::new();
        registry.register("NoopInput", make_noop_input as PluginFactory);
        assert!(registry.is_registered("NoopInput"));
        let factory = registry.lookup("NoopInput").unwrap();
        let _plugin = factory();
    }
}
