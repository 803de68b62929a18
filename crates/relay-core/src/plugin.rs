//! Plugin categories and the [`Plugin`] trait every plugin implements.

use async_trait::async_trait;
use serde_json::Value;

/// The six categories a plugin instance can belong to.
///
/// `MultiDecoder` is not a member of this enum: it is a transient
/// pseudo-category used only while the dependency orderer is filing makers,
/// and collapses into [`PluginCategory::Decoder`] before any runner is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    Input,
    Decoder,
    Encoder,
    Filter,
    Output,
    Splitter,
}

impl PluginCategory {
    /// All categories, in the fixed order `LoadConfig` prepares them.
    pub const PREPARE_ORDER: [PluginCategory; 6] = [
        PluginCategory::Decoder,
        PluginCategory::Encoder,
        PluginCategory::Splitter,
        PluginCategory::Input,
        PluginCategory::Filter,
        PluginCategory::Output,
    ];

    /// Derives a category from a plugin type name's suffix.
    ///
    /// Returns `None` when the name ends in none of the six recognized
    /// suffixes, which the maker surfaces as
    /// [`crate::error::PipelineError::UncategorizedPlugin`].
    pub fn from_type_name(type_name: &str) -> Option<PluginCategory> {
        // Longest suffix first: "Splitter" and "Filter" both end in "ter"
        // but none of the six suffixes is itself a suffix of another, so a
        // single ends_with pass in any order is unambiguous. Ordered here by
        // rough expected frequency.
        const SUFFIXES: &[(&str, PluginCategory)] = &[
            ("Decoder", PluginCategory::Decoder),
            ("Encoder", PluginCategory::Encoder),
            ("Filter", PluginCategory::Filter),
            ("Input", PluginCategory::Input),
            ("Output", PluginCategory::Output),
            ("Splitter", PluginCategory::Splitter),
        ];
        SUFFIXES
            .iter()
            .find(|(suffix, _)| type_name.ends_with(suffix))
            .map(|(_, category)| *category)
    }

    /// Short label used in log messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginCategory::Input => "Input",
            PluginCategory::Decoder => "Decoder",
            PluginCategory::Encoder => "Encoder",
            PluginCategory::Filter => "Filter",
            PluginCategory::Output => "Output",
            PluginCategory::Splitter => "Splitter",
        }
    }
}

/// Capability a plugin may expose to describe and default its own config.
///
/// A plugin without a schema falls back to an unchecked generic key/value
/// map: every key in its section is accepted as-is.
pub trait ConfigSchema: Send + Sync {
    /// Returns a JSON object populated with this plugin's default config.
    ///
    /// The object's key set doubles as the allow-list `PrepConfig` checks
    /// incoming section keys against.
    fn defaults(&self) -> Value;
}

/// The raw section merged with a plugin's defaults, still in `Value` form.
///
/// Keeping the post-merge value as JSON (rather than deserializing straight
/// into a plugin-specific Rust type) is what lets the maker reject unknown
/// keys generically and still hand every plugin a typed-enough view of its
/// own config, without reflection.
#[derive(Debug, Clone)]
pub enum PluginConfigValue {
    /// Config merged against a declared schema; unknown keys already rejected.
    Typed(Value),
    /// No schema was available; every key in the raw section is accepted.
    Generic(Value),
}

impl PluginConfigValue {
    /// Borrows the underlying JSON value regardless of variant.
    pub fn as_value(&self) -> &Value {
        match self {
            PluginConfigValue::Typed(v) | PluginConfigValue::Generic(v) => v,
        }
    }

    /// Deserializes a single field out of the config by key.
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.as_value()
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Every plugin instance, regardless of category, implements this trait.
///
/// Optional capabilities ([`NamedPlugin`], [`StatAccumulatorCapability`]) are
/// probed through the two `as_*` methods below rather than by downcasting a
/// `dyn Any`: once a concrete plugin has been erased into a `Box<dyn
/// InputRunnerPlugin>` there is no way to recover its concrete type to
/// downcast against, so a plugin that wants a capability visible through the
/// trait object must hand back a reference to itself through these vtable
/// methods, the same way a registered service is stored as a trait object
/// rather than recovered from an opaque one.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Returns this plugin's config schema, if it declares one.
    fn config_schema(&self) -> Option<Box<dyn ConfigSchema>> {
        None
    }

    /// Initializes the plugin from its merged config. Called at most once,
    /// by `PrepConfig`.
    async fn init(&mut self, config: &PluginConfigValue) -> crate::error::PipelineResult<()>;

    /// Exposes [`NamedPlugin`] if this plugin wants to know the full
    /// instance name it is given by `Encoder`/`Decoder` instantiation.
    fn as_named_mut(&mut self) -> Option<&mut dyn NamedPlugin> {
        None
    }

    /// Exposes [`StatAccumulatorCapability`] if this plugin accumulates
    /// stats the `StatAccumulator` helper operation can report.
    fn as_stat_accumulator(&self) -> Option<&dyn StatAccumulatorCapability> {
        None
    }
}

/// Optional capability: a plugin that wants the name it was registered
/// under (used by `Encoder`/`Decoder` instantiation, which may assign a
/// name distinct from the maker's own).
pub trait NamedPlugin {
    /// Informs the plugin of the full instance name it was given.
    fn set_name(&mut self, name: &str);
}

/// Optional capability: an input plugin that can report accumulated stats.
pub trait StatAccumulatorCapability: Send + Sync {
    /// Returns the plugin's current stat snapshot as a JSON object.
    fn stats(&self) -> Value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_suffix() {
        assert_eq!(
            PluginCategory::from_type_name("TcpInput"),
            Some(PluginCategory::Input)
        );
        assert_eq!(
            PluginCategory::from_type_name("ProtobufDecoder"),
            Some(PluginCategory::Decoder)
        );
        assert_eq!(
            PluginCategory::from_type_name("TokenSplitter"),
            Some(PluginCategory::Splitter)
        );
        assert_eq!(PluginCategory::from_type_name("SandboxManager"), None);
    }

    #[test]
    fn prepare_order_is_fixed() {
        assert_eq!(
            PluginCategory::PREPARE_ORDER,
            [
                PluginCategory::Decoder,
                PluginCategory::Encoder,
                PluginCategory::Splitter,
                PluginCategory::Input,
                PluginCategory::Filter,
                PluginCategory::Output,
            ]
        );
    }
}
