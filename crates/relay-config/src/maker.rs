//! Plugin maker: instantiates a plugin from a section, prepares its typed
//! config, and wraps it in a runner.

use crate::registry::PluginRegistry;
use crate::section::Section;
use relay_core::{
    DecoderRunner, FilterRunner, InputRunner, MatcherSpec, OutputRunner, PipelineError,
    PipelineResult, PluginCategory, PluginConfigValue, PluginInstance, SplitterRunner,
};
use serde_json::{Map, Value};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Section keys the maker itself consumes rather than passing through to a
/// plugin's own config schema. Never rejected as `UnknownOption` even when a
/// plugin declares no schema of its own for them.
const COMMON_KEYS: &[&str] = &[
    "type",
    "ticker_interval",
    "message_matcher",
    "message_signer",
    "encoder",
    "use_framing",
    "use_buffering",
    "buffering",
    "can_exit",
    "retries",
    "decoder",
    "splitter",
    "synchronous_decode",
    "send_decode_failures",
    "log_decode_failures",
    "keep_truncated",
    "use_message_bytes",
    "min_buffer_size",
    "deliver_incomplete_final",
    "subs",
];

/// The common per-category config fields recognized from a section,
/// independent of any plugin-declared schema.
#[derive(Debug, Clone, Default)]
pub struct CommonConfig {
    pub ticker_interval: Option<u64>,
    pub message_matcher: Option<String>,
    pub message_signer: Option<String>,
    pub encoder: Option<String>,
    pub use_framing: Option<bool>,
    pub can_exit: Option<bool>,
    pub decoder: Option<String>,
    pub splitter: Option<String>,
    pub subs: Option<Vec<String>>,
}

impl CommonConfig {
    /// Reads the common fields out of a raw section, rejecting a present
    /// field whose TOML type doesn't match what it's declared as here (e.g.
    /// `ticker_interval = "five"`) with [`PipelineError::TypeMismatch`]
    /// rather than silently dropping it to `None`.
    fn from_raw(plugin: &str, raw: &toml::value::Table) -> PipelineResult<Self> {
        Ok(Self {
            ticker_interval: typed_field(plugin, raw, "ticker_interval", |v| {
                v.as_integer().map(|n| n as u64)
            })?,
            message_matcher: typed_field(plugin, raw, "message_matcher", |v| {
                v.as_str().map(str::to_string)
            })?,
            message_signer: typed_field(plugin, raw, "message_signer", |v| {
                v.as_str().map(str::to_string)
            })?,
            encoder: typed_field(plugin, raw, "encoder", |v| v.as_str().map(str::to_string))?,
            use_framing: typed_field(plugin, raw, "use_framing", |v| v.as_bool())?,
            can_exit: typed_field(plugin, raw, "can_exit", |v| v.as_bool())?,
            decoder: typed_field(plugin, raw, "decoder", |v| v.as_str().map(str::to_string))?,
            splitter: typed_field(plugin, raw, "splitter", |v| v.as_str().map(str::to_string))?,
            subs: typed_field(plugin, raw, "subs", |v| {
                v.as_array().map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
            })?,
        })
    }

    fn matcher(&self) -> MatcherSpec {
        MatcherSpec {
            message_matcher: self.message_matcher.clone().unwrap_or_default(),
            message_signer: self.message_signer.clone(),
        }
    }
}

/// Looks up `key`, coercing it with `expected_type` if present. A present
/// value that doesn't coerce is a type mismatch, not a silent `None`.
fn typed_field<T>(
    plugin: &str,
    raw: &toml::value::Table,
    key: &str,
    expected_type: impl Fn(&toml::Value) -> Option<T>,
) -> PipelineResult<Option<T>> {
    match raw.get(key) {
        None => Ok(None),
        Some(v) => expected_type(v).map(Some).ok_or_else(|| PipelineError::TypeMismatch {
            plugin: plugin.to_string(),
            key: key.to_string(),
            reason: format!("found a {}", toml_type_name(v)),
        }),
    }
}

fn toml_type_name(v: &toml::Value) -> &'static str {
    match v {
        toml::Value::String(_) => "string",
        toml::Value::Integer(_) => "integer",
        toml::Value::Float(_) => "float",
        toml::Value::Boolean(_) => "boolean",
        toml::Value::Datetime(_) => "datetime",
        toml::Value::Array(_) => "array",
        toml::Value::Table(_) => "table",
    }
}

enum PrepState {
    Unprepared(PluginInstance),
    Prepared {
        instance: PluginInstance,
        config: PluginConfigValue,
    },
}

/// A single `[section]`'s full maker state: its category, raw primitives,
/// and (after `prep_config`) its typed config and initialized plugin.
pub struct PluginMaker {
    name: String,
    category: PluginCategory,
    type_name: String,
    raw: toml::value::Table,
    common: CommonConfig,
    factory: crate::registry::PluginFactory,
    state: Mutex<Option<PrepState>>,
    runner_made: Mutex<bool>,
}

impl std::fmt::Debug for PluginMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMaker")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl PluginMaker {
    /// Builds a maker from a raw section: looks up the factory, instantiates
    /// a bare plugin, and derives its category from the type name's suffix.
    pub fn new(section: &Section) -> PipelineResult<Self> {
        let type_name = section
            .raw
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or(section.name.as_str())
            .to_string();

        let factory = PluginRegistry::global().lookup(&type_name)?;
        let instance = factory();

        let category = PluginCategory::from_type_name(&type_name)
            .ok_or_else(|| PipelineError::UncategorizedPlugin(type_name.clone()))?;

        let common = CommonConfig::from_raw(&section.name, &section.raw)?;

        Ok(Self {
            name: section.name.clone(),
            category,
            type_name,
            raw: section.raw.clone(),
            common,
            factory,
            state: Mutex::new(Some(PrepState::Unprepared(instance))),
            runner_made: Mutex::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> PluginCategory {
        self.category
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn common(&self) -> &CommonConfig {
        &self.common
    }

    pub fn raw(&self) -> &toml::value::Table {
        &self.raw
    }

    /// Deserializes the raw section against the plugin's schema (rejecting
    /// unknown keys), applies common config fields, and runs the plugin's
    /// `init`. Idempotent: a second call is a no-op returning `Ok(())`.
    pub async fn prep_config(&self) -> PipelineResult<()> {
        let mut guard = self.state.lock().unwrap();
        let Some(PrepState::Unprepared(_)) = guard.as_ref() else {
            return Ok(());
        };
        let Some(PrepState::Unprepared(mut instance)) = guard.take() else {
            unreachable!()
        };

        let schema = instance.as_plugin().config_schema();
        let merged = merge_config(&self.name, &self.raw, schema.as_deref());
        let config = match &merged {
            Ok(v) => v.clone(),
            Err(e) => {
                warn!(plugin = %self.name, error = %e, "plugin config rejected");
                *guard = Some(PrepState::Unprepared(instance));
                return Err(e.clone());
            }
        };

        if let Err(e) = instance.as_plugin_mut().init(&config).await {
            error!(plugin = %self.name, error = %e, "plugin failed to initialize");
            *guard = Some(PrepState::Unprepared(instance));
            return Err(PipelineError::InitFailed {
                plugin: self.name.clone(),
                reason: e.to_string(),
            });
        }

        info!(plugin = %self.name, category = %self.category.as_str(), "plugin config prepared");
        *guard = Some(PrepState::Prepared { instance, config });
        Ok(())
    }

    /// Wraps the prepared plugin in its category's runner. Requires a prior
    /// successful `prep_config`. Callable at most once per maker, except for
    /// Encoders, which never build a runner (bare stateful objects instead).
    pub fn make_runner(&self, full_name: Option<String>) -> PipelineResult<RunnerHandle> {
        let mut made = self.runner_made.lock().unwrap();
        if *made {
            return Err(PipelineError::InitFailed {
                plugin: self.name.clone(),
                reason: "MakeRunner already called for this maker".to_string(),
            });
        }

        let mut guard = self.state.lock().unwrap();
        let Some(PrepState::Prepared { .. }) = guard.as_ref() else {
            return Err(PipelineError::NotFound(format!(
                "'{}' has not completed PrepConfig",
                self.name
            )));
        };
        let Some(PrepState::Prepared { instance, config }) = guard.take() else {
            unreachable!()
        };

        let name = full_name.unwrap_or_else(|| self.name.clone());
        let handle = match instance {
            PluginInstance::Input(p) => RunnerHandle::Input(InputRunner::new(name, p)),
            PluginInstance::Filter(p) => {
                RunnerHandle::Filter(FilterRunner::new(name, p, self.common.matcher()))
            }
            PluginInstance::Output(p) => {
                RunnerHandle::Output(OutputRunner::new(name, p, self.common.matcher()))
            }
            PluginInstance::Decoder(p) => {
                let (tx, rx) = mpsc::channel(1);
                RunnerHandle::Decoder(DecoderRunner::new(name, p, tx), rx)
            }
            PluginInstance::Splitter(p) => RunnerHandle::Splitter(SplitterRunner::new(name, p)),
            PluginInstance::Encoder(_) => {
                *guard = Some(PrepState::Prepared { instance, config });
                drop(guard);
                return Err(PipelineError::WrongCapability {
                    name: self.name.clone(),
                    capability: "runner",
                });
            }
        };

        *made = true;
        Ok(handle)
    }

    /// Takes this maker's own prepared encoder instance, for filing under
    /// its own name in `allEncoders` during `LoadConfig`. Encoders have no
    /// runner, so this is the Encoder-category counterpart to `make_runner`
    /// rather than a special case of it. Callable at most once.
    pub fn take_encoder(&self) -> PipelineResult<Box<dyn relay_core::EncoderPlugin>> {
        let mut made = self.runner_made.lock().unwrap();
        if *made {
            return Err(PipelineError::InitFailed {
                plugin: self.name.clone(),
                reason: "MakeRunner already called for this maker".to_string(),
            });
        }

        let mut guard = self.state.lock().unwrap();
        let Some(PrepState::Prepared { .. }) = guard.as_ref() else {
            return Err(PipelineError::NotFound(format!(
                "'{}' has not completed PrepConfig",
                self.name
            )));
        };
        let Some(PrepState::Prepared { instance, config }) = guard.take() else {
            unreachable!()
        };

        let PluginInstance::Encoder(p) = instance else {
            *guard = Some(PrepState::Prepared { instance, config });
            drop(guard);
            return Err(PipelineError::WrongCapability {
                name: self.name.clone(),
                capability: "Encoder",
            });
        };

        *made = true;
        Ok(p)
    }

    /// Produces a fresh, independently-prepared plugin instance from this
    /// maker's factory and config — used by the runtime helper's
    /// `Encoder`/`Decoder` operations, which hand out new instances per
    /// caller rather than sharing the maker's own.
    pub async fn instantiate_fresh(&self) -> PipelineResult<PluginInstance> {
        let mut instance = (self.factory)();
        let schema = instance.as_plugin().config_schema();
        let config = merge_config(&self.name, &self.raw, schema.as_deref())?;
        instance
            .as_plugin_mut()
            .init(&config)
            .await
            .map_err(|e| PipelineError::InitFailed {
                plugin: self.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(instance)
    }

    pub fn is_prepared(&self) -> bool {
        matches!(
            self.state.lock().unwrap().as_ref(),
            Some(PrepState::Prepared { .. })
        )
    }
}

/// A runner freshly built by [`PluginMaker::make_runner`]. Decoder runners
/// also hand back the receiving half of their inbound channel, since the
/// orchestrator — not the maker — owns the task that drains it.
pub enum RunnerHandle {
    Input(InputRunner),
    Filter(FilterRunner),
    Output(OutputRunner),
    Decoder(DecoderRunner, mpsc::Receiver<relay_core::PipelinePack>),
    Splitter(SplitterRunner),
}

impl std::fmt::Debug for RunnerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            RunnerHandle::Input(_) => "Input",
            RunnerHandle::Filter(_) => "Filter",
            RunnerHandle::Output(_) => "Output",
            RunnerHandle::Decoder(_, _) => "Decoder",
            RunnerHandle::Splitter(_) => "Splitter",
        };
        f.debug_tuple(variant).finish()
    }
}

fn merge_config(
    plugin_name: &str,
    raw: &toml::value::Table,
    schema: Option<&dyn relay_core::ConfigSchema>,
) -> PipelineResult<PluginConfigValue> {
    let Some(schema) = schema else {
        let mut generic = Map::new();
        for (k, v) in raw {
            if COMMON_KEYS.contains(&k.as_str()) {
                continue;
            }
            generic.insert(k.clone(), toml_to_json(v));
        }
        return Ok(PluginConfigValue::Generic(Value::Object(generic)));
    };

    let defaults = schema.defaults();
    let Value::Object(mut merged) = defaults else {
        return Ok(PluginConfigValue::Typed(defaults));
    };

    for (k, v) in raw {
        if COMMON_KEYS.contains(&k.as_str()) {
            continue;
        }
        if !merged.contains_key(k) {
            return Err(PipelineError::UnknownOption {
                plugin: plugin_name.to_string(),
                key: k.clone(),
            });
        }
        merged.insert(k.clone(), toml_to_json(v));
    }

    Ok(PluginConfigValue::Typed(Value::Object(merged)))
}

fn toml_to_json(v: &toml::Value) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PluginRegistry;
    use crate::testutil::{make_noop_input, make_schema_filter};

    fn section(name: &str, body: &str) -> Section {
        let text = format!("[{name}]\n{body}\n");
        crate::section::decode_sections(&text).unwrap().shift_remove(name).unwrap()
    }

    #[test]
    fn derives_category_from_type_suffix() {
        PluginRegistry::global().register("NoopInput", make_noop_input as crate::registry::PluginFactory);
        let section = section("MyInput", "type = \"NoopInput\"");
        let maker = PluginMaker::new(&section).unwrap();
        assert_eq!(maker.category(), PluginCategory::Input);
    }

    #[test]
    fn unregistered_type_is_unknown_plugin_type() {
        let section = section("Ghost", "type = \"TotallyMissingInput\"");
        let err = PluginMaker::new(&section).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPluginType(_)));
    }

    #[tokio::test]
    async fn prep_config_is_idempotent() {
        PluginRegistry::global()
            .register("IdemInput", make_noop_input as crate::registry::PluginFactory);
        let section = section("MyInput2", "type = \"IdemInput\"");
        let maker = PluginMaker::new(&section).unwrap();
        maker.prep_config().await.unwrap();
        assert!(maker.is_prepared());
        maker.prep_config().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_unknown_option_against_schema() {
        PluginRegistry::global()
            .register("SchemaFilterX", make_schema_filter as crate::registry::PluginFactory);
        let section = section(
            "MyFilter",
            "type = \"SchemaFilterX\"\nthreshold = 5\nbogus_key = 1",
        );
        let maker = PluginMaker::new(&section).unwrap();
        let err = maker.prep_config().await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownOption { .. }));
    }

    #[tokio::test]
    async fn make_runner_requires_prep_config_first() {
        PluginRegistry::global()
            .register("UnpreppedInput", make_noop_input as crate::registry::PluginFactory);
        let section = section("MyInput3", "type = \"UnpreppedInput\"");
        let maker = PluginMaker::new(&section).unwrap();
        let err = maker.make_runner(None).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn wrong_typed_common_field_is_a_type_mismatch() {
        PluginRegistry::global()
            .register("TickerInput", make_noop_input as crate::registry::PluginFactory);
        let section = section(
            "MyInput4",
            "type = \"TickerInput\"\nticker_interval = \"five\"",
        );
        let err = PluginMaker::new(&section).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TypeMismatch { ref key, .. } if key == "ticker_interval"
        ));
    }
}
