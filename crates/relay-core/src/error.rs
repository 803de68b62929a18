//! Unified error type shared by every crate in the workspace.
//!
//! Config-load-time and runtime errors share one enum because both sides of
//! the boundary need to move the same values: a load-phase failure is just a
//! runtime error that got logged and counted instead of returned.

use thiserror::Error;

/// Errors produced while constructing, ordering, loading or driving plugins.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A section named a `type` with no matching entry in the plugin registry.
    #[error("unknown plugin type '{0}'")]
    UnknownPluginType(String),

    /// A plugin's type name does not end in any recognized category suffix.
    #[error("plugin type '{0}' has no recognizable category suffix")]
    UncategorizedPlugin(String),

    /// A section set a key the plugin's config schema does not declare.
    #[error("unknown option '{key}' for plugin '{plugin}'")]
    UnknownOption {
        /// The plugin instance name.
        plugin: String,
        /// The offending key.
        key: String,
    },

    /// A section value could not be coerced to the type the schema expects.
    #[error("type mismatch for '{key}' in plugin '{plugin}': {reason}")]
    TypeMismatch {
        /// The plugin instance name.
        plugin: String,
        /// The offending key.
        key: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The MultiDecoder `subs` graph contains a cycle.
    #[error("cyclic dependency among MultiDecoders: {0:?}")]
    CyclicDependency(Vec<String>),

    /// A MultiDecoder's `subs` list names a decoder that doesn't exist.
    #[error("MultiDecoder '{multi}' references unknown sub-decoder '{sub}'")]
    UnknownSubDecoder {
        /// The referencing MultiDecoder.
        multi: String,
        /// The missing sub-decoder name.
        sub: String,
    },

    /// A plugin's `init` returned an error.
    #[error("plugin '{plugin}' failed to initialize: {reason}")]
    InitFailed {
        /// The plugin instance name.
        plugin: String,
        /// The reason reported by the plugin.
        reason: String,
    },

    /// A runner's `start` returned an error.
    #[error("runner '{runner}' failed to start: {reason}")]
    RunnerStartFailed {
        /// The runner instance name.
        runner: String,
        /// The reason reported by the runner.
        reason: String,
    },

    /// A message pack's loop count exceeded the configured maximum.
    #[error("message exceeded the maximum loop count ({max})")]
    LoopCountExceeded {
        /// The configured maximum.
        max: u32,
    },

    /// The process-wide abort signal has fired.
    #[error("operation aborted")]
    Aborted,

    /// An `%ENV[NAME]` token named a variable with invalid characters.
    #[error("invalid characters in environment variable name '{0}'")]
    InvalidEnvChars(String),

    /// An `%ENV[` token was never closed before end of input.
    #[error("missing closing ']' for %ENV[ token")]
    MissingCloseDelim,

    /// A lookup by name found nothing.
    #[error("'{0}' not found")]
    NotFound(String),

    /// A lookup by name found something, but not of the requested capability.
    #[error("'{name}' does not support capability '{capability}'")]
    WrongCapability {
        /// The looked-up name.
        name: String,
        /// The capability that was requested.
        capability: &'static str,
    },

    /// A config section redefined a section name already seen in this load.
    #[error("duplicate section '{0}'")]
    DuplicateSection(String),

    /// `LoadConfig` completed with one or more per-section failures.
    #[error("configuration load had {0} error(s)")]
    LoadHadErrors(usize),

    /// The config text itself could not be parsed (malformed syntax).
    #[error("invalid configuration syntax: {0}")]
    InvalidConfig(String),
}

/// Result type used throughout the workspace.
pub type PipelineResult<T> = Result<T, PipelineError>;
