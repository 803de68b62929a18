//! # relay-core
//!
//! Core data model for a pluggable log/event pipeline daemon: plugin
//! categories, the [`Plugin`] trait every plugin implements, runner
//! wrappers, the recyclable message carrier ([`PipelinePack`]) and its
//! bounded pools, and the router registration interface.
//!
//! Concrete plugin implementations, the router's matching engine, and the
//! runner event loops themselves are out of scope for this crate — it only
//! defines the shapes `relay-config` and `relay-runtime` build on.
//!
//! ## Layout
//!
//! - [`plugin`]: [`PluginCategory`], the [`Plugin`] trait, config schemas.
//! - [`runner`]: per-category runner structs and the plugin traits they wrap.
//! - [`pack`]: [`PipelinePack`] and [`pack::PackPool`].
//! - [`router`]: the [`router::Router`] registration interface.
//! - [`abort`]: the process-wide [`abort::AbortSignal`].
//! - [`waitgroup`]: a small async wait-group used during shutdown.
//! - [`error`]: [`error::PipelineError`], shared across the workspace.

pub mod abort;
pub mod error;
pub mod pack;
pub mod plugin;
pub mod router;
pub mod runner;
pub mod waitgroup;

pub use abort::AbortSignal;
pub use error::{PipelineError, PipelineResult};
pub use pack::{PackPool, PipelinePack, PoolKind};
pub use plugin::{ConfigSchema, Plugin, PluginCategory, PluginConfigValue};
pub use router::{MatcherSpec, Router};
pub use runner::{
    DecoderPlugin, DecoderRunner, EncoderPlugin, FilterRunner, FilterRunnerPlugin, InputRunner,
    InputRunnerPlugin, OutputRunner, OutputRunnerPlugin, PluginInstance, SplitterPlugin,
    SplitterRunner,
};
pub use waitgroup::WaitGroup;
