//! # relay-config
//!
//! Config-time plumbing for the pipeline daemon: environment-variable
//! expansion, section decoding, the process-wide plugin registry, the
//! per-section plugin maker (`PrepConfig`/`MakeRunner`), and the
//! MultiDecoder dependency orderer.
//!
//! Runtime orchestration — wiring makers into a running pipeline, starting
//! and stopping runners, the router implementation — lives in
//! `relay-runtime`, which depends on this crate.
//!
//! ## Layout
//!
//! - [`env`]: `%ENV[NAME]` expansion.
//! - [`section`]: TOML section decoding.
//! - [`registry`]: the process-wide [`registry::PluginRegistry`].
//! - [`maker`]: [`maker::PluginMaker`], the per-section config/runner builder.
//! - [`orderer`]: MultiDecoder `subs` dependency ordering.

pub mod env;
pub mod maker;
pub mod orderer;
pub mod registry;
pub mod section;

#[cfg(test)]
mod testutil;

pub use env::expand_env;
pub use maker::{CommonConfig, PluginMaker, RunnerHandle};
pub use orderer::order_multi_decoders;
pub use registry::{PluginFactory, PluginRegistry};
pub use section::{GLOBALS_SECTION, Section, decode_globals, decode_sections};
