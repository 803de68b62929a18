//! # relay-runtime
//!
//! The `PipelineConfig` orchestrator: two-phase config loading (Preload,
//! then Load), the runtime helper operations plugins call while the
//! pipeline is live, config file discovery, and process logging setup.
//!
//! ```ignore
//! use relay_runtime::config::PipelineConfig;
//! use relay_runtime::simple_router::SimpleRouter;
//! use relay_core::AbortSignal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     relay_runtime::logging::init_relay();
//!
//!     let text = relay_runtime::loader::ConfigLoader::default()
//!         .load()?
//!         .unwrap_or_default();
//!
//!     let pipeline = PipelineConfig::new(100, 4, Arc::new(SimpleRouter::new(64)), AbortSignal::new());
//!     pipeline.preload_from_str(&text).await?;
//!     pipeline.load().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod simple_router;

#[cfg(test)]
mod testutil;

pub use config::PipelineConfig;
pub use loader::ConfigLoader;
pub use logging::{LoggingBuilder, SpanEvents};
pub use simple_router::SimpleRouter;

pub use tracing;
pub use tracing_subscriber;

/// Convenient bundle of the logging macros most call sites need.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
