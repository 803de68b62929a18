//! Router registration interface.
//!
//! The matching-engine internals of the router are out of scope; this crate
//! only defines the interface filters and outputs register their matchers
//! against.

use crate::error::PipelineResult;
use async_trait::async_trait;

/// A filter or output's subscription to the router, built from the
/// `message_matcher`/`message_signer` section keys.
#[derive(Debug, Clone)]
pub struct MatcherSpec {
    pub message_matcher: String,
    pub message_signer: Option<String>,
}

/// The registration surface a [`crate::runner::FilterRunner`] or
/// [`crate::runner::OutputRunner`] is registered against.
///
/// Adding and removing go over bounded channels in a real router
/// implementation, which is why both operations are async and fallible: the
/// channel send may need to wait briefly, and fails once the router has shut
/// down.
#[async_trait]
pub trait Router: Send + Sync {
    async fn add_matcher(&self, name: &str, matcher: MatcherSpec) -> PipelineResult<()>;
    async fn remove_matcher(&self, name: &str) -> PipelineResult<()>;
}
