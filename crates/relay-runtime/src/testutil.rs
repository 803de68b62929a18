//! Test doubles shared by this crate's unit tests.

#![cfg(test)]

use async_trait::async_trait;
use relay_config::{PluginFactory, PluginRegistry};
use relay_core::{
    DecoderPlugin, FilterRunner, FilterRunnerPlugin, InputRunnerPlugin, MatcherSpec, PipelinePack,
    PipelineResult, Plugin, PluginConfigValue, PluginInstance,
};
use std::sync::Arc;

struct TestRuntimeInput;

#[async_trait]
impl Plugin for TestRuntimeInput {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl InputRunnerPlugin for TestRuntimeInput {
    async fn start(&self) -> PipelineResult<()> {
        Ok(())
    }
    async fn stop(&self) -> PipelineResult<()> {
        Ok(())
    }
}

fn make_test_runtime_input() -> PluginInstance {
    PluginInstance::Input(Box::new(TestRuntimeInput))
}

pub fn register_test_input() {
    PluginRegistry::global().register("TestRuntimeInput", make_test_runtime_input as PluginFactory);
}

struct TestRuntimeFilter;

#[async_trait]
impl Plugin for TestRuntimeFilter {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl FilterRunnerPlugin for TestRuntimeFilter {
    async fn start(&self) -> PipelineResult<()> {
        Ok(())
    }
    async fn stop(&self) -> PipelineResult<()> {
        Ok(())
    }
}

fn make_test_runtime_filter() -> PluginInstance {
    PluginInstance::Filter(Box::new(TestRuntimeFilter))
}

pub fn register_test_filter() {
    PluginRegistry::global().register("TestRuntimeFilter", make_test_runtime_filter as PluginFactory);
}

/// Builds a ready-to-add `FilterRunner` without going through a maker, for
/// tests exercising `PipelineConfig::add_filter_runner`/`remove_filter_runner`
/// directly.
pub struct TestFilterHandle;

impl TestFilterHandle {
    pub fn runner(name: &str) -> (Arc<FilterRunner>, MatcherSpec) {
        let matcher = MatcherSpec {
            message_matcher: "TRUE".to_string(),
            message_signer: None,
        };
        let runner = Arc::new(FilterRunner::new(
            name.to_string(),
            Box::new(TestRuntimeFilter),
            matcher.clone(),
        ));
        (runner, matcher)
    }
}

struct TestRuntimeDecoder;

#[async_trait]
impl Plugin for TestRuntimeDecoder {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl DecoderPlugin for TestRuntimeDecoder {
    fn decode(&self, pack: &mut PipelinePack) -> PipelineResult<Vec<PipelinePack>> {
        Ok(vec![pack.clone()])
    }

    async fn start(&self) -> PipelineResult<()> {
        Ok(())
    }
    async fn stop(&self) -> PipelineResult<()> {
        Ok(())
    }
}

fn make_test_runtime_decoder() -> PluginInstance {
    PluginInstance::Decoder(Box::new(TestRuntimeDecoder))
}

pub fn register_test_decoder() {
    PluginRegistry::global().register("TestRuntimeDecoder", make_test_runtime_decoder as PluginFactory);
}
