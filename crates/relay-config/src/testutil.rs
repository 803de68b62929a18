//! Test doubles shared by this crate's unit tests.

#![cfg(test)]

use async_trait::async_trait;
use relay_core::{
    ConfigSchema, InputRunnerPlugin, PipelineResult, Plugin, PluginConfigValue, PluginInstance,
};
use serde_json::json;

pub struct NoopInput {
    pub inited: bool,
}

#[async_trait]
impl Plugin for NoopInput {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        self.inited = true;
        Ok(())
    }
}

#[async_trait]
impl InputRunnerPlugin for NoopInput {
    async fn start(&self) -> PipelineResult<()> {
        Ok(())
    }
    async fn stop(&self) -> PipelineResult<()> {
        Ok(())
    }
}

pub fn make_noop_input() -> PluginInstance {
    PluginInstance::Input(Box::new(NoopInput { inited: false }))
}

pub struct SchemaFilter {
    pub schema_seen: Option<serde_json::Value>,
}

struct FilterSchema;

impl ConfigSchema for FilterSchema {
    fn defaults(&self) -> serde_json::Value {
        json!({ "threshold": 10 })
    }
}

#[async_trait]
impl Plugin for SchemaFilter {
    fn config_schema(&self) -> Option<Box<dyn ConfigSchema>> {
        Some(Box::new(FilterSchema))
    }

    async fn init(&mut self, config: &PluginConfigValue) -> PipelineResult<()> {
        self.schema_seen = Some(config.as_value().clone());
        Ok(())
    }
}

#[async_trait]
impl relay_core::FilterRunnerPlugin for SchemaFilter {
    async fn start(&self) -> PipelineResult<()> {
        Ok(())
    }
    async fn stop(&self) -> PipelineResult<()> {
        Ok(())
    }
}

pub fn make_schema_filter() -> PluginInstance {
    PluginInstance::Filter(Box::new(SchemaFilter { schema_seen: None }))
}
