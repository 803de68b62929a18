//! Built-in default plugin registrations.
//!
//! A stock config may reference these six type names without the host
//! binary registering anything itself. Concrete protocol and framing logic
//! is out of scope; each is a minimal stand-in sufficient to exercise
//! registration, `PrepConfig`, and the runner/encoder plumbing end to end.

use async_trait::async_trait;
use relay_config::{PluginFactory, PluginRegistry};
use relay_core::{
    DecoderPlugin, EncoderPlugin, Plugin, PipelinePack, PipelineResult, PluginConfigValue,
    PluginInstance, SplitterPlugin,
};

const DEFAULT_TYPES: &[(&str, PluginFactory)] = &[
    ("ProtobufDecoder", make_protobuf_decoder),
    ("ProtobufEncoder", make_protobuf_encoder),
    ("TokenSplitter", make_token_splitter),
    ("PatternGroupingSplitter", make_pattern_grouping_splitter),
    ("HekaFramingSplitter", make_heka_framing_splitter),
    ("NullSplitter", make_null_splitter),
];

/// Registers every built-in type not already claimed by the host binary.
/// A prior registration under the same name always wins.
pub fn register_missing_defaults() {
    let registry = PluginRegistry::global();
    for (name, factory) in DEFAULT_TYPES {
        if !registry.is_registered(name) {
            registry.register(*name, *factory);
        }
    }
}

struct ProtobufDecoder;

#[async_trait]
impl Plugin for ProtobufDecoder {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl DecoderPlugin for ProtobufDecoder {
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

fn make_protobuf_decoder() -> PluginInstance {
    PluginInstance::Decoder(Box::new(ProtobufDecoder))
}

struct ProtobufEncoder;

#[async_trait]
impl Plugin for ProtobufEncoder {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

impl EncoderPlugin for ProtobufEncoder {
    fn encode(&self, pack: &PipelinePack) -> PipelineResult<Vec<u8>> {
        Ok(serde_json::to_vec(&pack.message).unwrap_or_default())
    }
}

fn make_protobuf_encoder() -> PluginInstance {
    PluginInstance::Encoder(Box::new(ProtobufEncoder))
}

/// Splits on ASCII newlines, the simplest workable token boundary.
struct TokenSplitter;

#[async_trait]
impl Plugin for TokenSplitter {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

impl SplitterPlugin for TokenSplitter {
    fn split(&mut self, data: &[u8]) -> PipelineResult<Vec<Vec<u8>>> {
        Ok(data.split(|&b| b == b'\n').map(|s| s.to_vec()).collect())
    }
}

fn make_token_splitter() -> PluginInstance {
    PluginInstance::Splitter(Box::new(TokenSplitter))
}

/// Treats the entire buffer as a single record; real pattern matching is
/// out of scope.
struct PatternGroupingSplitter;

#[async_trait]
impl Plugin for PatternGroupingSplitter {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

impl SplitterPlugin for PatternGroupingSplitter {
    fn split(&mut self, data: &[u8]) -> PipelineResult<Vec<Vec<u8>>> {
        if data.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![data.to_vec()])
        }
    }
}

fn make_pattern_grouping_splitter() -> PluginInstance {
    PluginInstance::Splitter(Box::new(PatternGroupingSplitter))
}

/// A length-prefix-free stand-in: the real Heka framing header/footer
/// protocol is out of scope, so this just treats the buffer as one frame.
struct HekaFramingSplitter;

#[async_trait]
impl Plugin for HekaFramingSplitter {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

impl SplitterPlugin for HekaFramingSplitter {
    fn split(&mut self, data: &[u8]) -> PipelineResult<Vec<Vec<u8>>> {
        if data.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![data.to_vec()])
        }
    }
}

fn make_heka_framing_splitter() -> PluginInstance {
    PluginInstance::Splitter(Box::new(HekaFramingSplitter))
}

/// Never splits: every byte stays attached to whichever input read it.
struct NullSplitter;

#[async_trait]
impl Plugin for NullSplitter {
    async fn init(&mut self, _config: &PluginConfigValue) -> PipelineResult<()> {
        Ok(())
    }
}

impl SplitterPlugin for NullSplitter {
    fn split(&mut self, _data: &[u8]) -> PipelineResult<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }
}

fn make_null_splitter() -> PluginInstance {
    PluginInstance::Splitter(Box::new(NullSplitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_six_default_types() {
        register_missing_defaults();
        let registry = PluginRegistry::global();
        for (name, _) in DEFAULT_TYPES {
            assert!(registry.is_registered(name), "{name} should be registered");
        }
    }

    #[test]
    fn does_not_clobber_a_host_registration() {
        fn custom_decoder() -> PluginInstance {
            PluginInstance::Decoder(Box::new(ProtobufDecoder))
        }
        PluginRegistry::global().register("ProtobufDecoder", custom_decoder as PluginFactory);
        register_missing_defaults();
        let factory = PluginRegistry::global().lookup("ProtobufDecoder").unwrap();
        assert_eq!(factory as usize, custom_decoder as usize);
    }
}
