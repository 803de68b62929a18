//! Runner variants wrapping a configured plugin, and the per-category
//! plugin traits that drive them.
//!
//! Runner event-loop internals are out of scope; these types expose only
//! the start/stop contract the orchestrator and helper facade need.

use crate::error::PipelineResult;
use crate::pack::PipelinePack;
use crate::plugin::{Plugin, PluginCategory};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// A plugin wrapped in an `InputRunner`. Has no inbound channel: inputs are
/// the system's entry points.
#[async_trait]
pub trait InputRunnerPlugin: Plugin {
    async fn start(&self) -> PipelineResult<()>;
    async fn stop(&self) -> PipelineResult<()>;
}

/// A plugin wrapped in a `FilterRunner`. Registers a matcher with the
/// router on successful start.
#[async_trait]
pub trait FilterRunnerPlugin: Plugin {
    async fn start(&self) -> PipelineResult<()>;
    async fn stop(&self) -> PipelineResult<()>;
}

/// A plugin wrapped in an `OutputRunner`. Registers a matcher with the
/// router on successful start.
#[async_trait]
pub trait OutputRunnerPlugin: Plugin {
    async fn start(&self) -> PipelineResult<()>;
    async fn stop(&self) -> PipelineResult<()>;
}

/// A decoder plugin. Decoders have an inbound pack channel; closing it
/// signals the decoder's run loop to shut down.
#[async_trait]
pub trait DecoderPlugin: Plugin {
    fn decode(&self, pack: &mut PipelinePack) -> PipelineResult<Vec<PipelinePack>>;

    async fn start(&self) -> PipelineResult<()>;
    async fn stop(&self) -> PipelineResult<()>;
}

/// A splitter plugin: a stateful byte-stream framer attached to an input.
/// Splitters have no runner event loop of their own.
pub trait SplitterPlugin: Plugin {
    fn split(&mut self, data: &[u8]) -> PipelineResult<Vec<Vec<u8>>>;
}

/// An encoder plugin. Encoders have no runner: they are bare, stateful
/// objects keyed by instance name in `allEncoders`.
pub trait EncoderPlugin: Plugin {
    fn encode(&self, pack: &PipelinePack) -> PipelineResult<Vec<u8>>;
}

/// A freshly-instantiated plugin, still wearing the concrete category trait
/// its factory produced it as.
///
/// A plugin factory commits to a category by the variant it returns; the
/// maker separately derives the expected category from the type name's
/// suffix and treats a mismatch as a registration bug rather than a normal
/// config error.
pub enum PluginInstance {
    Input(Box<dyn InputRunnerPlugin>),
    Decoder(Box<dyn DecoderPlugin>),
    Encoder(Box<dyn EncoderPlugin>),
    Filter(Box<dyn FilterRunnerPlugin>),
    Output(Box<dyn OutputRunnerPlugin>),
    Splitter(Box<dyn SplitterPlugin>),
}

impl PluginInstance {
    pub fn category(&self) -> PluginCategory {
        match self {
            PluginInstance::Input(_) => PluginCategory::Input,
            PluginInstance::Decoder(_) => PluginCategory::Decoder,
            PluginInstance::Encoder(_) => PluginCategory::Encoder,
            PluginInstance::Filter(_) => PluginCategory::Filter,
            PluginInstance::Output(_) => PluginCategory::Output,
            PluginInstance::Splitter(_) => PluginCategory::Splitter,
        }
    }

    pub fn as_plugin(&self) -> &dyn Plugin {
        match self {
            PluginInstance::Input(p) => p.as_ref(),
            PluginInstance::Decoder(p) => p.as_ref(),
            PluginInstance::Encoder(p) => p.as_ref(),
            PluginInstance::Filter(p) => p.as_ref(),
            PluginInstance::Output(p) => p.as_ref(),
            PluginInstance::Splitter(p) => p.as_ref(),
        }
    }

    pub fn as_plugin_mut(&mut self) -> &mut dyn Plugin {
        match self {
            PluginInstance::Input(p) => p.as_mut(),
            PluginInstance::Decoder(p) => p.as_mut(),
            PluginInstance::Encoder(p) => p.as_mut(),
            PluginInstance::Filter(p) => p.as_mut(),
            PluginInstance::Output(p) => p.as_mut(),
            PluginInstance::Splitter(p) => p.as_mut(),
        }
    }
}

/// A started (or startable) input runner.
pub struct InputRunner {
    name: String,
    plugin: Box<dyn InputRunnerPlugin>,
    started: AtomicBool,
}

impl InputRunner {
    pub fn new(name: impl Into<String>, plugin: Box<dyn InputRunnerPlugin>) -> Self {
        Self {
            name: name.into(),
            plugin,
            started: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn start(&self) -> PipelineResult<()> {
        self.plugin.start().await?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn stop(&self) -> PipelineResult<()> {
        self.plugin.stop().await?;
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn plugin(&self) -> &dyn InputRunnerPlugin {
        self.plugin.as_ref()
    }

    /// Upcasts to the base [`Plugin`] trait, e.g. to probe
    /// [`crate::plugin::StatAccumulatorCapability`].
    pub fn as_plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }
}

/// A started (or startable) filter runner, with the matcher it was
/// registered against the router under.
pub struct FilterRunner {
    name: String,
    plugin: Box<dyn FilterRunnerPlugin>,
    matcher: crate::router::MatcherSpec,
    started: AtomicBool,
}

impl FilterRunner {
    pub fn new(
        name: impl Into<String>,
        plugin: Box<dyn FilterRunnerPlugin>,
        matcher: crate::router::MatcherSpec,
    ) -> Self {
        Self {
            name: name.into(),
            plugin,
            matcher,
            started: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &crate::router::MatcherSpec {
        &self.matcher
    }

    pub async fn start(&self) -> PipelineResult<()> {
        self.plugin.start().await?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn stop(&self) -> PipelineResult<()> {
        self.plugin.stop().await?;
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// A started (or startable) output runner, with the matcher it was
/// registered against the router under.
pub struct OutputRunner {
    name: String,
    plugin: Box<dyn OutputRunnerPlugin>,
    matcher: crate::router::MatcherSpec,
    started: AtomicBool,
}

impl OutputRunner {
    pub fn new(
        name: impl Into<String>,
        plugin: Box<dyn OutputRunnerPlugin>,
        matcher: crate::router::MatcherSpec,
    ) -> Self {
        Self {
            name: name.into(),
            plugin,
            matcher,
            started: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &crate::router::MatcherSpec {
        &self.matcher
    }

    pub async fn start(&self) -> PipelineResult<()> {
        self.plugin.start().await?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn stop(&self) -> PipelineResult<()> {
        self.plugin.stop().await?;
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// A running decoder: a bare decoder plugin plus the inbound channel whose
/// closure signals its run loop to exit.
pub struct DecoderRunner {
    name: String,
    plugin: Box<dyn DecoderPlugin>,
    inbound: parking_lot::Mutex<Option<mpsc::Sender<PipelinePack>>>,
    started: AtomicBool,
}

impl DecoderRunner {
    pub fn new(
        name: impl Into<String>,
        plugin: Box<dyn DecoderPlugin>,
        inbound: mpsc::Sender<PipelinePack>,
    ) -> Self {
        Self {
            name: name.into(),
            plugin,
            inbound: parking_lot::Mutex::new(Some(inbound)),
            started: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin(&self) -> &dyn DecoderPlugin {
        self.plugin.as_ref()
    }

    pub fn inbound(&self) -> Option<mpsc::Sender<PipelinePack>> {
        self.inbound.lock().clone()
    }

    pub async fn start(&self) -> PipelineResult<()> {
        self.plugin.start().await?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn stop(&self) -> PipelineResult<()> {
        self.plugin.stop().await?;
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Closes the inbound channel, which is the shutdown signal for a
    /// decoder's run loop. Returns whether it was still open.
    pub fn close_inbound(&self) -> bool {
        self.inbound.lock().take().is_some()
    }
}

/// A splitter attached to an input. Has no independent start/stop contract:
/// it is driven synchronously by the input it is attached to.
pub struct SplitterRunner {
    name: String,
    plugin: parking_lot::Mutex<Box<dyn SplitterPlugin>>,
}

impl SplitterRunner {
    pub fn new(name: impl Into<String>, plugin: Box<dyn SplitterPlugin>) -> Self {
        Self {
            name: name.into(),
            plugin: parking_lot::Mutex::new(plugin),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn split(&self, data: &[u8]) -> PipelineResult<Vec<Vec<u8>>> {
        self.plugin.lock().split(data)
    }
}
