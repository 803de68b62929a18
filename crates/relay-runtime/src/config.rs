//! `PipelineConfig`: the two-phase config orchestrator (Preload/Load) and
//! the runtime helper operations plugins call while the pipeline is live.

use indexmap::IndexMap;
use relay_config::{PluginMaker, RunnerHandle, decode_sections, expand_env, order_multi_decoders};
use relay_core::{
    AbortSignal, DecoderRunner, EncoderPlugin, FilterRunner, InputRunner, OutputRunner, PackPool,
    PipelineError, PipelinePack, PipelineResult, PluginCategory, PluginInstance, PoolKind, Router,
    SplitterRunner, WaitGroup,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{error, info, warn};

/// The two-phase config orchestrator. One instance per running daemon.
pub struct PipelineConfig {
    makers: AsyncRwLock<IndexMap<String, Arc<PluginMaker>>>,
    input_runners: AsyncRwLock<HashMap<String, Arc<InputRunner>>>,
    filter_runners: AsyncRwLock<HashMap<String, Arc<FilterRunner>>>,
    output_runners: AsyncRwLock<HashMap<String, Arc<OutputRunner>>>,
    splitters: AsyncRwLock<HashMap<String, Arc<SplitterRunner>>>,
    all_decoders: parking_lot::RwLock<HashMap<String, Arc<DecoderRunner>>>,
    all_encoders: parking_lot::RwLock<HashMap<String, Box<dyn EncoderPlugin>>>,

    input_pool: PackPool,
    inject_pool: PackPool,
    router: Arc<dyn Router>,
    abort: AbortSignal,

    inputs_wg: WaitGroup,
    filters_wg: WaitGroup,
    decoders_wg: WaitGroup,

    max_loop_count: u32,
    load_errors: parking_lot::Mutex<Vec<String>>,
    sections_seen: AtomicUsize,
    shutting_down: AtomicBool,
}

impl PipelineConfig {
    pub fn new(
        pool_capacity: usize,
        max_loop_count: u32,
        router: Arc<dyn Router>,
        abort: AbortSignal,
    ) -> Self {
        Self {
            makers: AsyncRwLock::new(IndexMap::new()),
            input_runners: AsyncRwLock::new(HashMap::new()),
            filter_runners: AsyncRwLock::new(HashMap::new()),
            output_runners: AsyncRwLock::new(HashMap::new()),
            splitters: AsyncRwLock::new(HashMap::new()),
            all_decoders: parking_lot::RwLock::new(HashMap::new()),
            all_encoders: parking_lot::RwLock::new(HashMap::new()),
            input_pool: PackPool::new(pool_capacity, PoolKind::Input),
            inject_pool: PackPool::new(pool_capacity, PoolKind::Inject),
            router,
            abort,
            inputs_wg: WaitGroup::new(),
            filters_wg: WaitGroup::new(),
            decoders_wg: WaitGroup::new(),
            max_loop_count,
            load_errors: parking_lot::Mutex::new(Vec::new()),
            sections_seen: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    fn record_error(&self, msg: String) {
        error!("{msg}");
        self.load_errors.lock().push(msg);
    }

    fn dedup_error_count(&self) -> usize {
        let errors = self.load_errors.lock();
        let unique: HashSet<&String> = errors.iter().collect();
        unique.len()
    }

    // ─── Phase 1: Preload ──────────────────────────────────────────────

    /// Expands, decodes, and files makers for every non-`hekad` section in
    /// `text`. Per-section construction failures are logged and counted;
    /// a malformed document (bad TOML syntax, a duplicate section) is a
    /// hard error since there is nothing sensible to file. Call serially;
    /// may be called more than once to merge multiple documents.
    pub async fn preload_from_str(&self, text: &str) -> PipelineResult<()> {
        let expanded = expand_env(text)?;
        let sections = decode_sections(&expanded)?;
        self.sections_seen.fetch_add(sections.len(), Ordering::SeqCst);

        let mut makers = self.makers.write().await;
        for (name, section) in sections {
            match PluginMaker::new(&section) {
                Ok(maker) => {
                    info!(section = %name, type_name = %maker.type_name(), "section filed");
                    makers.insert(name, Arc::new(maker));
                }
                Err(e) => self.record_error(format!("{name}: {e}")),
            }
        }
        Ok(())
    }

    /// Reads `path` and preloads it. See [`Self::preload_from_str`].
    pub async fn preload_from_file(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::InvalidConfig(format!("{}: {e}", path.display())))?;
        self.preload_from_str(&text).await
    }

    // ─── Phase 2: Load ─────────────────────────────────────────────────

    /// Registers any missing default plugins, orders MultiDecoders, then
    /// prepares and builds a runner for every maker in the fixed category
    /// order. Within a category, makers prepare in config insertion order
    /// (Decoders excepted: plain decoders first, then MultiDecoders in
    /// dependency order). Never starts a runner. Fails with
    /// [`PipelineError::LoadHadErrors`] if any section failed, carrying the
    /// de-duplicated error count.
    pub async fn load(&self) -> PipelineResult<()> {
        crate::defaults::register_missing_defaults();

        if self.sections_seen.load(Ordering::SeqCst) == 0 {
            self.record_error("Empty configuration".to_string());
            return Err(PipelineError::LoadHadErrors(self.dedup_error_count()));
        }

        let (by_category, multis, known_decoders) = self.index_by_category().await;

        let mut decoder_order = order_multi_decoders(&multis, &known_decoders)?;
        let plain_decoders: Vec<String> = by_category
            .get(&PluginCategory::Decoder)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|n| !multis.contains_key(n))
            .collect();
        let mut decoder_names = plain_decoders;
        decoder_names.append(&mut decoder_order);

        for category in PluginCategory::PREPARE_ORDER {
            let names = if category == PluginCategory::Decoder {
                decoder_names.clone()
            } else {
                by_category.get(&category).cloned().unwrap_or_default()
            };
            for name in names {
                self.prepare_and_build(&name, category).await;
            }
        }

        let count = self.dedup_error_count();
        if count > 0 {
            return Err(PipelineError::LoadHadErrors(count));
        }
        Ok(())
    }

    async fn index_by_category(
        &self,
    ) -> (
        HashMap<PluginCategory, Vec<String>>,
        HashMap<String, Vec<String>>,
        HashSet<String>,
    ) {
        let makers = self.makers.read().await;
        let mut by_category: HashMap<PluginCategory, Vec<String>> = HashMap::new();
        let mut multis = HashMap::new();
        let mut known_decoders = HashSet::new();

        for (name, maker) in makers.iter() {
            by_category
                .entry(maker.category())
                .or_default()
                .push(name.clone());
            if maker.category() == PluginCategory::Decoder {
                known_decoders.insert(name.clone());
                if let Some(subs) = &maker.common().subs {
                    multis.insert(name.clone(), subs.clone());
                }
            }
        }
        (by_category, multis, known_decoders)
    }

    async fn prepare_and_build(&self, name: &str, category: PluginCategory) {
        let maker = {
            let makers = self.makers.read().await;
            let Some(m) = makers.get(name) else {
                return;
            };
            Arc::clone(m)
        };

        if let Err(e) = maker.prep_config().await {
            self.record_error(format!("{name}: {e}"));
            return;
        }

        if category == PluginCategory::Encoder {
            match maker.take_encoder() {
                Ok(plugin) => {
                    self.all_encoders.write().insert(name.to_string(), plugin);
                }
                Err(e) => self.record_error(format!("{name}: {e}")),
            }
            return;
        }

        let handle = match maker.make_runner(None) {
            Ok(h) => h,
            Err(e) => {
                self.record_error(format!("{name}: {e}"));
                return;
            }
        };

        match handle {
            RunnerHandle::Input(r) => {
                self.input_runners
                    .write()
                    .await
                    .insert(name.to_string(), Arc::new(r));
            }
            RunnerHandle::Filter(r) => {
                self.filter_runners
                    .write()
                    .await
                    .insert(name.to_string(), Arc::new(r));
            }
            RunnerHandle::Output(r) => {
                self.output_runners
                    .write()
                    .await
                    .insert(name.to_string(), Arc::new(r));
            }
            RunnerHandle::Splitter(r) => {
                self.splitters
                    .write()
                    .await
                    .insert(name.to_string(), Arc::new(r));
            }
            RunnerHandle::Decoder(r, _inbound_rx) => {
                self.all_decoders.write().insert(name.to_string(), Arc::new(r));
            }
        }
    }

    // ─── Runtime helper operations ─────────────────────────────────────

    /// Returns a pack from the inject pool, enforcing the configured
    /// maximum loop count. The returned pack's loop count is `loop_count + 1`.
    pub async fn pipeline_pack(&self, loop_count: u32) -> PipelineResult<PipelinePack> {
        if loop_count >= self.max_loop_count {
            return Err(PipelineError::LoopCountExceeded {
                max: self.max_loop_count,
            });
        }
        let mut pack = self.inject_pool.checkout(&self.abort).await?;
        pack.set_loop_count(loop_count + 1);
        Ok(pack)
    }

    pub fn router(&self) -> Arc<dyn Router> {
        Arc::clone(&self.router)
    }

    pub fn input_recycle_chan(&self) -> &PackPool {
        &self.input_pool
    }

    pub fn inject_recycle_chan(&self) -> &PackPool {
        &self.inject_pool
    }

    pub async fn output(&self, name: &str) -> Option<Arc<OutputRunner>> {
        self.output_runners.read().await.get(name).cloned()
    }

    pub async fn filter(&self, name: &str) -> Option<Arc<FilterRunner>> {
        self.filter_runners.read().await.get(name).cloned()
    }

    async fn lookup_maker(&self, name: &str) -> PipelineResult<Arc<PluginMaker>> {
        self.makers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(name.to_string()))
    }

    /// Instantiates a fresh encoder from `base`'s maker and records it under
    /// `full` in `allEncoders`.
    pub async fn encoder(&self, base: &str, full: &str) -> PipelineResult<()> {
        let maker = self.lookup_maker(base).await?;
        let instance = maker.instantiate_fresh().await?;
        let PluginInstance::Encoder(mut plugin) = instance else {
            return Err(PipelineError::WrongCapability {
                name: base.to_string(),
                capability: "Encoder",
            });
        };
        if let Some(named) = plugin.as_named_mut() {
            named.set_name(full);
        }
        self.all_encoders.write().insert(full.to_string(), plugin);
        Ok(())
    }

    /// Instantiates a fresh, bare decoder from `name`'s maker (no runner).
    pub async fn decoder(&self, name: &str) -> PipelineResult<PluginInstance> {
        let maker = self.lookup_maker(name).await?;
        let instance = maker.instantiate_fresh().await?;
        if !matches!(instance, PluginInstance::Decoder(_)) {
            return Err(PipelineError::WrongCapability {
                name: name.to_string(),
                capability: "Decoder",
            });
        }
        Ok(instance)
    }

    /// Instantiates a fresh decoder from `base`'s maker, wraps it in a
    /// runner registered under `full`, starts it, and tracks it in the
    /// decoders wait-group.
    pub async fn decoder_runner(&self, base: &str, full: &str) -> PipelineResult<Arc<DecoderRunner>> {
        let maker = self.lookup_maker(base).await?;
        let instance = maker.instantiate_fresh().await?;
        let PluginInstance::Decoder(plugin) = instance else {
            return Err(PipelineError::WrongCapability {
                name: base.to_string(),
                capability: "Decoder",
            });
        };
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let runner = Arc::new(DecoderRunner::new(full.to_string(), plugin, tx));
        self.decoders_wg.add(1);
        self.all_decoders
            .write()
            .insert(full.to_string(), Arc::clone(&runner));

        if let Err(e) = runner.start().await {
            self.all_decoders.write().remove(full);
            self.decoders_wg.done();
            return Err(PipelineError::RunnerStartFailed {
                runner: full.to_string(),
                reason: e.to_string(),
            });
        }

        info!(decoder = %full, "decoder runner started");
        Ok(runner)
    }

    /// Removes `name` from `allDecoders`, stopping its plugin and closing its
    /// inbound channel to signal shutdown. Returns whether it was present.
    pub async fn stop_decoder_runner(&self, name: &str) -> bool {
        let Some(runner) = self.all_decoders.write().remove(name) else {
            return false;
        };
        let _ = runner.stop().await;
        runner.close_inbound();
        self.decoders_wg.done();
        true
    }

    /// Locates an input runner by name and projects its plugin to the
    /// stat-accumulator capability.
    pub async fn stat_accumulator(&self, name: &str) -> PipelineResult<serde_json::Value> {
        let runners = self.input_runners.read().await;
        let runner = runners
            .get(name)
            .ok_or_else(|| PipelineError::NotFound(name.to_string()))?;
        let accumulator =
            runner
                .as_plugin()
                .as_stat_accumulator()
                .ok_or_else(|| PipelineError::WrongCapability {
                    name: name.to_string(),
                    capability: "StatAccumulator",
                })?;
        Ok(accumulator.stats())
    }

    pub async fn add_filter_runner(&self, name: &str, runner: Arc<FilterRunner>) -> PipelineResult<()> {
        self.filter_runners
            .write()
            .await
            .insert(name.to_string(), Arc::clone(&runner));
        self.filters_wg.add(1);

        if let Err(e) = runner.start().await {
            self.filter_runners.write().await.remove(name);
            self.filters_wg.done();
            return Err(PipelineError::RunnerStartFailed {
                runner: name.to_string(),
                reason: e.to_string(),
            });
        }

        self.router.add_matcher(name, runner.matcher().clone()).await?;
        info!(filter = %name, "filter runner started");
        Ok(())
    }

    /// No-op once shutdown has begun, to avoid racing the router's teardown.
    pub async fn remove_filter_runner(&self, name: &str) -> PipelineResult<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.router.remove_matcher(name).await?;
        self.filter_runners.write().await.remove(name);
        Ok(())
    }

    pub async fn add_input_runner(&self, name: &str, runner: Arc<InputRunner>) -> PipelineResult<()> {
        self.input_runners
            .write()
            .await
            .insert(name.to_string(), Arc::clone(&runner));
        self.inputs_wg.add(1);

        if let Err(e) = runner.start().await {
            self.input_runners.write().await.remove(name);
            self.inputs_wg.done();
            return Err(PipelineError::RunnerStartFailed {
                runner: name.to_string(),
                reason: e.to_string(),
            });
        }
        info!(input = %name, "input runner started");
        Ok(())
    }

    /// Removes the maker (so it cannot be re-resolved) and stops the runner.
    pub async fn remove_input_runner(&self, name: &str) -> PipelineResult<()> {
        self.makers.write().await.shift_remove(name);
        let runner = self.input_runners.write().await.remove(name);
        if let Some(runner) = runner {
            runner.stop().await?;
            self.inputs_wg.done();
        }
        Ok(())
    }

    pub async fn remove_output_runner(&self, name: &str) -> PipelineResult<()> {
        self.makers.write().await.shift_remove(name);
        self.router.remove_matcher(name).await?;
        self.output_runners.write().await.remove(name);
        Ok(())
    }

    /// Fires the process-wide abort signal and marks shutdown in progress.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.abort.abort();
        warn!("pipeline shutdown initiated");
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    /// Blocks until every currently-tracked input, filter, and decoder
    /// runner has completed. Intended to be awaited after `begin_shutdown`.
    pub async fn wait_for_drain(&self) {
        self.inputs_wg.wait().await;
        self.filters_wg.wait().await;
        self.decoders_wg.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_router::SimpleRouter;

    fn new_config() -> PipelineConfig {
        PipelineConfig::new(4, 4, Arc::new(SimpleRouter::new(8)), AbortSignal::new())
    }

    #[tokio::test]
    async fn empty_config_fails_with_one_error() {
        let cfg = new_config();
        cfg.preload_from_str("").await.unwrap();
        let err = cfg.load().await.unwrap_err();
        assert!(matches!(err, PipelineError::LoadHadErrors(1)));
    }

    #[tokio::test]
    async fn unknown_plugin_type_is_counted_not_fatal() {
        let cfg = new_config();
        cfg.preload_from_str("[Ghost]\ntype = \"TotallyMissingInput\"\n")
            .await
            .unwrap();
        let err = cfg.load().await.unwrap_err();
        assert!(matches!(err, PipelineError::LoadHadErrors(1)));
    }

    #[tokio::test]
    async fn single_input_builds_a_runner() {
        use crate::testutil::register_test_input;
        register_test_input();
        let cfg = new_config();
        cfg.preload_from_str("[MyInput]\ntype = \"TestRuntimeInput\"\n")
            .await
            .unwrap();
        cfg.load().await.unwrap();
        assert!(cfg.input_runners.read().await.contains_key("MyInput"));
    }

    #[tokio::test]
    async fn multi_decoder_subs_load_alongside_their_composer() {
        use crate::testutil::register_test_decoder;
        register_test_decoder();
        let cfg = new_config();
        cfg.preload_from_str(
            "[A]\ntype = \"TestRuntimeDecoder\"\n\
             [B]\ntype = \"TestRuntimeDecoder\"\n\
             [Combo]\ntype = \"TestRuntimeDecoder\"\nsubs = [\"A\", \"B\"]\n",
        )
        .await
        .unwrap();
        cfg.load().await.unwrap();

        let decoders = cfg.all_decoders.read();
        assert!(decoders.contains_key("A"));
        assert!(decoders.contains_key("B"));
        assert!(decoders.contains_key("Combo"));
    }

    #[tokio::test]
    async fn multi_decoder_with_unknown_sub_is_a_load_error() {
        use crate::testutil::register_test_decoder;
        register_test_decoder();
        let cfg = new_config();
        cfg.preload_from_str(
            "[Combo]\ntype = \"TestRuntimeDecoder\"\nsubs = [\"Ghost\"]\n",
        )
        .await
        .unwrap();
        let err = cfg.load().await.unwrap_err();
        assert!(matches!(err, PipelineError::LoadHadErrors(_)));
    }

    #[tokio::test]
    async fn decoder_runner_helper_starts_the_runner() {
        use crate::testutil::register_test_decoder;
        register_test_decoder();
        let cfg = new_config();
        cfg.preload_from_str("[A]\ntype = \"TestRuntimeDecoder\"\n")
            .await
            .unwrap();
        cfg.load().await.unwrap();

        let runner = cfg.decoder_runner("A", "A-fresh").await.unwrap();
        assert!(runner.is_started());
        assert!(cfg.all_decoders.read().contains_key("A-fresh"));

        assert!(cfg.stop_decoder_runner("A-fresh").await);
        assert!(!cfg.all_decoders.read().contains_key("A-fresh"));
    }

    #[tokio::test]
    async fn add_then_remove_filter_runner_round_trips() {
        use crate::testutil::TestFilterHandle;
        let cfg = new_config();
        let (runner, _matcher) = TestFilterHandle::runner("Dedupe");

        cfg.add_filter_runner("Dedupe", runner).await.unwrap();
        assert!(cfg.filter_runners.read().await.contains_key("Dedupe"));

        cfg.remove_filter_runner("Dedupe").await.unwrap();
        assert!(!cfg.filter_runners.read().await.contains_key("Dedupe"));
    }

    #[tokio::test]
    async fn remove_filter_runner_short_circuits_once_shutting_down() {
        let cfg = new_config();
        cfg.begin_shutdown();
        // No matcher was ever added; a real removal attempt would error.
        // The shutdown short-circuit must return Ok regardless.
        cfg.remove_filter_runner("NeverAdded").await.unwrap();
    }

    #[tokio::test]
    async fn category_index_preserves_config_insertion_order_not_name_order() {
        use crate::testutil::register_test_input;
        register_test_input();
        let cfg = new_config();
        cfg.preload_from_str(
            "[Zebra]\ntype = \"TestRuntimeInput\"\n[Apple]\ntype = \"TestRuntimeInput\"\n",
        )
        .await
        .unwrap();

        let (by_category, _, _) = cfg.index_by_category().await;
        assert_eq!(
            by_category.get(&PluginCategory::Input).unwrap(),
            &vec!["Zebra".to_string(), "Apple".to_string()]
        );
    }

    #[tokio::test]
    async fn loop_count_guard_rejects_at_the_configured_maximum() {
        let cfg = new_config();
        let err = cfg.pipeline_pack(cfg.max_loop_count).await.unwrap_err();
        assert!(matches!(err, PipelineError::LoopCountExceeded { .. }));

        let pack = cfg.pipeline_pack(cfg.max_loop_count - 1).await.unwrap();
        assert_eq!(pack.loop_count(), cfg.max_loop_count);
    }
}
