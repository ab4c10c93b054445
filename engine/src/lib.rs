//! Analysis orchestration for AI-On.
//!
//! Raw text goes through one of four pipelines, each behind the same
//! [`Oracle`] seam:
//!
//! - [`HallucinationPipeline`] - tokenize, build bounded combinations, check
//!   them for contradictions in throttled batches
//! - [`LogicalAnalysis`] - extract → cross-check → synthesize with per-step status
//! - [`GraphExtractor`] - single-call knowledge graph
//! - [`FactChecker`] - web-grounded streaming answer
//!
//! [`Engine`] owns the keyed [`ResultStore`] and runs each request as its
//! own tokio task. Tasks only ever write their own slot, via
//! [`RecordUpdate`] snapshots on a channel the engine drains.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

pub use alon_providers::{self, Oracle, OracleError};
pub use alon_types;
pub use alon_types::{
    AnalysisMode, AnalysisRecord, FactCheckMessage, GraphMessage, HallucinationMessage,
    LarkMessage, RecordState, RequestId, RequestStatus,
};

mod combinations;
mod config;
mod errors;
mod fact_check;
mod graph;
mod hallucination;
mod lark;
mod normalize;
mod prompts;
mod store;
#[cfg(test)]
mod test_support;
mod tokenizer;
mod usage;

pub use combinations::{CombinationGenerator, DEFAULT_MIN_SIZE, DEFAULT_WINDOW_SIZE};
pub use config::{
    API_KEY_ENV, AlonConfig, ApiKeys, AppConfig, CombinationsConfig, ConfigError,
    DEFAULT_BATCH_SIZE, DEFAULT_INTER_BATCH_DELAY_MS, EngineConfig, HallucinationConfig,
    MODEL_ENV, TokenizerConfig, config_path, expand_env_vars,
};
pub use errors::AnalysisError;
pub use fact_check::FactChecker;
pub use graph::GraphExtractor;
pub use hallucination::{HallucinationPipeline, TOO_SHORT_MESSAGE};
pub use lark::{
    INSUFFICIENT_EXPRESSIONS_SUMMARY, LogicalAnalysis, NO_CONTRADICTION_SUMMARY, synthesize,
};
pub use store::{RecordUpdate, ResultStore};
pub use tokenizer::{DEFAULT_AFFIXES, Tokenizer};
pub use usage::UsageAccumulator;

// ============================================================================
// Engine
// ============================================================================

/// Starts analysis requests and folds their progress into a [`ResultStore`].
///
/// `start_*` must be called from within a tokio runtime.
pub struct Engine {
    oracle: Arc<dyn Oracle>,
    config: Arc<EngineConfig>,
    store: ResultStore,
    next_id: RequestId,
    update_tx: mpsc::UnboundedSender<RecordUpdate>,
    update_rx: mpsc::UnboundedReceiver<RecordUpdate>,
}

impl Engine {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>, config: EngineConfig) -> Self {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Self {
            oracle,
            config: Arc::new(config),
            store: ResultStore::new(),
            next_id: RequestId::new(1),
            update_tx,
            update_rx,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    #[must_use]
    pub fn record(&self, id: RequestId) -> Option<&AnalysisRecord> {
        self.store.get(id)
    }

    /// Register a pending record for `text` and spawn its pipeline.
    /// Returns immediately.
    pub fn start(&mut self, mode: AnalysisMode, text: impl Into<String>) -> RequestId {
        let text = text.into();
        let id = self.next_id;
        self.next_id = id.next();
        self.store
            .insert_pending(id, AnalysisRecord::pending(mode, text.clone()));
        tracing::debug!(%id, mode = mode.as_str(), "Starting analysis request");

        let publisher = Publisher::new(id, self.update_tx.clone());
        let task = run_request(
            mode,
            text.clone(),
            Arc::clone(&self.oracle),
            Arc::clone(&self.config),
            publisher.clone(),
        );
        spawn_supervised(task, mode, text, publisher);
        id
    }

    pub fn start_hallucination(&mut self, text: impl Into<String>) -> RequestId {
        self.start(AnalysisMode::Hallucination, text)
    }

    pub fn start_logical(&mut self, text: impl Into<String>) -> RequestId {
        self.start(AnalysisMode::Logical, text)
    }

    pub fn start_graph(&mut self, text: impl Into<String>) -> RequestId {
        self.start(AnalysisMode::Graph, text)
    }

    pub fn start_fact_check(&mut self, text: impl Into<String>) -> RequestId {
        self.start(AnalysisMode::Fact, text)
    }

    /// Apply every update already received. Returns the ids whose record
    /// changed, in arrival order.
    pub fn poll_updates(&mut self) -> Vec<RequestId> {
        let mut changed = Vec::new();
        while let Ok(update) = self.update_rx.try_recv() {
            let id = update.id;
            if self.store.apply(update) {
                changed.push(id);
            }
        }
        changed
    }

    /// Wait for the next update that changes a record and apply it.
    ///
    /// Returns `None` once nothing is pending and no updates are queued.
    pub async fn next_update(&mut self) -> Option<RequestId> {
        loop {
            let update = match self.update_rx.try_recv() {
                Ok(update) => update,
                Err(_) if self.store.pending_count() == 0 => return None,
                Err(_) => self.update_rx.recv().await?,
            };
            let id = update.id;
            if self.store.apply(update) {
                return Some(id);
            }
        }
    }
}

/// Sends snapshots for one request id and remembers the latest one. Send
/// failures mean the engine is gone; the pipeline keeps running with no
/// observable effect.
#[derive(Clone)]
struct Publisher {
    id: RequestId,
    tx: mpsc::UnboundedSender<RecordUpdate>,
    last: Arc<Mutex<Option<AnalysisRecord>>>,
}

impl Publisher {
    fn new(id: RequestId, tx: mpsc::UnboundedSender<RecordUpdate>) -> Self {
        Self {
            id,
            tx,
            last: Arc::new(Mutex::new(None)),
        }
    }

    fn send(&self, record: AnalysisRecord) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        let _ = self.tx.send(RecordUpdate {
            id: self.id,
            record,
        });
    }

    fn last_snapshot(&self) -> Option<AnalysisRecord> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn run_request(
    mode: AnalysisMode,
    text: String,
    oracle: Arc<dyn Oracle>,
    config: Arc<EngineConfig>,
    publisher: Publisher,
) {
    match mode {
        AnalysisMode::Hallucination => {
            let pipeline = HallucinationPipeline::new(oracle, &config);
            let state = match pipeline.analyze_text(&text).await {
                Ok(report) => RecordState::Complete(report),
                Err(error) => {
                    tracing::warn!(%error, "Hallucination analysis failed");
                    RecordState::Error(error.user_message())
                }
            };
            publisher.send(AnalysisRecord::Hallucination(HallucinationMessage {
                input: text,
                state,
            }));
        }
        AnalysisMode::Logical => {
            LogicalAnalysis::new(oracle, &config)
                .run(&text, |message| {
                    publisher.send(AnalysisRecord::Logical(message.clone()));
                })
                .await;
        }
        AnalysisMode::Graph => {
            let state = match GraphExtractor::new(oracle, &config).extract(&text).await {
                Ok(report) => RecordState::Complete(report),
                Err(error) => {
                    tracing::warn!(%error, "Knowledge graph extraction failed");
                    RecordState::Error(error.user_message())
                }
            };
            publisher.send(AnalysisRecord::Graph(GraphMessage { input: text, state }));
        }
        AnalysisMode::Fact => {
            FactChecker::new(oracle, &config)
                .check(&text, |message| {
                    publisher.send(AnalysisRecord::FactCheck(message.clone()));
                })
                .await;
        }
    }
}

/// Spawn `task`; if it panics, fail its last published snapshot so the
/// slot neither stays pending nor loses completed progress.
fn spawn_supervised<F>(task: F, mode: AnalysisMode, input: String, publisher: Publisher)
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(task);
    tokio::spawn(async move {
        if let Err(join_error) = handle.await {
            tracing::error!(id = %publisher.id, %join_error, "Analysis task aborted");
            let snapshot = publisher
                .last_snapshot()
                .unwrap_or_else(|| AnalysisRecord::pending(mode, input));
            publisher.send(snapshot.fail(format!("analysis task aborted: {join_error}")));
        }
    });
}
