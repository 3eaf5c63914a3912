//! Test doubles for exercising the engine without a model server.

use crate::config::BotConfig;
use crate::engine::{AccessPolicy, InboundCommand, SessionEngine};
use crate::pipeline::{BackendOutcome, GenerationPipeline, SegmentRequest, StoryBackend};
use crate::store::SessionStore;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Backend that replays scripted outcomes in order.
///
/// An exhausted script fails the request, which pushes the pipeline
/// onto its graph fallback; queue outcomes only for the beats a test
/// wants generated.
pub struct MockBackend {
    outcomes: Mutex<VecDeque<BackendOutcome>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Script the next outcome.
    pub fn queue(&self, outcome: BackendOutcome) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push_back(outcome);
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoryBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn next_segment(&self, _request: &SegmentRequest) -> BackendOutcome {
        match self.outcomes.lock() {
            Ok(mut outcomes) => outcomes
                .pop_front()
                .unwrap_or_else(|| BackendOutcome::Failed("no scripted outcome".to_string())),
            Err(_) => BackendOutcome::Failed("mock poisoned".to_string()),
        }
    }
}

static HARNESS_SEQ: AtomicU64 = AtomicU64::new(0);

/// A fully wired engine over a throwaway session file and a
/// [`MockBackend`], for end-to-end command tests.
pub struct TestHarness {
    store: Arc<SessionStore>,
    backend: Arc<MockBackend>,
    engine: SessionEngine,
}

impl TestHarness {
    pub fn new(config: BotConfig) -> Self {
        let path = std::env::temp_dir().join(format!(
            "mcadv-test-{}-{}.json",
            std::process::id(),
            HARNESS_SEQ.fetch_add(1, Ordering::Relaxed),
        ));
        let store = Arc::new(SessionStore::new(path, config.min_save_interval));
        let backend = Arc::new(MockBackend::new());
        let pipeline =
            GenerationPipeline::new(config.alphabet).with_backend(backend.clone());
        let engine = SessionEngine::new(store.clone(), pipeline, &config);
        Self {
            store,
            backend,
            engine,
        }
    }

    pub fn with_access_policy(mut self, access: Box<dyn AccessPolicy>) -> Self {
        self.engine = self.engine.with_access_policy(access);
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Script the backend's next outcome.
    pub fn queue(&self, outcome: BackendOutcome) {
        self.backend.queue(outcome);
    }

    /// Feed one message from `sender` on channel 1.
    pub async fn input(&self, sender: &str, text: &str) -> Option<String> {
        self.engine
            .handle(&InboundCommand {
                sender: sender.to_string(),
                text: text.to_string(),
                channel: 1,
                timestamp: None,
            })
            .await
    }
}
