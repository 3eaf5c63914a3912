//! Story segment generation.
//!
//! A [`GenerationPipeline`] holds an ordered list of backends and asks
//! each in turn for the next story beat. Any backend may decline or
//! fail; the pipeline then falls through to the next, and past the last
//! backend it walks the theme's built-in story graph. The pipeline
//! therefore never errors: a player always gets a next beat.

use crate::config::ChoiceAlphabet;
use crate::store::{SessionStatus, SessionStore};
use crate::story;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// What one backend produced for a segment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// Usable story text.
    Text(String),
    /// The backend responded but had nothing usable.
    Empty,
    /// The backend failed outright (network, timeout, bad status).
    Failed(String),
}

/// Everything a backend needs to continue a story.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    pub theme: String,
    /// Recent beats, oldest first.
    pub history: Vec<String>,
    /// The choice the player just made, if any.
    pub choice: Option<String>,
}

/// One story beat, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// True when this beat ends the story.
    pub terminal: bool,
}

/// A source of story text.
#[async_trait]
pub trait StoryBackend: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Produce the next story beat, or decline.
    async fn next_segment(&self, request: &SegmentRequest) -> BackendOutcome;
}

// ============================================================================
// Ollama backend
// ============================================================================

const SYSTEM_PROMPT: &str = "You are running a choose-your-own-adventure story over a very low-bandwidth text radio. Write the next story beat in at most 2 short sentences, then exactly three numbered choices on one line like '1:... 2:... 3:...'. When the story reaches a natural conclusion, end with THE END instead of choices.";

/// Generative backend driven by a local Ollama server.
pub struct OllamaBackend {
    client: ollama::Ollama,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(client: ollama::Ollama, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build a backend from bot configuration.
    pub fn from_config(config: &crate::config::BotConfig) -> Self {
        let client = ollama::Ollama::with_timeout(&config.ollama_url, config.llm_timeout)
            .with_model(&config.ollama_model);
        Self::new(client, config.llm_timeout)
    }

    fn build_prompt(request: &SegmentRequest) -> String {
        let mut prompt = format!("Theme: {}.\n", request.theme);
        if request.history.is_empty() {
            prompt.push_str("Begin a new story.");
        } else {
            prompt.push_str("Story so far:\n");
            for beat in &request.history {
                prompt.push_str(beat);
                prompt.push('\n');
            }
            match &request.choice {
                Some(choice) => {
                    prompt.push_str(&format!("The player chose {choice}. Continue."));
                }
                None => prompt.push_str("Continue."),
            }
        }
        prompt
    }
}

#[async_trait]
impl StoryBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn next_segment(&self, request: &SegmentRequest) -> BackendOutcome {
        let api_request = ollama::Request::new(Self::build_prompt(request))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(0.8)
            .with_num_predict(150);

        let result = tokio::time::timeout(self.timeout, self.client.generate(api_request)).await;

        match result {
            Ok(Ok(response)) => {
                let text = response.text_trimmed();
                if text.is_empty() {
                    BackendOutcome::Empty
                } else {
                    BackendOutcome::Text(text.to_string())
                }
            }
            Ok(Err(e)) => BackendOutcome::Failed(e.to_string()),
            Err(_) => BackendOutcome::Failed("timed out".to_string()),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered backend chain with a story-graph floor.
pub struct GenerationPipeline {
    backends: Vec<Arc<dyn StoryBackend>>,
    alphabet: ChoiceAlphabet,
}

impl GenerationPipeline {
    /// A pipeline with no generative backends: pure graph mode.
    pub fn new(alphabet: ChoiceAlphabet) -> Self {
        Self {
            backends: Vec::new(),
            alphabet,
        }
    }

    /// Append a backend to the chain.
    pub fn with_backend(mut self, backend: Arc<dyn StoryBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Produce the next story beat for the session under `key`,
    /// recording it in the store.
    ///
    /// `choice` is the canonical choice token, or `None` when a story
    /// is starting.
    pub async fn generate(
        &self,
        store: &SessionStore,
        key: &str,
        choice: Option<&str>,
        theme: &str,
    ) -> Segment {
        let theme = story::canonical_theme(theme);
        let session = store.get(key);
        let request = SegmentRequest {
            theme: theme.to_string(),
            history: session.as_ref().map(|s| s.history.clone()).unwrap_or_default(),
            choice: choice.map(str::to_string),
        };

        for backend in &self.backends {
            match backend.next_segment(&request).await {
                BackendOutcome::Text(text) => {
                    let terminal = text.contains(story::END_MARKER);
                    store.update(key, |s| {
                        s.theme = theme.to_string();
                        s.push_history(text.clone());
                        if terminal {
                            s.status = SessionStatus::Finished;
                        }
                    });
                    return Segment { text, terminal };
                }
                BackendOutcome::Empty => {
                    tracing::debug!(backend = backend.name(), "backend returned nothing");
                }
                BackendOutcome::Failed(reason) => {
                    tracing::debug!(backend = backend.name(), %reason, "backend failed");
                }
            }
        }

        self.graph_segment(store, key, choice, theme)
    }

    /// Graph-driven fallback: deterministic, always available.
    fn graph_segment(
        &self,
        store: &SessionStore,
        key: &str,
        choice: Option<&str>,
        theme: &'static str,
    ) -> Segment {
        let current = store
            .get(key)
            .map(|s| s.node)
            .unwrap_or_else(|| story::ENTRY_NODE.to_string());

        let node_id = match choice.and_then(|c| self.alphabet.parse(c)) {
            Some(index) => story::advance(theme, &current, index),
            None => story::ENTRY_NODE,
        };

        let graph = story::graph(theme);
        let node = match graph.node(node_id) {
            Some(node) => node,
            None => graph.entry(),
        };
        let text = node.format(self.alphabet);
        let terminal = node.is_terminal();

        store.update(key, |s| {
            s.theme = theme.to_string();
            s.node = node_id.to_string();
            s.push_history(node.text.to_string());
            if terminal {
                s.status = SessionStatus::Finished;
            }
        });

        Segment { text, terminal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SessionStore;
    use std::time::Duration;

    fn graph_pipeline() -> GenerationPipeline {
        GenerationPipeline::new(ChoiceAlphabet::Numeric)
    }

    fn temp_store(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("sessions.json"), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_graph_start_and_walk_to_ending() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let pipeline = graph_pipeline();

        let opening = pipeline.generate(&store, "alice", None, "fantasy").await;
        assert!(opening.text.contains("crossroads"));
        assert!(!opening.terminal);

        let road = pipeline.generate(&store, "alice", Some("1"), "fantasy").await;
        assert!(road.text.to_lowercase().contains("troll"));
        assert!(!road.terminal);

        let ending = pipeline.generate(&store, "alice", Some("1"), "fantasy").await;
        assert!(ending.terminal);
        assert!(ending.text.contains(story::END_MARKER));
        assert_eq!(
            store.get("alice").unwrap().status,
            SessionStatus::Finished
        );
    }

    #[tokio::test]
    async fn test_invalid_choice_restarts_story() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let pipeline = graph_pipeline();

        pipeline.generate(&store, "bob", None, "fantasy").await;
        pipeline.generate(&store, "bob", Some("1"), "fantasy").await;
        let segment = pipeline.generate(&store, "bob", Some("9"), "fantasy").await;
        assert!(segment.text.contains("crossroads"));
        assert_eq!(store.get("bob").unwrap().node, story::ENTRY_NODE);
    }

    #[tokio::test]
    async fn test_backend_text_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let backend = Arc::new(crate::testing::MockBackend::new());
        backend.queue(BackendOutcome::Text(
            "A dragon lands. 1:Run 2:Hide 3:Wave".to_string(),
        ));
        let pipeline =
            GenerationPipeline::new(ChoiceAlphabet::Numeric).with_backend(backend);

        let segment = pipeline.generate(&store, "carol", None, "fantasy").await;
        assert_eq!(segment.text, "A dragon lands. 1:Run 2:Hide 3:Wave");
        assert!(!segment.terminal);
        assert_eq!(store.get("carol").unwrap().history.len(), 1);
    }

    #[tokio::test]
    async fn test_end_marker_finishes_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let backend = Arc::new(crate::testing::MockBackend::new());
        backend.queue(BackendOutcome::Text("You win the crown. THE END".to_string()));
        let pipeline =
            GenerationPipeline::new(ChoiceAlphabet::Numeric).with_backend(backend);

        let segment = pipeline.generate(&store, "dave", None, "fantasy").await;
        assert!(segment.terminal);
        assert_eq!(
            store.get("dave").unwrap().status,
            SessionStatus::Finished
        );
    }

    #[tokio::test]
    async fn test_failed_backend_falls_through_to_graph() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let backend = Arc::new(crate::testing::MockBackend::new());
        backend.queue(BackendOutcome::Failed("connection refused".to_string()));
        let pipeline =
            GenerationPipeline::new(ChoiceAlphabet::Numeric).with_backend(backend);

        let segment = pipeline.generate(&store, "erin", None, "scifi").await;
        assert!(segment.text.to_lowercase().contains("colony ship"));
    }

    #[tokio::test]
    async fn test_empty_backend_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let backend = Arc::new(crate::testing::MockBackend::new());
        backend.queue(BackendOutcome::Empty);
        let pipeline =
            GenerationPipeline::new(ChoiceAlphabet::Numeric).with_backend(backend);

        let segment = pipeline.generate(&store, "frank", None, "horror").await;
        assert!(segment.text.to_lowercase().contains("manor"));
    }

    #[test]
    fn test_prompt_shapes() {
        let fresh = SegmentRequest {
            theme: "noir".to_string(),
            history: Vec::new(),
            choice: None,
        };
        let prompt = OllamaBackend::build_prompt(&fresh);
        assert!(prompt.contains("noir"));
        assert!(prompt.contains("Begin a new story"));

        let continued = SegmentRequest {
            theme: "noir".to_string(),
            history: vec!["The office was dark.".to_string()],
            choice: Some("2".to_string()),
        };
        let prompt = OllamaBackend::build_prompt(&continued);
        assert!(prompt.contains("The office was dark."));
        assert!(prompt.contains("chose 2"));
    }
}
