//! Command handling.
//!
//! [`SessionEngine`] is the bot's brain: it takes one inbound message
//! and returns at most one reply. `None` means stay silent, which on a
//! shared radio channel is the polite default for anything that isn't
//! clearly addressed to the bot.

use crate::commands::{self, Command};
use crate::config::{BotConfig, ChoiceAlphabet, Keying};
use crate::messages;
use crate::pipeline::GenerationPipeline;
use crate::store::{now_secs, Session, SessionStore};
use crate::story;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One message as received from the transport.
#[derive(Debug, Clone)]
pub struct InboundCommand {
    pub sender: String,
    pub text: String,
    pub channel: u32,
    /// Transport-supplied receive time, unix seconds.
    pub timestamp: Option<u64>,
}

/// Decides which senders the bot listens to.
pub trait AccessPolicy: Send + Sync {
    fn permits(&self, sender: &str) -> bool;
}

/// Listen to everyone.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn permits(&self, _sender: &str) -> bool {
        true
    }
}

/// Listen only to a fixed set of senders.
pub struct AllowList(pub HashSet<String>);

impl AccessPolicy for AllowList {
    fn permits(&self, sender: &str) -> bool {
        self.0.contains(sender)
    }
}

/// The adventure bot's command handler.
pub struct SessionEngine {
    store: Arc<SessionStore>,
    pipeline: GenerationPipeline,
    keying: Keying,
    alphabet: ChoiceAlphabet,
    default_theme: String,
    session_ttl: Duration,
    allowed_channel: Option<u32>,
    access: Box<dyn AccessPolicy>,
}

impl SessionEngine {
    pub fn new(
        store: Arc<SessionStore>,
        pipeline: GenerationPipeline,
        config: &BotConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            keying: config.keying,
            alphabet: config.alphabet,
            default_theme: config.default_theme.clone(),
            session_ttl: config.session_ttl,
            allowed_channel: config.allowed_channel,
            access: Box::new(AllowAll),
        }
    }

    /// Replace the access policy.
    pub fn with_access_policy(mut self, access: Box<dyn AccessPolicy>) -> Self {
        self.access = access;
        self
    }

    /// Session key for an inbound message under the configured keying.
    pub fn session_key(&self, cmd: &InboundCommand) -> String {
        match self.keying {
            Keying::PerSender => cmd.sender.clone(),
            Keying::PerChannel => format!("channel_{}", cmd.channel),
        }
    }

    /// Handle one inbound message. Returns the reply text, or `None`
    /// to stay silent.
    pub async fn handle(&self, cmd: &InboundCommand) -> Option<String> {
        if let Some(allowed) = self.allowed_channel {
            if cmd.channel != allowed {
                return None;
            }
        }
        if !self.access.permits(&cmd.sender) {
            tracing::debug!(sender = %cmd.sender, "sender not permitted");
            return None;
        }

        let now = cmd.timestamp.unwrap_or_else(now_secs);
        self.store.expire(now, self.session_ttl);

        let command = commands::parse(&cmd.text, self.alphabet)?;
        let key = self.session_key(cmd);

        match command {
            Command::Help => Some(self.help_text().to_string()),
            Command::Start { theme } => Some(self.start(cmd, &key, theme).await),
            Command::Choice(token) => self.choose(cmd, &key, &token).await,
            Command::Quit => self.quit(&key).await,
            Command::Status => Some(self.status(&key)),
            // Our own broadcast marker, looped back by the mesh.
            Command::Reset => None,
        }
    }

    fn help_text(&self) -> &'static str {
        match self.alphabet {
            ChoiceAlphabet::Numeric => messages::HELP_NUMERIC,
            ChoiceAlphabet::Lettered => messages::HELP_LETTERED,
        }
    }

    async fn start(&self, cmd: &InboundCommand, key: &str, theme: Option<String>) -> String {
        let theme = story::canonical_theme(theme.as_deref().unwrap_or(&self.default_theme));

        // In collaborative mode a running story belongs to everyone on
        // the channel, so a second !adv must not stomp it.
        if self.keying == Keying::PerChannel {
            if let Some(session) = self.store.get(key) {
                if session.is_active() {
                    return messages::STORY_IN_PROGRESS.to_string();
                }
            }
        }

        self.store.update(key, |s| *s = Session::new(theme));
        tracing::info!(key, theme, "story started");

        let segment = self.pipeline.generate(&self.store, key, None, theme).await;
        if segment.terminal {
            self.store.clear(key).await;
        }

        match self.keying {
            Keying::PerChannel => {
                format!("{} starts a {} adventure!\n{}", cmd.sender, theme, segment.text)
            }
            Keying::PerSender => segment.text,
        }
    }

    async fn choose(&self, cmd: &InboundCommand, key: &str, token: &str) -> Option<String> {
        // A choice token is recognized vocabulary, so unlike channel
        // noise it gets an answer even without a running story.
        let session = match self.store.get(key) {
            Some(session) if session.is_active() => session,
            _ => return Some(messages::NO_ACTIVE_STORY.to_string()),
        };

        let theme = session.theme.clone();
        let segment = self
            .pipeline
            .generate(&self.store, key, Some(token), &theme)
            .await;
        if segment.terminal {
            tracing::info!(key, "story finished");
            self.store.clear(key).await;
        } else {
            self.store.persist(false).await;
        }

        match self.keying {
            Keying::PerChannel => Some(format!(
                "{} chose {}.\n{}",
                cmd.sender, token, segment.text
            )),
            Keying::PerSender => Some(segment.text),
        }
    }

    async fn quit(&self, key: &str) -> Option<String> {
        if self.store.get(key).is_none() {
            return Some(messages::NO_ACTIVE_STORY.to_string());
        }
        self.store.clear(key).await;
        tracing::info!(key, "story ended by player");
        Some(messages::STORY_ENDED.to_string())
    }

    fn status(&self, key: &str) -> String {
        match self.store.get(key) {
            Some(session) if session.is_active() => format!(
                "Adventure in progress: {} ({} beats so far). Reply {} to choose.",
                session.theme,
                session.history.len(),
                self.alphabet.hint()
            ),
            _ => messages::NO_ACTIVE_STORY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::BackendOutcome;
    use crate::testing::TestHarness;

    #[tokio::test]
    async fn test_full_graph_story() {
        let harness = TestHarness::new(BotConfig::default());

        let opening = harness.input("alice", "!adv").await.unwrap();
        assert!(opening.contains("crossroads"));
        assert!(opening.contains("1:"));

        let road = harness.input("alice", "1").await.unwrap();
        assert!(road.to_lowercase().contains("troll"));

        let ending = harness.input("alice", "1").await.unwrap();
        assert!(ending.contains("THE END"));

        // Story over: the session is gone and a stray choice says so.
        assert!(harness.store().get("alice").is_none());
        assert_eq!(
            harness.input("alice", "2").await,
            Some(messages::NO_ACTIVE_STORY.to_string())
        );
    }

    #[tokio::test]
    async fn test_choice_without_session_prompts_to_start() {
        let harness = TestHarness::new(BotConfig::default());
        assert_eq!(
            harness.input("alice", "1").await,
            Some(messages::NO_ACTIVE_STORY.to_string())
        );
        // Unrecognized tokens stay silent regardless.
        assert_eq!(harness.input("alice", "42").await, None);
    }

    #[tokio::test]
    async fn test_unknown_traffic_ignored() {
        let harness = TestHarness::new(BotConfig::default());
        assert_eq!(harness.input("alice", "nice weather today").await, None);
        assert_eq!(harness.input("alice", "!reset").await, None);
        assert_eq!(harness.input("alice", "").await, None);
    }

    #[tokio::test]
    async fn test_help() {
        let harness = TestHarness::new(BotConfig::default());
        let help = harness.input("alice", "!help").await.unwrap();
        assert!(help.contains("!adv"));
        assert!(help.contains("1/2/3"));
    }

    #[tokio::test]
    async fn test_quit_ends_story() {
        let harness = TestHarness::new(BotConfig::default());
        harness.input("alice", "!adv horror").await.unwrap();
        let reply = harness.input("alice", "!quit").await.unwrap();
        assert_eq!(reply, messages::STORY_ENDED);
        assert!(harness.store().get("alice").is_none());

        let reply = harness.input("alice", "!quit").await.unwrap();
        assert_eq!(reply, messages::NO_ACTIVE_STORY);
    }

    #[tokio::test]
    async fn test_status() {
        let harness = TestHarness::new(BotConfig::default());
        assert_eq!(
            harness.input("alice", "!status").await.unwrap(),
            messages::NO_ACTIVE_STORY
        );
        harness.input("alice", "!adv scifi").await.unwrap();
        let status = harness.input("alice", "!status").await.unwrap();
        assert!(status.contains("scifi"));
    }

    #[tokio::test]
    async fn test_per_sender_stories_are_independent() {
        let harness = TestHarness::new(BotConfig::default());
        let a = harness.input("alice", "!adv fantasy").await.unwrap();
        let b = harness.input("bob", "!adv scifi").await.unwrap();
        assert!(a.contains("crossroads"));
        assert!(b.to_lowercase().contains("colony ship"));

        harness.input("alice", "1").await.unwrap();
        assert_eq!(harness.store().get("alice").unwrap().node, "road");
        assert_eq!(harness.store().get("bob").unwrap().node, story::ENTRY_NODE);
    }

    #[tokio::test]
    async fn test_restart_replaces_own_story() {
        let harness = TestHarness::new(BotConfig::default());
        harness.input("alice", "!adv fantasy").await.unwrap();
        harness.input("alice", "1").await.unwrap();

        let reply = harness.input("alice", "!adv mystery").await.unwrap();
        assert!(reply.contains("gallery"));
        let session = harness.store().get("alice").unwrap();
        assert_eq!(session.theme, "mystery");
        assert_eq!(session.node, story::ENTRY_NODE);
    }

    #[tokio::test]
    async fn test_unknown_theme_falls_back_to_default() {
        let harness = TestHarness::new(BotConfig::default());
        let reply = harness.input("alice", "!adv unicorns").await.unwrap();
        assert!(reply.contains("crossroads"));
        assert_eq!(harness.store().get("alice").unwrap().theme, "fantasy");
    }

    #[tokio::test]
    async fn test_shared_mode_one_story_per_channel() {
        let config = BotConfig::default().with_keying(Keying::PerChannel);
        let harness = TestHarness::new(config);

        let opening = harness.input("alice", "!adv").await.unwrap();
        assert!(opening.starts_with("alice starts a fantasy adventure!"));

        let refused = harness.input("bob", "!adv scifi").await.unwrap();
        assert_eq!(refused, messages::STORY_IN_PROGRESS);

        let chose = harness.input("bob", "1").await.unwrap();
        assert!(chose.starts_with("bob chose 1."));
        assert!(harness.store().get("channel_1").is_some());
    }

    #[tokio::test]
    async fn test_channel_filter() {
        let config = BotConfig::default().with_allowed_channel(2);
        let harness = TestHarness::new(config);
        // Harness traffic arrives on channel 1.
        assert_eq!(harness.input("alice", "!adv").await, None);
    }

    #[tokio::test]
    async fn test_allow_list_policy() {
        let harness = TestHarness::new(BotConfig::default()).with_access_policy(Box::new(
            AllowList(HashSet::from(["alice".to_string()])),
        ));
        assert!(harness.input("alice", "!adv").await.is_some());
        assert_eq!(harness.input("mallory", "!adv").await, None);
    }

    #[tokio::test]
    async fn test_generated_story_ends_on_marker() {
        let harness = TestHarness::new(BotConfig::default());
        harness.queue(BackendOutcome::Text(
            "You find the exit at once. THE END".to_string(),
        ));
        let reply = harness.input("alice", "!adv").await.unwrap();
        assert!(reply.contains("THE END"));
        assert!(harness.store().get("alice").is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_mid_story() {
        let harness = TestHarness::new(BotConfig::default());
        harness.queue(BackendOutcome::Failed("boom".to_string()));
        let reply = harness.input("alice", "!adv").await.unwrap();
        assert!(reply.contains("crossroads"));
    }

    #[tokio::test]
    async fn test_lettered_alphabet() {
        let config = BotConfig::default().with_alphabet(ChoiceAlphabet::Lettered);
        let harness = TestHarness::new(config);
        let opening = harness.input("alice", "!adv").await.unwrap();
        assert!(opening.contains("A:"));
        let road = harness.input("alice", "a").await.unwrap();
        assert!(road.to_lowercase().contains("troll"));
        assert_eq!(harness.input("alice", "1").await, None);
    }
}
