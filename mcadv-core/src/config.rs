//! Bot configuration.
//!
//! All knobs the engine, store, and watchdog need, with environment
//! variable overrides matching the deployment conventions
//! (`OLLAMA_URL`, `OLLAMA_MODEL`, `MCADV_*`).

use std::path::PathBuf;
use std::time::Duration;

/// How session keys are derived from inbound commands.
///
/// `PerSender` gives every sender their own story. `PerChannel` is
/// collaborative mode: everyone on a channel shares one story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keying {
    PerSender,
    PerChannel,
}

/// The token alphabet players use to pick a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceAlphabet {
    /// 1 / 2 / 3
    Numeric,
    /// A / B / C
    Lettered,
}

/// Maximum number of choices a story node may offer.
pub const MAX_CHOICES: usize = 3;

impl ChoiceAlphabet {
    /// Label for a 1-based choice index, e.g. `1` -> "1" or "A".
    pub fn label(&self, index: usize) -> String {
        debug_assert!(index >= 1 && index <= MAX_CHOICES);
        match self {
            ChoiceAlphabet::Numeric => index.to_string(),
            ChoiceAlphabet::Lettered => {
                char::from(b'A' + (index as u8 - 1)).to_string()
            }
        }
    }

    /// Parse a choice token into its 1-based index. Case-insensitive.
    /// Returns `None` for anything outside the valid range.
    pub fn parse(&self, token: &str) -> Option<usize> {
        let token = token.trim();
        if token.chars().count() != 1 {
            return None;
        }
        let ch = token.chars().next()?;
        let index = match self {
            ChoiceAlphabet::Numeric => match ch {
                '1'..='9' => ch as usize - '0' as usize,
                _ => return None,
            },
            ChoiceAlphabet::Lettered => match ch.to_ascii_uppercase() {
                c @ 'A'..='Z' => c as usize - 'A' as usize + 1,
                _ => return None,
            },
        };
        (index <= MAX_CHOICES).then_some(index)
    }

    /// Short usage hint, e.g. "1/2/3".
    pub fn hint(&self) -> &'static str {
        match self {
            ChoiceAlphabet::Numeric => "1/2/3",
            ChoiceAlphabet::Lettered => "A/B/C",
        }
    }
}

/// Configuration for the adventure bot core.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Theme used when a start command names none (or an unknown one).
    pub default_theme: String,

    /// Session keying policy.
    pub keying: Keying,

    /// Choice token alphabet.
    pub alphabet: ChoiceAlphabet,

    /// Idle time after which a single session is silently dropped.
    pub session_ttl: Duration,

    /// Idle time after which *all* sessions are reset with an announcement.
    pub reset_after: Duration,

    /// Path of the durable session file.
    pub session_file: PathBuf,

    /// Minimum interval between batched persistence writes.
    pub min_save_interval: Duration,

    /// Period of the background persistence ticker.
    pub save_interval: Duration,

    /// Raw transport frame size in characters.
    pub frame_limit: usize,

    /// Fixed per-frame prefix overhead imposed by the transport.
    pub prefix_overhead: usize,

    /// Only respond on this channel, if set.
    pub allowed_channel: Option<u32>,

    /// Ollama server base URL.
    pub ollama_url: String,

    /// Ollama model name.
    pub ollama_model: String,

    /// Upper bound on one generative backend call.
    pub llm_timeout: Duration,

    /// Push a startup announcement onto the broadcast outbox.
    pub announce: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            default_theme: "fantasy".to_string(),
            keying: Keying::PerSender,
            alphabet: ChoiceAlphabet::Numeric,
            session_ttl: Duration::from_secs(6 * 3600),
            reset_after: Duration::from_secs(24 * 3600),
            session_file: PathBuf::from("sessions.json"),
            min_save_interval: Duration::from_secs(5),
            save_interval: Duration::from_secs(30),
            frame_limit: 230,
            prefix_overhead: 0,
            allowed_channel: None,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.1:8b".to_string(),
            llm_timeout: Duration::from_secs(30),
            announce: false,
        }
    }
}

impl BotConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            config.ollama_model = model;
        }
        if let Ok(theme) = std::env::var("MCADV_THEME") {
            config.default_theme = theme;
        }
        if let Ok(path) = std::env::var("MCADV_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }
        if let Ok(shared) = std::env::var("MCADV_SHARED_MODE") {
            if matches!(shared.as_str(), "1" | "true" | "yes") {
                config.keying = Keying::PerChannel;
            }
        }
        if let Ok(alphabet) = std::env::var("MCADV_CHOICE_ALPHABET") {
            if alphabet.eq_ignore_ascii_case("lettered") {
                config.alphabet = ChoiceAlphabet::Lettered;
            }
        }
        if let Ok(channel) = std::env::var("MCADV_CHANNEL") {
            config.allowed_channel = channel.parse().ok();
        }
        if let Ok(limit) = std::env::var("MCADV_FRAME_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.frame_limit = limit;
            }
        }
        if let Ok(announce) = std::env::var("MCADV_ANNOUNCE") {
            config.announce = matches!(announce.as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Set the default theme.
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.default_theme = theme.into();
        self
    }

    /// Set the session keying policy.
    pub fn with_keying(mut self, keying: Keying) -> Self {
        self.keying = keying;
        self
    }

    /// Set the choice token alphabet.
    pub fn with_alphabet(mut self, alphabet: ChoiceAlphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    /// Set the per-session idle expiry.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the global reset horizon.
    pub fn with_reset_after(mut self, reset_after: Duration) -> Self {
        self.reset_after = reset_after;
        self
    }

    /// Set the durable session file path.
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Set the transport frame budget.
    pub fn with_frame_limit(mut self, frame_limit: usize) -> Self {
        self.frame_limit = frame_limit;
        self
    }

    /// Set the per-frame transport prefix overhead.
    pub fn with_prefix_overhead(mut self, overhead: usize) -> Self {
        self.prefix_overhead = overhead;
        self
    }

    /// Restrict the bot to one channel.
    pub fn with_allowed_channel(mut self, channel: u32) -> Self {
        self.allowed_channel = Some(channel);
        self
    }
}
