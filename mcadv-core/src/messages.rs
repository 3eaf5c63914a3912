//! Canned outbound text.
//!
//! Kept short on purpose: each of these must fit a single radio frame
//! without chunking.

/// Reply to `!help` when choices are numeric.
pub const HELP_NUMERIC: &str = "Adventure bot: !adv [theme] starts a story, reply 1/2/3 to choose, !quit ends, !status shows your story. Themes: fantasy, scifi, horror, mystery, noir, pirate...";

/// Reply to `!help` when choices are lettered.
pub const HELP_LETTERED: &str = "Adventure bot: !adv [theme] starts a story, reply A/B/C to choose, !quit ends, !status shows your story. Themes: fantasy, scifi, horror, mystery, noir, pirate...";

/// Refusal when a shared-channel story is already running.
pub const STORY_IN_PROGRESS: &str =
    "A story is already in progress. Type !quit to end it first.";

/// Confirmation after `!quit`.
pub const STORY_ENDED: &str = "Adventure ended. Type !adv to start a new one.";

/// Reply to a choice or `!status` with no running story.
pub const NO_ACTIVE_STORY: &str = "No active adventure. Type !adv to start.";

/// Broadcast when the watchdog resets every session.
pub const AUTO_RESET: &str = "Resetting all adventures after 24 hours of silence. Type !adv to start fresh.";

/// Optional startup broadcast.
pub const ANNOUNCE: &str = "Adventure bot online! Type !adv to start a story, !help for commands.";
