//! Inbound text parsing.
//!
//! Only a handful of tokens mean anything; everything else on the
//! channel is other people's traffic and parses to `None` so the bot
//! stays silent.

use crate::config::ChoiceAlphabet;

/// A recognized player command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Start a new story, optionally naming a theme.
    Start { theme: Option<String> },
    Quit,
    Status,
    /// Bot-to-bot reset marker; recognized so it is dropped, not echoed.
    Reset,
    /// A choice token in the configured alphabet, canonicalized.
    Choice(String),
}

/// Parse one inbound message.
///
/// The first whitespace-separated token decides the command,
/// case-insensitively. Anything unrecognized returns `None`.
pub fn parse(text: &str, alphabet: ChoiceAlphabet) -> Option<Command> {
    let mut words = text.split_whitespace();
    let first = words.next()?;
    let lowered = first.to_ascii_lowercase();

    match lowered.as_str() {
        "!help" | "help" => Some(Command::Help),
        "!adv" | "!start" => Some(Command::Start {
            theme: words.next().map(|w| w.to_ascii_lowercase()),
        }),
        "!quit" | "!end" => Some(Command::Quit),
        "!status" => Some(Command::Status),
        "!reset" => Some(Command::Reset),
        _ => alphabet
            .parse(first)
            .map(|index| Command::Choice(alphabet.label(index))),
    }
}
