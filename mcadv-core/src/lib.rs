//! Core engine for a choose-your-own-adventure bot on a
//! bandwidth-constrained text channel.
//!
//! The flow: inbound text is parsed by [`commands`], routed by the
//! [`engine::SessionEngine`] against per-sender (or per-channel)
//! sessions in a [`store::SessionStore`], and answered with story
//! beats from a [`pipeline::GenerationPipeline`] that prefers a
//! generative backend and falls back to built-in [`story`] graphs.
//! Replies that exceed the transport frame budget are split by
//! [`chunk`], and [`watchdog`] handles long-silence resets and
//! periodic persistence.

pub mod chunk;
pub mod commands;
pub mod config;
pub mod engine;
pub mod messages;
pub mod pipeline;
pub mod store;
pub mod story;
pub mod testing;
pub mod watchdog;

pub use commands::Command;
pub use config::{BotConfig, ChoiceAlphabet, Keying};
pub use engine::{AccessPolicy, AllowAll, AllowList, InboundCommand, SessionEngine};
pub use pipeline::{
    BackendOutcome, GenerationPipeline, OllamaBackend, Segment, SegmentRequest, StoryBackend,
};
pub use store::{Session, SessionStatus, SessionStore};
pub use testing::{MockBackend, TestHarness};
pub use watchdog::{broadcast_channel, spawn_persistence_ticker, Broadcaster, LifecycleWatchdog};
