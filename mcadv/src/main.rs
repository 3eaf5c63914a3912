//! Adventure bot terminal front-end.
//!
//! Reads `sender: message` lines from stdin and prints the bot's
//! outbound frames, which makes the whole engine drivable from a shell
//! pipe or an expect script. A real radio deployment replaces this loop
//! with its transport; everything below the read/print boundary is in
//! `mcadv-core`.
//!
//! ```bash
//! echo "alice: !adv scifi" | cargo run -p mcadv
//! ```

use mcadv_core::{
    broadcast_channel, chunk, messages, spawn_persistence_ticker, BotConfig, GenerationPipeline,
    InboundCommand, LifecycleWatchdog, OllamaBackend, SessionEngine, SessionStore,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const STDIN_CHANNEL: u32 = 0;
const DEFAULT_SENDER: &str = "operator";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = BotConfig::from_env();
    tracing::info!(
        theme = %config.default_theme,
        model = %config.ollama_model,
        frame_limit = config.frame_limit,
        "starting adventure bot"
    );

    let store = Arc::new(SessionStore::new(
        config.session_file.clone(),
        config.min_save_interval,
    ));
    store.load().await;

    let pipeline = GenerationPipeline::new(config.alphabet)
        .with_backend(Arc::new(OllamaBackend::from_config(&config)));
    let engine = SessionEngine::new(store.clone(), pipeline, &config);

    let (broadcaster, mut broadcasts) = broadcast_channel();
    if config.announce {
        broadcaster.send(messages::ANNOUNCE);
    }

    let watchdog = LifecycleWatchdog::new(store.clone(), broadcaster, config.reset_after);
    tokio::spawn(watchdog.run());
    let ticker = spawn_persistence_ticker(store.clone(), config.save_interval);

    let max_len = chunk::effective_len(config.frame_limit, config.prefix_overhead);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(message) = broadcasts.recv() => {
                send(&message, max_len);
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Some(reply) = engine.handle(&parse_line(&line)).await {
                            send(&reply, max_len);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        }
    }

    ticker.abort();
    store.persist(true).await;
    tracing::info!("shut down");
}

/// Parse `sender: message`; a bare line counts as the default sender.
fn parse_line(line: &str) -> InboundCommand {
    let (sender, text) = match line.split_once(':') {
        Some((sender, text)) if !sender.trim().is_empty() => (sender.trim(), text.trim()),
        _ => (DEFAULT_SENDER, line.trim()),
    };
    InboundCommand {
        sender: sender.to_string(),
        text: text.to_string(),
        channel: STDIN_CHANNEL,
        timestamp: None,
    }
}

/// Print a reply as transport-sized frames.
fn send(message: &str, max_len: usize) {
    for frame in chunk::split(message, max_len) {
        println!("{frame}");
    }
}
