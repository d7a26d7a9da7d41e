//! `g4a-chat`: line-oriented chat with a local GPT4All worker
//!
//! Configuration comes from `G4A_*` environment variables; logging is
//! controlled with `RUST_LOG` and goes to stderr.

use anyhow::Context;
use chrono::Utc;
use g4a_bridge::{BridgeConfig, ChatService, WorkerBridge, stdin_lines, stop_on_signal};
use std::io::Write;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn prompt() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = BridgeConfig::from_env().context("Invalid G4A_* configuration")?;
    let bridge = WorkerBridge::builder(config)
        .on_event(|event| tracing::debug!(?event, "Worker event"))
        .spawn()?;

    if let Err(err) = bridge.start().await {
        eprintln!("{}", err.suggested_action());
        return Err(err).context("Failed to start the GPT4All worker");
    }

    // Stops the worker on Ctrl-C/SIGTERM; preempts whatever the REPL is waiting on
    let mut shutdown = stop_on_signal(bridge.clone());

    // The worker greets with a bare prompt while the model loads
    tokio::select! {
        biased;
        _ = &mut shutdown => return Ok(()),
        greeting = bridge.read_response() => match greeting {
            Ok(_) => {}
            Err(err) if err.is_not_running() => {
                warn!("Worker is gone: {}", err);
                shutdown.abort();
                bridge.stop().await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        },
    }

    let chat = ChatService::in_memory(bridge.clone());
    let title = format!("g4a-chat {}", Utc::now().format("%Y-%m-%d %H:%M"));
    let conversation = chat.start_conversation(Some(&title), None).await?;
    info!(id = conversation.id, "Ready");

    let mut lines = stdin_lines();
    prompt()?;
    loop {
        let line = tokio::select! {
            biased;
            _ = &mut shutdown => return Ok(()),
            line = lines.recv() => line,
        };
        let Some(line) = line.transpose()? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            prompt()?;
            continue;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => return Ok(()),
            reply = chat.send_message(conversation.id, text) => match reply {
                Ok(message) => println!("{}", message.content),
                Err(err) if err.is_not_running() => {
                    warn!("Worker is gone: {}", err);
                    break;
                }
                Err(err) => eprintln!("error: {err}\n{}", err.suggested_action()),
            },
        }
        prompt()?;
    }

    shutdown.abort();
    info!("Stopping worker");
    bridge.stop().await?;
    Ok(())
}
