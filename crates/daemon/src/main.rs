// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node Manager Daemon (nmd)
//!
//! Replays inbound collaborator events through the application dispatcher
//! and writes the resulting effects to stdout as JSON lines.

use std::path::PathBuf;

use clap::Parser;
use nm_core::Application;
use nm_daemon::{replay, setup_logging, write_effects, Config};
use nm_engine::Dispatcher;
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nmd", version, about = "Node manager application event core")]
struct Args {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON-lines event file (stdin when omitted)
    #[arg(value_name = "EVENTS")]
    events: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logging is not up yet; report startup errors directly
    let config = match &args.config {
        Some(path) => Config::load(path).inspect_err(|e| eprintln!("nmd: {}", e))?,
        None => Config::default(),
    };
    let _log_guard = setup_logging(&config.log).inspect_err(|e| eprintln!("nmd: {}", e))?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting nmd");

    let (dispatcher, effects) = Dispatcher::<Application>::channel();
    let writer = tokio::spawn(write_effects(effects, tokio::io::stdout()));

    let replayed = match &args.events {
        Some(path) => {
            let file = tokio::fs::File::open(path).await.inspect_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "cannot open events");
            })?;
            replay(BufReader::new(file), &dispatcher).await
        }
        None => replay(BufReader::new(tokio::io::stdin()), &dispatcher).await,
    };

    // Flush every effect already emitted, even when the replay stopped early
    let stopped = dispatcher.shutdown().await;
    // Last effect sender; the writer ends once it is gone.
    drop(dispatcher);
    let written = writer.await??;
    let stats = replayed.inspect_err(|e| tracing::error!(error = %e, "replay aborted"))?;

    info!(
        records = stats.records,
        rejected = stats.rejected,
        effects = written,
        live_applications = stopped,
        "nmd stopped"
    );
    Ok(())
}
