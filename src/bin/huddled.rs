//! huddled - Chat relay server
//!
//! Accepts named clients over TCP and relays their messages to peers and
//! groups. Typing `EXIT` on the console (or sending SIGINT/SIGTERM) notifies
//! every client and shuts the server down.
//!
//! # Usage
//!
//! ```text
//! huddled 4000                        # listen on 0.0.0.0:4000
//! huddled 4000 --config huddled.toml  # with a config file
//! HUDDLE_HOST=127.0.0.1 huddled 4000  # loopback only
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use huddled::config::ServerConfig;
use huddled::server::ChatServer;

/// huddle relay server
#[derive(Parser, Debug)]
#[command(name = "huddled", version, about)]
struct Args {
    /// TCP port to listen on
    port: u16,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version go to stdout with success, usage errors fail
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    }
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let config = match &args.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ServerConfig::default(),
    };

    Ok(config
        .with_env_overrides(|key| std::env::var(key).ok())
        .with_port(args.port))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("huddled=info".parse()?)
                .add_directive("huddle_protocol=info".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "huddled starting"
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let server = ChatServer::bind(config, cancel_token).await?;

    // A console read may still be parked on a blocking thread, which would
    // keep the runtime alive after a signal, so exit explicitly.
    match server.run(tokio::io::stdin()).await {
        Ok(()) => {
            info!("huddled stopped");
            process::exit(0);
        }
        Err(e) => {
            error!(error = %e, "Server error");
            process::exit(1);
        }
    }
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
