//! huddle - Chat relay client
//!
//! Connects to a huddled server under a name and turns console lines into
//! requests.
//!
//! # Usage
//!
//! ```text
//! huddle alice localhost 4000
//!
//! create_group team bob,carol
//! send team hello everyone
//! send bob hi
//! who
//! exit
//! ```
//!
//! Exits with status 0 after `exit`, 1 if the name is taken, the server
//! cannot be reached, or the server shuts down first.

use std::process;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::error;
use tracing_subscriber::EnvFilter;

use huddle_client::display::Notice;
use huddle_client::{Session, SessionConfig, SessionError};

/// huddle relay client
#[derive(Parser, Debug)]
#[command(name = "huddle", version, about)]
struct Args {
    /// Name to register under (letters and digits only)
    name: String,

    /// Server host name or address
    host: String,

    /// Server TCP port
    port: u16,
}

fn usage_and_exit() -> ! {
    eprintln!("{}", Args::command().render_usage());
    process::exit(1);
}

fn parse_config() -> SessionConfig {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            process::exit(0);
        }
        Err(_) => usage_and_exit(),
    };

    match SessionConfig::new(&args.name, args.host, args.port) {
        Ok(config) => config,
        Err(_) => usage_and_exit(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = parse_config();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("huddle_client=warn".parse()?))
        .init();

    let mut out = std::io::stdout();

    let mut session = match Session::connect(&config).await {
        Ok(session) => session,
        Err(e) => {
            println!("{}", Notice::ConnectFailed);
            error!(error = %e, "Connection failed");
            process::exit(1);
        }
    };

    match session.handshake(&mut out).await {
        Ok(()) => {}
        Err(SessionError::NameInUse(_)) => process::exit(1),
        Err(e) => {
            error!(error = %e, "Handshake failed");
            process::exit(1);
        }
    }

    match session.run(tokio::io::stdin(), &mut out).await {
        Ok(end) => process::exit(end.exit_code()),
        Err(e) => {
            error!(error = %e, "Session ended");
            process::exit(1);
        }
    }
}
