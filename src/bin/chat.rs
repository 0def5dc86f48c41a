//! Terminal chat client.
//!
//! Connects to a dispatcher, announces a username and then turns each
//! line typed at the prompt into an envelope (see
//! [`chatwire::console::parse_line`]).  Inbound text is printed as it
//! arrives.  Typing `LOGOUT` ends the session; so does the server
//! going away.
//!
//! ```text
//! chat [username] [port] [serverAddress] [--config chat.toml] [-v]
//! ```
//!
//! Values given on the command line win over the config file, which
//! wins over the built-in defaults (`localhost`, `8700`, a random
//! `User<n>`).

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tracing::Level;

use chatwire::{
    config::Config,
    console::parse_line,
    protocol::Kind,
    session::Session,
    sink::PROMPT,
};

/// Command line options for the `chat` binary.
#[derive(Parser, Debug)]
#[command(name = "chat", version, about = "Chat with a dispatcher from the terminal")]
struct Cli {
    /// Name announced to the server.  Defaults to a random `User<n>`.
    username: Option<String>,
    /// Server port.
    port: Option<u16>,
    /// Server address.
    server_address: Option<String>,
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log more to stderr (`-v` info, `-vv` debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli).await
}

/// WARN by default so the log stays out of the conversation.
fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

fn init_logging(verbose: u8) {
    tracing_subscriber::fmt()
        .with_max_level(log_level(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    let address = cli
        .server_address
        .unwrap_or_else(|| config.server.address.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let username = cli
        .username
        .unwrap_or_else(|| config.user.name_or_generated());

    let session = Session::with_config(address, port, username, None, config.session.clone());
    session.start().await.with_context(|| {
        format!("starting session with {}:{}", session.address(), session.port())
    })?;

    let mut lines = spawn_stdin_reader();
    prompt();
    loop {
        tokio::select! {
            _ = session.closed() => break,
            line = lines.recv() => {
                let Some(line) = line else {
                    // stdin closed: leave politely.
                    let _ = session.logout().await;
                    break;
                };
                let Some(envelope) = parse_line(&line) else {
                    prompt();
                    continue;
                };
                if envelope.kind() == Kind::Logout {
                    let _ = session.logout().await;
                    break;
                }
                if session.send(&envelope).await.is_err() && session.state().is_terminal() {
                    break;
                }
                prompt();
            }
        }
    }
    session.disconnect().await;
    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn prompt() {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{PROMPT}");
    let _ = out.flush();
}
