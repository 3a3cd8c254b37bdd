#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use std::io::Write;
use std::path::{Path, PathBuf};

use alice_common::logging::init_logging;
use alice_common::config::config_path;
use alice_common::Config;
use alice_session::version::resolve_client_version;
use alice_session::{AliceClient, CancellationToken, SessionError, SessionResult};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// `alice` - talk to the Alice conversational gateway from a terminal.
#[derive(Parser, Debug)]
#[command(name = "alice")]
#[command(version = "0.1.0")]
#[command(about = "Command line client for the Alice conversational gateway.", long_about = None)]
struct Cli {
    /// Path to a JSON config file (default: ~/.alice/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Question text
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Interactive session; Ctrl-C cancels the question in flight
    Chat,

    /// Resolve and print the client version announced to the gateway
    Version,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    match cli.command {
        Commands::Ask { question } => {
            let question = question.join(" ");
            let client = AliceClient::from_config(&config).await;
            let result = ask_interruptible(&client, &question).await;
            client.close().await;
            match result {
                Ok(answer) => {
                    println!("{answer}");
                    Ok(())
                }
                Err(e) => {
                    if let Some(hint) = failure_hint(&e) {
                        eprintln!("hint: {hint}");
                    }
                    Err(e.into())
                }
            }
        }

        Commands::Chat => run_chat(&config).await,

        Commands::Version => {
            println!("{}", resolve_client_version(&config.client).await);
            Ok(())
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match Config::load_and_validate(path) {
        Ok(config) => Ok(config),
        Err(e) if e.is_invalid_config() => {
            let file = path.map_or_else(config_path, Path::to_path_buf);
            bail!("{e}\nhint: fix {} or remove it to use the defaults", file.display())
        }
        Err(e) => Err(e).context("Failed to load configuration"),
    }
}

/// What the user can do about a failed question, if anything.
fn failure_hint(err: &SessionError) -> Option<&'static str> {
    if err.is_transport() {
        Some("the gateway could not be reached; check gateway.url and the network, then try again")
    } else if err.is_retryable() {
        Some("try asking again")
    } else {
        None
    }
}

/// Ask one question, cancelling it on Ctrl-C.
async fn ask_interruptible(client: &AliceClient, question: &str) -> SessionResult<String> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let result = client.ask(question, &cancel).await;
    watcher.abort();
    result
}

async fn run_chat(config: &Config) -> Result<()> {
    let client = AliceClient::from_config(config).await;
    info!(gateway = %config.gateway.url, "Starting chat session");

    println!("Alice chat. Type 'exit' or press Ctrl-D to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match ask_interruptible(&client, line).await {
            Ok(answer) => println!("{answer}\n"),
            Err(SessionError::Cancelled) => println!("(cancelled)\n"),
            Err(e) => {
                eprintln!("error: {e}");
                if let Some(hint) = failure_hint(&e) {
                    eprintln!("hint: {hint}");
                }
                eprintln!();
            }
        }
    }

    client.close().await;
    Ok(())
}
