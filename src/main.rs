#[cfg(feature = "server")]
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
#[cfg(feature = "server")]
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;

use mentor_chat::{init_tracing, AppConfig, ChatSession, Conversation, GroqClient, Repl};

const DEFAULT_CONFIG: &str = "mentor.toml";

#[derive(Parser)]
#[command(name = "mentor-chat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./mentor.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat in the terminal
    Repl,

    /// Serve the web chat page
    #[cfg(feature = "server")]
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let required = cli.config.is_some();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let cfg = match AppConfig::load(Some(&path), required) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Nothing is served without a credential.
    if let Err(err) = cfg.api_key() {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }

    if let Err(err) = init_tracing(env!("CARGO_PKG_NAME"), &cfg.telemetry, cli.verbose) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli, cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cfg: AppConfig) -> Result<()> {
    let model = Arc::new(GroqClient::from_config(&cfg).context("building Groq client")?);
    let conversation = Conversation::new(model).with_request_builder(cfg.request_builder());
    let catalog = cfg.catalog()?;
    let settings = cfg.session_settings()?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            info!(model = %settings.model, "starting terminal session");
            let mut repl = Repl::new(&conversation, &catalog, ChatSession::new(settings));
            let mut stdout = tokio::io::stdout();
            repl.run(BufReader::new(tokio::io::stdin()), &mut stdout)
                .await?;
        }
        #[cfg(feature = "server")]
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| cfg.server.host.clone());
            let port = port.unwrap_or(cfg.server.port);
            let addr = format!("{host}:{port}")
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid listen address `{host}:{port}`"))?;
            mentor_chat::ChatServer::new(conversation, catalog, settings)
                .with_idle_timeout(Duration::from_secs(cfg.server.session_idle_secs))
                .serve(addr)
                .await?;
        }
    }
    Ok(())
}
