//! Docent daemon - grounded Q&A over a remote policy document

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use docent::config::Config;
use docent::error::Result;
use docent::server::DocentServer;

/// Docent - answers questions about one policy document
#[derive(Parser)]
#[command(name = "docent")]
#[command(about = "Answers questions about a remote policy document using a language model")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default command)
    #[command(name = "serve")]
    Serve,
    /// Load and validate the configuration, then print it
    #[command(name = "check-config")]
    CheckConfig,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::CheckConfig) => check_config(&config),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,docent=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load(config_path.as_deref())?;
    config.apply_env(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

fn check_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).map_err(|e| {
        docent::DocentError::Config(format!("Failed to render config: {e}"))
    })?;
    println!("{rendered}");
    let key_state = if config.completion.api_key.is_some() {
        "set"
    } else {
        "NOT SET"
    };
    println!("# {}: {key_state}", config.completion.api_key_env);
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting Docent");
    tracing::debug!("Config loaded: {:?}", RedactedConfig(&config));

    DocentServer::new(config).serve().await?;

    tracing::info!("Docent stopped");
    Ok(())
}

/// Debug view of the config that never prints the API key
struct RedactedConfig<'a>(&'a Config);

impl std::fmt::Debug for RedactedConfig<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut config = self.0.clone();
        if config.completion.api_key.is_some() {
            config.completion.api_key = Some("<redacted>".to_string());
        }
        std::fmt::Debug::fmt(&config, f)
    }
}
