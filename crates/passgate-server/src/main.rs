//! Passgate server CLI
//!
//! Starts the HTTP server, or issues a bearer token for operators.

use anyhow::Context;
use clap::Parser;
use passgate_server::{auth::AdminAuth, config::ServerConfig, start_server};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Passgate - score-gated account creation and posting
#[derive(Debug, Parser)]
#[command(name = "passgate-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PASSGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Print a bearer token for SUBJECT and exit
    #[arg(long, value_name = "SUBJECT")]
    issue_token: Option<String>,

    /// Give the issued token the admin claim
    #[arg(long, requires = "issue_token")]
    admin: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            eprintln!("Warning: No config file specified, using default test configuration");
            eprintln!("Usage: passgate-server --config <path-to-config.toml>");
            eprintln!();
            ServerConfig::default_test_config()
        }
    };

    if let Some(subject) = cli.issue_token {
        let auth = AdminAuth::new(&config.jwt_secret, config.token_expiry_secs);
        let token = auth
            .issue_token(&subject, cli.admin)
            .context("Failed to issue token")?;
        println!("{}", token);
        return Ok(());
    }

    start_server(config).await.context("Server stopped")?;
    Ok(())
}
