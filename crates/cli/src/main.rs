//! tagcache entry point.
//!
//! Logging goes to stderr so stdout carries only command output.

use anyhow::Result;
use clap::Parser;
use tagcache_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod host;

use cli::{Cli, Command};
use commands::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = AppConfig::load()?;
    tracing::debug!(
        cache_dir = %config.cache_dir.display(),
        collections = config.collections.len(),
        "configuration loaded"
    );

    if let Command::Config(args) = &cli.command {
        return commands::config(&config, args);
    }

    let mut session = Session::open(config, cli.json).await?;
    match cli.command {
        Command::Search(args) => session.search(&args).await,
        Command::Refresh(args) => session.refresh(&args).await,
        Command::Update => session.update().await,
        Command::Status => session.status().await,
        Command::Check => session.check().await,
        Command::Export(args) => session.export(&args).await,
        Command::Tags(args) => session.tags(args).await,
        Command::Simplify(args) => session.simplify(&args),
        Command::Config(_) => Ok(()),
    }
}
