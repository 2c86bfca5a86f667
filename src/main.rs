//! Codebreaker - console client
//!
//! Starts, resumes or deletes a game on the configured service.

#![warn(missing_docs)]

mod cli;
mod console;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use codebreaker::{ClientConfig, HttpTransport, ObserverHub, SessionService};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    initialize_tracing(&config);

    let transport = Arc::new(HttpTransport::new(&config)?);
    let service = Arc::new(SessionService::new(transport, Arc::new(ObserverHub::new())));

    match cli.command {
        Command::Play { pool, length } => {
            let config = config.with_game_defaults(pool, length);
            run_play(service, &config).await
        }
        Command::Resume { id } => run_resume(service, &id).await,
        Command::Delete { id } => run_delete(service, &id).await,
    }
}

/// Start a new game and play it
#[instrument(skip_all, fields(pool = %config.pool(), length = *config.length()))]
async fn run_play(service: Arc<SessionService>, config: &ClientConfig) -> Result<()> {
    let game = service
        .start_session(config.pool().as_str(), *config.length())
        .await?;
    info!(game_id = ?game.id(), "Game created");
    console::play(service).await
}

/// Resume a game by id and keep playing
#[instrument(skip(service))]
async fn run_resume(service: Arc<SessionService>, id: &str) -> Result<()> {
    service.get_session(id).await?;
    console::play(service).await
}

/// Delete a game by id
#[instrument(skip(service))]
async fn run_delete(service: Arc<SessionService>, id: &str) -> Result<()> {
    service.get_session(id).await?;
    service.delete_session().await?;
    println!("Deleted game {}", id);
    Ok(())
}

#[instrument]
fn load_config(path: Option<&std::path::Path>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn initialize_tracing(config: &ClientConfig) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();

    info!(base_url = %config.base_url(), "Tracing initialized");
}
