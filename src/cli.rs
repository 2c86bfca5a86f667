//! Command-line interface for codebreaker.

use clap::{Parser, Subcommand};

/// Codebreaker - play a remote code-guessing game from the terminal
#[derive(Parser, Debug)]
#[command(name = "codebreaker")]
#[command(about = "Console client for the codebreaker game service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new game and play it interactively
    Play {
        /// Characters the secret is drawn from (defaults to the config value)
        #[arg(short, long)]
        pool: Option<String>,

        /// Length of the secret (defaults to the config value)
        #[arg(short, long)]
        length: Option<usize>,
    },

    /// Resume an existing game by id
    Resume {
        /// Game id issued by the server
        id: String,
    },

    /// Delete a game by id
    Delete {
        /// Game id issued by the server
        id: String,
    },
}
