//! Command-line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HTTP retrain and prediction gateway
#[derive(Debug, Parser)]
#[command(name = "modelgate", version)]
pub struct Args {
    /// Configuration file (TOML); defaults to ./modelgate.toml if present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Load the default model and serve the HTTP API (default)
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,
        /// Override server.port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Write a fresh, untrained default model artifact
    Init {
        /// Number of features the model accepts
        #[arg(long)]
        input_width: usize,
        /// Replace an existing artifact
        #[arg(long)]
        force: bool,
    },
}

impl Args {
    /// The subcommand to run, `serve` when none was given
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            host: None,
            port: None,
        })
    }
}
