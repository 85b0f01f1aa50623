//! DoS Detector CLI
//!
//! A command-line tool for checking detector status, listing recent
//! detections, and toggling classifier debug output.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{debug, detections, status};

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// DoS Detector CLI
#[derive(Parser)]
#[command(name = "ddosctl")]
#[command(author, version, about = "CLI for the SDN DoS detector", long_about = None)]
pub struct Cli {
    /// Detector API URL (can also be set via DDOSCTL_API_URL env var)
    #[arg(long, env = "DDOSCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show detector status
    Status,

    /// List recent detections
    Detections {
        /// Maximum number of detections to show
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },

    /// Control classifier debug output
    #[command(subcommand)]
    Debug(DebugCommands),
}

#[derive(Subcommand)]
pub enum DebugCommands {
    /// Enable per-classification debug logging
    On,

    /// Disable per-classification debug logging
    Off,

    /// Show the current debug state
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Flag and env win over the saved config, which wins over the default
    let saved = config::Config::load().unwrap_or_default();
    let api_url = cli
        .api_url
        .clone()
        .or(saved.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    // Initialize client
    let client = client::ApiClient::new(&api_url)?;

    // Execute command
    match cli.command {
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
        Commands::Detections { limit } => {
            detections::list_detections(&client, limit, cli.format).await?;
        }
        Commands::Debug(debug_cmd) => match debug_cmd {
            DebugCommands::On => {
                debug::set_debug(&client, true, cli.format).await?;
            }
            DebugCommands::Off => {
                debug::set_debug(&client, false, cli.format).await?;
            }
            DebugCommands::Show => {
                debug::show_debug(&client, cli.format).await?;
            }
        },
    }

    Ok(())
}
