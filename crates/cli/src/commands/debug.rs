//! Classifier debug-output commands

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, DebugState};
use crate::output::{print_success, OutputFormat};

/// Enable or disable per-classification debug output
pub async fn set_debug(client: &ApiClient, enable: bool, format: OutputFormat) -> Result<()> {
    let path = if enable {
        "api/v1/debug/on"
    } else {
        "api/v1/debug/off"
    };
    let state: DebugState = client.post(path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&state)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if state.debug {
                print_success("Classifier debug output enabled");
            } else {
                print_success("Classifier debug output disabled");
            }
        }
    }

    Ok(())
}

/// Show the current debug state
pub async fn show_debug(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let state: DebugState = client.get("api/v1/debug").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&state)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            let rendered = if state.debug {
                "on".yellow().bold().to_string()
            } else {
                "off".to_string()
            };
            println!("Classifier debug output: {}", rendered);
        }
    }

    Ok(())
}
