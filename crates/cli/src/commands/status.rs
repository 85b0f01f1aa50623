//! Detector status command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, DetectorStatus};
use crate::output::{color_enabled, format_duration, OutputFormat};

/// Show detector status
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: DetectorStatus = client.get("api/v1/status").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&status)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Detector Status".bold());
            println!("{}", "=".repeat(50));
            println!("Instance:             {}", status.instance.cyan());
            println!("Version:              {}", status.version);
            println!("Detection:            {}", color_enabled(status.enabled));
            println!(
                "Debug output:         {}",
                if status.debug {
                    "on".yellow().to_string()
                } else {
                    "off".to_string()
                }
            );
            println!(
                "Uptime:               {}",
                format_duration(status.uptime_secs)
            );
            println!();
            println!("{}", "Epochs".bold());
            println!("{}", "-".repeat(50));
            println!("Completed:            {}", status.epochs);
            println!("Last epoch:           {}ms", status.last_epoch_ms);
            println!();
            println!("{}", "State".bold());
            println!("{}", "-".repeat(50));
            println!("Attachment points:    {}", status.attachment_points);
            println!("Ledger entries:       {}", status.ledger_entries);
            println!("Pending removals:     {}", status.pending_removals);
            println!("Detections:           {}", status.detections_total);
        }
    }

    Ok(())
}
