//! Detection listing command

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, Detection};
use crate::output::{color_score, format_timestamp, print_warning, OutputFormat};

/// Row for detections table
#[derive(Tabled)]
struct DetectionRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Epoch")]
    epoch: u64,
    #[tabled(rename = "Switch")]
    dpid: u64,
    #[tabled(rename = "Port")]
    port: u32,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Flows")]
    flows: String,
    #[tabled(rename = "Rate")]
    rate: String,
}

/// List recent detections, newest first
pub async fn list_detections(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let path = format!("api/v1/detections?limit={}", limit);
    let result: Vec<Detection> = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if result.is_empty() {
                print_warning("No detections recorded");
                return Ok(());
            }

            let rows: Vec<DetectionRow> = result
                .iter()
                .map(|d| DetectionRow {
                    time: format_timestamp(d.detected_at),
                    epoch: d.epoch,
                    dpid: d.dpid,
                    port: d.port,
                    host: d.host.clone().unwrap_or_else(|| "-".to_string()),
                    score: color_score(d.score),
                    flows: format!("{:.0}", d.features.live_flows),
                    rate: format!("{:.0}", d.features.flow_rate),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} detections", result.len());
        }
    }

    Ok(())
}
