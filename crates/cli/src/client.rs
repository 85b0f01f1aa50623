//! API client for communicating with the detector daemon

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the detector control API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a bodyless POST request
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorStatus {
    pub instance: String,
    pub version: String,
    pub enabled: bool,
    pub debug: bool,
    pub epochs: u64,
    pub last_epoch_ms: u64,
    pub attachment_points: usize,
    pub ledger_entries: usize,
    pub pending_removals: u64,
    pub detections_total: u64,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub dpid: u64,
    pub port: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub epoch: u64,
    pub score: f64,
    pub features: FeatureVector,
    pub detected_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub live_flows: f64,
    pub flow_rate: f64,
    pub mean_packet_delta: f64,
    pub stddev_packet_delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugState {
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_status() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "instance": "det-1",
            "version": "0.1.0",
            "enabled": true,
            "debug": false,
            "epochs": 12,
            "last_epoch_ms": 40,
            "attachment_points": 8,
            "ledger_entries": 0,
            "pending_removals": 0,
            "detections_total": 3,
            "uptime_secs": 36
        }"#;
        let mock = server
            .mock("GET", "/api/v1/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let status: DetectorStatus = client.get("api/v1/status").await.unwrap();

        mock.assert_async().await;
        assert_eq!(status.instance, "det-1");
        assert_eq!(status.epochs, 12);
        assert!(status.enabled);
        assert!(!status.debug);
    }

    #[tokio::test]
    async fn test_get_reports_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/status")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result: Result<DetectorStatus> = client.get("api/v1/status").await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_post_toggles_debug() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/debug/on")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"debug":true}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let state: DebugState = client.post("api/v1/debug/on").await.unwrap();

        mock.assert_async().await;
        assert!(state.debug);
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
