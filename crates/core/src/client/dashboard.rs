//! HTTP client for the dashboard backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::BackendConfig;
use crate::confsync::{ConfigBackend, ConfigDomain, ConfigSnapshot};
use crate::job::{Job, JobId, JobSource};
use crate::logtail::{ItemLog, LogChunk, LogSource};
use crate::metrics::BACKEND_REQUEST_DURATION;
use crate::tasks::{HistoryRow, HistorySource};

use super::ClientError;

/// Dashboard backend client implementing every pull-side seam.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode a JSON body, recording its latency under
    /// `endpoint`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let started = Instant::now();
        let result = self.send(request).await;
        let status = match &result {
            Ok(response) => response.status().as_u16().to_string(),
            Err(ClientError::Http { status, .. }) => status.to_string(),
            Err(ClientError::Timeout) => "timeout".to_string(),
            Err(_) => "error".to_string(),
        };
        BACKEND_REQUEST_DURATION
            .with_label_values(&[endpoint, &status])
            .observe(started.elapsed().as_secs_f64());

        result?
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", endpoint, e)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl JobSource for DashboardClient {
    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        let request = self.client.get(self.url("/api/scrape/jobs"));
        self.send_json("scrape_jobs", request).await
    }
}

#[async_trait]
impl LogSource for DashboardClient {
    async fn fetch_log(&self, job_id: JobId, offset: u64) -> Result<LogChunk, ClientError> {
        let request = self
            .client
            .get(self.url(&format!("/api/scrape/logs/{}", job_id)))
            .query(&[("offset", offset)]);
        self.send_json("scrape_logs", request).await
    }

    async fn fetch_item_log(&self, job_id: JobId, filename: &str) -> Result<ItemLog, ClientError> {
        debug!(job_id, filename, "Fetching item log");
        let request = self
            .client
            .get(self.url(&format!("/api/scrape/logs/{}/item", job_id)))
            .query(&[("filename", filename)]);
        self.send_json("scrape_item_log", request).await
    }
}

#[async_trait]
impl HistorySource for DashboardClient {
    async fn list_history(&self) -> Result<Vec<HistoryRow>, ClientError> {
        let request = self.client.get(self.url("/api/history"));
        self.send_json("history", request).await
    }
}

#[async_trait]
impl ConfigBackend for DashboardClient {
    async fn fetch_config(&self, domain: ConfigDomain) -> Result<ConfigSnapshot, ClientError> {
        let request = self.client.get(self.url(&domain.path()));
        self.send_json(config_endpoint(domain), request).await
    }

    async fn save_config(
        &self,
        domain: ConfigDomain,
        snapshot: &ConfigSnapshot,
    ) -> Result<ConfigSnapshot, ClientError> {
        let request = self.client.post(self.url(&domain.path())).json(snapshot);
        self.send_json(config_endpoint(domain), request).await
    }
}

fn config_endpoint(domain: ConfigDomain) -> &'static str {
    match domain {
        ConfigDomain::Download => "download_config",
        ConfigDomain::Player => "player_config",
        ConfigDomain::Scrape => "scrape_config",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:8000/".to_string(),
            timeout_secs: 5,
        };
        let client = DashboardClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
        assert_eq!(
            client.url("/api/scrape/jobs"),
            "http://127.0.0.1:8000/api/scrape/jobs"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        };
        let client = DashboardClient::new(&config).unwrap();
        let err = client.list_jobs().await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {}", err);
    }
}
