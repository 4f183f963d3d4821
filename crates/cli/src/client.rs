//! HTTP client for the scheduler's health, cycle and debug endpoints

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use scheduler_lib::health::HealthResponse;
use scheduler_lib::plugins::SNAPSHOT_PATH;
use scheduler_lib::{ClusterSnapshot, CycleReport};
use serde::de::DeserializeOwned;
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    async fn send(&self, path: &str) -> Result<reqwest::Response> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.client
            .get(url)
            .send()
            .await
            .context("Failed to send request")
    }

    /// GET a JSON document; non-2xx responses become errors carrying the body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(path).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Like [`ApiClient::get`], but a 404 is `None`
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.send(path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .map(Some)
            .context("Failed to parse response")
    }

    pub async fn snapshot(&self) -> Result<ClusterSnapshot> {
        self.get(SNAPSHOT_PATH).await
    }

    /// Health is reported with a JSON body on both 200 and 503
    pub async fn health(&self) -> Result<HealthResponse> {
        self.send("/healthz")
            .await?
            .json()
            .await
            .context("Failed to parse health response")
    }

    pub async fn last_cycle(&self) -> Result<Option<CycleReport>> {
        self.get_optional("/last-cycle").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_lib::health::ComponentStatus;
    use scheduler_lib::PodGroupId;

    const SNAPSHOT: &str = r#"{
        "queues": {"research": {"uid": "research", "name": "research", "parent": null,
                                "children": [], "gpu": {"deserved": 4.0, "limit": null, "over_quota_weight": 1.0}}},
        "nodes": {"gpu-node-1": {"name": "gpu-node-1", "labels": {},
                                 "allocatable": {"milli_cpu": 0.0, "memory": 0.0, "gpus": 8.0},
                                 "pod_infos": {}}},
        "pod_groups": {"train": {"uid": "train", "queue": "research", "min_member": 2, "pod_infos": {}}}
    }"#;

    #[tokio::test]
    async fn test_snapshot_is_parsed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/get-snapshot")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SNAPSHOT)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let snapshot = client.snapshot().await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.queues.len(), 1);
        assert_eq!(snapshot.nodes["gpu-node-1"].allocatable.gpus, 8.0);
        assert_eq!(snapshot.pod_groups[&PodGroupId::new("train")].min_member, 2);
    }

    #[tokio::test]
    async fn test_snapshot_error_carries_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/get-snapshot")
            .with_status(500)
            .with_body("Cache is unavailable: informers not synced")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.snapshot().await.unwrap_err().to_string();

        assert!(err.contains("500"));
        assert!(err.contains("informers not synced"));
    }

    #[tokio::test]
    async fn test_health_is_read_on_503_and_missing_cycle_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "unhealthy", "components": {"cache": {"status": "unhealthy", "message": "down", "last_check_timestamp": 0}}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/last-cycle")
            .with_status(404)
            .with_body("no cycle has completed yet")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(client.last_cycle().await.unwrap().is_none());
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
