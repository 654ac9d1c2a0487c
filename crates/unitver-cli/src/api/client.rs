//! HTTP API client for the unitver server

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::api::{endpoints, types::*};
use crate::error::{CliError, Result};

// ============================================================================
// API Client Constants
// ============================================================================

/// Default timeout for API requests in seconds.
/// Can be overridden via UNITVER_API_TIMEOUT_SECS environment variable.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

/// Default server URL when not specified via flag or environment variable.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// API client for the unitver server
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Result<Self> {
        let timeout_secs = std::env::var("UNITVER_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Check server health
    pub async fn health_check(&self) -> Result<bool> {
        let url = endpoints::health_url(&self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    pub async fn deploy(&self, name: &str, request: &DeployRequest) -> Result<DeployResult> {
        let url = endpoints::deploy_url(&self.base_url, name);
        let response = self.client.post(&url).json(request).send().await?;
        read_data(response).await
    }

    pub async fn list_function_units(&self) -> Result<FunctionUnitList> {
        let url = endpoints::function_units_url(&self.base_url);
        read_data(self.client.get(&url).send().await?).await
    }

    pub async fn version_history(&self, name: &str) -> Result<VersionHistory> {
        let url = endpoints::versions_url(&self.base_url, name);
        read_data(self.client.get(&url).send().await?).await
    }

    pub async fn active_version(&self, name: &str) -> Result<ActiveVersion> {
        let url = endpoints::active_version_url(&self.base_url, name);
        read_data(self.client.get(&url).send().await?).await
    }

    pub async fn export_snapshot(&self, name: &str, version: &str) -> Result<SnapshotExport> {
        let url = endpoints::snapshot_url(&self.base_url, name, version);
        read_data(self.client.get(&url).send().await?).await
    }

    pub async fn plan_rollback(&self, name: &str, target: &str) -> Result<RollbackImpact> {
        let url = endpoints::rollback_plan_url(&self.base_url, name, target);
        read_data(self.client.get(&url).send().await?).await
    }

    /// Execute a confirmed rollback
    pub async fn rollback(&self, name: &str, target: &str) -> Result<RollbackResult> {
        let url = endpoints::rollback_url(&self.base_url, name);
        let request = RollbackRequest {
            target_version: target.to_string(),
            confirmed: true,
        };
        let response = self.client.post(&url).json(&request).send().await?;
        read_data(response).await
    }

    pub async fn check_invariants(&self, name: Option<&str>) -> Result<Vec<InvariantReport>> {
        let url = endpoints::invariants_url(&self.base_url, name);
        read_data(self.client.get(&url).send().await?).await
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Unwrap the success envelope or turn the error envelope into [`CliError::Api`]
async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;
    tracing::debug!(%status, bytes = body.len(), "Received API response");

    if status.is_success() {
        if let Ok(envelope) = serde_json::from_slice::<ApiResponse<T>>(&body) {
            if envelope.success {
                return Ok(envelope.data);
            }
        }
    }

    match serde_json::from_slice::<ErrorResponse>(&body) {
        Ok(error) => Err(CliError::api(error.error.code, error.error.message)),
        Err(_) if status.is_success() => Err(CliError::UnexpectedResponse(format!(
            "body did not match the expected shape (HTTP {})",
            status
        ))),
        Err(_) => Err(CliError::api(
            status.as_u16().to_string(),
            format!("Server returned HTTP {}", status),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_client_creation() {
        let client = ApiClient::new("http://localhost:8000".to_string()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let client = ApiClient::new("http://127.0.0.1:9".to_string()).unwrap();
        assert!(!client.health_check().await.unwrap());
    }
}
