//! Build-worker API client.

use super::wire::TestUpdate;
use crate::error::{ReportingError, ReportingResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the build worker API base URL.
pub const ENV_API_URL: &str = "APPVEYOR_API_URL";

/// Test status sink on the CI build worker.
#[async_trait]
pub trait BuildWorkerApiClient: Send + Sync {
    /// Register a test (normally with outcome `Running`).
    async fn add_test(&self, test: &TestUpdate) -> ReportingResult<()>;

    /// Update a previously added test with its final outcome.
    async fn update_test(&self, test: &TestUpdate) -> ReportingResult<()>;
}

/// Configuration for [`HttpBuildWorkerClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildWorkerConfig {
    /// Build worker API base URL
    pub api_url: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for BuildWorkerConfig {
    fn default() -> Self {
        BuildWorkerConfig {
            api_url: std::env::var(ENV_API_URL).ok(),
            timeout_secs: 10,
            user_agent: format!("mspec-reporting/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl BuildWorkerConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific build worker
    pub fn new(api_url: &str) -> Self {
        BuildWorkerConfig {
            api_url: Some(api_url.to_string()),
            ..Self::default()
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Whether a build worker is reachable at all.
    pub fn is_configured(&self) -> bool {
        self.api_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// `{api_url}/api/tests`
    pub fn tests_endpoint(&self) -> ReportingResult<String> {
        let base = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ReportingError::Config(format!("{ENV_API_URL} is not set")))?;
        Ok(format!("{}/api/tests", base.trim_end_matches('/')))
    }
}

/// HTTP client for the build worker API.
pub struct HttpBuildWorkerClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpBuildWorkerClient {
    pub fn new(config: &BuildWorkerConfig) -> ReportingResult<Self> {
        let endpoint = config.tests_endpoint()?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, method: reqwest::Method, test: &TestUpdate) -> ReportingResult<()> {
        let verb = if method == reqwest::Method::POST { "POST" } else { "PUT" };
        let response = self
            .http
            .request(method, &self.endpoint)
            .json(test)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportingError::Rejected {
                method: verb,
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        debug!(method = verb, test = %test.test_name, outcome = %test.outcome, "Build worker accepted test update");
        Ok(())
    }
}

#[async_trait]
impl BuildWorkerApiClient for HttpBuildWorkerClient {
    async fn add_test(&self, test: &TestUpdate) -> ReportingResult<()> {
        self.send(reqwest::Method::POST, test).await
    }

    async fn update_test(&self, test: &TestUpdate) -> ReportingResult<()> {
        self.send(reqwest::Method::PUT, test).await
    }
}
