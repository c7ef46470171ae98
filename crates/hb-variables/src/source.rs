//! Execution Context Source
//!
//! The workflow engine owns execution state; this module only fetches a
//! variable snapshot for an execution id.

use async_trait::async_trait;
use hb_common::VariableValue;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Snapshot request failed: {0}")]
    Request(String),

    #[error("Snapshot response malformed: {0}")]
    Malformed(String),
}

/// Provider of execution variable snapshots
#[async_trait]
pub trait ExecutionContextSource: Send + Sync {
    /// Fetch the current variable snapshot for an execution.
    /// `Ok(None)` means the engine does not know the execution.
    async fn snapshot(
        &self,
        execution_id: &str,
    ) -> Result<Option<BTreeMap<String, VariableValue>>, SourceError>;
}

/// HTTP source configuration
#[derive(Debug, Clone)]
pub struct HttpExecutionContextSourceConfig {
    /// Workflow engine base URL
    pub engine_base_url: String,
    /// Optional Bearer token for the engine API
    pub api_token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpExecutionContextSourceConfig {
    fn default() -> Self {
        Self {
            engine_base_url: "http://localhost:8080".to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Source that reads snapshots from the workflow engine REST API
pub struct HttpExecutionContextSource {
    config: HttpExecutionContextSourceConfig,
    client: reqwest::Client,
}

impl HttpExecutionContextSource {
    pub fn new(config: HttpExecutionContextSourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ExecutionContextSource for HttpExecutionContextSource {
    async fn snapshot(
        &self,
        execution_id: &str,
    ) -> Result<Option<BTreeMap<String, VariableValue>>, SourceError> {
        let url = format!(
            "{}/api/executions/{}/variables",
            self.config.engine_base_url, execution_id
        );

        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SourceError::Request(format!(
                "engine answered {}",
                response.status()
            )));
        }

        let raw: serde_json::Map<String, serde_json::Value> = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let snapshot = raw
            .iter()
            .filter_map(|(k, v)| VariableValue::from_json(v).map(|value| (k.clone(), value)))
            .collect();
        debug!(execution_id, "execution snapshot fetched");
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source_for(server: &MockServer) -> HttpExecutionContextSource {
        HttpExecutionContextSource::new(HttpExecutionContextSourceConfig {
            engine_base_url: server.uri(),
            api_token: None,
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn snapshot_parses_scalars() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/executions/exec-1/variables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Ada",
                "attempt": 2,
                "done": false,
                "meta": {"skipped": true}
            })))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let snapshot = source.snapshot("exec-1").await.unwrap().unwrap();
        assert_eq!(snapshot.get("name"), Some(&VariableValue::Text("Ada".into())));
        assert_eq!(snapshot.get("attempt"), Some(&VariableValue::Number(2.0)));
        assert!(!snapshot.contains_key("meta"));
    }

    #[tokio::test]
    async fn not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        assert!(source.snapshot("exec-gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_error_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        assert!(matches!(
            source.snapshot("exec-1").await,
            Err(SourceError::Request(_))
        ));
    }
}
