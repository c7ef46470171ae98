//! Workflow Engine Dispatch
//!
//! Hands an accepted webhook event to the workflow engine's trigger
//! endpoint. The engine itself is an external collaborator; this module
//! only knows how to deliver to it and how to classify failures.

use async_trait::async_trait;
use hb_common::TenantId;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::InboundWebhookEvent;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Worth one synchronous retry: timeouts, connection failures, 5xx
    #[error("Transient dispatch failure: {0}")]
    Transient(String),

    /// Retrying cannot help: the engine rejected the trigger (4xx)
    #[error("Permanent dispatch failure: {0}")]
    Permanent(String),
}

/// Delivery of an accepted event to the workflow engine or notification path
#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        tenant: &TenantId,
        event: &InboundWebhookEvent,
    ) -> Result<(), DispatchError>;
}

/// HTTP dispatcher configuration
#[derive(Debug, Clone)]
pub struct HttpWorkflowDispatcherConfig {
    /// Workflow engine base URL
    pub engine_base_url: String,
    /// Optional Bearer token for the engine API
    pub api_token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpWorkflowDispatcherConfig {
    fn default() -> Self {
        Self {
            engine_base_url: "http://localhost:8080".to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Trigger request sent to the engine
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRequest<'a> {
    tenant_id: &'a str,
    source: &'static str,
    external_event_id: Option<&'a str>,
    received_at: String,
    payload: &'a serde_json::Value,
}

/// Dispatcher that POSTs triggers to the workflow engine REST API
pub struct HttpWorkflowDispatcher {
    config: HttpWorkflowDispatcherConfig,
    client: reqwest::Client,
}

impl HttpWorkflowDispatcher {
    pub fn new(config: HttpWorkflowDispatcherConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl WorkflowDispatcher for HttpWorkflowDispatcher {
    async fn dispatch(
        &self,
        tenant: &TenantId,
        event: &InboundWebhookEvent,
    ) -> Result<(), DispatchError> {
        let url = format!("{}/api/workflows/trigger", self.config.engine_base_url);
        let body = TriggerRequest {
            tenant_id: tenant.as_str(),
            source: "webhook",
            external_event_id: event.external_event_id.as_deref(),
            received_at: event.received_at.to_rfc3339(),
            payload: &event.raw_payload,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(tenant = %tenant, error = %e, "workflow engine unreachable");
            DispatchError::Transient(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(tenant = %tenant, "event dispatched to workflow engine");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(DispatchError::Permanent(format!(
                "engine rejected trigger ({}): {}",
                status, detail
            )))
        } else {
            Err(DispatchError::Transient(format!(
                "engine error ({}): {}",
                status, detail
            )))
        }
    }
}
