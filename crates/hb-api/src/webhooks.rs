//! Webhook Endpoints
//!
//! The provider-facing surface. Two iron rules:
//! - GET handshake: echo the challenge on success, 401 otherwise.
//! - POST events: always 200. Failures travel inside the body. A non-2xx
//!   here triggers provider-side redelivery, so the status code is part of
//!   the anti-retry-storm contract, not an error channel.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::AppState;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Handshake query parameters, named by the provider's protocol
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
}

/// Body of every webhook POST response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookAck {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// GET /webhooks/{tenant_token} - subscription handshake
#[utoipa::path(
    get,
    path = "/webhooks/{tenant_token}",
    tag = "Webhooks",
    params(("tenant_token" = String, Path, description = "Tenant callback token")),
    responses(
        (status = 200, description = "Challenge echoed verbatim", body = String),
        (status = 401, description = "Verification failed"),
    ),
)]
pub async fn verify_webhook(
    State(state): State<AppState>,
    Path(tenant_token): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let mode = query.mode.as_deref().unwrap_or_default();
    let challenge = query.challenge.as_deref().unwrap_or_default();
    let verify_token = query.verify_token.as_deref().unwrap_or_default();

    if state
        .verifier
        .verify(&tenant_token, mode, challenge, verify_token)
        .await
    {
        debug!(tenant_token, "webhook handshake verified");
        (StatusCode::OK, challenge.to_string()).into_response()
    } else {
        warn!(tenant_token, mode, "webhook handshake rejected");
        (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()).into_response()
    }
}

/// POST /webhooks/{tenant_token} - inbound event delivery. Always 200.
#[utoipa::path(
    post,
    path = "/webhooks/{tenant_token}",
    tag = "Webhooks",
    params(("tenant_token" = String, Path, description = "Tenant callback token")),
    request_body(content = serde_json::Value, content_type = "application/json"),
    responses(
        (status = 200, description = "Delivery acknowledged; success flag carries the real outcome", body = WebhookAck),
    ),
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(tenant_token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    // Signed tenants must present a valid payload signature over the raw
    // body. An invalid signature is still acknowledged with 200: answering
    // 401 would only make the provider redeliver the same bad request.
    if state.verifier.requires_signature(&tenant_token).await {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !state
            .verifier
            .verify_signature(&tenant_token, &body, signature)
            .await
        {
            warn!(tenant_token, "webhook payload signature rejected");
            return (StatusCode::OK, Json(WebhookAck::failed("invalid signature")));
        }
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) if body.is_empty() => serde_json::Value::Null,
        Err(e) => {
            warn!(tenant_token, error = %e, "webhook payload is not valid JSON");
            return (StatusCode::OK, Json(WebhookAck::failed("malformed payload")));
        }
    };

    let result = state.processor.process(&tenant_token, payload).await;
    let ack = if result.success {
        WebhookAck::ok()
    } else {
        WebhookAck::failed(result.detail.unwrap_or_else(|| "processing failed".to_string()))
    };
    (StatusCode::OK, Json(ack))
}
