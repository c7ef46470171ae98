//! HookBridge API
//!
//! HTTP endpoints for:
//! - Webhook handshake and event ingestion (provider-facing)
//! - Provider catalog and tenant configuration (tenant-scoped)
//! - Variable resolution for the automation engine
//! - Health

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use hb_registry::ProviderRegistry;
use hb_variables::VariableEngine;
use hb_webhook::{WebhookProcessor, WebhookVerifier};

pub mod error;
pub mod middleware;
pub mod openapi;
pub mod providers;
pub mod variables;
pub mod webhooks;

pub use error::{ApiError, ApiFailure};
pub use middleware::{CurrentTenant, TENANT_HEADER};
pub use openapi::ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub verifier: Arc<WebhookVerifier>,
    pub processor: Arc<WebhookProcessor>,
    pub engine: Arc<VariableEngine>,
}

/// Simple health response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status: UP
    pub status: String,
    /// Application version
    pub version: String,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    tag = "Monitoring",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create the full router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/webhooks/:tenant_token",
            get(webhooks::verify_webhook).post(webhooks::receive_webhook),
        )
        .route("/providers/definitions", get(providers::list_definitions))
        .route("/providers/tenant", get(providers::list_tenant_settings))
        .route(
            "/providers/tenant/:provider_key",
            get(providers::get_tenant_setting).post(providers::upsert_tenant_setting),
        )
        .route("/variables/replace", post(variables::replace_variables))
        .with_state(state)
}
