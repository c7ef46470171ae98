//! HookBridge Server
//!
//! Production server for:
//! - Provider-facing webhook endpoints (handshake + event ingestion)
//! - Tenant-scoped provider configuration APIs
//! - Variable resolution API
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HB_API_PORT` | `8080` | HTTP API port |
//! | `HB_METRICS_PORT` | `9090` | Prometheus metrics port |
//! | `HB_ENGINE_URL` | `http://localhost:8090` | Workflow engine base URL |
//! | `HB_ENGINE_TOKEN` | - | Bearer token for the engine API |
//! | `HB_DEDUP_RETENTION_SECS` | `3600` | Dedup window for redeliveries |
//! | `HB_DEDUP_SWEEP_SECS` | `60` | Dedup eviction sweep interval |
//! | `HB_LOOKUP_TIMEOUT_MS` | `3000` | Execution snapshot lookup budget |
//! | `HB_DEV_MODE` | - | Seed a demo tenant when `true`/`1` |
//! | `RUST_LOG` | `info` | Log level |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hb_api::{create_router, ApiDoc, AppState};
use hb_common::TenantId;
use hb_registry::{
    InMemorySettingsStore, InMemoryTokenDirectory, ProviderCatalog, ProviderRegistry,
    MESSAGING_PROVIDER_KEY,
};
use hb_variables::{
    HttpExecutionContextSource, HttpExecutionContextSourceConfig, VariableEngine,
    VariableEngineConfig,
};
use hb_webhook::{
    DedupStore, DedupStoreConfig, HttpWorkflowDispatcher, HttpWorkflowDispatcherConfig,
    WebhookProcessor, WebhookVerifier,
};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting HookBridge Server");

    // Configuration from environment
    let api_port: u16 = env_or_parse("HB_API_PORT", 8080);
    let metrics_port: u16 = env_or_parse("HB_METRICS_PORT", 9090);
    let engine_url = env_or("HB_ENGINE_URL", "http://localhost:8090");
    let engine_token = std::env::var("HB_ENGINE_TOKEN").ok();
    let dedup_retention_secs: u64 = env_or_parse("HB_DEDUP_RETENTION_SECS", 3600);
    let dedup_sweep_secs: u64 = env_or_parse("HB_DEDUP_SWEEP_SECS", 60);
    let lookup_timeout_ms: u64 = env_or_parse("HB_LOOKUP_TIMEOUT_MS", 3000);

    // Prometheus metrics exporter
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    info!("Metrics exporter listening on {}", metrics_addr);

    // Registry over the built-in catalog
    let registry = Arc::new(ProviderRegistry::new(
        Arc::new(ProviderCatalog::builtin()),
        Arc::new(InMemorySettingsStore::new()),
    ));
    let tokens = Arc::new(InMemoryTokenDirectory::new());

    // Seed development data if in dev mode
    let dev_mode = std::env::var("HB_DEV_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    if dev_mode {
        seed_dev_data(&registry, &tokens).await?;
    }

    // Webhook pipeline
    let dedup = Arc::new(DedupStore::new(DedupStoreConfig {
        retention: Duration::from_secs(dedup_retention_secs),
        sweep_interval: Duration::from_secs(dedup_sweep_secs),
    }));
    let _sweeper = dedup.spawn_sweeper();

    let dispatcher = Arc::new(HttpWorkflowDispatcher::new(HttpWorkflowDispatcherConfig {
        engine_base_url: engine_url.clone(),
        api_token: engine_token.clone(),
        ..HttpWorkflowDispatcherConfig::default()
    })?);
    let processor = Arc::new(WebhookProcessor::new(
        tokens.clone(),
        dedup,
        dispatcher,
    ));
    let verifier = Arc::new(WebhookVerifier::new(registry.clone(), tokens.clone()));

    // Variable resolution over the engine's execution store
    let source = Arc::new(HttpExecutionContextSource::new(
        HttpExecutionContextSourceConfig {
            engine_base_url: engine_url.clone(),
            api_token: engine_token,
            ..HttpExecutionContextSourceConfig::default()
        },
    )?);
    let engine = Arc::new(VariableEngine::new(
        source,
        VariableEngineConfig {
            lookup_timeout: Duration::from_millis(lookup_timeout_ms),
        },
    ));

    let state = AppState {
        registry,
        verifier,
        processor,
        engine,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HookBridge API listening on {} (engine: {})", addr, engine_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HookBridge Server stopped");
    Ok(())
}

/// Register a demo tenant so local webhook calls work out of the box
async fn seed_dev_data(
    registry: &Arc<ProviderRegistry>,
    tokens: &Arc<InMemoryTokenDirectory>,
) -> Result<()> {
    let tenant = TenantId::from("dev-tenant");
    registry
        .upsert_tenant_setting(
            &tenant,
            MESSAGING_PROVIDER_KEY,
            [
                ("phone_number_id".to_string(), "1550000000".to_string()),
                ("access_token".to_string(), "dev-access-token".to_string()),
                ("verify_token".to_string(), "dev-verify-token".to_string()),
            ]
            .into_iter()
            .collect(),
        )
        .await?;
    tokens.register("dev", tenant);
    info!("Dev data seeded: tenant 'dev-tenant' with webhook token 'dev'");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
