//! OpenAPI Documentation

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HookBridge API",
        description = "Webhook ingestion, provider configuration and variable resolution",
    ),
    paths(
        crate::health,
        crate::webhooks::verify_webhook,
        crate::webhooks::receive_webhook,
        crate::providers::list_definitions,
        crate::providers::list_tenant_settings,
        crate::providers::get_tenant_setting,
        crate::providers::upsert_tenant_setting,
        crate::variables::replace_variables,
    ),
    components(schemas(
        crate::HealthResponse,
        crate::error::ApiError,
        crate::webhooks::WebhookAck,
        crate::providers::SettingResponse,
        crate::providers::UpsertSettingRequest,
        crate::variables::ReplaceRequest,
        crate::variables::ReplaceResponse,
        hb_registry::ProviderDefinition,
        hb_registry::FieldSpec,
        hb_registry::ProviderCategory,
    )),
    tags(
        (name = "Webhooks", description = "Provider-facing webhook endpoints"),
        (name = "Providers", description = "Provider catalog and tenant configuration"),
        (name = "Variables", description = "Template variable resolution"),
        (name = "Monitoring", description = "Health"),
    ),
)]
pub struct ApiDoc;
