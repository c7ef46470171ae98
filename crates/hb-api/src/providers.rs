//! Provider Configuration API
//!
//! Tenant-scoped CRUD over the registry. Secret-valued fields never leave
//! the service: reads redact them, the catalog itself is schema only.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use hb_registry::{ProviderCategory, ProviderDefinition, TenantProviderSetting};

use crate::error::ApiFailure;
use crate::middleware::CurrentTenant;
use crate::AppState;

const REDACTED: &str = "***";

/// Query parameters for the definitions list
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DefinitionsQuery {
    /// Filter by category: messaging, payments, crm
    pub category: Option<String>,
}

/// Tenant setting response with secret fields redacted
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingResponse {
    pub provider_key: String,
    pub config_values: BTreeMap<String, String>,
    pub enabled: bool,
    pub updated_at: String,
}

impl SettingResponse {
    fn redacted(setting: TenantProviderSetting, definition: Option<&ProviderDefinition>) -> Self {
        let config_values = setting
            .config_values
            .into_iter()
            .map(|(name, value)| {
                let secret = definition
                    .and_then(|d| d.field(&name))
                    .map(|f| f.secret)
                    .unwrap_or(false);
                if secret {
                    (name, REDACTED.to_string())
                } else {
                    (name, value)
                }
            })
            .collect();
        Self {
            provider_key: setting.provider_key,
            config_values,
            enabled: setting.enabled,
            updated_at: setting.updated_at.to_rfc3339(),
        }
    }
}

/// Upsert request body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSettingRequest {
    pub config_values: BTreeMap<String, String>,
}

/// GET /providers/definitions - the global catalog
#[utoipa::path(
    get,
    path = "/providers/definitions",
    tag = "Providers",
    params(DefinitionsQuery),
    responses(
        (status = 200, description = "Catalog of provider definitions", body = [ProviderDefinition]),
        (status = 400, description = "Unknown category", body = crate::error::ApiError),
    ),
)]
pub async fn list_definitions(
    State(state): State<AppState>,
    Query(query): Query<DefinitionsQuery>,
) -> Result<Json<Vec<ProviderDefinition>>, ApiFailure> {
    let category = match query.category.as_deref() {
        None => None,
        Some(raw) => Some(ProviderCategory::parse(raw).ok_or_else(|| {
            ApiFailure::Validation(format!("Unknown provider category: {raw}"))
        })?),
    };

    let definitions = state
        .registry
        .catalog()
        .list(category)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(definitions))
}

/// GET /providers/tenant - this tenant's configured settings
#[utoipa::path(
    get,
    path = "/providers/tenant",
    tag = "Providers",
    responses(
        (status = 200, description = "Configured settings, secrets redacted", body = [SettingResponse]),
        (status = 401, description = "Missing tenant identity", body = crate::error::ApiError),
    ),
)]
pub async fn list_tenant_settings(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<Json<Vec<SettingResponse>>, ApiFailure> {
    let settings = state.registry.list_tenant_settings(&tenant).await?;
    let responses = settings
        .into_iter()
        .map(|s| {
            let definition = state.registry.catalog().get(&s.provider_key);
            SettingResponse::redacted(s, definition)
        })
        .collect();
    Ok(Json(responses))
}

/// GET /providers/tenant/{provider_key} - single setting
#[utoipa::path(
    get,
    path = "/providers/tenant/{provider_key}",
    tag = "Providers",
    params(("provider_key" = String, Path, description = "Provider key")),
    responses(
        (status = 200, description = "The setting, secrets redacted", body = SettingResponse),
        (status = 404, description = "No setting for this provider", body = crate::error::ApiError),
    ),
)]
pub async fn get_tenant_setting(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Path(provider_key): Path<String>,
) -> Result<Json<SettingResponse>, ApiFailure> {
    let setting = state
        .registry
        .get_tenant_setting(&tenant, &provider_key)
        .await?;
    let definition = state.registry.catalog().get(&provider_key);
    Ok(Json(SettingResponse::redacted(setting, definition)))
}

/// POST /providers/tenant/{provider_key} - insert or replace the setting
#[utoipa::path(
    post,
    path = "/providers/tenant/{provider_key}",
    tag = "Providers",
    params(("provider_key" = String, Path, description = "Provider key")),
    request_body = UpsertSettingRequest,
    responses(
        (status = 200, description = "Persisted setting, secrets redacted", body = SettingResponse),
        (status = 400, description = "Missing required field", body = crate::error::ApiError),
        (status = 404, description = "Unknown provider key", body = crate::error::ApiError),
    ),
)]
pub async fn upsert_tenant_setting(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    Path(provider_key): Path<String>,
    Json(request): Json<UpsertSettingRequest>,
) -> Result<Json<SettingResponse>, ApiFailure> {
    let setting = state
        .registry
        .upsert_tenant_setting(&tenant, &provider_key, request.config_values)
        .await?;
    let definition = state.registry.catalog().get(&provider_key);
    Ok(Json(SettingResponse::redacted(setting, definition)))
}
