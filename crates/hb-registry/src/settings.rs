//! Per-Tenant Provider Settings
//!
//! Settings live behind the SettingsStore trait; the registry layers
//! catalog validation on top. Upserts replace the whole row for a
//! (tenant, provider) pair, they never merge fields across writers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hb_common::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::catalog::ProviderCatalog;
use crate::error::RegistryError;
use crate::Result;

/// A tenant's configured instance of a provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantProviderSetting {
    pub tenant_id: TenantId,
    pub provider_key: String,
    pub config_values: BTreeMap<String, String>,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl TenantProviderSetting {
    pub fn value(&self, field: &str) -> Option<&str> {
        self.config_values.get(field).map(String::as_str)
    }
}

/// Storage contract for tenant provider settings.
///
/// At most one row exists per (tenant, provider) pair. Implementations must
/// serialize concurrent writes for the same pair (last-committed-wins); a
/// toggle never interleaves with a replace.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, tenant: &TenantId, provider_key: &str) -> Result<Option<TenantProviderSetting>>;

    async fn list_for_tenant(&self, tenant: &TenantId) -> Result<Vec<TenantProviderSetting>>;

    /// Insert or replace the single row for (tenant, provider), keeping an
    /// existing row's enabled flag. Returns the persisted state.
    async fn upsert(&self, setting: TenantProviderSetting) -> Result<TenantProviderSetting>;

    /// Flip the enabled flag in place. `Ok(None)` when no row exists.
    async fn set_enabled(
        &self,
        tenant: &TenantId,
        provider_key: &str,
        enabled: bool,
    ) -> Result<Option<TenantProviderSetting>>;
}

/// In-memory settings store keyed by (tenant, provider).
///
/// The dashmap entry API holds the pair's shard lock across the whole
/// read-modify-write, giving the per-pair serialization the contract
/// requires; unrelated pairs never contend.
#[derive(Default)]
pub struct InMemorySettingsStore {
    rows: DashMap<(TenantId, String), TenantProviderSetting>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get(&self, tenant: &TenantId, provider_key: &str) -> Result<Option<TenantProviderSetting>> {
        let key = (tenant.clone(), provider_key.to_string());
        Ok(self.rows.get(&key).map(|r| r.clone()))
    }

    async fn list_for_tenant(&self, tenant: &TenantId) -> Result<Vec<TenantProviderSetting>> {
        let mut settings: Vec<TenantProviderSetting> = self
            .rows
            .iter()
            .filter(|r| &r.key().0 == tenant)
            .map(|r| r.value().clone())
            .collect();
        settings.sort_by(|a, b| a.provider_key.cmp(&b.provider_key));
        Ok(settings)
    }

    async fn upsert(&self, mut setting: TenantProviderSetting) -> Result<TenantProviderSetting> {
        let key = (setting.tenant_id.clone(), setting.provider_key.clone());
        match self.rows.entry(key) {
            Entry::Occupied(mut entry) => {
                setting.enabled = entry.get().enabled;
                entry.insert(setting.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(setting.clone());
            }
        }
        Ok(setting)
    }

    async fn set_enabled(
        &self,
        tenant: &TenantId,
        provider_key: &str,
        enabled: bool,
    ) -> Result<Option<TenantProviderSetting>> {
        let key = (tenant.clone(), provider_key.to_string());
        Ok(self.rows.get_mut(&key).map(|mut row| {
            row.enabled = enabled;
            row.updated_at = Utc::now();
            row.clone()
        }))
    }
}

/// Provider Registry: the validated read/write surface over catalog and store
pub struct ProviderRegistry {
    catalog: Arc<ProviderCatalog>,
    store: Arc<dyn SettingsStore>,
}

impl ProviderRegistry {
    pub fn new(catalog: Arc<ProviderCatalog>, store: Arc<dyn SettingsStore>) -> Self {
        Self { catalog, store }
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Get the single setting row for a (tenant, provider) pair.
    /// A row that exists but is disabled is returned as-is; callers decide
    /// what disabled means for them.
    pub async fn get_tenant_setting(
        &self,
        tenant: &TenantId,
        provider_key: &str,
    ) -> Result<TenantProviderSetting> {
        self.store
            .get(tenant, provider_key)
            .await?
            .ok_or_else(|| RegistryError::not_found(tenant, provider_key))
    }

    pub async fn list_tenant_settings(&self, tenant: &TenantId) -> Result<Vec<TenantProviderSetting>> {
        self.store.list_for_tenant(tenant).await
    }

    /// Insert or replace the tenant's configuration for a provider.
    ///
    /// Validates the provider key against the catalog and the supplied values
    /// against the definition's required fields before touching the store.
    /// The whole config_values map is replaced; a re-upsert with fewer fields
    /// replaces the row, it does not merge. An existing row's enabled flag is
    /// preserved by the store, atomically with the replace.
    pub async fn upsert_tenant_setting(
        &self,
        tenant: &TenantId,
        provider_key: &str,
        config_values: BTreeMap<String, String>,
    ) -> Result<TenantProviderSetting> {
        let definition = self
            .catalog
            .get(provider_key)
            .ok_or_else(|| RegistryError::unknown_provider(provider_key))?;

        for field in definition.required_fields.iter().filter(|f| f.required) {
            let present = config_values
                .get(&field.name)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return Err(RegistryError::missing_field(provider_key, &field.name));
            }
        }

        let setting = TenantProviderSetting {
            tenant_id: tenant.clone(),
            provider_key: provider_key.to_string(),
            config_values,
            enabled: true,
            updated_at: Utc::now(),
        };

        let persisted = self.store.upsert(setting).await?;
        info!(
            tenant = %tenant,
            provider = provider_key,
            "provider setting upserted"
        );
        Ok(persisted)
    }

    /// Flip the enabled flag without touching config values
    pub async fn set_enabled(
        &self,
        tenant: &TenantId,
        provider_key: &str,
        enabled: bool,
    ) -> Result<TenantProviderSetting> {
        let updated = self
            .store
            .set_enabled(tenant, provider_key, enabled)
            .await?
            .ok_or_else(|| RegistryError::not_found(tenant, provider_key))?;
        debug!(tenant = %tenant, provider = provider_key, enabled, "provider setting toggled");
        Ok(updated)
    }
}
