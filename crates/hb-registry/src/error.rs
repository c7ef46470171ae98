//! Registry Error Types

use hb_common::TenantId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown provider: {key}")]
    UnknownProvider { key: String },

    #[error("No setting for tenant {tenant} and provider {key}")]
    NotFound { tenant: TenantId, key: String },

    #[error("Missing required field '{field}' for provider {key}")]
    MissingField { key: String, field: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RegistryError {
    pub fn unknown_provider(key: impl Into<String>) -> Self {
        Self::UnknownProvider { key: key.into() }
    }

    pub fn not_found(tenant: &TenantId, key: impl Into<String>) -> Self {
        Self::NotFound {
            tenant: tenant.clone(),
            key: key.into(),
        }
    }

    pub fn missing_field(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            key: key.into(),
            field: field.into(),
        }
    }
}
