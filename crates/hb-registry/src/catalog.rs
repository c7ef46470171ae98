//! Provider Definition Catalog
//!
//! The catalog is fixed at process start: definitions describe which
//! configuration fields a provider needs, never a tenant's actual values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Provider key for the messaging platform whose webhooks we terminate.
/// The Webhook Verifier and Processor always resolve settings under this key.
pub const MESSAGING_PROVIDER_KEY: &str = "whatsapp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderCategory {
    Messaging,
    Payments,
    Crm,
}

impl ProviderCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "messaging" => Some(Self::Messaging),
            "payments" => Some(Self::Payments),
            "crm" => Some(Self::Crm),
            _ => None,
        }
    }
}

/// One configuration field a provider requires or accepts
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub required: bool,
    /// Secret fields are redacted when tenant settings are listed
    pub secret: bool,
}

impl FieldSpec {
    pub fn required(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            required: true,
            secret: false,
        }
    }

    pub fn optional(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            required: false,
            secret: false,
        }
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Immutable, global definition of a configurable integration provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDefinition {
    pub key: String,
    pub category: ProviderCategory,
    pub required_fields: Vec<FieldSpec>,
    pub schema_version: u32,
}

impl ProviderDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.required_fields.iter().find(|f| f.name == name)
    }
}

/// Read-only catalog of provider definitions, keyed and ordered by `key`
pub struct ProviderCatalog {
    definitions: Vec<ProviderDefinition>,
    by_key: HashMap<String, usize>,
}

impl ProviderCatalog {
    pub fn new(mut definitions: Vec<ProviderDefinition>) -> Self {
        definitions.sort_by(|a, b| a.key.cmp(&b.key));
        let by_key = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.key.clone(), i))
            .collect();
        Self {
            definitions,
            by_key,
        }
    }

    /// The built-in catalog shipped with the server
    pub fn builtin() -> Self {
        Self::new(vec![
            ProviderDefinition {
                key: MESSAGING_PROVIDER_KEY.to_string(),
                category: ProviderCategory::Messaging,
                required_fields: vec![
                    FieldSpec::required("phone_number_id", "Phone number ID"),
                    FieldSpec::required("access_token", "API access token").secret(),
                    FieldSpec::required("verify_token", "Webhook verify token").secret(),
                    FieldSpec::optional("app_secret", "App secret for payload signatures").secret(),
                ],
                schema_version: 2,
            },
            ProviderDefinition {
                key: "slack".to_string(),
                category: ProviderCategory::Messaging,
                required_fields: vec![
                    FieldSpec::required("bot_token", "Bot user OAuth token").secret(),
                    FieldSpec::optional("default_channel", "Default channel"),
                ],
                schema_version: 1,
            },
            ProviderDefinition {
                key: "stripe".to_string(),
                category: ProviderCategory::Payments,
                required_fields: vec![
                    FieldSpec::required("api_key", "Secret API key").secret(),
                    FieldSpec::optional("webhook_secret", "Endpoint signing secret").secret(),
                ],
                schema_version: 1,
            },
            ProviderDefinition {
                key: "hubspot".to_string(),
                category: ProviderCategory::Crm,
                required_fields: vec![
                    FieldSpec::required("access_token", "Private app token").secret(),
                ],
                schema_version: 1,
            },
        ])
    }

    pub fn get(&self, key: &str) -> Option<&ProviderDefinition> {
        self.by_key.get(key).map(|&i| &self.definitions[i])
    }

    /// List definitions, optionally filtered by category. Ordering is stable
    /// by key.
    pub fn list(&self, category: Option<ProviderCategory>) -> Vec<&ProviderDefinition> {
        self.definitions
            .iter()
            .filter(|d| category.map_or(true, |c| d.category == c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
