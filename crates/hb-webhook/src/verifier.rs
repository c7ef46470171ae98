//! Webhook Verification
//!
//! Covers both legs of the provider's webhook protocol: the GET handshake
//! (verify_token must match the tenant's configured secret) and the POST
//! payload signature (X-Hub-Signature-256, HMAC-SHA256 over the raw body).
//!
//! Every resolution failure verifies as false. Nothing here returns an
//! error to the caller: an attacker probing unknown tokens gets the same
//! answer as a misconfigured tenant.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use hb_registry::{ProviderRegistry, TokenDirectory, MESSAGING_PROVIDER_KEY};

const VERIFY_TOKEN_FIELD: &str = "verify_token";
const APP_SECRET_FIELD: &str = "app_secret";
const SUBSCRIBE_MODE: &str = "subscribe";

pub struct WebhookVerifier {
    registry: Arc<ProviderRegistry>,
    tokens: Arc<dyn TokenDirectory>,
}

impl WebhookVerifier {
    pub fn new(registry: Arc<ProviderRegistry>, tokens: Arc<dyn TokenDirectory>) -> Self {
        Self { registry, tokens }
    }

    /// Handshake verification. True only when the mode is "subscribe", a
    /// challenge to echo is present, and the presented verify_token matches
    /// the tenant's configured secret byte for byte. Pure read of current
    /// configuration.
    pub async fn verify(&self, tenant_token: &str, mode: &str, challenge: &str, verify_token: &str) -> bool {
        if mode != SUBSCRIBE_MODE {
            debug!(tenant_token, mode, "handshake with non-subscribe mode");
            return false;
        }
        if challenge.is_empty() {
            return false;
        }

        let Some(secret) = self.configured_secret(tenant_token, VERIFY_TOKEN_FIELD).await else {
            return false;
        };

        bool::from(verify_token.as_bytes().ct_eq(secret.as_bytes()))
    }

    /// Payload signature verification for the POST leg. Header format is
    /// `sha256=<hex hmac>`. Tenants without an app_secret configured skip
    /// signature checks (the field is optional in the catalog).
    pub async fn verify_signature(&self, tenant_token: &str, body: &[u8], signature_header: &str) -> bool {
        let Some(secret) = self.configured_secret(tenant_token, APP_SECRET_FIELD).await else {
            return false;
        };

        let Some(hex_sig) = signature_header.strip_prefix("sha256=") else {
            return false;
        };
        let Ok(expected) = hex::decode(hex_sig) else {
            return false;
        };

        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }

    /// Whether the tenant requires signed payloads at all
    pub async fn requires_signature(&self, tenant_token: &str) -> bool {
        self.configured_secret(tenant_token, APP_SECRET_FIELD)
            .await
            .is_some()
    }

    /// Resolve token -> tenant -> enabled messaging setting -> field value.
    /// Any gap in the chain is a None, never an error.
    async fn configured_secret(&self, tenant_token: &str, field: &str) -> Option<String> {
        let tenant = self.tokens.resolve(tenant_token)?;

        let setting = match self
            .registry
            .get_tenant_setting(&tenant, MESSAGING_PROVIDER_KEY)
            .await
        {
            Ok(setting) => setting,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "no messaging setting for webhook tenant");
                return None;
            }
        };

        if !setting.enabled {
            debug!(tenant = %tenant, "messaging provider disabled");
            return None;
        }

        setting.value(field).map(str::to_string)
    }
}
