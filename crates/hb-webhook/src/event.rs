//! Inbound Webhook Events and their dedup identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One delivery from the messaging platform, as received.
/// Ephemeral: nothing outlives the dedup window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundWebhookEvent {
    pub tenant_token: String,
    pub external_event_id: Option<String>,
    pub received_at: DateTime<Utc>,
    pub raw_payload: serde_json::Value,
}

impl InboundWebhookEvent {
    pub fn new(tenant_token: impl Into<String>, raw_payload: serde_json::Value) -> Self {
        let external_event_id = extract_event_id(&raw_payload);
        Self {
            tenant_token: tenant_token.into(),
            external_event_id,
            received_at: Utc::now(),
            raw_payload,
        }
    }

    pub fn identity(&self) -> EventIdentity {
        EventIdentity::of(
            &self.tenant_token,
            self.external_event_id.as_deref(),
            &self.raw_payload,
        )
    }
}

/// The provider puts its message id at `entry[].changes[].value.messages[].id`;
/// status callbacks carry `entry[].changes[].value.statuses[].id` instead.
fn extract_event_id(payload: &serde_json::Value) -> Option<String> {
    let value = payload
        .get("entry")?
        .get(0)?
        .get("changes")?
        .get(0)?
        .get("value")?;

    for list in ["messages", "statuses"] {
        if let Some(id) = value
            .get(list)
            .and_then(|l| l.get(0))
            .and_then(|m| m.get("id"))
            .and_then(|id| id.as_str())
        {
            return Some(id.to_string());
        }
    }
    None
}

/// Identity under which redeliveries of the same event are recognized.
///
/// When the provider assigned an event id, identity is (token, id). Without
/// one, the payload content hash stands in, so byte-identical redeliveries
/// still collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventIdentity {
    tenant_token: String,
    discriminant: Discriminant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Discriminant {
    External(String),
    PayloadHash(String),
}

impl EventIdentity {
    pub fn of(tenant_token: &str, external_event_id: Option<&str>, payload: &serde_json::Value) -> Self {
        let discriminant = match external_event_id {
            Some(id) => Discriminant::External(id.to_string()),
            None => Discriminant::PayloadHash(payload_hash(payload)),
        };
        Self {
            tenant_token: tenant_token.to_string(),
            discriminant,
        }
    }

    pub fn tenant_token(&self) -> &str {
        &self.tenant_token
    }
}

impl std::fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.discriminant {
            Discriminant::External(id) => write!(f, "{}/ext:{}", self.tenant_token, id),
            Discriminant::PayloadHash(hash) => write!(f, "{}/sha:{}", self.tenant_token, hash),
        }
    }
}

fn payload_hash(payload: &serde_json::Value) -> String {
    // serde_json serializes maps in insertion order; hashing the compact
    // form is stable for a given delivery's bytes, which is what redelivery
    // gives us again.
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    hex::encode(digest)
}
