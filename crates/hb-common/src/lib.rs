use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Tenant Identity
// ============================================================================

/// Opaque tenant identifier, scoped by the upstream auth layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Variable Values
// ============================================================================

/// Scalar value a template token can resolve to.
///
/// Rendering is canonical per type so that resolving the same context twice
/// produces byte-identical output: numbers without locale grouping, booleans
/// as lowercase literals, timestamps as RFC 3339 UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Timestamp(DateTime<Utc>),
}

impl VariableValue {
    /// Render the canonical textual form used during substitution
    pub fn render(&self) -> String {
        match self {
            VariableValue::Text(s) => s.clone(),
            VariableValue::Number(n) => render_number(*n),
            VariableValue::Flag(b) => if *b { "true" } else { "false" }.to_string(),
            VariableValue::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Convert a JSON scalar into a variable value. Arrays, objects and null
    /// are not substitutable and yield None.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(VariableValue::Text(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(VariableValue::Number),
            serde_json::Value::Bool(b) => Some(VariableValue::Flag(*b)),
            _ => None,
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::Text(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::Text(s)
    }
}

impl From<f64> for VariableValue {
    fn from(n: f64) -> Self {
        VariableValue::Number(n)
    }
}

impl From<bool> for VariableValue {
    fn from(b: bool) -> Self {
        VariableValue::Flag(b)
    }
}

impl From<DateTime<Utc>> for VariableValue {
    fn from(ts: DateTime<Utc>) -> Self {
        VariableValue::Timestamp(ts)
    }
}

/// Integral values render without a fractional part, everything else uses
/// the shortest round-trippable form. Never grouped.
fn render_number(n: f64) -> String {
    const SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ============================================================================
// Webhook Processing Outcomes
// ============================================================================

/// Terminal state of the webhook processing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ProcessingState {
    Accepted,
    Rejected,
    Duplicate,
}

/// Result of processing one inbound webhook delivery.
///
/// `success` is what the HTTP boundary reports in the response body; the
/// transport status is always 200 regardless (see the webhook API).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessingResult {
    pub state: ProcessingState,
    pub success: bool,
    pub detail: Option<String>,
}

impl ProcessingResult {
    pub fn accepted() -> Self {
        Self {
            state: ProcessingState::Accepted,
            success: true,
            detail: None,
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            state: ProcessingState::Rejected,
            success: false,
            detail: Some(detail.into()),
        }
    }

    pub fn duplicate(prior_success: bool, detail: impl Into<String>) -> Self {
        Self {
            state: ProcessingState::Duplicate,
            success: prior_success,
            detail: Some(detail.into()),
        }
    }
}
