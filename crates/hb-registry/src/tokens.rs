//! Tenant Token Directory
//!
//! Each tenant gets an opaque token embedded in its callback URL. Resolution
//! is a single typed lookup; callers branch on Option, never on claim names.

use dashmap::DashMap;
use hb_common::TenantId;

/// Resolve a webhook callback token to the owning tenant
pub trait TokenDirectory: Send + Sync {
    fn resolve(&self, tenant_token: &str) -> Option<TenantId>;
}

/// In-memory token directory
#[derive(Default)]
pub struct InMemoryTokenDirectory {
    tokens: DashMap<String, TenantId>,
}

impl InMemoryTokenDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tenant_token: impl Into<String>, tenant: TenantId) {
        self.tokens.insert(tenant_token.into(), tenant);
    }

    pub fn remove(&self, tenant_token: &str) {
        self.tokens.remove(tenant_token);
    }
}

impl TokenDirectory for InMemoryTokenDirectory {
    fn resolve(&self, tenant_token: &str) -> Option<TenantId> {
        self.tokens.get(tenant_token).map(|t| t.clone())
    }
}
