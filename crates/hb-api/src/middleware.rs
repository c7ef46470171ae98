//! API Middleware
//!
//! Tenant identity extraction for the tenant-scoped configuration APIs.
//! Authentication itself happens upstream; by the time a request reaches
//! us the gateway has validated credentials and stamped the tenant header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Response;

use hb_common::TenantId;

use crate::error::ApiFailure;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// The single place a request's tenant is resolved. Handlers take
/// `CurrentTenant` and never look at headers or claims themselves.
pub struct CurrentTenant(pub TenantId);

fn resolve_tenant(parts: &Parts) -> Option<TenantId> {
    parts
        .headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(TenantId::from)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match resolve_tenant(parts) {
            Some(tenant) => Ok(CurrentTenant(tenant)),
            None => Err(axum::response::IntoResponse::into_response(
                ApiFailure::Unauthorized("Missing tenant identity".to_string()),
            )),
        }
    }
}
