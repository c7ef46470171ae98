//! API Error Mapping
//!
//! Domain errors carry explicit kinds; this module is the only place that
//! turns kinds into HTTP statuses. The webhook POST path never goes through
//! here: its failures are absorbed into a 200 body by design.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use hb_registry::RegistryError;
use hb_variables::VariableError;

/// Standard API error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Failure surface of the configuration and variable APIs
#[derive(Debug)]
pub enum ApiFailure {
    Validation(String),
    NotFound(String),
    Unauthorized(String),
    Internal(String),
}

impl ApiFailure {
    fn status(&self) -> StatusCode {
        match self {
            ApiFailure::Validation(_) => StatusCode::BAD_REQUEST,
            ApiFailure::NotFound(_) => StatusCode::NOT_FOUND,
            ApiFailure::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiFailure::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiFailure::Validation(_) => "VALIDATION_ERROR",
            ApiFailure::NotFound(_) => "NOT_FOUND",
            ApiFailure::Unauthorized(_) => "UNAUTHORIZED",
            ApiFailure::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiFailure::Validation(m)
            | ApiFailure::NotFound(m)
            | ApiFailure::Unauthorized(m)
            | ApiFailure::Internal(m) => m.clone(),
        };
        let body = ApiError::new(self.code(), message);
        (self.status(), Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiFailure {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownProvider { .. } | RegistryError::NotFound { .. } => {
                ApiFailure::NotFound(e.to_string())
            }
            RegistryError::MissingField { .. } => ApiFailure::Validation(e.to_string()),
            RegistryError::Internal { .. } => ApiFailure::Internal(e.to_string()),
        }
    }
}

impl From<VariableError> for ApiFailure {
    fn from(e: VariableError) -> Self {
        match e {
            VariableError::EmptyTemplate => ApiFailure::Validation(e.to_string()),
            VariableError::UnknownExecution { .. } => ApiFailure::NotFound(e.to_string()),
        }
    }
}
