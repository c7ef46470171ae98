//! Variable Resolution API

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use hb_variables::VariableContext;

use crate::error::ApiFailure;
use crate::AppState;

/// Replace request: exactly one of executionId / variables must be set
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceRequest {
    pub text: String,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub variables: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceResponse {
    pub success: bool,
    pub data: String,
    /// Token names left verbatim, reported for UI surfacing. Omitted when
    /// resolution was complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<Vec<String>>,
}

/// POST /variables/replace - resolve placeholders in free text
#[utoipa::path(
    post,
    path = "/variables/replace",
    tag = "Variables",
    request_body = ReplaceRequest,
    responses(
        (status = 200, description = "Resolved text", body = ReplaceResponse),
        (status = 400, description = "Empty text or ambiguous variable source", body = crate::error::ApiError),
        (status = 404, description = "Unknown execution", body = crate::error::ApiError),
    ),
)]
pub async fn replace_variables(
    State(state): State<AppState>,
    Json(request): Json<ReplaceRequest>,
) -> Result<Json<ReplaceResponse>, ApiFailure> {
    if request.text.is_empty() {
        return Err(ApiFailure::Validation("text must not be empty".to_string()));
    }

    let context = match (request.execution_id, request.variables) {
        (Some(execution_id), None) => VariableContext::execution(execution_id),
        (None, Some(variables)) => VariableContext::from_json_map(&variables),
        (Some(_), Some(_)) => {
            return Err(ApiFailure::Validation(
                "supply either executionId or variables, not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(ApiFailure::Validation(
                "one of executionId or variables is required".to_string(),
            ))
        }
    };

    let resolution = state.engine.resolve_report(&request.text, &context).await?;
    Ok(Json(ReplaceResponse {
        success: true,
        data: resolution.text,
        unresolved: if resolution.unresolved.is_empty() {
            None
        } else {
            Some(resolution.unresolved)
        },
    }))
}
