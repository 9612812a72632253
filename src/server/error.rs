use crate::utils::error::ScaffoldError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Error body: `{"error": "...", "details": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Scaffold(ScaffoldError),
    BadRequest(String),
    NotFound,
}

impl From<ScaffoldError> for ApiError {
    fn from(err: ScaffoldError) -> Self {
        ApiError::Scaffold(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn details(err: &ScaffoldError) -> Option<Value> {
    match err {
        ScaffoldError::Validation { issues } => Some(json!(issues)),
        ScaffoldError::UnsupportedServiceType {
            offenders,
            supported,
        } => Some(json!({ "offenders": offenders, "supported": supported })),
        ScaffoldError::WiringConflict { node_id, keys } => {
            Some(json!({ "nodeId": node_id, "keys": keys }))
        }
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Scaffold(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if err.is_client_safe() {
                    tracing::info!("Generation rejected ({}): {}", status, err);
                } else {
                    tracing::error!(
                        "Generation failed: {} (Category: {:?}, Severity: {:?})",
                        err,
                        err.category(),
                        err.severity()
                    );
                }
                let mut body = json!({ "error": err.user_friendly_message() });
                if let Some(details) = details(&err) {
                    body["details"] = details;
                }
                (status, body)
            }
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Route not found" })),
        };
        (status, Json(body)).into_response()
    }
}
