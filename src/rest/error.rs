// rest/error.rs — the two-valued REST fault taxonomy.
//
// NotFound: an id-addressed resource is absent on read-one/update/delete.
// Internal: everything else. The detail is logged server-side and the
// caller gets only a generic message.

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::error;

/// Error half of every handler result: HTTP status + `{"error": ...}` body.
pub type ApiError = (StatusCode, Json<Value>);

pub fn not_found(what: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{what} not found") })),
    )
}

pub fn internal(action: &str, err: anyhow::Error) -> ApiError {
    error!(err = %err, "failed to {action}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("Failed to {action}") })),
    )
}
