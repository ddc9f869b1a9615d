// rest/routes/events.rs — Calendar event routes.
//
// The optional start/end query bounds apply to startTime only (inclusive on
// both ends). Recurrence strings are stored opaque; nothing expands them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::error::{internal, not_found, ApiError};
use crate::storage::{CreateEventParams, EventListParams, EventWithAgent, UpdateEventParams};
use crate::AppContext;

pub async fn list_events(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<EventListParams>,
) -> Result<Json<Vec<EventWithAgent>>, ApiError> {
    let events = ctx
        .storage
        .list_events(&params)
        .await
        .map_err(|e| internal("fetch events", e))?;
    Ok(Json(events))
}

pub async fn create_event(
    State(ctx): State<Arc<AppContext>>,
    body: String,
) -> Result<(StatusCode, Json<EventWithAgent>), ApiError> {
    let params: CreateEventParams =
        serde_json::from_str(&body).map_err(|e| internal("create event", e.into()))?;
    let event = ctx
        .storage
        .create_event(params)
        .await
        .map_err(|e| internal("create event", e))?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<EventWithAgent>, ApiError> {
    let params: UpdateEventParams =
        serde_json::from_str(&body).map_err(|e| internal("update event", e.into()))?;
    match ctx.storage.update_event(&id, params).await {
        Ok(Some(event)) => Ok(Json(event)),
        Ok(None) => Err(not_found("Event")),
        Err(e) => Err(internal("update event", e)),
    }
}

pub async fn delete_event(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match ctx.storage.delete_event(&id).await {
        Ok(true) => Ok(Json(json!({ "success": true }))),
        Ok(false) => Err(not_found("Event")),
        Err(e) => Err(internal("delete event", e)),
    }
}
