// rest/routes/messages.rs — Inter-agent message feed routes.
//
// Messages are append-only. A message with toLabel "all" is a broadcast;
// feed consumers treat it as visible to everyone.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::rest::error::{internal, ApiError};
use crate::storage::{CreateMessageParams, MessageListParams, MessageWithAgents};
use crate::AppContext;

pub async fn list_messages(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<MessageListParams>,
) -> Result<Json<Vec<MessageWithAgents>>, ApiError> {
    let messages = ctx
        .storage
        .list_messages(&params)
        .await
        .map_err(|e| internal("fetch messages", e))?;
    Ok(Json(messages))
}

pub async fn create_message(
    State(ctx): State<Arc<AppContext>>,
    body: String,
) -> Result<(StatusCode, Json<MessageWithAgents>), ApiError> {
    let params: CreateMessageParams =
        serde_json::from_str(&body).map_err(|e| internal("create message", e.into()))?;
    let message = ctx
        .storage
        .create_message(params)
        .await
        .map_err(|e| internal("create message", e))?;
    Ok((StatusCode::CREATED, Json(message)))
}
