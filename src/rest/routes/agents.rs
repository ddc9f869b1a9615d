// rest/routes/agents.rs — Agent roster routes.
//
// Agents are created by the seed process and never deleted through the API;
// only list, read-one, and partial status/task/activity updates exist here.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::rest::error::{internal, not_found, ApiError};
use crate::storage::{AgentDetail, AgentWithTask, UpdateAgentParams};
use crate::AppContext;

pub async fn list_agents(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<AgentWithTask>>, ApiError> {
    let agents = ctx
        .storage
        .list_agents()
        .await
        .map_err(|e| internal("fetch agents", e))?;
    Ok(Json(agents))
}

pub async fn get_agent(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<AgentDetail>, ApiError> {
    match ctx.storage.get_agent_detail(&id).await {
        Ok(Some(agent)) => Ok(Json(agent)),
        Ok(None) => Err(not_found("Agent")),
        Err(e) => Err(internal("fetch agent", e)),
    }
}

pub async fn update_agent(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<AgentWithTask>, ApiError> {
    // Parsed in-handler so malformed bodies surface as Internal, not a
    // framework-level rejection. Unrecognized fields are ignored.
    let params: UpdateAgentParams =
        serde_json::from_str(&body).map_err(|e| internal("update agent", e.into()))?;
    match ctx.storage.update_agent(&id, params).await {
        Ok(Some(agent)) => Ok(Json(agent)),
        Ok(None) => Err(not_found("Agent")),
        Err(e) => Err(internal("update agent", e)),
    }
}
