// rest/routes/tasks.rs — Task board routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::error::{internal, not_found, ApiError};
use crate::storage::{CreateTaskParams, TaskListParams, TaskWithAgent, UpdateTaskParams};
use crate::AppContext;

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<TaskListParams>,
) -> Result<Json<Vec<TaskWithAgent>>, ApiError> {
    let tasks = ctx
        .storage
        .list_tasks(&params)
        .await
        .map_err(|e| internal("fetch tasks", e))?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    body: String,
) -> Result<(StatusCode, Json<TaskWithAgent>), ApiError> {
    let params: CreateTaskParams =
        serde_json::from_str(&body).map_err(|e| internal("create task", e.into()))?;
    let task = ctx
        .storage
        .create_task(params)
        .await
        .map_err(|e| internal("create task", e))?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<TaskWithAgent>, ApiError> {
    let params: UpdateTaskParams =
        serde_json::from_str(&body).map_err(|e| internal("update task", e.into()))?;
    match ctx.storage.update_task(&id, params).await {
        Ok(Some(task)) => Ok(Json(task)),
        Ok(None) => Err(not_found("Task")),
        Err(e) => Err(internal("update task", e)),
    }
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match ctx.storage.delete_task(&id).await {
        Ok(true) => Ok(Json(json!({ "success": true }))),
        Ok(false) => Err(not_found("Task")),
        Err(e) => Err(internal("delete task", e)),
    }
}
