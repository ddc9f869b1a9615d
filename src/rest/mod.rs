// rest/mod.rs — Public REST API server.
//
// Axum HTTP server for the Mission Control dashboard. CORS is permissive so
// the separately-hosted UI can poll from any origin.
//
// Endpoints:
//   GET    /api/v1/health
//   GET    /api/v1/agents
//   GET    /api/v1/agents/{id}
//   PATCH  /api/v1/agents/{id}
//   GET    /api/v1/tasks
//   POST   /api/v1/tasks
//   PATCH  /api/v1/tasks/{id}
//   DELETE /api/v1/tasks/{id}
//   GET    /api/v1/events
//   POST   /api/v1/events
//   PATCH  /api/v1/events/{id}
//   DELETE /api/v1/events/{id}
//   GET    /api/v1/messages
//   POST   /api/v1/messages

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, patch},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("REST API listening on http://{}", addr);
    serve(listener, ctx).await
}

/// Serve on an already-bound listener (tests bind port 0 themselves).
pub async fn serve(listener: tokio::net::TcpListener, ctx: Arc<AppContext>) -> Result<()> {
    axum::serve(listener, build_router(ctx)).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        // Agents (created by seed, never deleted via the API)
        .route("/api/v1/agents", get(routes::agents::list_agents))
        .route(
            "/api/v1/agents/{id}",
            get(routes::agents::get_agent).patch(routes::agents::update_agent),
        )
        // Tasks
        .route(
            "/api/v1/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/v1/tasks/{id}",
            patch(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        // Calendar events
        .route(
            "/api/v1/events",
            get(routes::events::list_events).post(routes::events::create_event),
        )
        .route(
            "/api/v1/events/{id}",
            patch(routes::events::update_event).delete(routes::events::delete_event),
        )
        // Message feed (create-only)
        .route(
            "/api/v1/messages",
            get(routes::messages::list_messages).post(routes::messages::create_message),
        )
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
