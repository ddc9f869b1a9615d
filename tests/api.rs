//! End-to-end tests for the REST API.
//! Boots the real server on an ephemeral port with a TempDir data dir and
//! drives every endpoint over HTTP.

use missiond::{config::DaemonConfig, rest, seed, storage::Storage, AppContext};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// Start the daemon on an OS-assigned port; returns the API base URL and the
/// context (for direct storage access in assertions/setup).
async fn spawn_server(dir: &TempDir) -> (String, Arc<AppContext>) {
    let data_dir = dir.path().to_path_buf();
    let config = Arc::new(DaemonConfig::new(
        None,
        Some(data_dir.clone()),
        Some("error".to_string()),
        None,
    ));
    let storage = Arc::new(Storage::new(&data_dir).await.unwrap());
    let ctx = Arc::new(AppContext {
        config,
        storage,
        started_at: std::time::Instant::now(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx_clone = ctx.clone();
    tokio::spawn(async move {
        let _ = rest::serve(listener, ctx_clone).await;
    });

    (format!("http://{addr}/api/v1"), ctx)
}

#[tokio::test]
async fn test_health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let (base, _ctx) = spawn_server(&dir).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_create_task_returns_201_with_defaults() {
    let dir = TempDir::new().unwrap();
    let (base, _ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/tasks"))
        .json(&json!({ "title": "Write report" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["title"], "Write report");
    assert_eq!(body["status"], "backlog");
    assert_eq!(body["priority"], "medium");
    assert_eq!(body["description"], "");
    assert_eq!(body["assignedTo"], Value::Null);
    assert_eq!(body["dueDate"], Value::Null);
    assert_eq!(body["agent"], Value::Null);
    assert!(body["id"].is_string());
}

#[tokio::test]
async fn test_create_task_without_title_is_internal_fault() {
    let dir = TempDir::new().unwrap();
    let (base, _ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/tasks"))
        .json(&json!({ "description": "no title here" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Failed to create task");

    // Malformed JSON is the same class of fault, not a framework 400.
    let resp = client
        .post(format!("{base}/tasks"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn test_update_task_partial_and_not_found() {
    let dir = TempDir::new().unwrap();
    let (base, _ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/tasks"))
        .json(&json!({
            "title": "Ship v1",
            "priority": "high",
            "dueDate": "2026-09-01"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // Move it on the board: only status changes.
    let resp = client
        .patch(format!("{base}/tasks/{id}"))
        .json(&json!({ "status": "in_progress" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["title"], "Ship v1");
    assert_eq!(body["priority"], "high");
    assert!(body["dueDate"].is_string());

    // Empty dueDate clears to null.
    let body: Value = client
        .patch(format!("{base}/tasks/{id}"))
        .json(&json!({ "dueDate": "" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["dueDate"], Value::Null);

    // Unknown id is NotFound, not a crash.
    let resp = client
        .patch(format!("{base}/tasks/no-such-id"))
        .json(&json!({ "status": "done" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Task not found");
}

#[tokio::test]
async fn test_delete_task_then_404_on_second_delete() {
    let dir = TempDir::new().unwrap();
    let (base, _ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/tasks"))
        .json(&json!({ "title": "short-lived" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let resp = client
        .delete(format!("{base}/tasks/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let resp = client
        .delete(format!("{base}/tasks/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_list_tasks_status_filter() {
    let dir = TempDir::new().unwrap();
    let (base, _ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    for (title, status) in [("a", "backlog"), ("b", "done"), ("c", "backlog")] {
        client
            .post(format!("{base}/tasks"))
            .json(&json!({ "title": title, "status": status }))
            .send()
            .await
            .unwrap();
    }

    let body: Value = reqwest::get(format!("{base}/tasks?status=backlog"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tasks = body.as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t["status"] == "backlog"));

    let body: Value = reqwest::get(format!("{base}/tasks"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_events_range_filter_and_clear_recurrence() {
    let dir = TempDir::new().unwrap();
    let (base, _ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for (title, day) in [("early", 1), ("mid", 10), ("late", 20)] {
        let resp = client
            .post(format!("{base}/events"))
            .json(&json!({
                "title": title,
                "startTime": format!("2026-06-{day:02}T10:00:00Z"),
                "endTime": format!("2026-06-{day:02}T11:00:00Z"),
                "recurrence": "0 10 * * *"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let body: Value = reqwest::get(format!(
        "{base}/events?start=2026-06-05T00:00:00Z&end=2026-06-15T00:00:00Z"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "mid");

    // PATCH {recurrence: ""} → stored recurrence becomes null.
    let body: Value = client
        .patch(format!("{base}/events/{}", ids[0]))
        .json(&json!({ "recurrence": "" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["recurrence"], Value::Null);
    assert_eq!(body["title"], "early");

    let resp = client
        .delete(format!("{base}/events/no-such-id"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Event not found");
}

#[tokio::test]
async fn test_message_broadcast_defaults_and_pagination() {
    let dir = TempDir::new().unwrap();
    let (base, _ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/messages"))
        .json(&json!({ "content": "hello everyone" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["fromLabel"], "system");
    assert_eq!(body["toLabel"], "all");
    assert_eq!(body["fromAgentId"], Value::Null);
    assert_eq!(body["toAgentId"], Value::Null);

    for i in 0..4 {
        client
            .post(format!("{base}/messages"))
            .json(&json!({ "content": format!("update {i}") }))
            .send()
            .await
            .unwrap();
    }

    // Newest first; skip most recent, take two.
    let body: Value = reqwest::get(format!("{base}/messages?take=2&skip=1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "update 2");
    assert_eq!(messages[1]["content"], "update 1");
}

#[tokio::test]
async fn test_agent_endpoints_with_seeded_fleet() {
    let dir = TempDir::new().unwrap();
    let (base, ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();
    seed::run(&ctx.storage).await.unwrap();

    let body: Value = reqwest::get(format!("{base}/agents"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let agents = body.as_array().unwrap();
    assert_eq!(agents.len(), 5);
    let cody = agents.iter().find(|a| a["name"] == "Cody").unwrap();
    assert_eq!(
        cody["currentTask"]["title"],
        "Build Mission Control Dashboard"
    );
    let cody_id = cody["id"].as_str().unwrap().to_string();

    // Read one: assigned tasks + sent messages embedded.
    let body: Value = reqwest::get(format!("{base}/agents/{cody_id}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["name"], "Cody");
    assert_eq!(body["assignedTasks"].as_array().unwrap().len(), 2);
    assert_eq!(body["sentMessages"].as_array().unwrap().len(), 1);

    // Partial update: status only; currentTask stays embedded.
    let resp = client
        .patch(format!("{base}/agents/{cody_id}"))
        .json(&json!({ "status": "offline" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "offline");
    assert_eq!(
        body["currentTask"]["title"],
        "Build Mission Control Dashboard"
    );

    let resp = reqwest::get(format!("{base}/agents/no-such-id")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Agent not found");
}

#[tokio::test]
async fn test_task_embeds_assigned_agent() {
    let dir = TempDir::new().unwrap();
    let (base, ctx) = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let zora = ctx
        .storage
        .upsert_agent("Zora", "Chief of Staff", "👑", "active", "2026-01-01T00:00:00.000000Z")
        .await
        .unwrap();

    let resp = client
        .post(format!("{base}/tasks"))
        .json(&json!({ "title": "Plan the week", "assignedTo": zora.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["agent"]["name"], "Zora");
    assert_eq!(body["agent"]["emoji"], "👑");

    let body: Value = reqwest::get(format!("{base}/tasks?assignedTo={}", zora.id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
}
