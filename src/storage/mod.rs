use anyhow::{anyhow, Context as _, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::collections::HashMap;
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

/// Current time as fixed-width RFC 3339 UTC (microsecond precision).
///
/// Fixed width keeps lexicographic ordering of the TEXT columns identical to
/// chronological ordering, which the ORDER BY / range queries rely on.
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Normalize a client-supplied timestamp to the stored RFC 3339 UTC form.
///
/// Accepts RFC 3339 (any offset), a naive datetime (assumed UTC), or a bare
/// date (midnight UTC). Anything else is an error, which the REST layer
/// surfaces as an Internal fault.
fn parse_timestamp(value: &str) -> Result<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Micros, true));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc
            .from_utc_datetime(&naive)
            .to_rfc3339_opts(SecondsFormat::Micros, true));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Utc
            .from_utc_datetime(&date.and_time(chrono::NaiveTime::default()))
            .to_rfc3339_opts(SecondsFormat::Micros, true));
    }
    Err(anyhow!("unrecognized timestamp: {value}"))
}

/// Deserialize helper distinguishing an absent field from an explicit null.
///
/// `None` = field absent (leave unchanged), `Some(None)` = explicit null,
/// `Some(Some(v))` = explicit value. Pair with `#[serde(default)]`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

// ─── Row types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRow {
    pub id: String,
    pub name: String,
    pub role: String,
    pub emoji: String,
    pub status: String,
    pub last_activity_at: String,
    pub current_task_id: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<String>,
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    /// Cron-like recurrence string. Stored opaque, never evaluated.
    pub recurrence: Option<String>,
    pub assigned_agent_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub id: String,
    pub content: String,
    pub from_agent_id: Option<String>,
    pub to_agent_id: Option<String>,
    pub from_label: String,
    /// "all" marks a broadcast visible to every viewer.
    pub to_label: String,
    pub created_at: String,
}

// ─── Response shapes (embedded relations) ────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentWithTask {
    #[serde(flatten)]
    pub agent: AgentRow,
    pub current_task: Option<TaskRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDetail {
    #[serde(flatten)]
    pub agent: AgentRow,
    pub assigned_tasks: Vec<TaskRow>,
    pub sent_messages: Vec<MessageRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithAgent {
    #[serde(flatten)]
    pub task: TaskRow,
    pub agent: Option<AgentRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWithAgent {
    #[serde(flatten)]
    pub event: EventRow,
    pub assigned_agent: Option<AgentRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithAgents {
    #[serde(flatten)]
    pub message: MessageRow,
    pub from_agent: Option<AgentRow>,
    pub to_agent: Option<AgentRow>,
}

// ─── Query / body params ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListParams {
    pub from_agent_id: Option<String>,
    pub to_agent_id: Option<String>,
    pub take: Option<String>,
    pub skip: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskParams {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<String>>,
    /// Explicit null or empty string clears the due date.
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventParams {
    pub title: String,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub recurrence: Option<String>,
    pub assigned_agent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Explicit null or empty string clears the field.
    #[serde(default, deserialize_with = "double_option")]
    pub recurrence: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_agent_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageParams {
    pub content: String,
    pub from_agent_id: Option<String>,
    pub to_agent_id: Option<String>,
    pub from_label: Option<String>,
    pub to_label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentParams {
    pub status: Option<String>,
    /// Explicit null detaches the agent from its current task.
    #[serde(default, deserialize_with = "double_option")]
    pub current_task_id: Option<Option<String>>,
    pub last_activity_at: Option<String>,
}

// ─── Storage ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("missiond.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Wrap an existing pool (tests use `:memory:`); call `migrate` before use.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent schema creation.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                emoji TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'idle',
                last_activity_at TEXT NOT NULL,
                current_task_id TEXT
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'backlog',
                priority TEXT NOT NULL DEFAULT 'medium',
                assigned_to TEXT,
                due_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_assigned_to ON tasks(assigned_to);

            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                recurrence TEXT,
                assigned_agent_id TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_start_time ON events(start_time);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                from_agent_id TEXT,
                to_agent_id TEXT,
                from_label TEXT NOT NULL DEFAULT 'system',
                to_label TEXT NOT NULL DEFAULT 'all',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_from ON messages(from_agent_id);
            CREATE INDEX IF NOT EXISTS idx_messages_to ON messages(to_agent_id);
            CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);
            ",
        )
        .execute(&self.pool)
        .await
        .context("Creating dashboard tables")?;
        Ok(())
    }

    /// Cheap liveness probe for the health endpoint.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Point-lookup an agent, memoizing misses as well as hits so a list
    /// embed never queries the same id twice.
    async fn cached_agent(
        &self,
        cache: &mut HashMap<String, Option<AgentRow>>,
        id: &str,
    ) -> Result<Option<AgentRow>> {
        if let Some(hit) = cache.get(id) {
            return Ok(hit.clone());
        }
        let fetched = self.get_agent(id).await?;
        cache.insert(id.to_string(), fetched.clone());
        Ok(fetched)
    }

    // ─── Agents ───────────────────────────────────────────────────────────────

    pub async fn get_agent(&self, id: &str) -> Result<Option<AgentRow>> {
        Ok(sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_agent_by_name(&self, name: &str) -> Result<Option<AgentRow>> {
        Ok(sqlx::query_as("SELECT * FROM agents WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// All agents with their current task embedded. A dangling
    /// `current_task_id` (task deleted out from under the agent) embeds as
    /// `None` rather than failing.
    pub async fn list_agents(&self) -> Result<Vec<AgentWithTask>> {
        let rows: Vec<AgentRow> = with_timeout(async {
            Ok(sqlx::query_as("SELECT * FROM agents ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?)
        })
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for agent in rows {
            let current_task = match agent.current_task_id.as_deref() {
                Some(task_id) => self.get_task(task_id).await?,
                None => None,
            };
            out.push(AgentWithTask {
                agent,
                current_task,
            });
        }
        Ok(out)
    }

    /// One agent with its assigned tasks and sent messages, newest first.
    pub async fn get_agent_detail(&self, id: &str) -> Result<Option<AgentDetail>> {
        let Some(agent) = self.get_agent(id).await? else {
            return Ok(None);
        };
        let assigned_tasks = sqlx::query_as(
            "SELECT * FROM tasks WHERE assigned_to = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let sent_messages = sqlx::query_as(
            "SELECT * FROM messages WHERE from_agent_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(AgentDetail {
            agent,
            assigned_tasks,
            sent_messages,
        }))
    }

    /// Partial update over status / current task / last activity.
    /// Returns `None` when the agent does not exist.
    pub async fn update_agent(
        &self,
        id: &str,
        params: UpdateAgentParams,
    ) -> Result<Option<AgentWithTask>> {
        let Some(mut row) = self.get_agent(id).await? else {
            return Ok(None);
        };

        if let Some(status) = params.status {
            row.status = status;
        }
        if let Some(task_id) = params.current_task_id {
            row.current_task_id = task_id;
        }
        if let Some(ts) = params.last_activity_at {
            row.last_activity_at = parse_timestamp(&ts)?;
        }

        sqlx::query(
            "UPDATE agents SET status = ?, current_task_id = ?, last_activity_at = ? WHERE id = ?",
        )
        .bind(&row.status)
        .bind(&row.current_task_id)
        .bind(&row.last_activity_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let current_task = match row.current_task_id.as_deref() {
            Some(task_id) => self.get_task(task_id).await?,
            None => None,
        };
        Ok(Some(AgentWithTask {
            agent: row,
            current_task,
        }))
    }

    /// Insert an agent unless one with the same name already exists.
    /// Used by the seed process only; the API never creates agents.
    pub async fn upsert_agent(
        &self,
        name: &str,
        role: &str,
        emoji: &str,
        status: &str,
        last_activity_at: &str,
    ) -> Result<AgentRow> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO agents (id, name, role, emoji, status, last_activity_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(&id)
        .bind(name)
        .bind(role)
        .bind(emoji)
        .bind(status)
        .bind(last_activity_at)
        .execute(&self.pool)
        .await?;
        self.get_agent_by_name(name)
            .await?
            .ok_or_else(|| anyhow!("agent not found after upsert"))
    }

    // ─── Tasks ────────────────────────────────────────────────────────────────

    pub async fn get_task(&self, id: &str) -> Result<Option<TaskRow>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Newest-first task list with optional exact-match filters (ANDed).
    pub async fn list_tasks(&self, params: &TaskListParams) -> Result<Vec<TaskWithAgent>> {
        let mut rows: Vec<TaskRow> = with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC, id DESC")
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await?;

        // Post-filter in memory (the filters are optional and combinable).
        if let Some(ref status) = params.status {
            rows.retain(|r| &r.status == status);
        }
        if let Some(ref priority) = params.priority {
            rows.retain(|r| &r.priority == priority);
        }
        if let Some(ref assignee) = params.assigned_to {
            rows.retain(|r| r.assigned_to.as_deref() == Some(assignee.as_str()));
        }

        let mut cache = HashMap::new();
        let mut out = Vec::with_capacity(rows.len());
        for task in rows {
            let agent = match task.assigned_to.as_deref() {
                Some(agent_id) => self.cached_agent(&mut cache, agent_id).await?,
                None => None,
            };
            out.push(TaskWithAgent { task, agent });
        }
        Ok(out)
    }

    pub async fn create_task(&self, params: CreateTaskParams) -> Result<TaskWithAgent> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let due_date = match params.due_date {
            Some(ref v) if !v.is_empty() => Some(parse_timestamp(v)?),
            _ => None,
        };
        sqlx::query(
            "INSERT INTO tasks (id, title, description, status, priority, assigned_to, due_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&params.title)
        .bind(params.description.unwrap_or_default())
        .bind(params.status.unwrap_or_else(|| "backlog".to_string()))
        .bind(params.priority.unwrap_or_else(|| "medium".to_string()))
        .bind(&params.assigned_to)
        .bind(&due_date)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let task = self
            .get_task(&id)
            .await?
            .ok_or_else(|| anyhow!("task not found after insert"))?;
        let agent = match task.assigned_to.as_deref() {
            Some(agent_id) => self.get_agent(agent_id).await?,
            None => None,
        };
        Ok(TaskWithAgent { task, agent })
    }

    /// Read-modify-write partial update; the whole accepted field set lands
    /// in one UPDATE. Returns `None` when the task does not exist.
    pub async fn update_task(
        &self,
        id: &str,
        params: UpdateTaskParams,
    ) -> Result<Option<TaskWithAgent>> {
        let Some(mut row) = self.get_task(id).await? else {
            return Ok(None);
        };

        if let Some(title) = params.title {
            row.title = title;
        }
        if let Some(description) = params.description {
            row.description = description;
        }
        if let Some(status) = params.status {
            row.status = status;
        }
        if let Some(priority) = params.priority {
            row.priority = priority;
        }
        if let Some(assignee) = params.assigned_to {
            row.assigned_to = assignee;
        }
        if let Some(due) = params.due_date {
            row.due_date = match due {
                Some(ref v) if !v.is_empty() => Some(parse_timestamp(v)?),
                _ => None,
            };
        }
        row.updated_at = now_rfc3339();

        sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?,
             assigned_to = ?, due_date = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.status)
        .bind(&row.priority)
        .bind(&row.assigned_to)
        .bind(&row.due_date)
        .bind(&row.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let agent = match row.assigned_to.as_deref() {
            Some(agent_id) => self.get_agent(agent_id).await?,
            None => None,
        };
        Ok(Some(TaskWithAgent { task: row, agent }))
    }

    /// Returns `false` when no row matched the id.
    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    pub async fn count_tasks(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }

    // ─── Events ───────────────────────────────────────────────────────────────

    pub async fn get_event(&self, id: &str) -> Result<Option<EventRow>> {
        Ok(sqlx::query_as("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Events ordered by start time, optionally bounded to
    /// `start <= start_time <= end` (either bound alone works too).
    pub async fn list_events(&self, params: &EventListParams) -> Result<Vec<EventWithAgent>> {
        let start = match params.start.as_deref() {
            Some(v) => Some(parse_timestamp(v)?),
            None => None,
        };
        let end = match params.end.as_deref() {
            Some(v) => Some(parse_timestamp(v)?),
            None => None,
        };

        let rows: Vec<EventRow> = with_timeout(async {
            Ok(match (&start, &end) {
                (Some(s), Some(e)) => {
                    sqlx::query_as(
                        "SELECT * FROM events WHERE start_time >= ? AND start_time <= ?
                         ORDER BY start_time ASC",
                    )
                    .bind(s)
                    .bind(e)
                    .fetch_all(&self.pool)
                    .await?
                }
                (Some(s), None) => {
                    sqlx::query_as(
                        "SELECT * FROM events WHERE start_time >= ? ORDER BY start_time ASC",
                    )
                    .bind(s)
                    .fetch_all(&self.pool)
                    .await?
                }
                (None, Some(e)) => {
                    sqlx::query_as(
                        "SELECT * FROM events WHERE start_time <= ? ORDER BY start_time ASC",
                    )
                    .bind(e)
                    .fetch_all(&self.pool)
                    .await?
                }
                (None, None) => {
                    sqlx::query_as("SELECT * FROM events ORDER BY start_time ASC")
                        .fetch_all(&self.pool)
                        .await?
                }
            })
        })
        .await?;

        let mut cache = HashMap::new();
        let mut out = Vec::with_capacity(rows.len());
        for event in rows {
            let assigned_agent = match event.assigned_agent_id.as_deref() {
                Some(agent_id) => self.cached_agent(&mut cache, agent_id).await?,
                None => None,
            };
            out.push(EventWithAgent {
                event,
                assigned_agent,
            });
        }
        Ok(out)
    }

    pub async fn create_event(&self, params: CreateEventParams) -> Result<EventWithAgent> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let start_time = parse_timestamp(&params.start_time)?;
        let end_time = parse_timestamp(&params.end_time)?;
        sqlx::query(
            "INSERT INTO events (id, title, description, start_time, end_time, recurrence, assigned_agent_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&params.title)
        .bind(params.description.unwrap_or_default())
        .bind(&start_time)
        .bind(&end_time)
        .bind(&params.recurrence)
        .bind(&params.assigned_agent_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let event = self
            .get_event(&id)
            .await?
            .ok_or_else(|| anyhow!("event not found after insert"))?;
        let assigned_agent = match event.assigned_agent_id.as_deref() {
            Some(agent_id) => self.get_agent(agent_id).await?,
            None => None,
        };
        Ok(EventWithAgent {
            event,
            assigned_agent,
        })
    }

    /// Partial update; empty-string or null recurrence / assigned agent
    /// clears the field. Returns `None` when the event does not exist.
    pub async fn update_event(
        &self,
        id: &str,
        params: UpdateEventParams,
    ) -> Result<Option<EventWithAgent>> {
        let Some(mut row) = self.get_event(id).await? else {
            return Ok(None);
        };

        if let Some(title) = params.title {
            row.title = title;
        }
        if let Some(description) = params.description {
            row.description = description;
        }
        if let Some(ref start) = params.start_time {
            row.start_time = parse_timestamp(start)?;
        }
        if let Some(ref end) = params.end_time {
            row.end_time = parse_timestamp(end)?;
        }
        if let Some(recurrence) = params.recurrence {
            row.recurrence = recurrence.filter(|v| !v.is_empty());
        }
        if let Some(agent_id) = params.assigned_agent_id {
            row.assigned_agent_id = agent_id.filter(|v| !v.is_empty());
        }

        sqlx::query(
            "UPDATE events SET title = ?, description = ?, start_time = ?, end_time = ?,
             recurrence = ?, assigned_agent_id = ? WHERE id = ?",
        )
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.start_time)
        .bind(&row.end_time)
        .bind(&row.recurrence)
        .bind(&row.assigned_agent_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let assigned_agent = match row.assigned_agent_id.as_deref() {
            Some(agent_id) => self.get_agent(agent_id).await?,
            None => None,
        };
        Ok(Some(EventWithAgent {
            event: row,
            assigned_agent,
        }))
    }

    /// Returns `false` when no row matched the id.
    pub async fn delete_event(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    pub async fn count_events(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }

    // ─── Messages ─────────────────────────────────────────────────────────────

    pub async fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        Ok(sqlx::query_as("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Newest-first message feed with optional sender/recipient filters and
    /// take/skip pagination. `take` absent means unlimited (SQLite `LIMIT -1`).
    pub async fn list_messages(
        &self,
        params: &MessageListParams,
    ) -> Result<Vec<MessageWithAgents>> {
        let take: i64 = match params.take.as_deref() {
            Some(v) => v.parse().context("parsing take")?,
            None => -1,
        };
        let skip: i64 = match params.skip.as_deref() {
            Some(v) => v.parse().context("parsing skip")?,
            None => 0,
        };

        let rows: Vec<MessageRow> = with_timeout(async {
            Ok(
                match (&params.from_agent_id, &params.to_agent_id) {
                    (Some(from), Some(to)) => {
                        sqlx::query_as(
                            "SELECT * FROM messages WHERE from_agent_id = ? AND to_agent_id = ?
                             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                        )
                        .bind(from)
                        .bind(to)
                        .bind(take)
                        .bind(skip)
                        .fetch_all(&self.pool)
                        .await?
                    }
                    (Some(from), None) => {
                        sqlx::query_as(
                            "SELECT * FROM messages WHERE from_agent_id = ?
                             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                        )
                        .bind(from)
                        .bind(take)
                        .bind(skip)
                        .fetch_all(&self.pool)
                        .await?
                    }
                    (None, Some(to)) => {
                        sqlx::query_as(
                            "SELECT * FROM messages WHERE to_agent_id = ?
                             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                        )
                        .bind(to)
                        .bind(take)
                        .bind(skip)
                        .fetch_all(&self.pool)
                        .await?
                    }
                    (None, None) => {
                        sqlx::query_as(
                            "SELECT * FROM messages
                             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                        )
                        .bind(take)
                        .bind(skip)
                        .fetch_all(&self.pool)
                        .await?
                    }
                },
            )
        })
        .await?;

        let mut cache = HashMap::new();
        let mut out = Vec::with_capacity(rows.len());
        for message in rows {
            let from_agent = match message.from_agent_id.as_deref() {
                Some(agent_id) => self.cached_agent(&mut cache, agent_id).await?,
                None => None,
            };
            let to_agent = match message.to_agent_id.as_deref() {
                Some(agent_id) => self.cached_agent(&mut cache, agent_id).await?,
                None => None,
            };
            out.push(MessageWithAgents {
                message,
                from_agent,
                to_agent,
            });
        }
        Ok(out)
    }

    /// Messages are create-only; no update or delete exists anywhere.
    pub async fn create_message(&self, params: CreateMessageParams) -> Result<MessageWithAgents> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        sqlx::query(
            "INSERT INTO messages (id, content, from_agent_id, to_agent_id, from_label, to_label, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&params.content)
        .bind(&params.from_agent_id)
        .bind(&params.to_agent_id)
        .bind(params.from_label.unwrap_or_else(|| "system".to_string()))
        .bind(params.to_label.unwrap_or_else(|| "all".to_string()))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let message = self
            .get_message(&id)
            .await?
            .ok_or_else(|| anyhow!("message not found after insert"))?;
        let from_agent = match message.from_agent_id.as_deref() {
            Some(agent_id) => self.get_agent(agent_id).await?,
            None => None,
        };
        let to_agent = match message.to_agent_id.as_deref() {
            Some(agent_id) => self.get_agent(agent_id).await?,
            None => None,
        };
        Ok(MessageWithAgents {
            message,
            from_agent,
            to_agent,
        })
    }

    pub async fn count_messages(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }
}
