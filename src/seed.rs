// seed.rs — demo fleet for a fresh install (`missiond seed`).
//
// Safe to re-run: agents are upserted by unique name; tasks, events, and
// messages are only inserted when their table is empty.

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::storage::{
    CreateEventParams, CreateMessageParams, CreateTaskParams, Storage, UpdateAgentParams,
};

#[derive(Debug, Default)]
pub struct SeedReport {
    pub agents: u64,
    pub tasks: u64,
    pub events: u64,
    pub messages: u64,
}

fn rfc(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> String {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    rfc(Utc.from_utc_datetime(&date.and_time(time)))
}

pub async fn run(storage: &Storage) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let now = Utc::now();

    // ─── Agents (upsert by name) ──────────────────────────────────────────────

    let zora = storage
        .upsert_agent("Zora", "Chief of Staff", "👑", "active", &rfc(now))
        .await?;
    let grabber = storage
        .upsert_agent("Grabber", "Lead Acquisition", "🎯", "active", &rfc(now))
        .await?;
    let loki = storage
        .upsert_agent(
            "Loki",
            "Graphic Design",
            "🎨",
            "idle",
            &rfc(now - Duration::minutes(30)),
        )
        .await?;
    let cody = storage
        .upsert_agent("Cody", "Development", "💻", "active", &rfc(now))
        .await?;
    let zoe = storage
        .upsert_agent(
            "Zoe",
            "Customer Experience",
            "💬",
            "idle",
            &rfc(now - Duration::minutes(15)),
        )
        .await?;
    report.agents = 5;

    // ─── Tasks ────────────────────────────────────────────────────────────────

    if storage.count_tasks().await? == 0 {
        let demo_tasks: &[(&str, &str, &str, &str, &str)] = &[
            (
                "Build Mission Control Dashboard",
                "Create the main dashboard for monitoring all agents",
                "in_progress",
                "high",
                &cody.id,
            ),
            (
                "Design brand guidelines",
                "Create comprehensive brand guidelines document",
                "review",
                "medium",
                &loki.id,
            ),
            (
                "Outreach campaign Q1",
                "Plan and execute Q1 lead acquisition campaign",
                "in_progress",
                "high",
                &grabber.id,
            ),
            (
                "Customer feedback analysis",
                "Analyze recent customer feedback and create report",
                "backlog",
                "medium",
                &zoe.id,
            ),
            (
                "Weekly team sync agenda",
                "Prepare agenda for the weekly team sync meeting",
                "done",
                "low",
                &zora.id,
            ),
            (
                "API integration testing",
                "Test all API endpoints for the new integration",
                "backlog",
                "urgent",
                &cody.id,
            ),
            (
                "Social media graphics",
                "Create graphics for social media posts this week",
                "backlog",
                "medium",
                &loki.id,
            ),
            (
                "Lead qualification criteria",
                "Define and document lead qualification criteria",
                "in_progress",
                "high",
                &grabber.id,
            ),
        ];

        let mut created_ids = Vec::with_capacity(demo_tasks.len());
        for (title, description, status, priority, assignee) in demo_tasks {
            let task = storage
                .create_task(CreateTaskParams {
                    title: (*title).to_string(),
                    description: Some((*description).to_string()),
                    status: Some((*status).to_string()),
                    priority: Some((*priority).to_string()),
                    assigned_to: Some((*assignee).to_string()),
                    ..Default::default()
                })
                .await?;
            created_ids.push(task.task.id);
        }
        report.tasks = created_ids.len() as u64;

        // Point the busy agents at their active tasks.
        storage
            .update_agent(
                &cody.id,
                UpdateAgentParams {
                    current_task_id: Some(Some(created_ids[0].clone())),
                    ..Default::default()
                },
            )
            .await?;
        storage
            .update_agent(
                &grabber.id,
                UpdateAgentParams {
                    current_task_id: Some(Some(created_ids[2].clone())),
                    ..Default::default()
                },
            )
            .await?;
    }

    // ─── Messages ─────────────────────────────────────────────────────────────

    if storage.count_messages().await? == 0 {
        let feed: &[(Option<&str>, &str, Option<&str>, &str, &str)] = &[
            (
                Some(&zora.id),
                "Zora",
                None,
                "all",
                "Good morning team! Let's have a productive day.",
            ),
            (
                Some(&cody.id),
                "Cody",
                Some(&zora.id),
                "Zora",
                "Starting work on Mission Control dashboard. Will update when MVP is ready.",
            ),
            (
                Some(&grabber.id),
                "Grabber",
                Some(&zora.id),
                "Zora",
                "Q1 campaign draft is ready for review. 47 new leads identified.",
            ),
            (
                Some(&loki.id),
                "Loki",
                None,
                "all",
                "Brand guidelines v2 is in review. Check the shared folder.",
            ),
            (
                Some(&zoe.id),
                "Zoe",
                Some(&zora.id),
                "Zora",
                "Customer satisfaction score is up 12% this month!",
            ),
            (None, "system", None, "all", "Daily standup reminder: 9:00 AM"),
            (
                Some(&zora.id),
                "Zora",
                Some(&cody.id),
                "Cody",
                "Priority update: API integration testing moved to urgent. Please plan accordingly.",
            ),
        ];

        for (from_id, from_label, to_id, to_label, content) in feed {
            storage
                .create_message(CreateMessageParams {
                    content: (*content).to_string(),
                    from_agent_id: from_id.map(|s| s.to_string()),
                    to_agent_id: to_id.map(|s| s.to_string()),
                    from_label: Some((*from_label).to_string()),
                    to_label: Some((*to_label).to_string()),
                })
                .await?;
        }
        report.messages = feed.len() as u64;
    }

    // ─── Events ───────────────────────────────────────────────────────────────

    if storage.count_events().await? == 0 {
        let today = now.date_naive();
        storage
            .create_event(CreateEventParams {
                title: "Daily Standup".to_string(),
                description: Some("Team sync meeting".to_string()),
                start_time: at(today, 9, 0),
                end_time: at(today, 9, 15),
                recurrence: Some("0 9 * * 1-5".to_string()),
                assigned_agent_id: Some(zora.id.clone()),
            })
            .await?;
        storage
            .create_event(CreateEventParams {
                title: "Sprint Review".to_string(),
                description: Some("End of sprint review and demo".to_string()),
                start_time: at(today + Duration::days(5), 14, 0),
                end_time: at(today + Duration::days(5), 15, 0),
                ..Default::default()
            })
            .await?;
        storage
            .create_event(CreateEventParams {
                title: "Q1 Campaign Launch".to_string(),
                description: Some("Launch the Q1 outreach campaign".to_string()),
                start_time: at(today + Duration::days(3), 10, 0),
                end_time: at(today + Duration::days(3), 11, 0),
                assigned_agent_id: Some(grabber.id.clone()),
                ..Default::default()
            })
            .await?;
        storage
            .create_event(CreateEventParams {
                title: "Design Review".to_string(),
                description: Some("Review brand guidelines with the team".to_string()),
                start_time: at(today + Duration::days(1), 13, 0),
                end_time: at(today + Duration::days(1), 14, 0),
                assigned_agent_id: Some(loki.id.clone()),
                ..Default::default()
            })
            .await?;
        report.events = 4;
    }

    Ok(report)
}
