// --------------------------------------------------
// Handles API endpoints related to tasks.
//
// Responsibilities:
// - List open / completed tasks with their derived status
// - Create tasks (and notify)
// - Mark tasks done
// - Reschedule tasks (assistant only)
// -------------------------------------------------

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{ApiJson, AppError, AppResult};
use crate::logic;
use crate::models::{Priority, Role, Task, TaskStatus};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OpenTaskView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub planned_at: NaiveDateTime,
    pub priority: Priority,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct OpenTasksResponse {
    pub now: NaiveDateTime,
    pub role: Role,
    pub tasks: Vec<OpenTaskView>,
}

#[derive(Debug, Serialize)]
pub struct CompletedTaskView {
    pub id: Uuid,
    pub title: String,
    pub planned_at: NaiveDateTime,
    pub actual_at: NaiveDateTime,
    pub status: TaskStatus,
    pub delay_hours: Option<f64>, // only for Delayed, 2 decimals
}

fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("invalid id".to_string()))
}

fn parse_planned(raw: &str) -> AppResult<NaiveDateTime> {
    logic::parse_datetime(raw).ok_or_else(|| AppError::BadRequest("invalid planned_at".to_string()))
}

// -----------------------------
// GET /api/tasks
// Open tasks, earliest first
// -----------------------------
pub async fn get_open_tasks(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<OpenTasksResponse>> {
    let now = logic::now_local();
    let db = state.store.load()?;

    let tasks = logic::open_tasks(&db.tasks)
        .into_iter()
        .map(|t| OpenTaskView {
            id: t.id,
            title: t.title.clone(),
            description: t.description.clone(),
            planned_at: t.planned_at,
            priority: t.priority,
            status: logic::classify_status(t, now),
        })
        .collect();

    Ok(Json(OpenTasksResponse {
        now,
        role: ctx.role,
        tasks,
    }))
}

// -----------------------------
// GET /api/tasks/completed
// Most recently finished first
// -----------------------------
pub async fn get_completed_tasks(
    State(state): State<AppState>,
    _ctx: AuthContext,
) -> AppResult<Json<Vec<CompletedTaskView>>> {
    let now = logic::now_local();
    let db = state.store.load()?;

    let tasks = logic::completed_tasks(&db.tasks)
        .into_iter()
        .filter_map(|t| {
            let actual = t.actual_at?;
            let status = logic::classify_status(t, now);
            let delay_hours = (status == TaskStatus::Delayed)
                .then(|| logic::round_to(logic::delay_hours(t.planned_at, actual), 2));
            Some(CompletedTaskView {
                id: t.id,
                title: t.title.clone(),
                planned_at: t.planned_at,
                actual_at: actual,
                status,
                delay_hours,
            })
        })
        .collect();

    Ok(Json(tasks))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskInput {
    pub title: String,
    pub planned_at: String, // "YYYY-MM-DDTHH:MM[:SS]"
    pub description: Option<String>,
    pub priority: Option<Priority>,
}

// -----------------------------
// POST /api/tasks
// Creates a task and notifies the configured address
// -----------------------------
pub async fn create_task(
    State(state): State<AppState>,
    ctx: AuthContext,
    ApiJson(input): ApiJson<CreateTaskInput>,
) -> AppResult<Json<Task>> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("title required".to_string()));
    }
    let planned_at = parse_planned(&input.planned_at)?;

    let task = Task {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: input.description.filter(|d| !d.trim().is_empty()),
        planned_at,
        actual_at: None,
        priority: input.priority.unwrap_or_default(),
        created_at: logic::now_local(),
    };

    state
        .store
        .update(|db| {
            db.tasks.push(task.clone());
            Ok::<_, AppError>(())
        })
        .await?;
    info!(task_id = %task.id, by = %ctx.username, "task created");

    // the task is already saved; a failed mail must not undo that
    if let Err(e) = state.notifier.task_created(&task).await {
        warn!(task_id = %task.id, error = %e, "new-task notification failed");
    }

    Ok(Json(task))
}

// -----------------------------
// POST /api/tasks/:id/done
// Records completion time. Completion is final.
// -----------------------------
pub async fn mark_done(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<Task>> {
    let id = parse_id(&id)?;
    let now = logic::now_local();

    let updated = state
        .store
        .update(|db| {
            let Some(t) = db.tasks.iter_mut().find(|t| t.id == id) else {
                return Err(AppError::NotFound("task not found".to_string()));
            };
            if t.actual_at.is_some() {
                return Err(AppError::Conflict("task already completed".to_string()));
            }
            t.actual_at = Some(now);
            Ok(t.clone())
        })
        .await?;

    info!(task_id = %id, by = %ctx.username, "task completed");
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleInput {
    pub planned_at: String,
}

// -----------------------------
// POST /api/tasks/:id/reschedule
// Moves the planned time only. Assistants only.
// -----------------------------
pub async fn reschedule_task(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<RescheduleInput>,
) -> AppResult<Json<Task>> {
    ctx.require_role(Role::Assistant)?;
    let id = parse_id(&id)?;
    let planned_at = parse_planned(&input.planned_at)?;

    let updated = state
        .store
        .update(|db| {
            let Some(t) = db.tasks.iter_mut().find(|t| t.id == id) else {
                return Err(AppError::NotFound("task not found".to_string()));
            };
            t.planned_at = planned_at;
            Ok(t.clone())
        })
        .await?;

    info!(task_id = %id, planned_at = %planned_at, by = %ctx.username, "task rescheduled");
    Ok(Json(updated))
}
