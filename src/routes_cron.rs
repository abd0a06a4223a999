// --------------------------------------------------
// Overdue reminder job, triggered by an external scheduler.
// Guarded by a shared secret header when one is configured.
// --------------------------------------------------

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::logic;
use crate::AppState;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

#[derive(Debug, Serialize)]
pub struct OverdueReport {
    pub status: &'static str,
    pub overdue_tasks: usize,
    pub notification_failures: usize,
}

// -----------------------------
// GET /api/cron/check-overdue
// One reminder per open task whose planned time has passed
// -----------------------------
pub async fn check_overdue(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<OverdueReport>> {
    if let Some(secret) = &state.config.cron_secret {
        let given = headers.get(CRON_SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(secret.as_str()) {
            warn!("cron call with bad secret");
            return Err(AppError::Forbidden("unauthorized".to_string()));
        }
    }

    let now = logic::now_local();
    let db = state.store.load()?;
    let overdue = logic::overdue_tasks(&db.tasks, now);

    let mut failures = 0;
    for task in &overdue {
        if let Err(e) = state.notifier.task_overdue(task).await {
            failures += 1;
            warn!(task_id = %task.id, error = %e, "overdue reminder failed");
        }
    }

    info!(overdue = overdue.len(), failures, "overdue check finished");
    Ok(Json(OverdueReport {
        status: "ok",
        overdue_tasks: overdue.len(),
        notification_failures: failures,
    }))
}
