use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::error::{AppError, AppResult};
use crate::logic::{self, WeekSummary};
use crate::models::WeeklyMetrics;
use crate::AppState;

// Weeks shown on the trends view, current week included
pub const TREND_WEEKS: u32 = 6;

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub date: Option<String>, // "YYYY-MM-DD", defaults to today
}

#[derive(Debug, Serialize)]
pub struct WeekMetricsResponse {
    pub selected_date: NaiveDate,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(flatten)]
    pub metrics: WeeklyMetrics,
}

#[derive(Debug, Serialize)]
pub struct TrendsResponse {
    pub trends: Vec<WeekSummary>,
}

// -----------------------------
// GET /api/metrics/week?date=YYYY-MM-DD
// -----------------------------
pub async fn get_week_metrics(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Query(q): Query<WeekQuery>,
) -> AppResult<Json<WeekMetricsResponse>> {
    let selected = match q.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(raw) => logic::parse_date(raw).ok_or_else(|| AppError::BadRequest("invalid date".to_string()))?,
        None => logic::today(),
    };

    let range = logic::resolve_week_range(Some(selected));
    let db = state.store.load()?;

    Ok(Json(WeekMetricsResponse {
        selected_date: selected,
        week_start: range.start_date(),
        week_end: range.end_date(),
        metrics: logic::metrics_for_week(&db.tasks, &range),
    }))
}

// -----------------------------
// GET /api/metrics/trends
// -----------------------------
pub async fn get_trends(
    State(state): State<AppState>,
    _ctx: AuthContext,
) -> AppResult<Json<TrendsResponse>> {
    let db = state.store.load()?;
    Ok(Json(TrendsResponse {
        trends: logic::weekly_trends(&db.tasks, logic::today(), TREND_WEEKS),
    }))
}
