// Define data modules
pub mod models; // Data structures (Task, User, WeeklyMetrics, Db)
pub mod store;  // Persistent storage (load/save db.json)
pub mod logic;  // Week ranges, status classification and weekly metrics
pub mod config; // Startup configuration
pub mod error;  // Handler error type
pub mod auth;   // Password hashing, sessions, request identity
pub mod notify; // Mail transports
pub mod routes_auth;    // HTTP handlers for login / logout
pub mod routes_tasks;   // HTTP handlers for task APIs
pub mod routes_metrics; // HTTP handlers for weekly metrics
pub mod routes_cron;    // HTTP handler for the overdue reminder job

use std::sync::Arc;

// Import axum routing utilities and Router
use axum::{
    routing::{get, post}, // HTTP method helpers
    Router, // Main router type
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::auth::SessionStore;
use crate::config::Config;
use crate::notify::Notifier;
use crate::store::Store;

// Shared by every handler; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub sessions: Arc<SessionStore>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(config: Config, notifier: Notifier) -> Self {
        let store = Store::new(config.db_path.clone());
        let sessions = SessionStore::new(config.session_ttl);
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            sessions: Arc::new(sessions),
            notifier,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // auth
        .route("/login", post(routes_auth::login))
        .route("/logout", post(routes_auth::logout))
        .route("/me", get(routes_auth::me))
        // tasks
        .route("/tasks", get(routes_tasks::get_open_tasks).post(routes_tasks::create_task))
        .route("/tasks/completed", get(routes_tasks::get_completed_tasks))
        .route("/tasks/:id/done", post(routes_tasks::mark_done))
        .route("/tasks/:id/reschedule", post(routes_tasks::reschedule_task))
        // metrics
        .route("/metrics/week", get(routes_metrics::get_week_metrics))
        .route("/metrics/trends", get(routes_metrics::get_trends))
        // scheduled job
        .route("/cron/check-overdue", get(routes_cron::check_overdue));

    let static_dir = state.config.static_dir.clone();

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
