use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

// Derived, never stored. See logic::classify_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    Upcoming,
    Pending,
    Completed,
    Delayed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub planned_at: NaiveDateTime,
    pub actual_at: Option<NaiveDateTime>, // None while the task is open
    #[serde(default)]
    pub priority: Priority,
    pub created_at: NaiveDateTime,
}

impl Task {
    pub fn is_open(&self) -> bool {
        self.actual_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Ceo,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String, // argon2 PHC string
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Db {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub users: Vec<User>,
}

// Summary of one calendar week, rebuilt on every request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyMetrics {
    pub planned: u32,
    pub completed: u32,
    pub on_time: u32,
    pub delayed: u32,
    pub completion_ratio: f64, // percent, 1 decimal
    pub on_time_ratio: f64,    // percent, 1 decimal
    pub delay_percentage: f64, // percent, 1 decimal
    pub avg_delay: f64,        // hours, 2 decimals
    pub carryover: u32,
    pub high_priority_total: u32,
    pub high_priority_delayed: u32,
}
