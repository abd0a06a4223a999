/*
Week resolution, status and metrics logic.
Module was independently written from HTTP / Axum for testing
*/


use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::models::{Priority, Task, TaskStatus, WeeklyMetrics};


// Calendar week, Monday 00:00:00 through Sunday 23:59:59.999999 (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl WeekRange {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }
}

// One row of the trends view
#[derive(Debug, Clone, Serialize)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(flatten)]
    pub metrics: WeeklyMetrics,
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

// Week (Monday..Sunday) that contains `date`, or None when part of
// that week falls outside the representable calendar
pub fn checked_week_range(date: NaiveDate) -> Option<WeekRange> {
    let offset = date.weekday().num_days_from_monday() as u64; // Mon=0 .. Sun=6
    let start_date = date.checked_sub_days(Days::new(offset))?;
    let end_date = start_date.checked_add_days(Days::new(6))?;
    Some(week_bounds(start_date, end_date))
}

// Total version of checked_week_range: clamps to the calendar edges
pub fn week_range_containing(date: NaiveDate) -> WeekRange {
    checked_week_range(date).unwrap_or_else(|| {
        let offset = date.weekday().num_days_from_monday() as u64;
        let start_date = date.checked_sub_days(Days::new(offset)).unwrap_or(NaiveDate::MIN);
        let end_date = start_date.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
        week_bounds(start_date, end_date)
    })
}

fn week_bounds(start_date: NaiveDate, end_date: NaiveDate) -> WeekRange {
    WeekRange {
        start: start_date.and_time(NaiveTime::MIN),
        end: end_date.and_time(last_instant_of_day()),
    }
}

// Same as week_range_containing, falling back to today
pub fn resolve_week_range(reference: Option<NaiveDate>) -> WeekRange {
    week_range_containing(reference.unwrap_or_else(today))
}

fn last_instant_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

// Select tasks whose planned time falls inside the (closed) week window
pub fn tasks_in_week<'a>(tasks: &'a [Task], range: &WeekRange) -> Vec<&'a Task> {
    tasks.iter().filter(|t| range.contains(t.planned_at)).collect()
}

// Status decision table. Order matters:
//     completion is checked before lateness relative to now
pub fn classify_status(task: &Task, now: NaiveDateTime) -> TaskStatus {
    match task.actual_at {
        Some(actual) if actual <= task.planned_at => TaskStatus::Completed,
        Some(_) => TaskStatus::Delayed,
        None if now < task.planned_at => TaskStatus::Upcoming,
        None => TaskStatus::Pending,
    }
}

// Fractional hours between planned and actual; negative when early
pub fn delay_hours(planned: NaiveDateTime, actual: NaiveDateTime) -> f64 {
    let delta = actual - planned;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 3_600_000_000.0,
        None => delta.num_seconds() as f64 / 3_600.0, // beyond i64 microseconds
    }
}

// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

// Aggregate a week's worth of tasks into summary statistics.
//
// Input is expected to be pre-filtered to the week window
// (see tasks_in_week). Every ratio guards its denominator and
// reports 0 rather than dividing by zero.
pub fn compute_weekly_metrics<'a, I>(tasks: I) -> WeeklyMetrics
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut m = WeeklyMetrics::default();
    let mut delays: Vec<f64> = Vec::new();

    for task in tasks {
        m.planned += 1;
        let high = task.priority == Priority::High;
        if high {
            m.high_priority_total += 1;
        }

        let Some(actual) = task.actual_at else {
            continue;
        };

        m.completed += 1;
        if actual <= task.planned_at {
            m.on_time += 1;
        } else {
            m.delayed += 1;
            delays.push(delay_hours(task.planned_at, actual));
            if high {
                m.high_priority_delayed += 1;
            }
        }
    }

    m.carryover = m.planned - m.completed;
    m.completion_ratio = percent(m.completed, m.planned);
    m.on_time_ratio = percent(m.on_time, m.completed);
    m.delay_percentage = percent(m.delayed, m.completed);
    m.avg_delay = if delays.is_empty() {
        0.0
    } else {
        round_to(delays.iter().sum::<f64>() / delays.len() as f64, 2)
    };

    m
}

// Select and aggregate in one step
pub fn metrics_for_week(tasks: &[Task], range: &WeekRange) -> WeeklyMetrics {
    compute_weekly_metrics(tasks_in_week(tasks, range))
}

// `weeks` consecutive weeks ending with the one containing `today`, oldest first
pub fn weekly_trends(tasks: &[Task], today: NaiveDate, weeks: u32) -> Vec<WeekSummary> {
    (0..weeks)
        .rev()
        .filter_map(|i| today.checked_sub_days(Days::new(7 * i as u64)))
        .map(|day| {
            let range = week_range_containing(day);
            WeekSummary {
                week_start: range.start_date(),
                week_end: range.end_date(),
                metrics: metrics_for_week(tasks, &range),
            }
        })
        .collect()
}

// Open tasks, earliest planned first
pub fn open_tasks(tasks: &[Task]) -> Vec<&Task> {
    let mut open: Vec<&Task> = tasks.iter().filter(|t| t.is_open()).collect();
    open.sort_by_key(|t| t.planned_at);
    open
}

// Completed tasks, most recently finished first
pub fn completed_tasks(tasks: &[Task]) -> Vec<&Task> {
    let mut done: Vec<&Task> = tasks.iter().filter(|t| !t.is_open()).collect();
    done.sort_by(|a, b| b.actual_at.cmp(&a.actual_at));
    done
}

// Open tasks whose planned time has already passed
pub fn overdue_tasks(tasks: &[Task], now: NaiveDateTime) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|t| t.is_open() && t.planned_at < now)
        .collect()
}

// Accepts "YYYY-MM-DDTHH:MM" (HTML datetime-local) or with seconds
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

// Also rejects dates whose whole week can't be represented
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .filter(|d| checked_week_range(*d).is_some())
}
