//! Task due-date reminders.
//!
//! Scans run on every refresh cycle, so each reminder key is remembered in
//! the session and fires at most once per session. The session is not
//! persisted: a new session may remind again.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::notification::NotificationDraft;
use crate::record::{parse_timestamp, Record};

const DUE_DATE_FIELDS: &[&str] = &["DueDate", "dueDate"];
const SUBJECT_FIELDS: &[&str] = &["Subject", "subject"];

pub const TASK_DUE_SOON: &str = "task_due_soon";
pub const TASK_OVERDUE: &str = "task_overdue";

/// Per-session record of reminders already emitted.
#[derive(Debug, Default)]
pub struct ReminderSession {
    sent: HashSet<String>,
}

impl ReminderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan tasks against `now`, returning reminders not yet emitted this session.
    ///
    /// Due within the next 24 hours yields a due-soon reminder; a due time in
    /// the past yields an overdue reminder. Tasks without a parseable due
    /// date or without an identifier are skipped.
    pub fn scan(&mut self, tasks: &[Record], now: DateTime<Utc>) -> Vec<NotificationDraft> {
        let window = Duration::hours(24);
        let mut drafts = Vec::new();

        for task in tasks {
            let due = task
                .non_empty_text(DUE_DATE_FIELDS)
                .and_then(|raw| parse_timestamp(&raw));
            let (Some(due), Some(task_id)) = (due, task.id_str()) else {
                continue;
            };
            let subject = task
                .non_empty_text(SUBJECT_FIELDS)
                .unwrap_or_else(|| "Task".to_string());
            let diff = due - now;

            let (key, draft) = if diff > Duration::zero() && diff < window {
                (
                    format!("{}_due_soon", task_id),
                    NotificationDraft::new(
                        TASK_DUE_SOON,
                        "Task Due Soon",
                        format!("{} is due soon.", subject),
                    ),
                )
            } else if diff < Duration::zero() {
                (
                    format!("{}_overdue", task_id),
                    NotificationDraft::new(
                        TASK_OVERDUE,
                        "Task Overdue",
                        format!("{} is overdue!", subject),
                    ),
                )
            } else {
                continue;
            };

            if self.sent.insert(key) {
                drafts.push(draft);
            }
        }

        if !drafts.is_empty() {
            log::info!("Reminder scan: {} new task reminders", drafts.len());
        }
        drafts
    }
}
