//! In-app notification list
//!
//! Notifications are kept newest first and persisted as one JSON array
//! (`~/.forcelink/notifications.json` by default). Every mutation rewrites
//! the whole file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::record::RecordKind;

/// A notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationDraft {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
}

impl NotificationDraft {
    pub fn new(kind: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            message: message.into(),
        }
    }

    /// Confirmation after a record was created or updated.
    pub fn record_saved(kind: RecordKind, updated: bool) -> Self {
        let action = if updated { "updated" } else { "created" };
        Self::new(
            format!("{}_success", kind.plural()),
            "Success",
            format!("{} successfully {}.", kind.singular(), action),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub read: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
}

pub struct NotificationStore {
    path: PathBuf,
    events: Vec<NotificationEvent>,
}

impl NotificationStore {
    /// Load the list at `path`.
    ///
    /// A missing file is an empty list. An unreadable or malformed file is
    /// logged and also treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let events = if path.exists() {
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str(&c).map_err(|e| e.to_string()))
            {
                Ok(events) => events,
                Err(e) => {
                    log::error!("Failed to load notifications from {}: {}", path.display(), e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        Self { path, events }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn events(&self) -> &[NotificationEvent] {
        &self.events
    }

    pub fn unread_count(&self) -> usize {
        self.events.iter().filter(|e| !e.read).count()
    }

    /// Store a new unread notification at the front of the list.
    pub fn add(&mut self, draft: NotificationDraft) -> Result<&NotificationEvent, String> {
        let event = NotificationEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            read: false,
            kind: draft.kind,
            title: draft.title,
            message: draft.message,
        };
        self.events.insert(0, event);
        self.save()?;
        Ok(&self.events[0])
    }

    /// Store several drafts; the last draft ends up first.
    pub fn add_all(&mut self, drafts: Vec<NotificationDraft>) -> Result<usize, String> {
        let count = drafts.len();
        for draft in drafts {
            self.add(draft)?;
        }
        Ok(count)
    }

    pub fn mark_all_read(&mut self) -> Result<(), String> {
        for event in &mut self.events {
            event.read = true;
        }
        self.save()
    }

    pub fn clear(&mut self) -> Result<(), String> {
        self.events.clear();
        self.save()
    }

    fn save(&self) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create notifications dir: {}", e))?;
            }
        }
        let content = serde_json::to_string_pretty(&self.events)
            .map_err(|e| format!("Serialize error: {}", e))?;
        fs::write(&self.path, content).map_err(|e| format!("Write error: {}", e))
    }
}

/// Short relative label for a notification timestamp (ms since epoch).
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let mins = (now_ms - timestamp_ms).max(0) / 60_000;
    let hours = mins / 60;
    let days = hours / 24;

    if mins < 1 {
        "Just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else {
        format!("{}d ago", days)
    }
}
