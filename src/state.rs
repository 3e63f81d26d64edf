use std::fs;
use std::path::PathBuf;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crate::assistant::AssistantSession;
use crate::dashboard::{DashboardData, RefreshCoordinator};
use crate::notification::{NotificationDraft, NotificationStore};
use crate::record::RecordKind;
use crate::reminders::ReminderSession;
use crate::types::Config;

/// Shared state for one running client session.
///
/// Reminder dedup and the assistant throttle are per session: a second
/// `AppState` starts with fresh ones.
pub struct AppState {
    pub config: RwLock<Config>,
    pub notifications: Mutex<NotificationStore>,
    pub reminders: Mutex<ReminderSession>,
    pub assistant: AssistantSession,
    /// Latest applied dashboard cycle.
    pub dashboard: RwLock<Option<DashboardData>>,
    /// Error of the latest failed dashboard cycle, cleared on success.
    pub last_error: RwLock<Option<String>>,
    pub refresh: RefreshCoordinator,
    pub dashboard_wake: Notify,
}

impl AppState {
    pub fn new(config: Config, notifications_path: PathBuf) -> Self {
        let assistant = AssistantSession::new(config.assistant.min_interval());
        Self {
            config: RwLock::new(config),
            notifications: Mutex::new(NotificationStore::load(notifications_path)),
            reminders: Mutex::new(ReminderSession::new()),
            assistant,
            dashboard: RwLock::new(None),
            last_error: RwLock::new(None),
            refresh: RefreshCoordinator::new(),
            dashboard_wake: Notify::new(),
        }
    }

    /// Build state from config, resolving the notification list location.
    pub fn from_config(config: Config) -> Result<Self, String> {
        let path = match &config.notifications_path {
            Some(p) => PathBuf::from(p),
            None => get_state_dir()?.join("notifications.json"),
        };
        Ok(Self::new(config, path))
    }

    /// Record a successful create/update and refresh the dashboard.
    pub fn record_saved(&self, kind: RecordKind, updated: bool) -> Result<(), String> {
        self.notifications
            .lock()
            .add(NotificationDraft::record_saved(kind, updated))?;
        self.dashboard_wake.notify_one();
        Ok(())
    }

    /// The active view changed: results of in-flight cycles are dropped.
    pub fn view_changed(&self) {
        self.refresh.cancel_all();
    }
}

/// Get the canonical config file path (~/.forcelink/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".forcelink").join("config.json"))
}

/// Get the state directory (~/.forcelink), creating it if needed.
fn get_state_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    let state_dir = home.join(".forcelink");

    if !state_dir.exists() {
        fs::create_dir_all(&state_dir).map_err(|e| format!("Failed to create state dir: {}", e))?;
    }

    Ok(state_dir)
}

/// Load configuration from `path`, then apply environment overrides.
///
/// A missing file is not an error: defaults plus environment apply.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, String> {
    let mut config = if path.exists() {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok());

    if config.backend_url.trim().is_empty() {
        return Err("backendUrl must not be empty".to_string());
    }

    Ok(config)
}

/// Load configuration from ~/.forcelink/config.json
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

/// Create or update the config file at `path`.
///
/// Starts from the file's current contents (or defaults), applies the
/// mutator and writes the result back. Environment overrides are not
/// persisted.
pub fn create_or_update_config_at(
    path: &std::path::Path,
    mutator: impl FnOnce(&mut Config),
) -> Result<Config, String> {
    let mut config = if path.exists() {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        Config::default()
    };

    mutator(&mut config);

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;

    Ok(config)
}

pub fn create_or_update_config(mutator: impl FnOnce(&mut Config)) -> Result<Config, String> {
    create_or_update_config_at(&config_path()?, mutator)
}
