use serde::{Deserialize, Serialize};

use crate::assistant::AssistantConfig;

/// Configuration stored in ~/.forcelink/config.json
///
/// Every field has a default so a partial (or empty) file is valid.
/// Environment variables override the file, see [`Config::apply_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend server root; REST paths live under `{backendUrl}/api`.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Dashboard refresh interval while the dashboard view is active.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Override for the notification list location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_path: Option<String>,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            auth_token: None,
            poll_interval_secs: default_poll_interval_secs(),
            notifications_path: None,
            assistant: AssistantConfig::default(),
        }
    }
}

pub const ENV_BACKEND_URL: &str = "FORCELINK_BACKEND_URL";
pub const ENV_TOKEN: &str = "FORCELINK_TOKEN";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

impl Config {
    /// Apply overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_BACKEND_URL) {
            self.backend_url = url;
        }
        if let Some(token) = non_empty(ENV_TOKEN) {
            self.auth_token = Some(token);
        }
        if let Some(key) = non_empty(ENV_GEMINI_API_KEY) {
            self.assistant.api_key = Some(key);
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
