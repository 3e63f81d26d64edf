//! CRM assistant backed by the Gemini `generateContent` API.
//!
//! The provider is externally rate limited, so the client throttles itself:
//! at most one call in flight and a minimum interval between call starts.
//! A call that would break either rule fails immediately with
//! [`AssistantError::CoolingDown`]; nothing is queued or retried, and a 429
//! from the provider is never retried either.
//!
//! Throttle state lives in an [`AssistantSession`] owned by the caller, so
//! independent sessions (tests, several windows) never share it.

pub mod prompts;

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;

/// Assistant configuration stored under `assistant` in ~/.forcelink/config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    800
}

fn default_min_interval_ms() -> u64 {
    4_000
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl AssistantConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Missing Gemini API key")]
    MissingApiKey,
    #[error("Assistant cooling down")]
    CoolingDown,
    #[error("Gemini rate limit hit")]
    RateLimited,
    #[error("Gemini API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ThrottleState {
    in_flight: bool,
    last_call: Option<Instant>,
}

/// Per-session throttle for assistant calls.
#[derive(Debug)]
pub struct AssistantSession {
    min_interval: Duration,
    state: Mutex<ThrottleState>,
}

impl AssistantSession {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// Claim the single call slot, or fail if busy or too soon.
    fn try_begin(&self) -> Result<CallGuard<'_>, AssistantError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let too_soon = state
            .last_call
            .is_some_and(|last| now.duration_since(last) < self.min_interval);
        if state.in_flight || too_soon {
            return Err(AssistantError::CoolingDown);
        }
        state.in_flight = true;
        state.last_call = Some(now);
        Ok(CallGuard { session: self })
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }
}

impl Default for AssistantSession {
    fn default() -> Self {
        Self::new(Duration::from_millis(default_min_interval_ms()))
    }
}

/// Releases the in-flight flag when the call finishes, however it finishes.
struct CallGuard<'a> {
    session: &'a AssistantSession,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.session.state.lock().in_flight = false;
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Ai,
            text: text.into(),
        }
    }
}

const NO_RESPONSE: &str = "No response generated.";

pub struct GeminiClient {
    client: reqwest::Client,
    config: AssistantConfig,
}

impl GeminiClient {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Single-turn generation. Exactly one model is tried per call.
    pub async fn generate(
        &self,
        session: &AssistantSession,
        system_prompt: &str,
        user_message: &str,
        context: &str,
        history: &[ChatMessage],
    ) -> Result<String, AssistantError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AssistantError::MissingApiKey)?;

        let _guard = session.try_begin()?;

        let today = chrono::Utc::now().date_naive();
        let prompt = prompts::build_request_text(system_prompt, today, context, user_message);

        let mut contents: Vec<Value> = history
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    ChatRole::Ai => "model",
                    ChatRole::User => "user",
                };
                json!({ "role": role, "parts": [{ "text": msg.text }] })
            })
            .collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": prompt }] }));

        let body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            }
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let resp = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            log::warn!("Assistant: provider rate limit hit, not retrying");
            return Err(AssistantError::RateLimited);
        }
        let text = match resp.text().await {
            Ok(text) => text,
            Err(_) if !status.is_success() => String::new(),
            Err(e) => return Err(e.into()),
        };
        if !status.is_success() {
            let json: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            let message = json
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("Gemini API error")
                .to_string();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| AssistantError::Api {
            status: status.as_u16(),
            message: format!("Malformed response: {}", e),
        })?;
        Ok(json
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(NO_RESPONSE)
            .to_string())
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Chat transcript for one assistant view.
///
/// Each turn is sent on its own with the user-provided-context marker; the
/// transcript is kept for display only.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::ai(prompts::GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Send one user message. Blank input is ignored and returns `None`.
    ///
    /// Any failure, throttling included, is recorded as the static
    /// unavailable reply rather than returned.
    pub async fn send(
        &mut self,
        client: &GeminiClient,
        session: &AssistantSession,
        input: &str,
    ) -> Option<&ChatMessage> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(text));

        let reply = match client
            .generate(
                session,
                prompts::system_prompt(),
                text,
                prompts::USER_PROVIDED_CONTEXT,
                &[],
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("Assistant unavailable: {}", e);
                prompts::UNAVAILABLE.to_string()
            }
        };
        self.messages.push(ChatMessage::ai(reply));
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_throttle_rejects_calls_inside_interval() {
        let session = AssistantSession::new(Duration::from_secs(4));

        drop(session.try_begin().expect("first call"));
        assert!(matches!(
            session.try_begin(),
            Err(AssistantError::CoolingDown)
        ));

        tokio::time::advance(Duration::from_millis(3_999)).await;
        assert!(session.try_begin().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(session.try_begin().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_rejects_concurrent_call() {
        let session = AssistantSession::new(Duration::ZERO);
        let guard = session.try_begin().expect("first call");
        assert!(session.is_in_flight());
        assert!(matches!(
            session.try_begin(),
            Err(AssistantError::CoolingDown)
        ));
        drop(guard);
        assert!(!session.is_in_flight());
        assert!(session.try_begin().is_ok());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_claiming_slot() {
        let client = GeminiClient::new(AssistantConfig::default());
        let session = AssistantSession::default();
        let err = client
            .generate(&session, "rules", "hi", "ctx", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::MissingApiKey));
        assert!(session.try_begin().is_ok());
    }

    #[tokio::test]
    async fn test_conversation_failure_uses_static_reply() {
        let client = GeminiClient::new(AssistantConfig::default());
        let session = AssistantSession::default();
        let mut convo = Conversation::new();

        assert!(convo.send(&client, &session, "   ").await.is_none());
        assert_eq!(convo.messages().len(), 1);

        let reply = convo.send(&client, &session, " pipeline? ").await.cloned();
        assert_eq!(reply, Some(ChatMessage::ai(prompts::UNAVAILABLE)));
        assert_eq!(convo.messages()[1], ChatMessage::user("pipeline?"));
    }

    #[test]
    fn test_config_defaults() {
        let config: AssistantConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.min_interval(), Duration::from_secs(4));
        assert_eq!(config.max_output_tokens, 800);
    }
}
