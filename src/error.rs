//! Top-level error type for client operations
//!
//! Errors are classified by recoverability:
//! - Retryable: network issues, backend 5xx, provider throttling
//! - NonRetryable: invalid payloads, unsupported operations, bad config
//! - RequiresUserAction: missing API key, rejected credentials

use thiserror::Error;

use crate::api::ApiError;
use crate::assistant::AssistantError;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl CrmError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            CrmError::Api(ApiError::Http(_)) => true,
            CrmError::Api(e) => matches!(e.status(), Some(s) if s >= 500 || s == 429 || s == 408),
            CrmError::Assistant(e) => matches!(
                e,
                AssistantError::CoolingDown | AssistantError::RateLimited | AssistantError::Http(_)
            ),
            CrmError::Configuration(_) | CrmError::Io(_) => false,
        }
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        match self {
            CrmError::Api(e) => matches!(e.status(), Some(401) | Some(403)),
            CrmError::Assistant(AssistantError::MissingApiKey) => true,
            _ => false,
        }
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        if self.requires_user_action() {
            return match self {
                CrmError::Assistant(_) => "Set GEMINI_API_KEY or assistant.apiKey in ~/.forcelink/config.json",
                _ => "Sign in again and update authToken in ~/.forcelink/config.json",
            };
        }
        match self {
            CrmError::Api(ApiError::Validation { .. }) => "Fill in the required fields and try again.",
            CrmError::Api(ApiError::Url(_)) => "Check backendUrl in ~/.forcelink/config.json",
            CrmError::Api(ApiError::Unsupported(_)) => "Delete and recreate the record instead.",
            CrmError::Api(e) if e.is_not_found() => "The record no longer exists. Refresh the list.",
            CrmError::Api(_) => "Check your connection to the CRM backend and try again.",
            CrmError::Assistant(_) => "Wait a few seconds and try again.",
            CrmError::Configuration(_) => "Check your configuration in ~/.forcelink/config.json",
            CrmError::Io(_) => "Check file permissions and disk space.",
        }
    }
}

impl From<std::io::Error> for CrmError {
    fn from(err: std::io::Error) -> Self {
        CrmError::Io(err.to_string())
    }
}

/// Serializable error representation for front ends
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&CrmError> for ErrorReport {
    fn from(err: &CrmError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        ErrorReport {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> CrmError {
        CrmError::Api(ApiError::Status {
            status,
            message: "x".into(),
        })
    }

    #[test]
    fn test_classification() {
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(status(401).requires_user_action());
        assert!(CrmError::Assistant(AssistantError::MissingApiKey).requires_user_action());
        assert!(CrmError::Assistant(AssistantError::CoolingDown).is_retryable());
    }

    #[test]
    fn test_report_for_not_found() {
        let report = ErrorReport::from(&status(404));
        assert_eq!(report.error_type, ErrorType::NonRetryable);
        assert!(!report.can_retry);
        assert_eq!(
            report.recovery_suggestion,
            "The record no longer exists. Refresh the list."
        );
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = ErrorReport::from(&CrmError::Configuration("bad".into()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errorType"], "nonRetryable");
        assert_eq!(json["message"], "Configuration error: bad");
    }
}
