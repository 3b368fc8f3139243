//! Crate-level error types
//!
//! Each subsystem has its own error enum; [`TaskRunnerError`] wraps them for
//! callers that drive the whole service.

use crate::config::ConfigError;
use crate::content::SyncError;
use crate::handlers::HandlerError;
use crate::llm::LlmError;
use crate::notion::StoreError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for task runner operations
#[derive(Debug, Error)]
pub enum TaskRunnerError {
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Content synchronization error: {0}")]
    Sync(#[from] SyncError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid page {page_id}: {reason}")]
    InvalidPage { page_id: String, reason: String },
}

impl TaskRunnerError {
    /// Create invalid page error
    pub fn invalid_page<S: Into<String>>(page_id: &str, reason: S) -> Self {
        Self::InvalidPage {
            page_id: page_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for task runner operations
pub type TaskRunnerResult<T> = Result<T, TaskRunnerError>;

static SECRET_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern compiles")
});

static SENSITIVE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern compiles")
});

const TRUNCATION_SUFFIX: &str = "...[truncated]";

/// Redact secrets and sensitive paths, then cap the message at `max_len` chars
///
/// Messages end up in a database field readable by everyone with access to
/// the workspace.
pub fn sanitize_error_message(message: &str, max_len: usize) -> String {
    let sanitized = SECRET_ASSIGNMENT.replace_all(message, "${1}=***");
    let sanitized = SENSITIVE_PATH
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.chars().count() <= max_len {
        return sanitized;
    }

    let suffix_len = TRUNCATION_SUFFIX.chars().count();
    if max_len <= suffix_len {
        return sanitized.chars().take(max_len).collect();
    }

    let mut truncated: String = sanitized.chars().take(max_len - suffix_len).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_page_constructor() {
        let error = TaskRunnerError::invalid_page("page-1", "missing title");
        assert!(matches!(error, TaskRunnerError::InvalidPage { .. }));
        assert_eq!(error.to_string(), "Invalid page page-1: missing title");
    }

    #[test]
    fn test_store_error_conversion() {
        let error: TaskRunnerError = StoreError::Transport("connection reset".to_string()).into();
        assert!(matches!(error, TaskRunnerError::Store(_)));
        assert!(error.to_string().contains("connection reset"));
    }

    #[test]
    fn test_redacts_secret_assignments() {
        let message = "Auth failed: password=pass1 api_key=key123 secret=hidden token=tok456";
        let sanitized = sanitize_error_message(message, 2000);

        assert!(!sanitized.contains("pass1"));
        assert!(!sanitized.contains("key123"));
        assert!(!sanitized.contains("hidden"));
        assert!(!sanitized.contains("tok456"));
        assert!(sanitized.contains("password=***"));
        assert!(sanitized.contains("key=***"));
    }

    #[test]
    fn test_redaction_is_case_insensitive_and_accepts_colons() {
        let sanitized = sanitize_error_message("PASSWORD: secret123 Token=abc", 2000);
        assert!(!sanitized.contains("secret123"));
        assert!(!sanitized.contains("abc"));
    }

    #[test]
    fn test_redacts_sensitive_paths() {
        let sanitized =
            sanitize_error_message("Failed to read /home/user/.aws/credentials", 2000);
        assert!(sanitized.contains("/***REDACTED***/"));
        assert!(!sanitized.contains(".aws/credentials"));
    }

    #[test]
    fn test_truncates_by_chars() {
        let sanitized = sanitize_error_message(&"é".repeat(3000), 2000);
        assert_eq!(sanitized.chars().count(), 2000);
        assert!(sanitized.ends_with(TRUNCATION_SUFFIX));

        let exact = "x".repeat(2000);
        assert_eq!(sanitize_error_message(&exact, 2000), exact);
    }

    #[test]
    fn test_tiny_limit() {
        assert_eq!(sanitize_error_message("abcdef", 3), "abc");
        assert_eq!(sanitize_error_message("", 3), "");
    }
}
