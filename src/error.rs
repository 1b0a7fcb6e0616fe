use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::provider::Platform;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// HTTP-status-derived error classification shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Timeout,
    Conflict,
    ValidationError,
    RateLimited,
    ServerError,
    /// Anything else; rendered as `GITLAB_ERROR` / `GITHUB_ERROR`.
    Platform,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorCode::BadRequest,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            408 => ErrorCode::Timeout,
            409 => ErrorCode::Conflict,
            422 => ErrorCode::ValidationError,
            429 => ErrorCode::RateLimited,
            500..=599 => ErrorCode::ServerError,
            _ => ErrorCode::Platform,
        }
    }

    pub fn as_str(&self, platform: Platform) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::Platform => match platform {
                Platform::GitLab => "GITLAB_ERROR",
                Platform::GitHub => "GITHUB_ERROR",
            },
        }
    }
}

/// Failure of any capability-interface operation.
#[derive(Debug, Error)]
#[error("{platform} {}: {message}", code_label(.code, .platform))]
pub struct ProviderError {
    pub platform: Platform,
    pub code: ErrorCode,
    /// HTTP status of the failed call, when one was received (408 for timeouts).
    pub status: Option<u16>,
    pub message: String,
    /// Raw error body returned by the backend.
    pub details: Option<Value>,
}

impl ProviderError {
    pub fn new(platform: Platform, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            platform,
            code,
            status: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(platform: Platform, message: impl Into<String>) -> Self {
        Self {
            status: Some(400),
            ..Self::new(platform, ErrorCode::BadRequest, message)
        }
    }

    pub fn not_found(platform: Platform, message: impl Into<String>) -> Self {
        Self {
            status: Some(404),
            ..Self::new(platform, ErrorCode::NotFound, message)
        }
    }

    /// Build an error from a non-success HTTP response body.
    pub fn from_response(platform: Platform, status: u16, body: &str) -> Self {
        let details = serde_json::from_str::<Value>(body).ok();
        let message = details
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() || trimmed.len() > 200 {
                    format!("HTTP {}", status)
                } else {
                    trimmed.to_string()
                }
            });

        Self {
            platform,
            code: ErrorCode::from_status(status),
            status: Some(status),
            message,
            details: details.or_else(|| (!body.trim().is_empty()).then(|| Value::String(body.to_string()))),
        }
    }

    pub fn from_transport(platform: Platform, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self {
                status: Some(408),
                ..Self::new(platform, ErrorCode::Timeout, format!("request timed out: {}", err))
            };
        }
        let status = err.status().map(|s| s.as_u16());
        Self {
            status,
            ..Self::new(
                platform,
                status.map(ErrorCode::from_status).unwrap_or(ErrorCode::Platform),
                err.to_string(),
            )
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str(self.platform)
    }

    /// Hint for callers; this layer never retries on its own.
    pub fn retryable(&self) -> bool {
        matches!(self.code, ErrorCode::RateLimited | ErrorCode::ServerError)
    }

    /// Prefix the message with the operation stage that failed.
    pub fn context(mut self, stage: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", stage, self.message);
        self
    }
}

fn code_label(code: &ErrorCode, platform: &Platform) -> &'static str {
    code.as_str(*platform)
}

/// Pull a human message out of a backend error body: `message` string,
/// then `error` string, then the `errors` array joined.
fn extract_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Some(error.to_string());
    }
    let errors = body.get("errors").and_then(Value::as_array)?;
    let parts: Vec<String> = errors
        .iter()
        .filter_map(|e| match e {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => e
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    let field = e.get("field").and_then(Value::as_str)?;
                    let code = e.get("code").and_then(Value::as_str)?;
                    Some(format!("{} {}", field, code))
                }),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}
