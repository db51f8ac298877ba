//! Error types for the schedule pipeline.

use thiserror::Error;

/// Errors that can occur while reading or mutating schedules.
#[derive(Debug, Error, Clone)]
pub enum ScheduleError {
    /// A fetch tier could not produce data (threw, unreachable, bad status)
    #[error("Source {source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: &'static str,
        message: String,
    },

    /// A payload did not have any of the shapes we know how to read
    #[error("Unexpected payload shape from {source_name}: {message}")]
    ShapeMismatch {
        source_name: &'static str,
        message: String,
    },

    /// A mutation was rejected locally before any request was sent
    #[error("{message}")]
    Validation { message: String },

    /// A create/update/delete call failed
    #[error("{message}")]
    MutationFailed { message: String },

    /// The API answered with a non-success status
    #[error("API returned {status}{}", detail_suffix(.detail))]
    Api { status: u16, detail: Option<String> },

    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// Response body was not valid JSON or did not deserialize
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },

    /// A date/time fragment could not be turned into an instant
    #[error("Invalid time: {message}")]
    InvalidTime { message: String },

    /// The same form is already submitting
    #[error("A {operation} is already in progress")]
    OperationInProgress { operation: &'static str },

    /// Configuration could not be loaded
    #[error("Config error: {message}")]
    Config { message: String },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ScheduleError {
    /// Shorthand for a local validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        ScheduleError::Validation {
            message: message.into(),
        }
    }

    /// The server's own message, if the API sent one.
    pub fn server_detail(&self) -> Option<&str> {
        match self {
            ScheduleError::Api {
                detail: Some(detail),
                ..
            } => Some(detail.as_str()),
            _ => None,
        }
    }

    /// Text suitable for an inline form error or banner.
    pub fn user_message(&self) -> String {
        match self {
            ScheduleError::Api {
                detail: Some(detail),
                ..
            } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ScheduleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ScheduleError::Decode {
                message: err.to_string(),
            };
        }
        ScheduleError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for ScheduleError {
    fn from(err: url::ParseError) -> Self {
        ScheduleError::UrlError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ScheduleError {
    fn from(err: serde_json::Error) -> Self {
        ScheduleError::Decode {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ScheduleError {
    fn from(err: std::io::Error) -> Self {
        ScheduleError::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_includes_detail() {
        let err = ScheduleError::Api {
            status: 404,
            detail: Some("Schedule not found".to_string()),
        };
        assert_eq!(err.to_string(), "API returned 404: Schedule not found");
        assert_eq!(err.user_message(), "Schedule not found");

        let bare = ScheduleError::Api {
            status: 500,
            detail: None,
        };
        assert_eq!(bare.to_string(), "API returned 500");
        assert!(bare.server_detail().is_none());
    }

    #[test]
    fn test_user_message_for_local_errors() {
        let err = ScheduleError::OperationInProgress { operation: "delete" };
        assert_eq!(err.user_message(), err.to_string());
        assert_eq!(
            ScheduleError::validation("Room number is required").user_message(),
            "Room number is required"
        );
    }
}
