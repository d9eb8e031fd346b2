//! Error types for Azure DevOps project operations.
//!
//! Errors are categorized so callers can tell an absent project apart from a
//! failed call, and a failed provisioning job apart from a slow one. Each
//! error raised inside a reconciler operation is wrapped in
//! [`Error::Context`] naming the action and the project it was acting on.

use crate::types::OperationStatus;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Result type alias for azdokit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing configuration, malformed identifiers or forbidden changes,
    /// detected before any remote call.
    Validation,
    /// The remote lookup found nothing.
    NotFound,
    /// Transport or API failure on a direct call.
    Remote,
    /// A polled operation reached `Failed` or `Cancelled`.
    OperationFailed,
    /// Polling ran out of time before a terminal status.
    Timeout,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether the error means "the resource is not there" rather than a failure.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid input",
            Self::NotFound => "Not found",
            Self::Remote => "Azure DevOps request failed",
            Self::OperationFailed => "Server-side operation failed",
            Self::Timeout => "Timed out waiting for operation",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the configuration or identifier and try again",
            Self::NotFound => "Check the project or process template name",
            Self::Remote => "Check the organization URL, the access token and your connection",
            Self::OperationFailed => "Inspect the operation message in Azure DevOps",
            Self::Timeout => "The job keeps running server-side; raise the timeout or check later",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while managing projects.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required connection settings are missing or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An identifier is not a well-formed GUID.
    #[error("invalid {kind} identifier {value:?}: expected a GUID")]
    InvalidId {
        /// What the identifier names ("project", "process template").
        kind: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A field that is fixed at creation was changed.
    #[error("{field} cannot change after creation ({from} -> {to}); the project must be replaced")]
    Immutable {
        /// Field name.
        field: &'static str,
        /// Recorded value.
        from: String,
        /// Desired value.
        to: String,
    },

    /// The remote lookup found nothing.
    #[error("{what} not found: {key}")]
    NotFound {
        /// Kind of thing looked up.
        what: &'static str,
        /// Name or identifier used for the lookup.
        key: String,
        /// Remote error behind the miss, if any.
        #[source]
        source: Option<Box<Error>>,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Invalid response from the API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// A polled operation ended in `Failed` or `Cancelled`.
    #[error("operation {operation_id} ended as {status}: {}", detail(.message))]
    OperationFailed {
        /// Operation identifier.
        operation_id: Uuid,
        /// Terminal status observed.
        status: OperationStatus,
        /// Detailed message reported by the server.
        message: Option<String>,
    },

    /// Polling exceeded the allotted wait.
    #[error(
        "timed out after {}s waiting for operation {operation_id} (last status: {})",
        .elapsed.as_secs(),
        last(.last_status)
    )]
    Timeout {
        /// Operation identifier.
        operation_id: Uuid,
        /// Time spent waiting.
        elapsed: Duration,
        /// Last status seen, if any poll happened.
        last_status: Option<OperationStatus>,
    },

    /// The operation reported a status in neither the pending nor the terminal set.
    #[error("operation {operation_id} reported unexpected status {status}")]
    UnexpectedStatus {
        /// Operation identifier.
        operation_id: Uuid,
        /// The status that was reported.
        status: OperationStatus,
    },

    /// An error annotated with the action and target it happened in.
    #[error("{action} {target}: {source}")]
    Context {
        /// What was being done ("creating project").
        action: &'static str,
        /// Which project or identifier.
        target: String,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

fn detail(message: &Option<String>) -> &str {
    message.as_deref().unwrap_or("no details reported")
}

fn last(status: &Option<OperationStatus>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// Create a not-found error without an underlying cause.
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
            source: None,
        }
    }

    /// Annotate this error with the action and target it happened in.
    pub fn context(self, action: &'static str, target: impl Into<String>) -> Self {
        Self::Context {
            action,
            target: target.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through [`Error::Context`] wrappers.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self.root() {
            Error::InvalidConfig(_) | Error::InvalidId { .. } | Error::Immutable { .. } => {
                ErrorCategory::Validation
            }
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::HttpError { status: Some(404), .. } => ErrorCategory::NotFound,
            Error::HttpError { .. } | Error::InvalidResponse(_) => ErrorCategory::Remote,
            Error::UnexpectedStatus { .. } => ErrorCategory::Remote,
            Error::OperationFailed { .. } => ErrorCategory::OperationFailed,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Context { .. } | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error means the looked-up resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category().is_absent()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::HttpError {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_absent() {
        assert!(ErrorCategory::NotFound.is_absent());
        assert!(!ErrorCategory::Remote.is_absent());
        assert!(!ErrorCategory::Validation.is_absent());
        assert!(!ErrorCategory::Timeout.is_absent());
    }

    #[test]
    fn test_error_category_text() {
        assert!(!ErrorCategory::Timeout.description().is_empty());
        assert!(!ErrorCategory::Timeout.advice().is_empty());
        assert!(format!("{}", ErrorCategory::NotFound).contains("Not found"));
    }

    #[test]
    fn test_http_404_is_not_found() {
        let err = Error::http("HTTP 404", Some(404));
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(err.is_not_found());

        let err = Error::http("HTTP 500", Some(500));
        assert_eq!(err.category(), ErrorCategory::Remote);
    }

    #[test]
    fn test_validation_category() {
        let err = Error::InvalidId {
            kind: "project",
            value: "nope".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.to_string().contains("nope"));

        let err = Error::InvalidConfig("the personal access token is required".to_string());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_context_keeps_category() {
        let err = Error::not_found("project", "Proj1").context("reading project", "Proj1");
        assert_eq!(err.category(), ErrorCategory::NotFound);
        let display = err.to_string();
        assert!(display.starts_with("reading project Proj1"));
        assert!(matches!(err.root(), Error::NotFound { .. }));
    }

    #[test]
    fn test_operation_failed_display() {
        let err = Error::OperationFailed {
            operation_id: Uuid::nil(),
            status: OperationStatus::Failed,
            message: Some("template missing".to_string()),
        };
        assert_eq!(err.category(), ErrorCategory::OperationFailed);
        let display = err.to_string();
        assert!(display.contains("failed"));
        assert!(display.contains("template missing"));

        let err = Error::OperationFailed {
            operation_id: Uuid::nil(),
            status: OperationStatus::Cancelled,
            message: None,
        };
        assert!(err.to_string().contains("no details reported"));
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            operation_id: Uuid::nil(),
            elapsed: Duration::from_secs(600),
            last_status: Some(OperationStatus::InProgress),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);
        let display = err.to_string();
        assert!(display.contains("600s"));
        assert!(display.contains("inProgress"));

        let err = Error::Timeout {
            operation_id: Uuid::nil(),
            elapsed: Duration::from_secs(1),
            last_status: None,
        };
        assert!(err.to_string().contains("last status: none"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.category(), ErrorCategory::Remote);
    }
}
