//! Error types for reelflow.
//!
//! Vendor failures are normalised into [`JobError`] at the client boundary.
//! Polling adds [`PollError`]. Stages report a [`StageFailure`], which the
//! orchestrator records on the run instead of propagating.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::core::JobStatus;

/// Maximum number of characters of a response body kept in an error.
const MAX_BODY_CHARS: usize = 500;

/// The main error type for reelflow operations.
#[derive(Debug, Error)]
pub enum ReelflowError {
    /// A vendor call failed.
    #[error("{0}")]
    Job(#[from] JobError),

    /// A polling loop did not reach a terminal state.
    #[error("{0}")]
    Poll(#[from] PollError),

    /// The orchestrator was driven from an invalid state.
    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A background session ended without an outcome.
    #[error("{0}")]
    Session(#[from] crate::session::SessionError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uniform error shape for every vendor operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Required input was missing or invalid. No request was sent.
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// The vendor answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The (truncated) response body.
        body: String,
    },

    /// The vendor answered 2xx with a body that could not be decoded.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// What could not be decoded.
        message: String,
    },

    /// The vendor answered with a well-formed body lacking the success marker.
    #[error("Vendor rejected request: {message}")]
    VendorRejected {
        /// The vendor's own message, or a generic fallback.
        message: String,
    },

    /// A file was offered with a media type the operation does not accept.
    #[error("Unsupported media type '{content_type}' for '{filename}'")]
    UnsupportedMediaType {
        /// The offending filename.
        filename: String,
        /// The detected content type.
        content_type: String,
    },

    /// The request never produced an HTTP response.
    #[error("Transport error: {message}")]
    Transport {
        /// The underlying client error.
        message: String,
    },

    /// A local file operation failed.
    #[error("IO error: {message}")]
    Io {
        /// The underlying IO error.
        message: String,
    },
}

impl JobError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an HTTP error, truncating long bodies.
    #[must_use]
    pub fn http(status: u16, body: impl AsRef<str>) -> Self {
        let body = body.as_ref();
        let body = if body.chars().count() > MAX_BODY_CHARS {
            let mut truncated: String = body.chars().take(MAX_BODY_CHARS).collect();
            truncated.push_str("...");
            truncated
        } else {
            body.to_string()
        };
        Self::Http { status, body }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Creates a vendor rejection error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::VendorRejected {
            message: message.into(),
        }
    }

    /// Creates an unsupported media type error.
    #[must_use]
    pub fn unsupported_media_type(
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self::UnsupportedMediaType {
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an IO error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Returns a short machine-friendly name for the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Http { .. } => "http",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::VendorRejected { .. } => "vendor_rejected",
            Self::UnsupportedMediaType { .. } => "unsupported_media_type",
            Self::Transport { .. } => "transport",
            Self::Io { .. } => "io",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::Http { status, .. } = self {
            map.insert("status".to_string(), serde_json::json!(status));
        }
        map
    }
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Errors produced by the polling loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError {
    /// The attempt budget ran out before a terminal state was observed.
    #[error(
        "No terminal status after {attempts} attempts at {}s intervals (last status: {})",
        .delay.as_secs_f64(),
        describe_last(.last_status.as_ref(), .last_error.as_deref())
    )]
    Timeout {
        /// Number of status fetches made.
        attempts: u32,
        /// Delay between attempts.
        delay: Duration,
        /// The last status observed, if any fetch succeeded.
        last_status: Option<JobStatus>,
        /// The last fetch error, if any fetch failed.
        last_error: Option<String>,
    },

    /// Cancellation was requested between attempts.
    #[error("Polling cancelled after {attempts} attempts")]
    Cancelled {
        /// Number of status fetches made before cancellation.
        attempts: u32,
        /// The cancellation reason, if one was given.
        reason: Option<String>,
    },
}

fn describe_last(status: Option<&JobStatus>, error: Option<&str>) -> String {
    match (status, error) {
        (Some(status), _) => status.describe(),
        (None, Some(error)) => format!("fetch failed: {error}"),
        (None, None) => "none".to_string(),
    }
}

impl PollError {
    /// Returns true if the poll ended because of cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Why a stage did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct StageFailure {
    /// Human-readable reason surfaced to the operator verbatim.
    pub reason: String,
    /// True when the stage stopped because the run was cancelled.
    pub cancelled: bool,
}

impl StageFailure {
    /// Creates a failure with a reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            cancelled: false,
        }
    }

    /// Creates a failure caused by cancellation.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            cancelled: true,
        }
    }
}

impl From<JobError> for StageFailure {
    fn from(err: JobError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<PollError> for StageFailure {
    fn from(err: PollError) -> Self {
        match &err {
            PollError::Cancelled { reason, .. } => Self::cancelled(
                reason
                    .clone()
                    .unwrap_or_else(|| err.to_string()),
            ),
            PollError::Timeout { .. } => Self::new(err.to_string()),
        }
    }
}

/// Misuse of the orchestrator state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// A run was requested while the pipeline was not idle.
    #[error("Pipeline '{pipeline}' cannot start from state '{state}'; reset or retry first")]
    NotIdle {
        /// The pipeline name.
        pipeline: String,
        /// The current state label.
        state: String,
    },

    /// A retry was requested but no stage has failed.
    #[error("Pipeline '{pipeline}' has no failed stage to retry (state '{state}')")]
    NothingToRetry {
        /// The pipeline name.
        pipeline: String,
        /// The current state label.
        state: String,
    },

    /// The pipeline has no stages.
    #[error("Pipeline '{pipeline}' has no stages")]
    Empty {
        /// The pipeline name.
        pipeline: String,
    },

    /// The background task driving the run did not finish normally.
    #[error("Pipeline task aborted: {message}")]
    TaskAborted {
        /// The join error.
        message: String,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable was set to a value that could not be parsed.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// The variable name.
        key: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required variable was not set.
    #[error("Missing required setting {key}")]
    Missing {
        /// The variable name.
        key: String,
    },

    /// The tracing subscriber could not be installed.
    #[error("Logging setup failed: {message}")]
    Logging {
        /// The underlying error.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing setting error.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }
}
