//! Normalised job state and status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor-neutral state of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted but not started.
    Pending,
    /// Work in progress.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully as reported by the vendor.
    Failed,
    /// The vendor reported an error condition for the job.
    Error,
}

impl Default for JobState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl JobState {
    /// Returns true if the state represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Error)
    }

    /// Returns true if the state indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the state indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

/// A single observation of a remote job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// The normalised state.
    pub state: JobState,

    /// URL of the finished artifact, when the vendor returns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,

    /// Identifier of the finished artifact, when the vendor returns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,

    /// Vendor-provided failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// The literal status string the vendor used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
}

impl JobStatus {
    /// Creates a status in the given state.
    #[must_use]
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Creates a completed status.
    #[must_use]
    pub fn completed() -> Self {
        Self::new(JobState::Completed)
    }

    /// Creates a failed status with detail.
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::new(JobState::Failed).with_error_detail(detail)
    }

    /// Sets the result URL.
    #[must_use]
    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    /// Sets the result identifier.
    #[must_use]
    pub fn with_result_id(mut self, id: impl Into<String>) -> Self {
        self.result_id = Some(id.into());
        self
    }

    /// Sets the error detail.
    #[must_use]
    pub fn with_error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    /// Sets the raw vendor status.
    #[must_use]
    pub fn with_raw_status(mut self, raw: impl Into<String>) -> Self {
        self.raw_status = Some(raw.into());
        self
    }

    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Short description for logs and timeout messages, e.g. `processing (rendering)`.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.raw_status {
            Some(raw) if !raw.is_empty() => format!("{} ({raw})", self.state),
            _ => self.state.to_string(),
        }
    }

    /// Reason to surface when a terminal status is not a success.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        match &self.error_detail {
            Some(detail) if !detail.is_empty() => {
                format!("job ended in state '{}': {detail}", self.describe())
            }
            _ => format!("job ended in state '{}' without details", self.describe()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_display() {
        assert_eq!(JobState::Pending.to_string(), "pending");
        assert_eq!(JobState::Completed.to_string(), "completed");
        assert_eq!(JobState::Error.to_string(), "error");
    }

    #[test]
    fn test_job_state_is_terminal() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
    }

    #[test]
    fn test_job_state_serialize() {
        let json = serde_json::to_string(&JobState::Processing).unwrap();
        assert_eq!(json, r#""processing""#);
    }

    #[test]
    fn test_status_describe() {
        let status = JobStatus::new(JobState::Processing).with_raw_status("rendering");
        assert_eq!(status.describe(), "processing (rendering)");
        assert_eq!(JobStatus::completed().describe(), "completed");
    }

    #[test]
    fn test_failure_reason_includes_detail() {
        let status = JobStatus::failed("bad photo").with_raw_status("Failed");
        let reason = status.failure_reason();
        assert!(reason.contains("bad photo"));
        assert!(reason.contains("failed (Failed)"));
    }

    #[test]
    fn test_status_serialization_skips_empty_fields() {
        let json = serde_json::to_value(JobStatus::completed().with_result_url("https://x/y.mp4"))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "completed", "result_url": "https://x/y.mp4"})
        );
    }
}
