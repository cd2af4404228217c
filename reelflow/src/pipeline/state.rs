//! Orchestrator states, run outcomes and progress snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a pipeline is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// Ready to run from `entry`.
    Idle {
        /// Index of the next stage to execute.
        entry: usize,
    },
    /// A stage is executing.
    Running {
        /// Stage index.
        index: usize,
        /// Stage name.
        stage: String,
    },
    /// Every stage succeeded.
    Done,
    /// A stage failed; later stages did not run.
    Failed {
        /// Index of the failed stage.
        index: usize,
        /// Stage name.
        stage: String,
        /// Failure reason, verbatim.
        reason: String,
    },
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle { entry: 0 }
    }
}

impl PipelineState {
    /// Short label: `idle`, `running`, `done` or `failed`.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "idle",
            Self::Running { .. } => "running",
            Self::Done => "done",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the state is `Done` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle { entry } => write!(f, "idle (next stage #{entry})"),
            Self::Running { stage, .. } => write!(f, "running {stage}"),
            Self::Done => write!(f, "done"),
            Self::Failed { stage, reason, .. } => write!(f, "failed at {stage}: {reason}"),
        }
    }
}

/// How one call to `run` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All stages succeeded.
    Done,
    /// A stage failed.
    Failed {
        /// Stage name.
        stage: String,
        /// Failure reason.
        reason: String,
    },
    /// The run was cancelled; the pipeline is idle at the interrupted stage.
    Cancelled {
        /// The interrupted stage.
        stage: String,
    },
}

impl RunOutcome {
    /// Whether the run completed every stage.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Read-only view of a run for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Pipeline name.
    pub pipeline: String,
    /// Run identifier.
    pub run_id: Uuid,
    /// Current state.
    pub state: PipelineState,
    /// Stage running, failed or next to run.
    pub current_stage: Option<String>,
    /// Failure reason of the last failed stage.
    pub last_error: Option<String>,
    /// Narration script.
    pub script: Option<String>,
    /// Voice in use.
    pub voice_id: Option<String>,
    /// Talking photo in use.
    pub talking_photo_id: Option<String>,
    /// Avatar video.
    pub video_url: Option<String>,
    /// Background narration.
    pub narration_url: Option<String>,
    /// Final composed video.
    pub final_video_url: Option<String>,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
    /// When the snapshot was taken.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_display() {
        assert_eq!(PipelineState::default(), PipelineState::Idle { entry: 0 });
        assert_eq!(PipelineState::Done.label(), "done");
        let failed = PipelineState::Failed {
            index: 2,
            stage: "generate_video".to_string(),
            reason: "HTTP 500: boom".to_string(),
        };
        assert!(failed.is_terminal());
        assert_eq!(failed.to_string(), "failed at generate_video: HTTP 500: boom");
        assert!(!PipelineState::Idle { entry: 3 }.is_terminal());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(PipelineState::Running {
            index: 1,
            stage: "await_look".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "running", "index": 1, "stage": "await_look"})
        );
    }
}
