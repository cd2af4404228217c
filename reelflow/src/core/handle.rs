//! Job handles and the vendors that issue them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{JobState, JobStatus};

/// The kind of remote job a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// A HeyGen video generation.
    HeyGenVideo,
    /// A HeyGen photo-avatar group training.
    HeyGenTraining,
    /// A HeyGen photo-avatar group whose first look is being processed.
    HeyGenAvatarGroup,
    /// A Shotstack template render.
    ShotstackRender,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeyGenVideo => write!(f, "heygen_video"),
            Self::HeyGenTraining => write!(f, "heygen_training"),
            Self::HeyGenAvatarGroup => write!(f, "heygen_avatar_group"),
            Self::ShotstackRender => write!(f, "shotstack_render"),
        }
    }
}

impl Vendor {
    /// States after which polling this kind of job is meaningless.
    #[must_use]
    pub fn terminal_states(&self) -> &'static [JobState] {
        match self {
            Self::HeyGenVideo | Self::HeyGenTraining => {
                &[JobState::Completed, JobState::Failed, JobState::Error]
            }
            Self::HeyGenAvatarGroup | Self::ShotstackRender => {
                &[JobState::Completed, JobState::Failed]
            }
        }
    }

    /// Terminal predicate for this vendor, suitable for [`crate::poller::poll`].
    #[must_use]
    pub fn is_terminal(&self, status: &JobStatus) -> bool {
        self.terminal_states().contains(&status.state)
    }
}

/// Opaque reference to a remote job, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Which vendor and job kind issued the id.
    pub vendor: Vendor,
    /// The vendor's job identifier.
    pub id: String,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    /// Creates a handle stamped with the current time.
    #[must_use]
    pub fn new(vendor: Vendor, id: impl Into<String>) -> Self {
        Self {
            vendor,
            id: id.into(),
            submitted_at: Utc::now(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vendor, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_display() {
        assert_eq!(Vendor::HeyGenVideo.to_string(), "heygen_video");
        assert_eq!(Vendor::ShotstackRender.to_string(), "shotstack_render");
    }

    #[test]
    fn test_vendor_terminal_predicates() {
        let error = JobStatus::new(JobState::Error);
        assert!(Vendor::HeyGenVideo.is_terminal(&error));
        assert!(Vendor::HeyGenTraining.is_terminal(&error));
        assert!(!Vendor::ShotstackRender.is_terminal(&error));

        let done = JobStatus::completed();
        assert!(Vendor::ShotstackRender.is_terminal(&done));
        assert!(Vendor::HeyGenAvatarGroup.is_terminal(&done));
        assert!(!Vendor::HeyGenVideo.is_terminal(&JobStatus::new(JobState::Processing)));
    }

    #[test]
    fn test_handle_display() {
        let handle = JobHandle::new(Vendor::HeyGenVideo, "v-123");
        assert_eq!(handle.to_string(), "heygen_video:v-123");
    }

    #[test]
    fn test_handle_serialization() {
        let handle = JobHandle::new(Vendor::ShotstackRender, "r-1");
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["vendor"], "shotstack_render");
        assert_eq!(json["id"], "r-1");

        let back: JobHandle = serde_json::from_value(json).unwrap();
        assert_eq!(back, handle);
    }
}
