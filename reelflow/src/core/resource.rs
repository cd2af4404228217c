//! Temporary resources created during a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The kind of temporary resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A HeyGen photo-avatar group created for one video.
    AvatarGroup,
    /// A scratch file on the local filesystem.
    LocalTempFile,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AvatarGroup => write!(f, "avatar_group"),
            Self::LocalTempFile => write!(f, "local_temp_file"),
        }
    }
}

/// A vendor-side or local object created for one run and meant to be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryResource {
    /// What kind of resource this is.
    pub kind: ResourceKind,
    /// Vendor id or local path.
    pub id: String,
    /// The stage that created it.
    pub created_by_stage: String,
    /// When it was registered.
    pub created_at: DateTime<Utc>,
}

impl TemporaryResource {
    /// Creates a resource record.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            created_by_stage: stage.into(),
            created_at: Utc::now(),
        }
    }

    /// Records an avatar group.
    #[must_use]
    pub fn avatar_group(group_id: impl Into<String>, stage: impl Into<String>) -> Self {
        Self::new(ResourceKind::AvatarGroup, group_id, stage)
    }

    /// Records a local scratch file.
    #[must_use]
    pub fn local_file(path: &Path, stage: impl Into<String>) -> Self {
        Self::new(ResourceKind::LocalTempFile, path.display().to_string(), stage)
    }
}

impl fmt::Display for TemporaryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' (from {})", self.kind, self.id, self.created_by_stage)
    }
}
