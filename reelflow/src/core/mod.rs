//! Core job types shared by clients, the poller and the orchestrator.

mod handle;
mod resource;
mod status;

pub use handle::{JobHandle, Vendor};
pub use resource::{ResourceKind, TemporaryResource};
pub use status::{JobState, JobStatus};
