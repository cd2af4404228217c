//! Stage-by-stage orchestration of vendor jobs.
//!
//! An [`Orchestrator`] runs [`Stage`]s in order over a single
//! [`PipelineContext`]. Stages submit jobs and poll them through
//! [`StageScope::track_job`], which records the handle so a cancelled run
//! resumes polling instead of submitting twice.

mod context;
mod orchestrator;
mod presets;
mod stage;
pub mod stages;
mod state;


pub use context::{PipelineContext, SettlingVoice};
pub use orchestrator::Orchestrator;
pub use presets::{
    avatar_video_pipeline, group_training_pipeline, render_pipeline, AvatarVideoRequest,
    TrainingRequest, VendorClients,
};
pub use stage::{CompletedJob, Stage, StageScope};
pub use stages::{
    AvatarSource, NarrationOptions, TrainingGroup, VideoOptions, VoiceSource,
};
pub use state::{PipelineState, RunOutcome, RunSnapshot};
