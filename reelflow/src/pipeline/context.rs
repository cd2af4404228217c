//! State threaded through one pipeline run.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::{JobHandle, TemporaryResource};

/// A cloned voice that is not usable yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlingVoice {
    /// Voice returned by the clone call.
    pub voice_id: String,
    /// When the voice may be used.
    pub ready_at: Instant,
}

/// Values produced by stages, plus the bookkeeping needed to resume a run.
///
/// A context belongs to exactly one run. Stages read what earlier stages
/// wrote and fill in their own outputs; the orchestrator never interprets
/// these fields.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Identifier of the run.
    pub run_id: Uuid,
    /// When the context was created.
    pub started_at: DateTime<Utc>,

    /// Narration script spoken by the avatar.
    pub script: Option<String>,
    /// HeyGen voice used for the avatar video.
    pub voice_id: Option<String>,
    /// Cloned voice still inside its settle delay.
    pub settling_voice: Option<SettlingVoice>,
    /// Uploaded avatar photo.
    pub image_key: Option<String>,
    /// Avatar group (temporary for a single video, persistent for training).
    pub group_id: Option<String>,
    /// Talking photo (look) used for the video.
    pub talking_photo_id: Option<String>,
    /// Finished avatar video.
    pub video_url: Option<String>,
    /// Public URL of the background narration track.
    pub narration_url: Option<String>,
    /// Looks were added to the training group.
    pub looks_added: bool,
    /// Finished training job.
    pub training_id: Option<String>,
    /// Finished Shotstack render.
    pub render_id: Option<String>,
    /// Final composed video.
    pub final_video_url: Option<String>,

    active_jobs: HashMap<String, JobHandle>,
    resources: Vec<TemporaryResource>,
    warnings: Vec<String>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    /// Creates an empty context with a fresh run id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            script: None,
            voice_id: None,
            settling_voice: None,
            image_key: None,
            group_id: None,
            talking_photo_id: None,
            video_url: None,
            narration_url: None,
            looks_added: false,
            training_id: None,
            render_id: None,
            final_video_url: None,
            active_jobs: HashMap::new(),
            resources: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Job submitted by a stage and not yet finished.
    #[must_use]
    pub fn active_job(&self, stage: &str) -> Option<&JobHandle> {
        self.active_jobs.get(stage)
    }

    /// Remembers a submitted job so an interrupted stage can resume polling it.
    pub fn begin_job(&mut self, stage: &str, handle: JobHandle) {
        self.active_jobs.insert(stage.to_string(), handle);
    }

    /// Forgets the active job of a stage.
    pub fn finish_job(&mut self, stage: &str) -> Option<JobHandle> {
        self.active_jobs.remove(stage)
    }

    /// Records a temporary resource.
    pub fn register_resource(&mut self, resource: TemporaryResource) {
        self.resources.push(resource);
    }

    /// Drops a resource record once it has been deleted.
    pub fn release_resource(&mut self, id: &str) -> Option<TemporaryResource> {
        let index = self.resources.iter().position(|r| r.id == id)?;
        Some(self.resources.remove(index))
    }

    /// Resources still allocated.
    #[must_use]
    pub fn resources(&self) -> &[TemporaryResource] {
        &self.resources
    }

    /// Removes and returns every resource record.
    pub fn take_resources(&mut self) -> Vec<TemporaryResource> {
        std::mem::take(&mut self.resources)
    }

    /// Records a non-fatal problem.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Non-fatal problems seen so far.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Vendor;

    #[test]
    fn test_active_jobs() {
        let mut ctx = PipelineContext::new();
        assert!(ctx.active_job("generate_video").is_none());

        ctx.begin_job("generate_video", JobHandle::new(Vendor::HeyGenVideo, "v-1"));
        assert_eq!(ctx.active_job("generate_video").unwrap().id, "v-1");

        let handle = ctx.finish_job("generate_video").unwrap();
        assert_eq!(handle.id, "v-1");
        assert!(ctx.active_job("generate_video").is_none());
    }

    #[test]
    fn test_resources() {
        let mut ctx = PipelineContext::new();
        ctx.register_resource(TemporaryResource::avatar_group("g-1", "prepare_avatar"));
        ctx.register_resource(TemporaryResource::avatar_group("g-2", "prepare_avatar"));

        assert_eq!(ctx.release_resource("g-1").unwrap().id, "g-1");
        assert!(ctx.release_resource("g-1").is_none());
        assert_eq!(ctx.resources().len(), 1);

        let rest = ctx.take_resources();
        assert_eq!(rest.len(), 1);
        assert!(ctx.resources().is_empty());
    }

    #[test]
    fn test_fresh_contexts_differ() {
        let a = PipelineContext::new();
        let b = PipelineContext::default();
        assert_ne!(a.run_id, b.run_id);
        assert!(a.warnings().is_empty());
    }
}
