use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::missing;
use crate::errors::StageFailure;
use crate::pipeline::{PipelineContext, Stage, StageScope};
use crate::poller::PollPolicy;
use crate::vendors::{RenderTemplate, ShotstackClient};

/// Merge field that receives the avatar video.
pub const AVATAR_VIDEO_FIELD: &str = "AVATAR_VIDEO";
/// Merge field that receives the narration track.
pub const NARRATION_FIELD: &str = "NARRATION_AUDIO_SRC";

/// Renders the Shotstack template around the avatar video.
pub struct RenderCompositionStage {
    shotstack: Arc<ShotstackClient>,
    template: RenderTemplate,
    policy: PollPolicy,
    require_video: bool,
}

impl RenderCompositionStage {
    /// Creates a stage that places the avatar video into `template`.
    #[must_use]
    pub fn new(shotstack: Arc<ShotstackClient>, template: RenderTemplate, policy: PollPolicy) -> Self {
        Self {
            shotstack,
            template,
            policy,
            require_video: true,
        }
    }

    /// Renders the template as given, without an avatar video.
    #[must_use]
    pub fn standalone(mut self) -> Self {
        self.require_video = false;
        self
    }

    fn template_for(&self, ctx: &PipelineContext) -> Result<RenderTemplate, StageFailure> {
        let mut template = self.template.clone();
        match &ctx.video_url {
            Some(url) => template.upsert(AVATAR_VIDEO_FIELD, url.clone()),
            None if self.require_video => return Err(missing("avatar video url")),
            None => {}
        }
        if let Some(url) = &ctx.narration_url {
            template.upsert(NARRATION_FIELD, url.clone());
        }
        Ok(template)
    }
}

#[async_trait]
impl Stage for RenderCompositionStage {
    fn name(&self) -> &str {
        "render_composition"
    }

    async fn execute(&self, ctx: &mut PipelineContext, scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.final_video_url.is_some() {
            return Ok(());
        }
        let template = self.template_for(ctx)?;
        let client = Arc::clone(&self.shotstack);

        let job = scope
            .track_job(ctx, self.shotstack.as_ref(), &self.policy, move || async move {
                client.render(&template).await
            })
            .await?;

        let url = job.status.result_url.ok_or_else(|| {
            StageFailure::new(format!("render {} finished without a url", job.handle.id))
        })?;
        info!(render_id = %job.handle.id, url = %url, "Composition rendered");
        ctx.render_id = Some(job.handle.id);
        ctx.final_video_url = Some(url);
        Ok(())
    }
}
