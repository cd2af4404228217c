use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::missing;
use crate::errors::StageFailure;
use crate::pipeline::{PipelineContext, Stage, StageScope};
use crate::poller::PollPolicy;
use crate::vendors::{HeyGenClient, VideoDimension, VideoRequest};

/// Presentation options for the avatar video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOptions {
    /// Video title shown in the HeyGen dashboard.
    pub title: String,
    /// Burn in captions.
    pub caption: bool,
    /// Watermarked test render that does not consume credits.
    pub test: bool,
    /// Output size.
    pub dimension: VideoDimension,
    /// Stock avatar used when no talking photo is available.
    pub avatar_id: Option<String>,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            title: "Reelflow video".to_string(),
            caption: false,
            test: false,
            dimension: VideoDimension::default(),
            avatar_id: None,
        }
    }
}

/// Submits the avatar video and polls it until HeyGen reports a result.
pub struct GenerateVideoStage {
    heygen: Arc<HeyGenClient>,
    options: VideoOptions,
    policy: PollPolicy,
}

impl GenerateVideoStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(heygen: Arc<HeyGenClient>, options: VideoOptions, policy: PollPolicy) -> Self {
        Self {
            heygen,
            options,
            policy,
        }
    }

    fn request(&self, ctx: &PipelineContext) -> Result<VideoRequest, StageFailure> {
        let voice_id = ctx.voice_id.as_deref().ok_or_else(|| missing("voice id"))?;
        let script = ctx.script.as_deref().ok_or_else(|| missing("script"))?;

        let mut request = VideoRequest::new(voice_id, script)
            .with_title(&self.options.title)
            .with_caption(self.options.caption)
            .with_test_mode(self.options.test)
            .with_dimension(self.options.dimension);
        if let Some(id) = &ctx.talking_photo_id {
            request = request.with_talking_photo(id);
        }
        if let Some(id) = &self.options.avatar_id {
            request = request.with_avatar(id);
        }
        request.validate()?;
        Ok(request)
    }
}

#[async_trait]
impl Stage for GenerateVideoStage {
    fn name(&self) -> &str {
        "generate_video"
    }

    async fn execute(&self, ctx: &mut PipelineContext, scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.video_url.is_some() {
            return Ok(());
        }
        let request = self.request(ctx)?;
        let client = Arc::clone(&self.heygen);

        let job = scope
            .track_job(ctx, self.heygen.as_ref(), &self.policy, move || async move {
                client.generate_video(&request).await
            })
            .await?;

        let url = job.status.result_url.ok_or_else(|| {
            StageFailure::new(format!("video {} completed without a video_url", job.handle.id))
        })?;
        info!(video_id = %job.handle.id, url = %url, "Avatar video ready");
        ctx.video_url = Some(url);
        Ok(())
    }
}
