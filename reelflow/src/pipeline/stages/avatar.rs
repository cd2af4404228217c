use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::missing;
use crate::core::{JobHandle, TemporaryResource, Vendor};
use crate::errors::{JobError, StageFailure};
use crate::events::PipelineEvent;
use crate::pipeline::{PipelineContext, Stage, StageScope};
use crate::poller::PollPolicy;
use crate::vendors::HeyGenClient;

/// Where the avatar's face comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum AvatarSource {
    /// An existing talking photo.
    TalkingPhoto(String),
    /// A photo to upload into a temporary avatar group.
    Photo {
        /// Original filename; its extension decides the content type.
        filename: String,
        /// Image bytes.
        data: Vec<u8>,
    },
}

impl fmt::Debug for AvatarSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TalkingPhoto(id) => f.debug_tuple("TalkingPhoto").field(id).finish(),
            Self::Photo { filename, data } => f
                .debug_struct("Photo")
                .field("filename", filename)
                .field("bytes", &data.len())
                .finish(),
        }
    }
}

/// Uploads the avatar photo and creates a temporary avatar group for it, or
/// passes an existing talking photo through.
pub struct PrepareAvatarStage {
    heygen: Arc<HeyGenClient>,
    source: AvatarSource,
    group_name: String,
}

impl PrepareAvatarStage {
    /// Creates the stage; `group_name` names the temporary group.
    #[must_use]
    pub fn new(heygen: Arc<HeyGenClient>, source: AvatarSource, group_name: impl Into<String>) -> Self {
        Self {
            heygen,
            source,
            group_name: group_name.into(),
        }
    }
}

#[async_trait]
impl Stage for PrepareAvatarStage {
    fn name(&self) -> &str {
        "prepare_avatar"
    }

    async fn execute(&self, ctx: &mut PipelineContext, scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.talking_photo_id.is_some() || ctx.group_id.is_some() {
            return Ok(());
        }

        match &self.source {
            AvatarSource::TalkingPhoto(id) if id.trim().is_empty() => {
                Err(StageFailure::new("no talking photo id was supplied"))
            }
            AvatarSource::TalkingPhoto(id) => {
                ctx.talking_photo_id = Some(id.clone());
                Ok(())
            }
            AvatarSource::Photo { filename, data } => {
                let image_key = match &ctx.image_key {
                    Some(key) => key.clone(),
                    None => {
                        let key = self.heygen.upload_asset(data.clone(), filename).await?;
                        ctx.image_key = Some(key.clone());
                        key
                    }
                };

                let group_id = self
                    .heygen
                    .create_avatar_group(&self.group_name, &image_key)
                    .await?;
                let resource = TemporaryResource::avatar_group(&group_id, scope.stage());
                info!(group_id = %group_id, "Temporary avatar group registered");
                scope.emit(PipelineEvent::ResourceRegistered {
                    resource: resource.clone(),
                });
                ctx.register_resource(resource);
                ctx.group_id = Some(group_id);
                Ok(())
            }
        }
    }
}

/// Polls the temporary group until its first look is ready and records the
/// look as the talking photo.
pub struct AwaitAvatarLookStage {
    heygen: Arc<HeyGenClient>,
    policy: PollPolicy,
}

impl AwaitAvatarLookStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(heygen: Arc<HeyGenClient>, policy: PollPolicy) -> Self {
        Self { heygen, policy }
    }
}

#[async_trait]
impl Stage for AwaitAvatarLookStage {
    fn name(&self) -> &str {
        "await_avatar_look"
    }

    async fn execute(&self, ctx: &mut PipelineContext, scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.talking_photo_id.is_some() {
            return Ok(());
        }
        let group_id = ctx.group_id.clone().ok_or_else(|| missing("avatar group id"))?;

        let job = scope
            .track_job(ctx, self.heygen.as_ref(), &self.policy, move || async move {
                Ok::<_, JobError>(JobHandle::new(Vendor::HeyGenAvatarGroup, group_id))
            })
            .await?;

        let look_id = job
            .status
            .result_id
            .ok_or_else(|| StageFailure::new("avatar look is ready but has no id"))?;
        info!(look_id = %look_id, "Avatar look ready");
        ctx.talking_photo_id = Some(look_id);
        Ok(())
    }
}
