use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::ResourceKind;
use crate::errors::StageFailure;
use crate::events::PipelineEvent;
use crate::pipeline::{PipelineContext, Stage, StageScope};
use crate::vendors::HeyGenClient;

/// Deletes the temporary avatar group once the video no longer needs it.
///
/// Best effort: a failed delete is logged, recorded as a warning and left
/// registered so the caller can reclaim it later. The stage itself never
/// fails.
pub struct CleanupAvatarGroupStage {
    heygen: Arc<HeyGenClient>,
}

impl CleanupAvatarGroupStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(heygen: Arc<HeyGenClient>) -> Self {
        Self { heygen }
    }
}

#[async_trait]
impl Stage for CleanupAvatarGroupStage {
    fn name(&self) -> &str {
        "cleanup_avatar_group"
    }

    async fn execute(&self, ctx: &mut PipelineContext, scope: &StageScope<'_>) -> Result<(), StageFailure> {
        let groups: Vec<_> = ctx
            .resources()
            .iter()
            .filter(|r| r.kind == ResourceKind::AvatarGroup)
            .cloned()
            .collect();

        for group in groups {
            let reason = match self.heygen.delete_avatar_group(&group.id).await {
                Ok(true) => {
                    info!(group_id = %group.id, "Temporary avatar group deleted");
                    ctx.release_resource(&group.id);
                    scope.emit(PipelineEvent::ResourceReclaimed { resource: group });
                    continue;
                }
                Ok(false) => "HeyGen did not confirm deletion".to_string(),
                Err(e) => e.to_string(),
            };

            warn!(group_id = %group.id, reason = %reason, "Could not delete temporary avatar group");
            ctx.add_warning(format!("avatar group {} was not deleted: {reason}", group.id));
            scope.emit(PipelineEvent::ResourceLeaked {
                resource: group,
                reason,
            });
        }
        Ok(())
    }
}
