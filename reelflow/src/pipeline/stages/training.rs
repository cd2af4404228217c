use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::missing;
use crate::errors::StageFailure;
use crate::pipeline::{PipelineContext, Stage, StageScope};
use crate::poller::PollPolicy;
use crate::vendors::HeyGenClient;

/// The group a training run works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingGroup {
    /// Train an existing group.
    Existing(String),
    /// Create a group from an uploaded image.
    New {
        /// Group name.
        name: String,
        /// Image key of the first look.
        image_key: String,
    },
}

/// Picks or creates the group to train. Training groups are persistent and
/// never registered for cleanup.
pub struct ResolveGroupStage {
    heygen: Arc<HeyGenClient>,
    group: TrainingGroup,
}

impl ResolveGroupStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(heygen: Arc<HeyGenClient>, group: TrainingGroup) -> Self {
        Self { heygen, group }
    }
}

#[async_trait]
impl Stage for ResolveGroupStage {
    fn name(&self) -> &str {
        "resolve_group"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.group_id.is_some() {
            return Ok(());
        }
        let group_id = match &self.group {
            TrainingGroup::Existing(id) if id.trim().is_empty() => {
                return Err(StageFailure::new("no group id was supplied"));
            }
            TrainingGroup::Existing(id) => id.clone(),
            TrainingGroup::New { name, image_key } => {
                ctx.image_key = Some(image_key.clone());
                self.heygen.create_avatar_group(name, image_key).await?
            }
        };
        ctx.group_id = Some(group_id);
        Ok(())
    }
}

/// Adds extra looks to the group before training.
pub struct AddLooksStage {
    heygen: Arc<HeyGenClient>,
    image_keys: Vec<String>,
    name: String,
}

impl AddLooksStage {
    /// Creates the stage. With no keys the stage does nothing.
    #[must_use]
    pub fn new(heygen: Arc<HeyGenClient>, image_keys: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            heygen,
            image_keys,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Stage for AddLooksStage {
    fn name(&self) -> &str {
        "add_looks"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.looks_added || self.image_keys.is_empty() {
            return Ok(());
        }
        let group_id = ctx.group_id.as_deref().ok_or_else(|| missing("group id"))?;
        self.heygen.add_looks(group_id, &self.image_keys, &self.name).await?;
        ctx.looks_added = true;
        Ok(())
    }
}

/// Starts training and polls it to completion.
pub struct TrainGroupStage {
    heygen: Arc<HeyGenClient>,
    policy: PollPolicy,
}

impl TrainGroupStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(heygen: Arc<HeyGenClient>, policy: PollPolicy) -> Self {
        Self { heygen, policy }
    }
}

#[async_trait]
impl Stage for TrainGroupStage {
    fn name(&self) -> &str {
        "train_group"
    }

    async fn execute(&self, ctx: &mut PipelineContext, scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.training_id.is_some() {
            return Ok(());
        }
        let group_id = ctx.group_id.clone().ok_or_else(|| missing("group id"))?;
        let client = Arc::clone(&self.heygen);

        let job = scope
            .track_job(ctx, self.heygen.as_ref(), &self.policy, move || async move {
                client.train_group(&group_id).await
            })
            .await?;

        info!(training_id = %job.handle.id, "Avatar group trained");
        ctx.training_id = Some(job.handle.id);
        Ok(())
    }
}
