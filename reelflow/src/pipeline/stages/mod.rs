//! Vendor-backed stages.

mod avatar;
mod cleanup;
mod narration;
mod render;
mod script;
mod training;
mod video;
mod voice;

pub use avatar::{AvatarSource, AwaitAvatarLookStage, PrepareAvatarStage};
pub use cleanup::CleanupAvatarGroupStage;
pub use narration::{NarrationOptions, NarrationStage};
pub use render::RenderCompositionStage;
pub use script::GenerateScriptStage;
pub use training::{AddLooksStage, ResolveGroupStage, TrainGroupStage, TrainingGroup};
pub use video::{GenerateVideoStage, VideoOptions};
pub use voice::{ResolveVoiceStage, VoiceSource};

use crate::errors::StageFailure;

pub(crate) fn missing(what: &str) -> StageFailure {
    StageFailure::new(format!("{what} is not available from earlier stages"))
}
