use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::errors::StageFailure;
use crate::pipeline::{PipelineContext, SettlingVoice, Stage, StageScope};
use crate::vendors::{HeyGenClient, VoiceSample};

/// Where the avatar's voice comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSource {
    /// An existing HeyGen voice.
    Existing(String),
    /// Clone a new voice from a sample.
    Clone(VoiceSample),
}

/// Resolves the voice id, cloning one if asked to.
///
/// A freshly cloned voice is not usable immediately; the stage waits
/// `settle` before handing it on. The clone is recorded before the wait, so
/// an interrupted stage only finishes waiting when it runs again.
pub struct ResolveVoiceStage {
    heygen: Arc<HeyGenClient>,
    source: VoiceSource,
    settle: Duration,
}

impl ResolveVoiceStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(heygen: Arc<HeyGenClient>, source: VoiceSource, settle: Duration) -> Self {
        Self {
            heygen,
            source,
            settle,
        }
    }
}

#[async_trait]
impl Stage for ResolveVoiceStage {
    fn name(&self) -> &str {
        "resolve_voice"
    }

    async fn execute(&self, ctx: &mut PipelineContext, scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.voice_id.is_some() {
            return Ok(());
        }
        match &self.source {
            VoiceSource::Existing(id) if id.trim().is_empty() => {
                Err(StageFailure::new("no voice id was supplied"))
            }
            VoiceSource::Existing(id) => {
                ctx.voice_id = Some(id.clone());
                Ok(())
            }
            VoiceSource::Clone(sample) => {
                let pending = match ctx.settling_voice.clone() {
                    Some(pending) => pending,
                    None => {
                        let voice_id = self.heygen.clone_voice(sample).await?;
                        let pending = SettlingVoice {
                            voice_id,
                            ready_at: Instant::now() + self.settle,
                        };
                        ctx.settling_voice = Some(pending.clone());
                        pending
                    }
                };

                let remaining = pending.ready_at.saturating_duration_since(Instant::now());
                info!(voice_id = %pending.voice_id, settle_secs = remaining.as_secs_f64(), "Waiting for cloned voice");
                scope.pause(remaining).await?;
                ctx.settling_voice = None;
                ctx.voice_id = Some(pending.voice_id);
                Ok(())
            }
        }
    }
}
