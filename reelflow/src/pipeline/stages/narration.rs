use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::TemporaryResource;
use crate::errors::{JobError, StageFailure};
use crate::events::PipelineEvent;
use crate::pipeline::{PipelineContext, Stage, StageScope};
use crate::vendors::media::DEFAULT_AUDIO_TYPE;
use crate::vendors::{narration_object_path, OpenAiSpeechClient, SupabaseStorage};

/// What the background narration says.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationOptions {
    /// Spoken text; a short product greeting when unset.
    pub text: Option<String>,
    /// Product name used in the greeting and the object path.
    pub product_name: String,
}

impl NarrationOptions {
    /// Text that will be synthesized.
    #[must_use]
    pub fn spoken_text(&self) -> String {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => {
                let product = match self.product_name.trim() {
                    "" => "this amazing opportunity",
                    name => name,
                };
                format!("Welcome! Discover more about {product}.")
            }
        }
    }
}

/// Synthesizes a narration track and publishes it to storage.
///
/// Narration is an enhancement: any failure becomes a warning on the run
/// and the render proceeds without the track.
pub struct NarrationStage {
    speech: Option<Arc<OpenAiSpeechClient>>,
    storage: Option<Arc<SupabaseStorage>>,
    options: NarrationOptions,
}

impl NarrationStage {
    /// Creates the stage. Missing clients turn the stage into a warning.
    #[must_use]
    pub fn new(
        speech: Option<Arc<OpenAiSpeechClient>>,
        storage: Option<Arc<SupabaseStorage>>,
        options: NarrationOptions,
    ) -> Self {
        Self {
            speech,
            storage,
            options,
        }
    }

    async fn publish(
        &self,
        ctx: &mut PipelineContext,
        scope: &StageScope<'_>,
        speech: &OpenAiSpeechClient,
        storage: &SupabaseStorage,
    ) -> Result<String, JobError> {
        let path = speech.synthesize_to_file(&self.options.spoken_text()).await?;
        let resource = TemporaryResource::local_file(&path, scope.stage());
        scope.emit(PipelineEvent::ResourceRegistered {
            resource: resource.clone(),
        });
        ctx.register_resource(resource.clone());

        let uploaded = self.upload(&path, storage).await;

        match path.close() {
            Ok(()) => {
                ctx.release_resource(&resource.id);
                scope.emit(PipelineEvent::ResourceReclaimed { resource });
            }
            Err(e) => warn!(path = %resource.id, error = %e, "Could not remove narration scratch file"),
        }
        uploaded
    }

    async fn upload(&self, path: &Path, storage: &SupabaseStorage) -> Result<String, JobError> {
        let bytes = tokio::fs::read(path).await?;
        let object = narration_object_path(&self.options.product_name, Utc::now().timestamp());
        storage.upload_object(&object, bytes, DEFAULT_AUDIO_TYPE).await
    }
}

#[async_trait]
impl Stage for NarrationStage {
    fn name(&self) -> &str {
        "narration"
    }

    async fn execute(&self, ctx: &mut PipelineContext, scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.narration_url.is_some() {
            return Ok(());
        }
        let (Some(speech), Some(storage)) = (&self.speech, &self.storage) else {
            warn!("Narration skipped, speech or storage client not configured");
            ctx.add_warning("narration skipped: speech or storage is not configured");
            return Ok(());
        };

        match self.publish(ctx, scope, speech, storage).await {
            Ok(url) => {
                info!(url = %url, "Narration published");
                ctx.narration_url = Some(url);
            }
            Err(e) => {
                warn!(error = %e, "Narration failed, continuing without it");
                ctx.add_warning(format!("narration failed: {e}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoken_text_defaults_to_greeting() {
        let options = NarrationOptions {
            text: Some("   ".to_string()),
            product_name: "Harbor Loft".to_string(),
        };
        assert_eq!(options.spoken_text(), "Welcome! Discover more about Harbor Loft.");

        let options = NarrationOptions {
            text: Some("Custom line".to_string()),
            product_name: String::new(),
        };
        assert_eq!(options.spoken_text(), "Custom line");

        let options = NarrationOptions::default();
        assert_eq!(
            options.spoken_text(),
            "Welcome! Discover more about this amazing opportunity."
        );
    }
}
