use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::errors::StageFailure;
use crate::pipeline::{PipelineContext, Stage, StageScope};
use crate::vendors::{GeminiClient, ScriptSizing};

/// Produces the narration script, either supplied by the caller or written
/// by Gemini from the property description.
pub struct GenerateScriptStage {
    gemini: Option<Arc<GeminiClient>>,
    description: String,
    provided: Option<String>,
    sizing: ScriptSizing,
}

impl GenerateScriptStage {
    /// Generates a script from a description.
    #[must_use]
    pub fn new(gemini: Option<Arc<GeminiClient>>, description: impl Into<String>, sizing: ScriptSizing) -> Self {
        Self {
            gemini,
            description: description.into(),
            provided: None,
            sizing,
        }
    }

    /// Uses a caller-supplied script instead of generating one.
    #[must_use]
    pub fn with_provided(mut self, script: Option<String>) -> Self {
        self.provided = script.filter(|s| !s.trim().is_empty());
        self
    }
}

#[async_trait]
impl Stage for GenerateScriptStage {
    fn name(&self) -> &str {
        "generate_script"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _scope: &StageScope<'_>) -> Result<(), StageFailure> {
        if ctx.script.is_some() {
            return Ok(());
        }
        if let Some(script) = &self.provided {
            info!(words = script.split_whitespace().count(), "Using supplied script");
            ctx.script = Some(script.trim().to_string());
            return Ok(());
        }

        let gemini = self
            .gemini
            .as_ref()
            .ok_or_else(|| StageFailure::new("no script was supplied and Gemini is not configured"))?;
        ctx.script = Some(gemini.generate_script(&self.description, &self.sizing).await?);
        Ok(())
    }
}
