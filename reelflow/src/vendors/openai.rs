//! OpenAI text-to-speech client.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::info;

use super::require_key;
use crate::errors::JobError;
use crate::http::envelope::ensure_success;
use crate::http::{ContentPolicy, HttpRequest, HttpTransport};

/// Default API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default voice.
pub const DEFAULT_TTS_VOICE: &str = "alloy";
/// Default model.
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

const VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];
const MODELS: &[&str] = &["tts-1", "tts-1-hd"];

/// Client for `audio/speech`.
pub struct OpenAiSpeechClient {
    transport: Arc<dyn HttpTransport>,
    api_key: SecretString,
    base_url: String,
    voice: String,
    model: String,
}

impl fmt::Debug for OpenAiSpeechClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSpeechClient")
            .field("base_url", &self.base_url)
            .field("voice", &self.voice)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiSpeechClient {
    /// Creates a client with the default voice and model.
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: SecretString) -> Result<Self, JobError> {
        require_key(&api_key, "OpenAI")?;
        Ok(Self {
            transport,
            api_key,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            voice: DEFAULT_TTS_VOICE.to_string(),
            model: DEFAULT_TTS_MODEL.to_string(),
        })
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Selects a voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Result<Self, JobError> {
        let voice = voice.into();
        if !VOICES.contains(&voice.as_str()) {
            return Err(JobError::validation(format!(
                "unknown TTS voice '{voice}' (expected one of {})",
                VOICES.join(", ")
            )));
        }
        self.voice = voice;
        Ok(self)
    }

    /// Selects a model.
    pub fn with_model(mut self, model: impl Into<String>) -> Result<Self, JobError> {
        let model = model.into();
        if !MODELS.contains(&model.as_str()) {
            return Err(JobError::validation(format!(
                "unknown TTS model '{model}' (expected one of {})",
                MODELS.join(", ")
            )));
        }
        self.model = model;
        Ok(self)
    }

    /// Synthesises MP3 audio for a text.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, JobError> {
        if text.trim().is_empty() {
            return Err(JobError::validation("speech synthesis needs text"));
        }

        let request = HttpRequest::post(format!("{}/audio/speech", self.base_url.trim_end_matches('/')))
            .with_header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .with_policy(ContentPolicy::Json)
            .with_json(json!({
                "model": self.model,
                "voice": self.voice,
                "input": text,
                "response_format": "mp3",
            }));
        let response = self.transport.send(request).await?;
        ensure_success(&response)?;
        if response.body.is_empty() {
            return Err(JobError::malformed("speech synthesis returned no audio"));
        }

        info!(voice = %self.voice, model = %self.model, bytes = response.body.len(), "Synthesised speech");
        Ok(response.body)
    }

    /// Synthesises speech into a fresh `.mp3` scratch file.
    ///
    /// The file is removed when the returned path is dropped.
    pub async fn synthesize_to_file(&self, text: &str) -> Result<TempPath, JobError> {
        let audio = self.synthesize(text).await?;
        let path = tempfile::Builder::new()
            .prefix("reelflow_narration_")
            .suffix(".mp3")
            .tempfile()?
            .into_temp_path();
        tokio::fs::write(&path, &audio).await?;
        Ok(path)
    }
}
