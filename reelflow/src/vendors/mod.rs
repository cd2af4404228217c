//! Vendor clients.
//!
//! Each client owns an [`HttpTransport`](crate::http::HttpTransport) and
//! its credentials, validates inputs before touching the network, and maps
//! vendor envelopes into [`JobHandle`]/[`JobStatus`] values.

mod gemini;
mod heygen;
pub mod media;
mod openai;
mod shotstack;
mod supabase;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::io::ErrorKind;
use tracing::debug;

use crate::core::{JobHandle, JobStatus, TemporaryResource};
use crate::errors::JobError;

pub use gemini::{GeminiClient, ScriptSizing, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
pub use heygen::{
    AvatarGroupSummary, AvatarLook, HeyGenClient, HeyGenEndpoints, VideoRequest, VoiceSample,
    DEFAULT_UPLOAD_BASE_URL, DEFAULT_V1_BASE_URL, DEFAULT_V2_BASE_URL,
};
pub use media::VideoDimension;
pub use openai::{OpenAiSpeechClient, DEFAULT_OPENAI_BASE_URL, DEFAULT_TTS_MODEL, DEFAULT_TTS_VOICE};
pub use shotstack::{
    default_merge_fields, MergeField, RenderTemplate, ShotstackClient, ShotstackEndpoints,
    DEFAULT_RENDER_ENDPOINT, DEFAULT_STATUS_ENDPOINT_TEMPLATE,
};
pub use supabase::{narration_object_path, SupabaseStorage, DEFAULT_BUCKET};

/// Reports the current state of a submitted job.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetches the status once. Errors are transient from the poller's view.
    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobStatus, JobError>;
}

/// Deletes temporary resources.
#[async_trait]
pub trait ResourceReclaimer: Send + Sync {
    /// Returns `Ok(true)` when the resource is gone afterwards.
    async fn reclaim(&self, resource: &TemporaryResource) -> Result<bool, JobError>;
}

pub(crate) fn require_key(key: &SecretString, vendor: &str) -> Result<(), JobError> {
    if key.expose_secret().trim().is_empty() {
        return Err(JobError::validation(format!("{vendor} API key is empty")));
    }
    Ok(())
}

/// Removes a scratch file. A missing file counts as removed.
pub(crate) async fn remove_local_file(path: &str) -> Result<bool, JobError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path, "Scratch file already removed");
            Ok(true)
        }
        Err(e) => Err(JobError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_key() {
        assert!(require_key(&SecretString::from("abc".to_string()), "HeyGen").is_ok());
        let err = require_key(&SecretString::from(String::new()), "HeyGen").unwrap_err();
        assert_eq!(err, JobError::validation("HeyGen API key is empty"));
    }

    #[tokio::test]
    async fn test_remove_local_file_is_idempotent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.into_temp_path().keep().unwrap();
        let path = path.display().to_string();

        assert!(remove_local_file(&path).await.unwrap());
        assert!(remove_local_file(&path).await.unwrap());
    }
}
