//! Supabase storage uploads.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::require_key;
use crate::errors::JobError;
use crate::http::envelope::ensure_success;
use crate::http::{ContentPolicy, HttpRequest, HttpTransport};

/// Default bucket for narration audio.
pub const DEFAULT_BUCKET: &str = "videobgm";

/// Object name for a narration track, e.g. `narration_Sea_View_1700000000.mp3`.
#[must_use]
pub fn narration_object_path(product: &str, timestamp: i64) -> String {
    let product = product.trim().replace(' ', "_");
    if product.is_empty() {
        format!("narration_{timestamp}.mp3")
    } else {
        format!("narration_{product}_{timestamp}.mp3")
    }
}

/// Uploads objects to a public Supabase storage bucket.
pub struct SupabaseStorage {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    service_key: SecretString,
    bucket: String,
}

impl fmt::Debug for SupabaseStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStorage")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl SupabaseStorage {
    /// Creates a storage client for the project URL.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        service_key: SecretString,
    ) -> Result<Self, JobError> {
        require_key(&service_key, "Supabase")?;
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(JobError::validation("Supabase URL is empty"));
        }
        Ok(Self {
            transport,
            base_url,
            service_key,
            bucket: DEFAULT_BUCKET.to_string(),
        })
    }

    /// Selects the bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Public URL of an object in the bucket.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }

    /// Uploads (or overwrites) an object and returns its public URL.
    pub async fn upload_object(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, JobError> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(JobError::validation("object path is empty"));
        }
        let bytes = data.len();
        let key = self.service_key.expose_secret();
        let request = HttpRequest::post(format!(
            "{}/storage/v1/object/{}/{path}",
            self.base_url, self.bucket
        ))
        .with_header("Authorization", format!("Bearer {key}"))
        .with_header("apikey", key)
        .with_header("x-upsert", "true")
        .with_policy(ContentPolicy::Media(content_type.to_string()))
        .with_bytes(data);

        ensure_success(&self.transport.send(request).await?)?;
        let url = self.public_url(path);
        info!(bucket = %self.bucket, path, bytes, url = %url, "Uploaded object");
        Ok(url)
    }
}
