//! HeyGen client: assets, photo-avatar groups, training, voices and videos.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::media::{audio_content_type, image_content_type, VideoDimension};
use super::{remove_local_file, require_key, ResourceReclaimer, StatusSource};
use crate::core::{JobHandle, JobState, JobStatus, ResourceKind, TemporaryResource, Vendor};
use crate::errors::JobError;
use crate::http::envelope::{
    decode_json, error_text, interpret_delete, lookup, rejection, require_str, str_at,
};
use crate::http::{ContentPolicy, FormPart, HttpRequest, HttpResponse, HttpTransport, Method};

/// Default v1 API base URL.
pub const DEFAULT_V1_BASE_URL: &str = "https://api.heygen.com/v1";
/// Default v2 API base URL.
pub const DEFAULT_V2_BASE_URL: &str = "https://api.heygen.com/v2";
/// Default asset upload base URL.
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://upload.heygen.com/v1";

/// Base URLs of the HeyGen APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeyGenEndpoints {
    /// v1 API (video status, voices).
    pub v1: String,
    /// v2 API (groups, training, video generation).
    pub v2: String,
    /// Upload API.
    pub upload: String,
}

impl Default for HeyGenEndpoints {
    fn default() -> Self {
        Self {
            v1: DEFAULT_V1_BASE_URL.to_string(),
            v2: DEFAULT_V2_BASE_URL.to_string(),
            upload: DEFAULT_UPLOAD_BASE_URL.to_string(),
        }
    }
}

impl HeyGenEndpoints {
    fn v1(&self, path: &str) -> String {
        format!("{}/{path}", self.v1.trim_end_matches('/'))
    }

    fn v2(&self, path: &str) -> String {
        format!("{}/{path}", self.v2.trim_end_matches('/'))
    }

    fn upload(&self, path: &str) -> String {
        format!("{}/{path}", self.upload.trim_end_matches('/'))
    }
}

/// One look inside a photo-avatar group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarLook {
    /// Look id; becomes the talking-photo id once ready.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Vendor status, upper-cased.
    pub status: String,
    /// Preview image.
    pub image_url: Option<String>,
}

impl AvatarLook {
    fn from_value(value: &Value) -> Self {
        Self {
            id: str_at(value, &["id"]).map(ToString::to_string),
            name: str_at(value, &["name"]).map(ToString::to_string),
            status: str_at(value, &["status"])
                .unwrap_or("UNKNOWN")
                .to_ascii_uppercase(),
            image_url: str_at(value, &["image_url"]).map(ToString::to_string),
        }
    }
}

/// Summary of an avatar group owned by the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarGroupSummary {
    /// Group id.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
}

/// An audio sample used to clone a voice.
#[derive(Clone, PartialEq, Eq)]
pub struct VoiceSample {
    /// Name for the new voice.
    pub name: String,
    /// Original filename, used to pick the content type.
    pub filename: String,
    /// Audio bytes.
    pub data: Vec<u8>,
}

impl fmt::Debug for VoiceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceSample")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Parameters of a video generation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoRequest {
    /// Talking-photo (look) id. Preferred over `avatar_id` when both are set.
    pub talking_photo_id: Option<String>,
    /// Stock avatar id.
    pub avatar_id: Option<String>,
    /// Voice id used to speak the script.
    pub voice_id: String,
    /// Script text.
    pub input_text: String,
    /// Video title.
    pub title: String,
    /// Whether HeyGen should burn in captions.
    pub caption: bool,
    /// Watermarked test render.
    pub test: bool,
    /// Output frame size.
    pub dimension: VideoDimension,
}

impl VideoRequest {
    /// Creates a request for the given voice and script.
    #[must_use]
    pub fn new(voice_id: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            input_text: input_text.into(),
            title: "Reelflow video".to_string(),
            ..Self::default()
        }
    }

    /// Uses a talking photo as the character.
    #[must_use]
    pub fn with_talking_photo(mut self, id: impl Into<String>) -> Self {
        self.talking_photo_id = Some(id.into());
        self
    }

    /// Uses a stock avatar as the character.
    #[must_use]
    pub fn with_avatar(mut self, id: impl Into<String>) -> Self {
        self.avatar_id = Some(id.into());
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Enables or disables captions.
    #[must_use]
    pub fn with_caption(mut self, caption: bool) -> Self {
        self.caption = caption;
        self
    }

    /// Enables or disables test mode.
    #[must_use]
    pub fn with_test_mode(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    /// Sets the output dimension.
    #[must_use]
    pub fn with_dimension(mut self, dimension: VideoDimension) -> Self {
        self.dimension = dimension;
        self
    }

    fn character(&self) -> Option<Value> {
        fn non_empty(id: &Option<String>) -> Option<&str> {
            id.as_deref().filter(|s| !s.trim().is_empty())
        }
        if let Some(id) = non_empty(&self.talking_photo_id) {
            Some(json!({"type": "talking_photo", "talking_photo_id": id}))
        } else {
            non_empty(&self.avatar_id).map(|id| json!({"type": "avatar", "avatar_id": id}))
        }
    }

    /// Checks required identifiers.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.character().is_none() {
            return Err(JobError::validation(
                "video generation needs a talking_photo_id or an avatar_id",
            ));
        }
        if self.voice_id.trim().is_empty() {
            return Err(JobError::validation("video generation needs a voice_id"));
        }
        if self.input_text.trim().is_empty() {
            return Err(JobError::validation("video generation needs a script"));
        }
        Ok(())
    }

    /// Builds the `video/generate` payload.
    pub fn to_payload(&self) -> Result<Value, JobError> {
        self.validate()?;
        let character = self.character().unwrap_or(Value::Null);
        Ok(json!({
            "video_inputs": [{
                "character": character,
                "voice": {
                    "type": "text",
                    "input_text": self.input_text,
                    "voice_id": self.voice_id,
                },
            }],
            "test": self.test,
            "caption": self.caption,
            "dimension": self.dimension,
            "title": self.title,
        }))
    }
}

/// Client for the HeyGen REST APIs.
pub struct HeyGenClient {
    transport: Arc<dyn HttpTransport>,
    api_key: SecretString,
    endpoints: HeyGenEndpoints,
}

impl fmt::Debug for HeyGenClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeyGenClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl HeyGenClient {
    /// Creates a client with the default endpoints.
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: SecretString) -> Result<Self, JobError> {
        require_key(&api_key, "HeyGen")?;
        Ok(Self {
            transport,
            api_key,
            endpoints: HeyGenEndpoints::default(),
        })
    }

    /// Overrides the endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: HeyGenEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Returns the endpoints in use.
    #[must_use]
    pub fn endpoints(&self) -> &HeyGenEndpoints {
        &self.endpoints
    }

    fn request(&self, method: Method, url: String, policy: ContentPolicy) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_header("X-Api-Key", self.api_key.expose_secret())
            .with_policy(policy)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, JobError> {
        debug!(method = %request.method, url = %request.url, "HeyGen request");
        self.transport.send(request).await
    }

    async fn post_json(&self, url: String, body: Value) -> Result<Value, JobError> {
        let request = self.request(Method::Post, url, ContentPolicy::Json).with_json(body);
        decode_json(&self.send(request).await?)
    }

    async fn get_json(&self, url: String) -> Result<Value, JobError> {
        let request = self.request(Method::Get, url, ContentPolicy::AcceptJson);
        decode_json(&self.send(request).await?)
    }

    /// Uploads an avatar photo and returns its image key.
    pub async fn upload_asset(&self, data: Vec<u8>, filename: &str) -> Result<String, JobError> {
        let content_type = image_content_type(filename)?;
        if data.is_empty() {
            return Err(JobError::validation(format!("'{filename}' is empty")));
        }

        let request = self
            .request(
                Method::Post,
                self.endpoints.upload("asset"),
                ContentPolicy::Media(content_type),
            )
            .with_bytes(data);
        let body = decode_json(&self.send(request).await?)?;

        if str_at(&body, &["data", "file_type"]) != Some("image") {
            return Err(rejection(&body, "upload response is not an image asset"));
        }
        let image_key = require_str(&body, &["data", "image_key"], "upload response has no image_key")?;
        info!(filename, image_key = %image_key, "Uploaded avatar photo");
        Ok(image_key)
    }

    /// Creates a photo-avatar group from an uploaded image and returns its id.
    pub async fn create_avatar_group(&self, name: &str, image_key: &str) -> Result<String, JobError> {
        if image_key.trim().is_empty() {
            return Err(JobError::validation("creating an avatar group needs an image_key"));
        }
        let body = self
            .post_json(
                self.endpoints.v2("photo_avatar/avatar_group/create"),
                json!({"name": name, "image_key": image_key}),
            )
            .await?;
        let group_id = require_str(&body, &["data", "group_id"], "group creation returned no group_id")?;
        info!(name, group_id = %group_id, "Created avatar group");
        Ok(group_id)
    }

    /// Adds uploaded images as looks to an existing group.
    pub async fn add_looks(
        &self,
        group_id: &str,
        image_keys: &[String],
        name: &str,
    ) -> Result<(), JobError> {
        if group_id.trim().is_empty() {
            return Err(JobError::validation("adding looks needs a group_id"));
        }
        if image_keys.is_empty() {
            return Err(JobError::validation("adding looks needs at least one image_key"));
        }

        let request = self
            .request(
                Method::Post,
                self.endpoints.v2("photo_avatar/avatar_group/add"),
                ContentPolicy::Json,
            )
            .with_json(json!({"group_id": group_id, "image_keys": image_keys, "name": name}));
        let response = self.send(request).await?;
        if response.is_success() && response.is_blank() {
            return Ok(());
        }
        let body = decode_json(&response)?;
        if body.get("error").is_some_and(|e| !e.is_null()) {
            return Err(rejection(&body, "adding looks failed"));
        }
        info!(group_id, looks = image_keys.len(), "Added looks to avatar group");
        Ok(())
    }

    /// Starts training a group.
    pub async fn train_group(&self, group_id: &str) -> Result<JobHandle, JobError> {
        if group_id.trim().is_empty() {
            return Err(JobError::validation("training needs a group_id"));
        }
        let body = self
            .post_json(self.endpoints.v2("photo_avatar/train"), json!({"group_id": group_id}))
            .await?;
        let id = str_at(&body, &["data", "job_id"])
            .or_else(|| str_at(&body, &["data", "training_id"]))
            .ok_or_else(|| rejection(&body, "training request returned no job_id"))?;
        info!(group_id, training_id = id, "Submitted avatar group training");
        Ok(JobHandle::new(Vendor::HeyGenTraining, id))
    }

    /// Fetches the state of a training job.
    pub async fn training_status(&self, training_id: &str) -> Result<JobStatus, JobError> {
        let body = self
            .get_json(self.endpoints.v2(&format!("photo_avatar/train/status/{training_id}")))
            .await?;
        training_status_from(&body)
    }

    /// Lists the looks of a group.
    pub async fn list_group_looks(&self, group_id: &str) -> Result<Vec<AvatarLook>, JobError> {
        let body = self
            .get_json(self.endpoints.v2(&format!("avatar_group/{group_id}/avatars")))
            .await?;
        let looks = lookup(&body, &["data", "avatar_list"])
            .and_then(Value::as_array)
            .ok_or_else(|| rejection(&body, "look list response has no data.avatar_list"))?;
        Ok(looks.iter().map(AvatarLook::from_value).collect())
    }

    /// Reports whether the first look of a group is ready.
    pub async fn group_look_status(&self, group_id: &str) -> Result<JobStatus, JobError> {
        let looks = self.list_group_looks(group_id).await?;
        Ok(look_status_from(&looks))
    }

    /// Lists the avatar groups of the account.
    pub async fn list_avatar_groups(&self) -> Result<Vec<AvatarGroupSummary>, JobError> {
        let body = self.get_json(self.endpoints.v2("avatar_group.list")).await?;
        let items = lookup(&body, &["data", "list"])
            .and_then(Value::as_array)
            .or_else(|| body.get("data").and_then(Value::as_array))
            .ok_or_else(|| rejection(&body, "group list response has no data.list"))?;

        Ok(items
            .iter()
            .filter_map(|item| {
                let id = str_at(item, &["group_id"]).or_else(|| str_at(item, &["id"]))?;
                Some(AvatarGroupSummary {
                    id: id.to_string(),
                    name: str_at(item, &["name"]).map(ToString::to_string),
                })
            })
            .collect())
    }

    /// Deletes a photo-avatar group. A group that is already gone counts as deleted.
    pub async fn delete_avatar_group(&self, group_id: &str) -> Result<bool, JobError> {
        self.delete(&format!("photo_avatar_group/{group_id}"), group_id)
            .await
    }

    /// Deletes a talking photo. A photo that is already gone counts as deleted.
    pub async fn delete_talking_photo(&self, talking_photo_id: &str) -> Result<bool, JobError> {
        self.delete(&format!("talking_photos/{talking_photo_id}"), talking_photo_id)
            .await
    }

    async fn delete(&self, path: &str, id: &str) -> Result<bool, JobError> {
        if id.trim().is_empty() {
            return Err(JobError::validation("delete needs a resource id"));
        }
        let request = self.request(Method::Delete, self.endpoints.v2(path), ContentPolicy::AcceptJson);
        let deleted = interpret_delete(&self.send(request).await?, id)?;
        if deleted {
            info!(resource = id, "Deleted HeyGen resource");
        }
        Ok(deleted)
    }

    /// Submits a video generation.
    pub async fn generate_video(&self, request: &VideoRequest) -> Result<JobHandle, JobError> {
        let payload = request.to_payload()?;
        let body = self.post_json(self.endpoints.v2("video/generate"), payload).await?;
        let video_id = require_str(&body, &["data", "video_id"], "video generation returned no video_id")?;
        info!(video_id = %video_id, dimension = %request.dimension, "Submitted video generation");
        Ok(JobHandle::new(Vendor::HeyGenVideo, video_id))
    }

    /// Fetches the state of a video generation.
    pub async fn video_status(&self, video_id: &str) -> Result<JobStatus, JobError> {
        let body = self
            .get_json(self.endpoints.v1(&format!("video_status.get?video_id={video_id}")))
            .await?;
        video_status_from(&body)
    }

    /// Clones a voice from an audio sample and returns the new voice id.
    pub async fn clone_voice(&self, sample: &VoiceSample) -> Result<String, JobError> {
        if sample.data.is_empty() {
            return Err(JobError::validation("voice sample is empty"));
        }
        if sample.name.trim().is_empty() {
            return Err(JobError::validation("cloned voice needs a name"));
        }

        let parts = vec![
            FormPart::File {
                name: "files".to_string(),
                filename: sample.filename.clone(),
                content_type: audio_content_type(&sample.filename),
                data: sample.data.clone(),
            },
            FormPart::Text {
                name: "name".to_string(),
                value: sample.name.clone(),
            },
        ];
        let request = self
            .request(Method::Post, self.endpoints.v1("voice"), ContentPolicy::Multipart)
            .with_multipart(parts);
        let body = decode_json(&self.send(request).await?)?;
        let voice_id = require_str(&body, &["data", "voice_id"], "voice cloning returned no voice_id")?;
        info!(voice_id = %voice_id, name = %sample.name, "Cloned voice");
        Ok(voice_id)
    }
}

#[async_trait]
impl StatusSource for HeyGenClient {
    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobStatus, JobError> {
        match handle.vendor {
            Vendor::HeyGenVideo => self.video_status(&handle.id).await,
            Vendor::HeyGenTraining => self.training_status(&handle.id).await,
            Vendor::HeyGenAvatarGroup => self.group_look_status(&handle.id).await,
            Vendor::ShotstackRender => Err(JobError::validation(format!(
                "HeyGen cannot report status for {} jobs",
                handle.vendor
            ))),
        }
    }
}

#[async_trait]
impl ResourceReclaimer for HeyGenClient {
    async fn reclaim(&self, resource: &TemporaryResource) -> Result<bool, JobError> {
        match resource.kind {
            ResourceKind::AvatarGroup => self.delete_avatar_group(&resource.id).await,
            ResourceKind::LocalTempFile => remove_local_file(&resource.id).await,
        }
    }
}

/// Maps a `video_status.get` body.
fn video_status_from(body: &Value) -> Result<JobStatus, JobError> {
    let raw = str_at(body, &["data", "status"])
        .ok_or_else(|| rejection(body, "video status response has no data.status"))?;
    let state = match raw.to_ascii_lowercase().as_str() {
        "completed" => JobState::Completed,
        "failed" => JobState::Failed,
        "error" => JobState::Error,
        "pending" | "waiting" => JobState::Pending,
        _ => JobState::Processing,
    };

    let mut status = JobStatus::new(state).with_raw_status(raw);
    if let Some(url) = str_at(body, &["data", "video_url"]) {
        status = status.with_result_url(url);
    }
    if let Some(detail) = lookup(body, &["data", "error"]).and_then(error_text) {
        status = status.with_error_detail(detail);
    }
    Ok(status)
}

/// Maps a `photo_avatar/train/status` body.
fn training_status_from(body: &Value) -> Result<JobStatus, JobError> {
    let detail = lookup(body, &["data", "error"])
        .and_then(error_text)
        .or_else(|| body.get("error").and_then(error_text));

    let Some(raw) = str_at(body, &["data", "status"]) else {
        return match detail {
            Some(detail) => Ok(JobStatus::new(JobState::Error).with_error_detail(detail)),
            None => Err(rejection(body, "training status response has no data.status")),
        };
    };

    let mut status = match raw.to_ascii_lowercase().as_str() {
        "ready" => JobStatus::completed(),
        "failed" => JobStatus::new(JobState::Failed),
        "error" => JobStatus::new(JobState::Error),
        "pending" => JobStatus::new(JobState::Pending),
        "training" | "processing" => JobStatus::new(JobState::Processing),
        _ => JobStatus::new(JobState::Error)
            .with_error_detail(format!("unexpected training status '{raw}'")),
    }
    .with_raw_status(raw);

    if status.error_detail.is_none() {
        if let Some(detail) = detail {
            status = status.with_error_detail(detail);
        }
    }
    Ok(status)
}

/// Decides readiness of a group from its looks. Only the first look counts.
fn look_status_from(looks: &[AvatarLook]) -> JobStatus {
    let Some(first) = looks.first() else {
        return JobStatus::new(JobState::Pending).with_raw_status("NO_LOOKS");
    };

    match (first.status.as_str(), &first.id) {
        ("COMPLETED", Some(id)) => JobStatus::completed()
            .with_result_id(id)
            .with_raw_status("COMPLETED"),
        ("COMPLETED" | "PENDING" | "UNKNOWN", _) => {
            JobStatus::new(JobState::Pending).with_raw_status(&first.status)
        }
        ("TRAINING" | "PROCESSING", _) => {
            JobStatus::new(JobState::Processing).with_raw_status(&first.status)
        }
        // A look without an id is still being created.
        (_, None) => JobStatus::new(JobState::Pending).with_raw_status(&first.status),
        (other, Some(id)) => {
            JobStatus::failed(format!("look {id} finished with status {other}")).with_raw_status(other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockHttpTransport;
    use crate::testing::{fixtures, ScriptedTransport};
    use pretty_assertions::assert_eq;

    fn client(transport: &Arc<ScriptedTransport>) -> HeyGenClient {
        HeyGenClient::new(transport.clone(), SecretString::from("hg-key".to_string())).unwrap()
    }

    #[test]
    fn test_new_requires_key() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = HeyGenClient::new(transport, SecretString::from("  ".to_string())).unwrap_err();
        assert!(matches!(err, JobError::Validation { .. }));
    }

    #[test]
    fn test_video_payload_prefers_talking_photo() {
        let payload = VideoRequest::new("voice-1", "Hello there")
            .with_talking_photo("look-9")
            .with_avatar("stock-1")
            .with_dimension(VideoDimension::PORTRAIT_9_16)
            .with_title("Listing")
            .to_payload()
            .unwrap();

        assert_eq!(
            payload,
            json!({
                "video_inputs": [{
                    "character": {"type": "talking_photo", "talking_photo_id": "look-9"},
                    "voice": {"type": "text", "input_text": "Hello there", "voice_id": "voice-1"},
                }],
                "test": false,
                "caption": false,
                "dimension": {"width": 1080, "height": 1920},
                "title": "Listing",
            })
        );
    }

    #[test]
    fn test_video_payload_avatar_character() {
        let payload = VideoRequest::new("voice-1", "Hi")
            .with_avatar("stock-1")
            .to_payload()
            .unwrap();
        assert_eq!(
            payload["video_inputs"][0]["character"],
            json!({"type": "avatar", "avatar_id": "stock-1"})
        );
    }

    #[tokio::test]
    async fn test_generate_video_without_character_sends_nothing() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(0);
        let client =
            HeyGenClient::new(Arc::new(transport), SecretString::from("k".to_string())).unwrap();

        let err = client
            .generate_video(&VideoRequest::new("voice-1", "Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_generate_video_sends_json_headers() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(Method::Post, "video/generate", fixtures::heygen_video_submitted("vid-1"));

        let handle = client(&transport)
            .generate_video(&VideoRequest::new("voice-1", "Hello").with_talking_photo("look-1"))
            .await
            .unwrap();
        assert_eq!(handle.vendor, Vendor::HeyGenVideo);
        assert_eq!(handle.id, "vid-1");

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "https://api.heygen.com/v2/video/generate");
        assert_eq!(sent.header("X-Api-Key"), Some("hg-key"));
        assert_eq!(sent.header("Content-Type"), Some("application/json"));
        assert_eq!(sent.header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_generate_video_missing_marker_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::Post,
            "video/generate",
            HttpResponse::json(200, &json!({"error": {"message": "voice not found"}, "data": null})),
        );

        let err = client(&transport)
            .generate_video(&VideoRequest::new("voice-1", "Hello").with_talking_photo("look-1"))
            .await
            .unwrap_err();
        assert_eq!(err, JobError::rejected("voice not found"));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image_before_sending() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(0);
        let client =
            HeyGenClient::new(Arc::new(transport), SecretString::from("k".to_string())).unwrap();

        let err = client.upload_asset(vec![1, 2], "clip.mp4").await.unwrap_err();
        assert!(matches!(err, JobError::UnsupportedMediaType { .. }));
    }

    #[tokio::test]
    async fn test_upload_asset_sends_raw_image() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(Method::Post, "/asset", fixtures::heygen_upload_ok("key-1"));

        let key = client(&transport)
            .upload_asset(vec![0xFF, 0xD8], "face.jpg")
            .await
            .unwrap();
        assert_eq!(key, "key-1");

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "https://upload.heygen.com/v1/asset");
        assert_eq!(sent.header("Content-Type"), Some("image/jpeg"));
        assert_eq!(sent.body, crate::http::RequestBody::Bytes(vec![0xFF, 0xD8]));
    }

    #[tokio::test]
    async fn test_upload_requires_image_file_type() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::Post,
            "/asset",
            HttpResponse::json(200, &json!({"data": {"image_key": "k", "file_type": "video"}})),
        );

        let err = client(&transport)
            .upload_asset(vec![1], "face.png")
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::VendorRejected { .. }));
    }

    #[tokio::test]
    async fn test_delete_group_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(Method::Delete, "photo_avatar_group/g-1", fixtures::heygen_delete_ok());
        transport.respond(Method::Delete, "photo_avatar_group/g-1", HttpResponse::empty(404));

        let client = client(&transport);
        assert!(client.delete_avatar_group("g-1").await.unwrap());
        assert!(client.delete_avatar_group("g-1").await.unwrap());
        assert_eq!(transport.call_count("photo_avatar_group/g-1"), 2);

        let sent = transport.last_request().unwrap();
        assert!(sent.header("Content-Type").is_none());
        assert_eq!(sent.header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_delete_talking_photo_server_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(Method::Delete, "talking_photos/tp-1", HttpResponse::new(500, "boom"));

        let err = client(&transport).delete_talking_photo("tp-1").await.unwrap_err();
        assert_eq!(err, JobError::http(500, "boom"));
    }

    #[tokio::test]
    async fn test_clone_voice_multipart() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(Method::Post, "v1/voice", fixtures::heygen_voice_cloned("voice-7"));

        let sample = VoiceSample {
            name: "Agent".to_string(),
            filename: "sample.wav".to_string(),
            data: vec![1, 2, 3],
        };
        let voice_id = client(&transport).clone_voice(&sample).await.unwrap();
        assert_eq!(voice_id, "voice-7");

        let sent = transport.last_request().unwrap();
        let crate::http::RequestBody::Multipart(parts) = &sent.body else {
            panic!("expected multipart body");
        };
        assert_eq!(
            parts[0],
            FormPart::File {
                name: "files".to_string(),
                filename: "sample.wav".to_string(),
                content_type: "audio/wav".to_string(),
                data: vec![1, 2, 3],
            }
        );
        assert!(sent.header("Content-Type").is_none());
    }

    #[tokio::test]
    async fn test_add_looks_accepts_empty_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(Method::Post, "avatar_group/add", HttpResponse::empty(200));
        transport.respond(
            Method::Post,
            "avatar_group/add",
            HttpResponse::json(200, &json!({"error": {"message": "group busy"}})),
        );

        let client = client(&transport);
        let keys = vec!["k1".to_string()];
        client.add_looks("g-1", &keys, "looks").await.unwrap();
        let err = client.add_looks("g-1", &keys, "looks").await.unwrap_err();
        assert_eq!(err, JobError::rejected("group busy"));
    }

    #[tokio::test]
    async fn test_train_group_accepts_training_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::Post,
            "photo_avatar/train",
            HttpResponse::json(200, &json!({"data": {"training_id": "t-1"}})),
        );

        let handle = client(&transport).train_group("g-1").await.unwrap();
        assert_eq!(handle.vendor, Vendor::HeyGenTraining);
        assert_eq!(handle.id, "t-1");
    }

    #[tokio::test]
    async fn test_list_avatar_groups_both_shapes() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::Get,
            "avatar_group.list",
            HttpResponse::json(200, &json!({"data": {"list": [{"group_id": "g-1", "name": "A"}]}})),
        );
        transport.respond(
            Method::Get,
            "avatar_group.list",
            HttpResponse::json(200, &json!({"data": [{"id": "g-2"}]})),
        );

        let client = client(&transport);
        let first = client.list_avatar_groups().await.unwrap();
        assert_eq!(first[0].id, "g-1");
        assert_eq!(first[0].name.as_deref(), Some("A"));
        let second = client.list_avatar_groups().await.unwrap();
        assert_eq!(second[0].id, "g-2");
    }

    #[tokio::test]
    async fn test_fetch_status_rejects_foreign_handle() {
        let transport = Arc::new(ScriptedTransport::new());
        let handle = JobHandle::new(Vendor::ShotstackRender, "r-1");
        let err = client(&transport).fetch_status(&handle).await.unwrap_err();
        assert!(matches!(err, JobError::Validation { .. }));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_video_status_mapping() {
        let status = video_status_from(&fixtures::heygen_video_status_body("completed", Some("https://v/1.mp4")))
            .unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.result_url.as_deref(), Some("https://v/1.mp4"));

        let status = video_status_from(&json!({"data": {"status": "waiting"}})).unwrap();
        assert_eq!(status.state, JobState::Pending);

        let status = video_status_from(&json!({"data": {"status": "processing"}})).unwrap();
        assert_eq!(status.state, JobState::Processing);

        let status = video_status_from(
            &json!({"data": {"status": "failed", "error": {"message": "avatar rejected"}}}),
        )
        .unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error_detail.as_deref(), Some("avatar rejected"));

        assert!(video_status_from(&json!({"data": {}})).is_err());
    }

    #[test]
    fn test_training_status_mapping() {
        let ready = training_status_from(&json!({"data": {"status": "Ready"}})).unwrap();
        assert_eq!(ready.state, JobState::Completed);

        let failed = training_status_from(
            &json!({"data": {"status": "Failed", "error": {"message": "bad photo"}}}),
        )
        .unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.error_detail.as_deref(), Some("bad photo"));

        let training = training_status_from(&json!({"data": {"status": "Training"}})).unwrap();
        assert_eq!(training.state, JobState::Processing);

        let embedded = training_status_from(&json!({"error": {"message": "not found"}, "data": {}}))
            .unwrap();
        assert_eq!(embedded.state, JobState::Error);
        assert_eq!(embedded.error_detail.as_deref(), Some("not found"));

        let odd = training_status_from(&json!({"data": {"status": "Sleeping"}})).unwrap();
        assert_eq!(odd.state, JobState::Error);
        assert!(odd.error_detail.unwrap().contains("Sleeping"));

        assert!(training_status_from(&json!({"data": {}})).is_err());
    }

    #[test]
    fn test_look_status_mapping() {
        let look = |id: Option<&str>, status: &str| AvatarLook {
            id: id.map(ToString::to_string),
            name: None,
            status: status.to_string(),
            image_url: None,
        };

        assert_eq!(look_status_from(&[]).state, JobState::Pending);

        let ready = look_status_from(&[look(Some("look-1"), "COMPLETED"), look(None, "FAILED")]);
        assert_eq!(ready.state, JobState::Completed);
        assert_eq!(ready.result_id.as_deref(), Some("look-1"));

        assert_eq!(look_status_from(&[look(None, "COMPLETED")]).state, JobState::Pending);
        assert_eq!(look_status_from(&[look(Some("l"), "TRAINING")]).state, JobState::Processing);
        assert_eq!(look_status_from(&[look(Some("l"), "UNKNOWN")]).state, JobState::Pending);

        let failed = look_status_from(&[look(Some("l"), "REJECTED")]);
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.error_detail.unwrap().contains("REJECTED"));
    }

    #[test]
    fn test_look_without_id_keeps_polling() {
        let look = AvatarLook {
            id: None,
            name: None,
            status: "FAILED".to_string(),
            image_url: None,
        };
        let status = look_status_from(&[look]);
        assert_eq!(status.state, JobState::Pending);
        assert!(!status.is_terminal());
        assert_eq!(status.raw_status.as_deref(), Some("FAILED"));
    }

    #[test]
    fn test_video_request_prefers_talking_photo() {
        let both = VideoRequest::new("v-1", "Hi")
            .with_avatar("avatar-1")
            .with_talking_photo("tp-1");
        assert_eq!(
            both.character(),
            Some(json!({"type": "talking_photo", "talking_photo_id": "tp-1"}))
        );

        let blank_photo = VideoRequest::new("v-1", "Hi")
            .with_talking_photo("  ")
            .with_avatar("avatar-1");
        assert_eq!(
            blank_photo.character(),
            Some(json!({"type": "avatar", "avatar_id": "avatar-1"}))
        );
        assert!(VideoRequest::new("v-1", "Hi").character().is_none());
    }

    #[tokio::test]
    async fn test_group_look_status_parses_list() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::Get,
            "avatar_group/g-1/avatars",
            fixtures::heygen_looks(&[("look-1", "completed")]),
        );

        let status = client(&transport).group_look_status("g-1").await.unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.result_id.as_deref(), Some("look-1"));
        assert_eq!(
            transport.last_request().unwrap().url,
            "https://api.heygen.com/v2/avatar_group/g-1/avatars"
        );
    }
}
