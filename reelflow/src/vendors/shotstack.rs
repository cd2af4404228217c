//! Shotstack template rendering client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::{require_key, StatusSource};
use crate::core::{JobHandle, JobState, JobStatus, Vendor};
use crate::errors::JobError;
use crate::http::envelope::{decode_json, lookup, rejection, require_str, str_at};
use crate::http::{ContentPolicy, HttpRequest, HttpTransport, Method};

/// Default render submission endpoint (stage environment).
pub const DEFAULT_RENDER_ENDPOINT: &str = "https://api.shotstack.io/edit/stage/templates/render";
/// Default status endpoint; `{}` is replaced by the render id.
pub const DEFAULT_STATUS_ENDPOINT_TEMPLATE: &str = "https://api.shotstack.io/edit/stage/render/{}";

/// Merge-field names understood by the marketing template.
const TEMPLATE_FIELDS: &[(&str, &str)] = &[
    ("AVATAR_VIDEO", ""),
    ("IMAGE_SRC", ""),
    ("IMAGE_SRC_2", ""),
    ("IMAGE_SRC_3", ""),
    ("IMAGE_SRC_4", ""),
    ("IMAGE_SRC_5", ""),
    ("IMAGE_SRC_6", ""),
    ("IMAGE_SRC_7", ""),
    ("IMAGE_SRC_8", ""),
    ("PRODUCT_NAME", "PRODUCT NAME"),
    ("BRAND_NAME", "BRAND NAME"),
    ("PRODUCT_CTA", "FREE DELIVERY"),
    ("PRODUCT_TEXT", "YOUR TEXT GOES HERE"),
    ("LOGO_SRC", ""),
    ("PRODUCT_SUBTITLE", "YOUR SUBTITLE GOES HERE"),
    ("NARRATION_AUDIO_SRC", ""),
];

/// A `{find, replace}` substitution applied to a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeField {
    /// Placeholder name in the template.
    pub find: String,
    /// Replacement value.
    pub replace: String,
}

impl MergeField {
    /// Creates a merge field.
    #[must_use]
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }
}

/// The template's fields with their placeholder values.
#[must_use]
pub fn default_merge_fields() -> Vec<MergeField> {
    TEMPLATE_FIELDS
        .iter()
        .map(|(find, replace)| MergeField::new(*find, *replace))
        .collect()
}

/// A render request against a saved template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTemplate {
    /// Template id.
    pub template_id: String,
    /// Owner (account) id.
    pub owner_id: String,
    /// Substitutions.
    pub merge: Vec<MergeField>,
}

impl RenderTemplate {
    /// Creates a request with no merge fields.
    #[must_use]
    pub fn new(template_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            owner_id: owner_id.into(),
            merge: Vec::new(),
        }
    }

    /// Replaces the merge fields.
    #[must_use]
    pub fn with_merge(mut self, merge: Vec<MergeField>) -> Self {
        self.merge = merge;
        self
    }

    /// Sets a field, replacing an existing entry with the same name.
    pub fn upsert(&mut self, find: &str, replace: impl Into<String>) {
        let replace = replace.into();
        match self.merge.iter_mut().find(|f| f.find == find) {
            Some(field) => field.replace = replace,
            None => self.merge.push(MergeField::new(find, replace)),
        }
    }

    /// Returns the value of a field.
    #[must_use]
    pub fn field(&self, find: &str) -> Option<&str> {
        self.merge
            .iter()
            .find(|f| f.find == find)
            .map(|f| f.replace.as_str())
    }

    /// Checks the ids a render needs.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.template_id.trim().is_empty() {
            return Err(JobError::validation("render needs a template id"));
        }
        if self.owner_id.trim().is_empty() {
            return Err(JobError::validation("render needs an owner id"));
        }
        Ok(())
    }
}

/// Shotstack endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotstackEndpoints {
    /// Render submission URL.
    pub render: String,
    /// Status URL template with a `{}` placeholder for the render id.
    pub status_template: String,
}

impl Default for ShotstackEndpoints {
    fn default() -> Self {
        Self {
            render: DEFAULT_RENDER_ENDPOINT.to_string(),
            status_template: DEFAULT_STATUS_ENDPOINT_TEMPLATE.to_string(),
        }
    }
}

impl ShotstackEndpoints {
    fn status_url(&self, render_id: &str) -> String {
        if self.status_template.contains("{}") {
            self.status_template.replacen("{}", render_id, 1)
        } else {
            format!("{}/{render_id}", self.status_template.trim_end_matches('/'))
        }
    }
}

/// Client for the Shotstack edit API.
pub struct ShotstackClient {
    transport: Arc<dyn HttpTransport>,
    api_key: SecretString,
    endpoints: ShotstackEndpoints,
}

impl fmt::Debug for ShotstackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShotstackClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl ShotstackClient {
    /// Creates a client with the default endpoints.
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: SecretString) -> Result<Self, JobError> {
        require_key(&api_key, "Shotstack")?;
        Ok(Self {
            transport,
            api_key,
            endpoints: ShotstackEndpoints::default(),
        })
    }

    /// Overrides the endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: ShotstackEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn request(&self, method: Method, url: String, policy: ContentPolicy) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_header("x-api-key", self.api_key.expose_secret())
            .with_policy(policy)
    }

    /// Submits a render.
    pub async fn render(&self, template: &RenderTemplate) -> Result<JobHandle, JobError> {
        template.validate()?;
        debug!(template_id = %template.template_id, fields = template.merge.len(), "Submitting render");

        let request = self
            .request(Method::Post, self.endpoints.render.clone(), ContentPolicy::Json)
            .with_json(json!({
                "id": template.template_id,
                "merge": template.merge,
                "owner": template.owner_id,
            }));
        let body = decode_json(&self.transport.send(request).await?)?;
        ensure_flag(&body, "render submission was not accepted")?;

        let render_id = require_str(&body, &["response", "id"], "render submission returned no id")?;
        info!(render_id = %render_id, template_id = %template.template_id, "Submitted render");
        Ok(JobHandle::new(Vendor::ShotstackRender, render_id))
    }

    /// Fetches the state of a render.
    pub async fn render_status(&self, render_id: &str) -> Result<JobStatus, JobError> {
        let request = self.request(
            Method::Get,
            self.endpoints.status_url(render_id),
            ContentPolicy::AcceptJson,
        );
        let body = decode_json(&self.transport.send(request).await?)?;
        render_status_from(&body)
    }
}

#[async_trait]
impl StatusSource for ShotstackClient {
    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobStatus, JobError> {
        match handle.vendor {
            Vendor::ShotstackRender => self.render_status(&handle.id).await,
            other => Err(JobError::validation(format!(
                "Shotstack cannot report status for {other} jobs"
            ))),
        }
    }
}

fn ensure_flag(body: &Value, fallback: &str) -> Result<(), JobError> {
    if body.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(())
    } else {
        Err(rejection(body, fallback))
    }
}

fn render_status_from(body: &Value) -> Result<JobStatus, JobError> {
    ensure_flag(body, "render status request was not successful")?;
    let raw = str_at(body, &["response", "status"])
        .ok_or_else(|| rejection(body, "render status response has no status"))?;

    let status = match raw {
        "done" => {
            let url = require_str(body, &["response", "url"], "render is done but has no url")?;
            JobStatus::completed().with_result_url(url)
        }
        "failed" => {
            let detail = lookup(body, &["response", "error"])
                .and_then(Value::as_str)
                .unwrap_or("unknown Shotstack error");
            JobStatus::failed(detail)
        }
        "queued" => JobStatus::new(JobState::Pending),
        _ => JobStatus::new(JobState::Processing),
    };
    Ok(status.with_raw_status(raw))
}
