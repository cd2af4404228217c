//! Request/response types and the transport trait.

use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;

use crate::errors::JobError;

/// HTTP methods used by the vendor APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    /// A plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// A file field.
    File {
        /// Field name.
        name: String,
        /// Filename reported to the server.
        filename: String,
        /// MIME type of the file.
        content_type: String,
        /// File contents.
        data: Vec<u8>,
    },
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A JSON document.
    Json(serde_json::Value),
    /// Raw bytes with the content type carried in the headers.
    Bytes(Vec<u8>),
    /// A multipart form.
    Multipart(Vec<FormPart>),
}

/// Header sets keyed by payload kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPolicy {
    /// JSON body: `Content-Type` and `accept` both `application/json`.
    Json,
    /// No body, JSON answer expected: `accept: application/json`.
    AcceptJson,
    /// Raw upload: `Content-Type` set to the asset's MIME type.
    Media(String),
    /// Multipart form: the transport sets the boundary content type.
    Multipart,
}

/// A fully described HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// The method.
    pub method: Method,
    /// Absolute URL including any query string.
    pub url: String,
    /// Header name/value pairs, in insertion order.
    pub headers: Vec<(String, String)>,
    /// The payload.
    pub body: RequestBody,
}

impl HttpRequest {
    /// Creates a request with no headers or body.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Applies the headers for a payload kind.
    #[must_use]
    pub fn with_policy(self, policy: ContentPolicy) -> Self {
        match policy {
            ContentPolicy::Json => self
                .with_header("Content-Type", "application/json")
                .with_header("accept", "application/json"),
            ContentPolicy::AcceptJson => self.with_header("accept", "application/json"),
            ContentPolicy::Media(content_type) => self.with_header("Content-Type", content_type),
            ContentPolicy::Multipart => self,
        }
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Sets a raw body.
    #[must_use]
    pub fn with_bytes(mut self, data: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes(data);
        self
    }

    /// Sets a multipart body.
    #[must_use]
    pub fn with_multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// Looks up a header value, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the JSON body, if any.
    #[must_use]
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response with a JSON body.
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Creates a response with no body.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the body is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Sends HTTP requests on behalf of the vendor clients.
///
/// Implementations report connection-level failures as
/// [`JobError::Transport`]; any HTTP status, including errors, is returned
/// as an [`HttpResponse`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request and returns the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, JobError>;
}

/// Transport backed by a shared `reqwest::Client`.
#[cfg(feature = "reqwest-transport")]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest-transport")]
impl ReqwestTransport {
    /// Creates a transport with a per-request timeout.
    #[must_use]
    pub fn new(timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn multipart_form(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, JobError> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    let file = reqwest::multipart::Part::bytes(data)
                        .file_name(filename)
                        .mime_str(&content_type)
                        .map_err(|e| JobError::validation(format!("bad MIME type: {e}")))?;
                    form.part(name, file)
                }
            };
        }
        Ok(form)
    }
}

#[cfg(feature = "reqwest-transport")]
#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, JobError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = match method {
            Method::Get => self.client.get(url.as_str()),
            Method::Post => self.client.post(url.as_str()),
            Method::Delete => self.client.delete(url.as_str()),
        };
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(value.to_string()),
            RequestBody::Bytes(data) => builder.body(data),
            RequestBody::Multipart(parts) => builder.multipart(Self::multipart_form(parts)?),
        };

        tracing::debug!(method = %method, url = %url, "Sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| JobError::transport(format!("{method} {url}: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| JobError::transport(format!("reading body of {url}: {e}")))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_policy_headers() {
        let req = HttpRequest::post("https://api.example.com/x")
            .with_header("X-Api-Key", "k")
            .with_policy(ContentPolicy::Json);
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("Accept"), Some("application/json"));
        assert_eq!(req.header("x-api-key"), Some("k"));
    }

    #[test]
    fn test_accept_json_policy_has_no_content_type() {
        let req = HttpRequest::get("https://api.example.com/x").with_policy(ContentPolicy::AcceptJson);
        assert!(req.header("Content-Type").is_none());
        assert_eq!(req.header("accept"), Some("application/json"));
    }

    #[test]
    fn test_media_policy() {
        let req = HttpRequest::post("https://upload.example.com/asset")
            .with_policy(ContentPolicy::Media("image/png".to_string()))
            .with_bytes(vec![1, 2, 3]);
        assert_eq!(req.header("Content-Type"), Some("image/png"));
        assert_eq!(req.body, RequestBody::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_multipart_policy_adds_nothing() {
        let req = HttpRequest::post("https://x").with_policy(ContentPolicy::Multipart);
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_response_helpers() {
        assert!(HttpResponse::empty(204).is_success());
        assert!(HttpResponse::empty(204).is_blank());
        assert!(!HttpResponse::new(404, "nope").is_success());
        assert_eq!(HttpResponse::new(200, "hi").text(), "hi");
        assert!(HttpResponse::new(200, " \n").is_blank());
    }
}
