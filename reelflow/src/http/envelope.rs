//! Decoding vendor response envelopes.
//!
//! Every vendor wraps its payload differently, but failures share a shape:
//! non-2xx is [`JobError::Http`], an undecodable 2xx body is
//! [`JobError::MalformedResponse`], and a decodable body without the
//! operation's success marker is [`JobError::VendorRejected`].

use serde_json::Value;
use tracing::{info, warn};

use super::HttpResponse;
use crate::errors::JobError;

/// Fails with [`JobError::Http`] unless the status is 2xx.
pub fn ensure_success(response: &HttpResponse) -> Result<(), JobError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(JobError::http(response.status, response.text()))
    }
}

/// Checks the status and decodes the body as JSON.
pub fn decode_json(response: &HttpResponse) -> Result<Value, JobError> {
    ensure_success(response)?;
    if response.is_blank() {
        return Err(JobError::malformed(format!(
            "empty body with HTTP {}",
            response.status
        )));
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| JobError::malformed(format!("invalid JSON: {e}")))
}

/// Walks a path of object keys.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Returns a non-empty string at the path.
#[must_use]
pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(value, path)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Extracts a message from an `error` field that is either a string or `{message}`.
#[must_use]
pub fn error_text(error: &Value) -> Option<String> {
    match error {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(_) => str_at(error, &["message"])
            .map(ToString::to_string)
            .or_else(|| str_at(error, &["detail"]).map(ToString::to_string)),
        _ => None,
    }
}

/// Finds the vendor's own explanation in a response body.
///
/// Looks at `error` (string or object), then `message`, then `data.error`.
#[must_use]
pub fn vendor_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(error_text)
        .or_else(|| str_at(body, &["message"]).map(ToString::to_string))
        .or_else(|| lookup(body, &["data", "error"]).and_then(error_text))
}

/// Builds a [`JobError::VendorRejected`] from the body, or the fallback text.
#[must_use]
pub fn rejection(body: &Value, fallback: &str) -> JobError {
    JobError::rejected(vendor_message(body).unwrap_or_else(|| fallback.to_string()))
}

/// Requires a non-empty string at the path, or rejects.
pub fn require_str(body: &Value, path: &[&str], fallback: &str) -> Result<String, JobError> {
    str_at(body, path)
        .map(ToString::to_string)
        .ok_or_else(|| rejection(body, fallback))
}

/// Interprets the response to an idempotent delete.
///
/// 404 means the resource is already gone and counts as success. 204, or a
/// 2xx with an empty body, is success. A 2xx JSON body must carry
/// `code == 0` and a message containing "success"; anything else is
/// reported as `Ok(false)`.
pub fn interpret_delete(response: &HttpResponse, resource: &str) -> Result<bool, JobError> {
    if response.status == 404 {
        info!(resource, "Resource already deleted (404)");
        return Ok(true);
    }
    ensure_success(response)?;
    if response.status == 204 || response.is_blank() {
        return Ok(true);
    }

    let body: Value = serde_json::from_slice(&response.body)
        .map_err(|e| JobError::malformed(format!("invalid JSON in delete response: {e}")))?;
    let code_ok = body.get("code").and_then(Value::as_i64) == Some(0);
    let message_ok = str_at(&body, &["message"])
        .is_some_and(|m| m.to_ascii_lowercase().contains("success"));

    if code_ok && message_ok {
        Ok(true)
    } else {
        warn!(resource, body = %body, "Delete answered 2xx without a success marker");
        Ok(false)
    }
}
