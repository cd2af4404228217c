//! Gemini script writer.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::require_key;
use crate::errors::JobError;
use crate::http::envelope::{decode_json, lookup, str_at};
use crate::http::{ContentPolicy, HttpRequest, HttpTransport};

/// Default Generative Language API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro-preview-05-06";

/// Target length of a narration script.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptSizing {
    /// Desired spoken duration.
    pub target_duration_seconds: u32,
    /// Speaking rate used to convert duration into words.
    pub words_per_second: f64,
}

impl Default for ScriptSizing {
    fn default() -> Self {
        Self {
            target_duration_seconds: 25,
            words_per_second: 2.5,
        }
    }
}

impl ScriptSizing {
    /// Word budget: `floor(duration * words_per_second)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn target_words(&self) -> u32 {
        (f64::from(self.target_duration_seconds) * self.words_per_second)
            .floor()
            .max(0.0) as u32
    }
}

/// Client for `models/{model}:generateContent`.
pub struct GeminiClient {
    transport: Arc<dyn HttpTransport>,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client with the default base URL and model.
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: SecretString) -> Result<Self, JobError> {
        require_key(&api_key, "Gemini")?;
        Ok(Self {
            transport,
            api_key,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        })
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Writes a narration script for a property description.
    pub async fn generate_script(
        &self,
        description: &str,
        sizing: &ScriptSizing,
    ) -> Result<String, JobError> {
        if description.trim().is_empty() {
            return Err(JobError::validation("script generation needs a description"));
        }

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let request = HttpRequest::post(url)
            .with_header("x-goog-api-key", self.api_key.expose_secret())
            .with_policy(ContentPolicy::Json)
            .with_json(json!({
                "contents": [{"parts": [{"text": build_prompt(description, sizing)}]}],
            }));
        let body = decode_json(&self.transport.send(request).await?)?;

        let script = candidate_text(&body);
        let script = script.trim();
        if script.is_empty() {
            let feedback = str_at(&body, &["promptFeedback", "blockReason"])
                .map_or_else(|| "no prompt feedback".to_string(), |r| format!("blocked: {r}"));
            return Err(JobError::rejected(format!("Gemini returned an empty script ({feedback})")));
        }

        info!(
            model = %self.model,
            words = script.split_whitespace().count(),
            target_words = sizing.target_words(),
            "Generated narration script"
        );
        Ok(script.to_string())
    }
}

fn build_prompt(description: &str, sizing: &ScriptSizing) -> String {
    let words = sizing.target_words();
    let seconds = sizing.target_duration_seconds;
    format!(
        "You are an enthusiastic and persuasive real estate sales agent writing a promotional \
         video script for prospective residents. Turn the property description below into an \
         inviting narration of about {words} words, suitable for a {seconds}-second video, in a \
         warm, confident and professional tone. Highlight the lifestyle and the features that \
         matter to someone looking to live there, avoid technical jargon, and close with an \
         invitation to imagine living there. Provide ONLY the spoken narration, with no scene \
         directions, camera instructions or other text.\n\n\
         Property Description:\n\"\"\"\n{description}\n\"\"\"\n\n\
         Generate ONLY the narration script text, nothing else."
    )
}

fn candidate_text(body: &Value) -> String {
    lookup(body, &["candidates"])
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| lookup(candidate, &["content", "parts"]))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, Method};
    use crate::testing::{fixtures, ScriptedTransport};

    fn client(transport: &Arc<ScriptedTransport>) -> GeminiClient {
        GeminiClient::new(transport.clone(), SecretString::from("g-key".to_string())).unwrap()
    }

    #[test]
    fn test_target_words_floors() {
        let sizing = ScriptSizing {
            target_duration_seconds: 25,
            words_per_second: 2.5,
        };
        assert_eq!(sizing.target_words(), 62);
        let sizing = ScriptSizing {
            target_duration_seconds: 10,
            words_per_second: 2.0,
        };
        assert_eq!(sizing.target_words(), 20);
    }

    #[test]
    fn test_prompt_mentions_budget() {
        let prompt = build_prompt("Sunny loft", &ScriptSizing::default());
        assert!(prompt.contains("about 62 words"));
        assert!(prompt.contains("25-second video"));
        assert!(prompt.contains("Sunny loft"));
    }

    #[tokio::test]
    async fn test_generate_script_joins_parts() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::Post,
            ":generateContent",
            HttpResponse::json(
                200,
                &json!({"candidates": [{"content": {"parts": [{"text": "Welcome "}, {"text": "home. "}]}}]}),
            ),
        );

        let script = client(&transport)
            .generate_script("Sunny loft", &ScriptSizing::default())
            .await
            .unwrap();
        assert_eq!(script, "Welcome home.");

        let sent = transport.last_request().unwrap();
        assert_eq!(
            sent.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro-preview-05-06:generateContent"
        );
        assert_eq!(sent.header("x-goog-api-key"), Some("g-key"));
    }

    #[tokio::test]
    async fn test_generate_script_empty_answer() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::Post,
            ":generateContent",
            HttpResponse::json(200, &json!({"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}})),
        );

        let err = client(&transport)
            .generate_script("Sunny loft", &ScriptSizing::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            JobError::rejected("Gemini returned an empty script (blocked: SAFETY)")
        );
    }

    #[tokio::test]
    async fn test_generate_script_requires_description() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(Method::Post, ":generateContent", fixtures::gemini_script("unused"));

        let err = client(&transport)
            .generate_script("   ", &ScriptSizing::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Validation { .. }));
        assert_eq!(transport.call_count(":generateContent"), 0);
    }
}
