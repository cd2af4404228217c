//! Environment-driven settings.
//!
//! [`Settings::load`] reads a `.env` file (if present) and then the process
//! environment. Every value has a default except the secrets, the Supabase
//! project URL, the Shotstack template/owner ids and the default HeyGen ids.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::errors::ConfigError;
use crate::poller::PollPolicy;
use crate::vendors::{
    HeyGenEndpoints, ScriptSizing, ShotstackEndpoints, DEFAULT_BUCKET, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_TTS_MODEL, DEFAULT_TTS_VOICE,
};

/// Delays and budgets for every waiting point of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    /// Avatar-group look readiness.
    #[serde(default = "default_look_poll")]
    pub look_poll: PollPolicy,
    /// Video generation.
    #[serde(default = "default_video_poll")]
    pub video_poll: PollPolicy,
    /// Group training.
    #[serde(default = "default_training_poll")]
    pub training_poll: PollPolicy,
    /// Shotstack render.
    #[serde(default = "default_render_poll")]
    pub render_poll: PollPolicy,
    /// Pause after cloning a voice before it is used.
    #[serde(default = "default_voice_clone_settle", with = "duration_secs")]
    pub voice_clone_settle: Duration,
}

fn default_look_poll() -> PollPolicy {
    PollPolicy::new(24, Duration::from_secs(5))
}

fn default_video_poll() -> PollPolicy {
    PollPolicy::new(90, Duration::from_secs(10))
}

fn default_training_poll() -> PollPolicy {
    PollPolicy::new(60, Duration::from_secs(10))
}

fn default_render_poll() -> PollPolicy {
    PollPolicy::new(90, Duration::from_secs(10))
}

fn default_voice_clone_settle() -> Duration {
    Duration::from_secs(10)
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            look_poll: default_look_poll(),
            video_poll: default_video_poll(),
            training_poll: default_training_poll(),
            render_poll: default_render_poll(),
            voice_clone_settle: default_voice_clone_settle(),
        }
    }
}

impl Pacing {
    /// Millisecond pacing with tiny budgets, for tests and dry runs.
    #[must_use]
    pub fn immediate() -> Self {
        let fast = PollPolicy::new(5, Duration::from_millis(1));
        Self {
            look_poll: fast,
            video_poll: fast,
            training_poll: fast,
            render_poll: fast,
            voice_clone_settle: Duration::ZERO,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Log filter and output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `reelflow=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

/// Credentials held as secrets; never printed.
#[derive(Default, Clone)]
pub struct ApiKeys {
    /// HeyGen API key.
    pub heygen: Option<SecretString>,
    /// Shotstack API key.
    pub shotstack: Option<SecretString>,
    /// Gemini API key.
    pub gemini: Option<SecretString>,
    /// OpenAI API key.
    pub openai: Option<SecretString>,
    /// Supabase service-role key.
    pub supabase: Option<SecretString>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = |key: &Option<SecretString>| if key.is_some() { "set" } else { "unset" };
        f.debug_struct("ApiKeys")
            .field("heygen", &state(&self.heygen))
            .field("shotstack", &state(&self.shotstack))
            .field("gemini", &state(&self.gemini))
            .field("openai", &state(&self.openai))
            .field("supabase", &state(&self.supabase))
            .finish()
    }
}

/// Everything a run needs from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Vendor credentials.
    pub keys: ApiKeys,
    /// HeyGen base URLs.
    pub heygen: HeyGenEndpoints,
    /// Shotstack endpoints.
    pub shotstack: ShotstackEndpoints,
    /// Shotstack template id.
    pub shotstack_template_id: Option<String>,
    /// Shotstack owner id.
    pub shotstack_owner_id: Option<String>,
    /// Gemini base URL.
    pub gemini_base_url: String,
    /// Gemini model.
    pub gemini_model: String,
    /// OpenAI base URL.
    pub openai_base_url: String,
    /// OpenAI TTS voice.
    pub openai_tts_voice: String,
    /// OpenAI TTS model.
    pub openai_tts_model: String,
    /// Supabase project URL.
    pub supabase_url: Option<String>,
    /// Supabase storage bucket.
    pub supabase_bucket: String,
    /// Talking photo used when no avatar photo is supplied.
    pub default_talking_photo_id: Option<String>,
    /// Voice used when none is supplied.
    pub default_voice_id: Option<String>,
    /// Narration script length.
    pub script: ScriptSizing,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Poll budgets and delays.
    pub pacing: Pacing,
    /// Tracing setup.
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keys: ApiKeys::default(),
            heygen: HeyGenEndpoints::default(),
            shotstack: ShotstackEndpoints::default(),
            shotstack_template_id: None,
            shotstack_owner_id: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_tts_voice: DEFAULT_TTS_VOICE.to_string(),
            openai_tts_model: DEFAULT_TTS_MODEL.to_string(),
            supabase_url: None,
            supabase_bucket: DEFAULT_BUCKET.to_string(),
            default_talking_photo_id: None,
            default_voice_id: None,
            script: ScriptSizing::default(),
            http_timeout: Duration::from_secs(120),
            pacing: Pacing::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!(error = %e, "Could not read .env file");
            }
        }
        Self::from_env()
    }

    /// Reads the process environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = Self::default();

        let keys = ApiKeys {
            heygen: env.secret("HEYGEN_API_KEY"),
            shotstack: env.secret("SHOTSTACK_API_KEY"),
            gemini: env.secret("GEMINI_API_KEY"),
            openai: env.secret("OPENAI_API_KEY"),
            supabase: env.secret("SUPABASE_SERVICE_KEY"),
        };

        let heygen = HeyGenEndpoints {
            v1: env.string_or("HEYGEN_V1_BASE_URL", &defaults.heygen.v1),
            v2: env.string_or("HEYGEN_V2_BASE_URL", &defaults.heygen.v2),
            upload: env.string_or("HEYGEN_UPLOAD_URL", &defaults.heygen.upload),
        };
        let shotstack = ShotstackEndpoints {
            render: env.string_or("SHOTSTACK_API_ENDPOINT", &defaults.shotstack.render),
            status_template: env.string_or(
                "SHOTSTACK_STATUS_ENDPOINT_TEMPLATE",
                &defaults.shotstack.status_template,
            ),
        };

        let script = ScriptSizing {
            target_duration_seconds: env.parse_or(
                "TARGET_VIDEO_DURATION_SECONDS",
                defaults.script.target_duration_seconds,
            )?,
            words_per_second: env
                .parse_or("WORDS_PER_SECOND_ESTIMATE", defaults.script.words_per_second)?,
        };
        if !(script.words_per_second.is_finite() && script.words_per_second > 0.0) {
            return Err(ConfigError::invalid(
                "WORDS_PER_SECOND_ESTIMATE",
                script.words_per_second.to_string(),
                "must be a positive number",
            ));
        }

        let pacing = Pacing {
            look_poll: env.policy("LOOK_POLL", defaults.pacing.look_poll)?,
            video_poll: env.policy("VIDEO_POLL", defaults.pacing.video_poll)?,
            training_poll: env.policy("TRAINING_POLL", defaults.pacing.training_poll)?,
            render_poll: env.policy("RENDER_POLL", defaults.pacing.render_poll)?,
            voice_clone_settle: Duration::from_secs(env.parse_or(
                "VOICE_CLONE_SETTLE_SECONDS",
                defaults.pacing.voice_clone_settle.as_secs(),
            )?),
        };

        let logging = LoggingConfig {
            filter: env.string_or("RUST_LOG", &defaults.logging.filter),
            json: env
                .string("REELFLOW_LOG_FORMAT")
                .is_some_and(|format| format.eq_ignore_ascii_case("json")),
        };

        Ok(Self {
            keys,
            heygen,
            shotstack,
            shotstack_template_id: env.string("SHOTSTACK_TEMPLATE_ID"),
            shotstack_owner_id: env.string("SHOTSTACK_OWNER_ID"),
            gemini_base_url: env.string_or("GEMINI_BASE_URL", &defaults.gemini_base_url),
            gemini_model: env.string_or("GEMINI_MODEL", &defaults.gemini_model),
            openai_base_url: env.string_or("OPENAI_BASE_URL", &defaults.openai_base_url),
            openai_tts_voice: env.string_or("OPENAI_TTS_VOICE", &defaults.openai_tts_voice),
            openai_tts_model: env.string_or("OPENAI_TTS_MODEL", &defaults.openai_tts_model),
            supabase_url: env.string("SUPABASE_URL"),
            supabase_bucket: env.string_or("SUPABASE_BUCKET_NAME", &defaults.supabase_bucket),
            default_talking_photo_id: env.string("DEFAULT_HEYGEN_TALKING_PHOTO_ID"),
            default_voice_id: env.string("DEFAULT_HEYGEN_VOICE_ID"),
            script,
            http_timeout: Duration::from_secs(
                env.parse_or("HTTP_TIMEOUT_SECONDS", defaults.http_timeout.as_secs())?,
            ),
            pacing,
            logging,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    fn secret(&self, key: &str) -> Option<SecretString> {
        self.string(key).map(SecretString::from)
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.string(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, raw.clone(), e.to_string())),
            None => Ok(default),
        }
    }

    fn policy(&self, prefix: &str, default: PollPolicy) -> Result<PollPolicy, ConfigError> {
        let attempts_key = format!("{prefix}_MAX_ATTEMPTS");
        let delay_key = format!("{prefix}_DELAY_SECONDS");
        let max_attempts = self.parse_or(&attempts_key, default.max_attempts)?;
        let delay_secs: u64 = self.parse_or(&delay_key, default.delay().as_secs())?;
        let policy = PollPolicy::new(max_attempts, Duration::from_secs(delay_secs));
        policy.validate(&attempts_key)?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert!(s.keys.heygen.is_none());
        assert_eq!(s.supabase_bucket, "videobgm");
        assert_eq!(s.heygen.v2, "https://api.heygen.com/v2");
        assert_eq!(
            s.shotstack.status_template,
            "https://api.shotstack.io/edit/stage/render/{}"
        );
        assert_eq!(s.gemini_model, "gemini-2.5-pro-preview-05-06");
        assert_eq!(s.openai_tts_voice, "alloy");
        assert_eq!(s.script.target_duration_seconds, 25);
        assert!((s.script.words_per_second - 2.5).abs() < f64::EPSILON);
        assert_eq!(s.http_timeout, Duration::from_secs(120));
        assert_eq!(s.pacing, Pacing::default());
        assert_eq!(s.pacing.look_poll, PollPolicy::new(24, Duration::from_secs(5)));
        assert_eq!(s.logging, LoggingConfig::default());
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("HEYGEN_API_KEY", " hg "),
            ("SUPABASE_BUCKET_NAME", "audio"),
            ("VIDEO_POLL_MAX_ATTEMPTS", "12"),
            ("VIDEO_POLL_DELAY_SECONDS", "3"),
            ("VOICE_CLONE_SETTLE_SECONDS", "0"),
            ("REELFLOW_LOG_FORMAT", "JSON"),
            ("RUST_LOG", "reelflow=debug"),
            ("SHOTSTACK_TEMPLATE_ID", "tpl"),
        ])
        .unwrap();

        assert_eq!(s.keys.heygen.unwrap().expose_secret(), "hg");
        assert_eq!(s.supabase_bucket, "audio");
        assert_eq!(s.pacing.video_poll, PollPolicy::new(12, Duration::from_secs(3)));
        assert_eq!(s.pacing.voice_clone_settle, Duration::ZERO);
        assert!(s.logging.json);
        assert_eq!(s.logging.filter, "reelflow=debug");
        assert_eq!(s.shotstack_template_id.as_deref(), Some("tpl"));
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = settings(&[("RENDER_POLL_DELAY_SECONDS", "ten")]).unwrap_err();
        let ConfigError::InvalidValue { key, value, .. } = err else {
            panic!("expected invalid value");
        };
        assert_eq!(key, "RENDER_POLL_DELAY_SECONDS");
        assert_eq!(value, "ten");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = settings(&[("LOOK_POLL_MAX_ATTEMPTS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LOOK_POLL_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_words_per_second_must_be_positive() {
        assert!(settings(&[("WORDS_PER_SECOND_ESTIMATE", "0")]).is_err());
    }

    #[test]
    fn test_keys_debug_hides_values() {
        let s = settings(&[("OPENAI_API_KEY", "sk-secret")]).unwrap();
        let debug = format!("{:?}", s.keys);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("openai: \"set\""));
    }

    #[test]
    fn test_pacing_serde_defaults() {
        let pacing: Pacing = serde_json::from_str(r#"{"voice_clone_settle": 2.5}"#).unwrap();
        assert_eq!(pacing.voice_clone_settle, Duration::from_millis(2500));
        assert_eq!(pacing.render_poll, PollPolicy::new(90, Duration::from_secs(10)));
    }
}
