//! Content-type detection and video dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::errors::JobError;

/// Fallback content type for audio samples with unknown extensions.
pub const DEFAULT_AUDIO_TYPE: &str = "audio/mpeg";

/// Guesses a content type from the filename extension.
#[must_use]
pub fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Content type of an avatar photo; anything other than `image/*` is refused.
pub fn image_content_type(filename: &str) -> Result<String, JobError> {
    let content_type = content_type_for(filename);
    if content_type.starts_with("image/") {
        Ok(content_type)
    } else {
        Err(JobError::unsupported_media_type(filename, content_type))
    }
}

/// Content type of a voice sample, defaulting to MP3.
#[must_use]
pub fn audio_content_type(filename: &str) -> String {
    let content_type = content_type_for(filename);
    if content_type.starts_with("audio/") {
        content_type
    } else {
        DEFAULT_AUDIO_TYPE.to_string()
    }
}

/// Output frame size of a generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDimension {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for VideoDimension {
    fn default() -> Self {
        Self::HD_720P
    }
}

impl fmt::Display for VideoDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl VideoDimension {
    /// 1920x1080.
    pub const LANDSCAPE_16_9: Self = Self::new(1920, 1080);
    /// 1080x1920.
    pub const PORTRAIT_9_16: Self = Self::new(1080, 1920);
    /// 1080x1080.
    pub const SQUARE: Self = Self::new(1080, 1080);
    /// 1080x1350.
    pub const PORTRAIT_4_5: Self = Self::new(1080, 1350);
    /// 1280x720.
    pub const HD_720P: Self = Self::new(1280, 720);

    /// Creates a dimension.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parses a preset (`16:9`, `9:16`, `1:1`, `4:5`, `720p`) or a custom `WxH`.
    #[must_use]
    pub fn from_preset(preset: &str) -> Option<Self> {
        let preset = preset.trim().to_ascii_lowercase();
        match preset.as_str() {
            "16:9" => Some(Self::LANDSCAPE_16_9),
            "9:16" => Some(Self::PORTRAIT_9_16),
            "1:1" => Some(Self::SQUARE),
            "4:5" => Some(Self::PORTRAIT_4_5),
            "720p" => Some(Self::HD_720P),
            custom => {
                let (w, h) = custom.split_once('x')?;
                let width: u32 = w.trim().parse().ok()?;
                let height: u32 = h.trim().parse().ok()?;
                (width > 0 && height > 0).then_some(Self::new(width, height))
            }
        }
    }

    /// Like [`VideoDimension::from_preset`], falling back to 720p with a warning.
    #[must_use]
    pub fn parse_or_default(preset: &str) -> Self {
        Self::from_preset(preset).unwrap_or_else(|| {
            warn!(preset, "Unrecognised video dimension, using 1280x720");
            Self::HD_720P
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type("face.png").unwrap(), "image/png");
        assert_eq!(image_content_type("FACE.JPG").unwrap(), "image/jpeg");
        assert_eq!(image_content_type("face.jpeg").unwrap(), "image/jpeg");
    }

    #[test]
    fn test_image_content_type_rejects_other_media() {
        let err = image_content_type("notes.pdf").unwrap_err();
        assert_eq!(
            err,
            JobError::unsupported_media_type("notes.pdf", "application/pdf")
        );
        assert!(image_content_type("noext").is_err());
    }

    #[test]
    fn test_audio_content_type_defaults_to_mpeg() {
        assert_eq!(audio_content_type("sample.wav"), "audio/wav");
        assert_eq!(audio_content_type("sample"), DEFAULT_AUDIO_TYPE);
    }

    #[test]
    fn test_dimension_presets() {
        assert_eq!(VideoDimension::from_preset("16:9"), Some(VideoDimension::new(1920, 1080)));
        assert_eq!(VideoDimension::from_preset("9:16"), Some(VideoDimension::new(1080, 1920)));
        assert_eq!(VideoDimension::from_preset("1:1"), Some(VideoDimension::new(1080, 1080)));
        assert_eq!(VideoDimension::from_preset("4:5"), Some(VideoDimension::new(1080, 1350)));
        assert_eq!(VideoDimension::from_preset("720P"), Some(VideoDimension::new(1280, 720)));
        assert_eq!(VideoDimension::from_preset("640x360"), Some(VideoDimension::new(640, 360)));
    }

    #[test]
    fn test_dimension_fallback() {
        assert_eq!(VideoDimension::from_preset("0x100"), None);
        assert_eq!(VideoDimension::from_preset("wide"), None);
        assert_eq!(VideoDimension::parse_or_default("wide"), VideoDimension::HD_720P);
        assert_eq!(VideoDimension::default().to_string(), "1280x720");
    }
}
