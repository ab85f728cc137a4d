//! Job-based video generation requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Shortest accepted video duration in seconds.
pub const MIN_VIDEO_DURATION_SECS: u32 = 5;
/// Longest accepted video duration in seconds.
pub const MAX_VIDEO_DURATION_SECS: u32 = 25;
/// Duration used when the caller gives none.
pub const DEFAULT_VIDEO_DURATION_SECS: u32 = 10;

/// Frame orientation of a generated video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Landscape,
    Portrait,
    Square,
}

impl AspectRatio {
    /// Wire value sent to the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landscape" | "16:9" => Ok(Self::Landscape),
            "portrait" | "9:16" => Ok(Self::Portrait),
            "square" | "1:1" => Ok(Self::Square),
            other => Err(CoreError::UnknownVariant {
                kind: "aspect ratio",
                value: other.to_string(),
            }),
        }
    }
}

/// A request to generate one video through a job-based provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub prompt: String,
    /// Provider model; the configured default is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// High-quality rendering.
    #[serde(default)]
    pub hd: bool,
    pub duration_secs: u32,
    #[serde(default)]
    pub watermark: bool,
    /// Keep the result out of any public gallery.
    pub private: bool,
    /// Image locators used as visual references.
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Same presence rules as `TaskSpec::output_dir`.
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl VideoRequest {
    /// Create a VideoRequest with default parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            aspect_ratio: AspectRatio::default(),
            hd: false,
            duration_secs: DEFAULT_VIDEO_DURATION_SECS,
            watermark: false,
            private: true,
            image_urls: Vec::new(),
            output_dir: None,
        }
    }

    /// Builder method to request high-quality rendering.
    pub fn with_hd(mut self, hd: bool) -> Self {
        self.hd = hd;
        self
    }

    /// Builder method to set the duration.
    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Builder method to set the aspect ratio.
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Check the request before submission.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::InvalidParams("prompt must not be empty".to_string()));
        }

        if !(MIN_VIDEO_DURATION_SECS..=MAX_VIDEO_DURATION_SECS).contains(&self.duration_secs) {
            return Err(CoreError::InvalidParams(format!(
                "duration must be between {} and {} seconds, got {}",
                MIN_VIDEO_DURATION_SECS, MAX_VIDEO_DURATION_SECS, self.duration_secs
            )));
        }

        if let Some(bad) = self
            .image_urls
            .iter()
            .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
        {
            return Err(CoreError::InvalidParams(format!(
                "image references for video jobs must be http(s) URLs, got '{}'",
                bad
            )));
        }

        Ok(())
    }
}
