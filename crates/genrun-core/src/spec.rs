//! Task specifications and their parameter bounds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Lowest accepted guidance strength.
pub const MIN_GUIDANCE: f64 = 1.0;
/// Highest accepted guidance strength.
pub const MAX_GUIDANCE: f64 = 10.0;
/// Guidance strength used when the caller gives none.
pub const DEFAULT_GUIDANCE: f64 = 7.5;
/// Largest accepted seed.
pub const MAX_SEED: u64 = 2_147_483_647;
/// Lowest accepted image count.
pub const MIN_IMAGE_COUNT: u32 = 1;
/// Highest accepted image count.
pub const MAX_IMAGE_COUNT: u32 = 4;

/// Requested output size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    #[default]
    Medium,
    Large,
}

impl SizeClass {
    /// Pixel dimensions rendered into the prompt.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Small => (512, 512),
            Self::Medium => (1024, 1024),
            Self::Large => (2048, 2048),
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{}x{}", w, h)
    }
}

impl FromStr for SizeClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "512x512" => Ok(Self::Small),
            "medium" | "1024x1024" => Ok(Self::Medium),
            "large" | "2048x2048" => Ok(Self::Large),
            other => Err(CoreError::UnknownVariant {
                kind: "size",
                value: other.to_string(),
            }),
        }
    }
}

/// Immutable description of one image generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Text prompt describing the image.
    pub prompt: String,

    /// Output size.
    #[serde(default)]
    pub size: SizeClass,

    /// Guidance strength, in `[MIN_GUIDANCE, MAX_GUIDANCE]`.
    pub guidance: f64,

    /// Optional seed for reproducible output.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Number of images to request.
    pub count: u32,

    /// Reference images, each a remote URL or a local path.
    #[serde(default)]
    pub reference_images: Vec<String>,

    /// Where to save outputs.
    ///
    /// `None` means the outputs are not written to disk. `Some("")` means
    /// "save to the default temp location". The two are distinct.
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Filename template for saved outputs.
    #[serde(default)]
    pub filename: Option<String>,
}

impl TaskSpec {
    /// Create a TaskSpec with default parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            size: SizeClass::default(),
            guidance: DEFAULT_GUIDANCE,
            seed: None,
            count: MIN_IMAGE_COUNT,
            reference_images: Vec::new(),
            output_dir: None,
            filename: None,
        }
    }

    /// Builder method to set the size class.
    pub fn with_size(mut self, size: SizeClass) -> Self {
        self.size = size;
        self
    }

    /// Builder method to set the guidance strength.
    pub fn with_guidance(mut self, guidance: f64) -> Self {
        self.guidance = guidance;
        self
    }

    /// Builder method to set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder method to set the number of images.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Builder method to add a reference image locator.
    pub fn with_reference_image(mut self, locator: impl Into<String>) -> Self {
        self.reference_images.push(locator.into());
        self
    }

    /// Builder method to request persistence into a directory.
    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Builder method to set the filename template.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Check every parameter against its bounds.
    ///
    /// Performs no I/O.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::InvalidParams("prompt must not be empty".to_string()));
        }

        // Written so that NaN is rejected as well.
        if !(self.guidance >= MIN_GUIDANCE && self.guidance <= MAX_GUIDANCE) {
            return Err(CoreError::InvalidParams(format!(
                "guidance must be between {} and {}, got {}",
                MIN_GUIDANCE, MAX_GUIDANCE, self.guidance
            )));
        }

        if !(MIN_IMAGE_COUNT..=MAX_IMAGE_COUNT).contains(&self.count) {
            return Err(CoreError::InvalidParams(format!(
                "image count must be between {} and {}, got {}",
                MIN_IMAGE_COUNT, MAX_IMAGE_COUNT, self.count
            )));
        }

        if let Some(seed) = self.seed {
            if seed > MAX_SEED {
                return Err(CoreError::InvalidParams(format!(
                    "seed must be between 0 and {}, got {}",
                    MAX_SEED, seed
                )));
            }
        }

        Ok(())
    }
}
