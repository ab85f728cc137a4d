//! Writing generated outputs to disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use genrun_client::Fetcher;
use genrun_core::{extension_for_mime, ImageReference};

use crate::error::GenerationError;
use crate::extract::{has_image_extension, url_extension};
use crate::normalize::absolutize;

/// Extension used when nothing better is known.
const FALLBACK_EXTENSION: &str = "png";

/// Saves images and videos into caller-chosen directories.
#[derive(Clone)]
pub struct OutputWriter {
    fetcher: Arc<dyn Fetcher>,
    default_dir: PathBuf,
}

impl OutputWriter {
    /// `default_dir` is used when a caller asks for persistence with an empty path.
    pub fn new(fetcher: Arc<dyn Fetcher>, default_dir: PathBuf) -> Self {
        Self {
            fetcher,
            default_dir,
        }
    }

    /// Resolve the requested output directory.
    ///
    /// `None` means "do not persist" and stays `None`. A present but blank
    /// value selects the default directory.
    pub fn resolve_dir(&self, requested: Option<&str>) -> Option<PathBuf> {
        let requested = requested?;
        if requested.trim().is_empty() {
            Some(self.default_dir.clone())
        } else {
            Some(absolutize(requested.trim()))
        }
    }

    /// Save every output into `dir`, one entry per output.
    ///
    /// A failed save yields `None` for that image and never affects the others.
    pub async fn save_all(
        &self,
        outputs: &[ImageReference],
        dir: &Path,
        filename: Option<&str>,
    ) -> Vec<Option<PathBuf>> {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "Failed to create output directory");
            return vec![None; outputs.len()];
        }

        let stamp = timestamp();
        let mut saved = Vec::with_capacity(outputs.len());

        for (index, image) in outputs.iter().enumerate() {
            match self.save_one(image, dir, filename, index, outputs.len(), &stamp).await {
                Ok(path) => {
                    info!(path = %path.display(), "Saved image");
                    saved.push(Some(path));
                }
                Err(e) => {
                    warn!(index, locator = %abbreviate(image), error = %e, "Failed to save image");
                    saved.push(None);
                }
            }
        }

        saved
    }

    async fn save_one(
        &self,
        image: &ImageReference,
        dir: &Path,
        filename: Option<&str>,
        index: usize,
        total: usize,
        stamp: &str,
    ) -> Result<PathBuf, GenerationError> {
        let (bytes, ext) = match image {
            ImageReference::Inline { mime_type, data } => {
                (data.clone(), extension_for_mime(mime_type).to_string())
            }
            ImageReference::External { url } => {
                let fetched = self.fetcher.fetch(url).await?;
                let ext = fetched
                    .content_type
                    .as_deref()
                    .filter(|ct| ct.starts_with("image/"))
                    .map(|ct| extension_for_mime(ct).to_string())
                    .or_else(|| url_extension(url).filter(|_| has_image_extension(url)))
                    .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
                (fetched.bytes, ext)
            }
        };

        let name = output_filename(filename, index, total, &ext, stamp);
        let path = dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }

    /// Download `url` into `dir` as `<prefix>_<timestamp>.<ext>`.
    pub async fn download(
        &self,
        url: &str,
        dir: &Path,
        prefix: &str,
        ext: &str,
    ) -> Result<PathBuf, GenerationError> {
        tokio::fs::create_dir_all(dir).await?;

        let fetched = self.fetcher.fetch(url).await?;
        let path = dir.join(format!("{}_{}.{}", prefix, timestamp(), ext));
        tokio::fs::write(&path, &fetched.bytes).await?;

        debug!(url = %url, path = %path.display(), bytes = fetched.bytes.len(), "Downloaded output");
        Ok(path)
    }
}

/// Name for output `index` (0-based) of `total`.
///
/// With a template, only its final path component is used. A single output
/// takes the template as-is (adding `ext` if it has none); several outputs get
/// a 1-based `_<n>` suffix before the extension. Without a template the name
/// is `image_<stamp>_<n>.<ext>`.
pub fn output_filename(
    template: Option<&str>,
    index: usize,
    total: usize,
    ext: &str,
    stamp: &str,
) -> String {
    let number = index + 1;

    let template = template
        .map(|t| {
            Path::new(t.trim())
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string()
        })
        .filter(|t| !t.is_empty());

    let Some(template) = template else {
        return format!("image_{}_{}.{}", stamp, number, ext);
    };

    let (stem, ext) = match template.rsplit_once('.') {
        Some((stem, given)) if !stem.is_empty() && !given.is_empty() => (stem.to_string(), given.to_string()),
        _ => (template.clone(), ext.to_string()),
    };

    if total > 1 {
        format!("{}_{}.{}", stem, number, ext)
    } else {
        format!("{}.{}", stem, ext)
    }
}

/// UTC timestamp with millisecond precision, safe for filenames.
pub fn timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

fn abbreviate(image: &ImageReference) -> String {
    match image {
        ImageReference::Inline { mime_type, data } => format!("inline {} ({} bytes)", mime_type, data.len()),
        ImageReference::External { url } => url.clone(),
    }
}
