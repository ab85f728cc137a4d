//! Reference-image normalization.
//!
//! Turns caller-supplied locators (remote URLs or local paths) into inline
//! images. The whole list fails on the first bad entry; later entries are
//! never touched.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use genrun_client::Fetcher;
use genrun_core::{mime_for_extension, ImageReference};

use crate::error::GenerationError;
use crate::extract::url_extension;

/// Normalizes reference images into inline payloads.
#[derive(Clone)]
pub struct ReferenceNormalizer {
    fetcher: Arc<dyn Fetcher>,
}

impl ReferenceNormalizer {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Produce one inline image per locator, in input order.
    pub async fn normalize(&self, locators: &[String]) -> Result<Vec<ImageReference>, GenerationError> {
        let mut images = Vec::with_capacity(locators.len());

        for locator in locators {
            let image = self
                .normalize_one(locator)
                .await
                .map_err(|e| e.for_reference(locator))?;
            images.push(image);
        }

        info!(count = images.len(), "Normalized reference images");
        Ok(images)
    }

    async fn normalize_one(&self, locator: &str) -> Result<ImageReference, GenerationError> {
        let trimmed = locator.trim();

        if trimmed.starts_with("data:image/") {
            return Ok(ImageReference::from_data_url(trimmed)?);
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return self.fetch_remote(trimmed).await;
        }

        read_local(trimmed).await
    }

    async fn fetch_remote(&self, url: &str) -> Result<ImageReference, GenerationError> {
        let fetched = self.fetcher.fetch(url).await?;

        let mime_type = fetched
            .content_type
            .filter(|ct| ct.starts_with("image/"))
            .unwrap_or_else(|| {
                let ext = url_extension(url).unwrap_or_default();
                mime_for_extension(&ext).to_string()
            });

        debug!(url = %url, mime = %mime_type, bytes = fetched.bytes.len(), "Fetched reference image");
        Ok(ImageReference::inline(mime_type, fetched.bytes))
    }
}

/// Resolve a path against the current working directory if it is relative.
pub fn absolutize(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

async fn read_local(locator: &str) -> Result<ImageReference, GenerationError> {
    let path = absolutize(locator);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(GenerationError::FileNotFound(path));
        }
        Err(e) => return Err(e.into()),
    };

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let mime_type = mime_for_extension(ext);

    debug!(path = %path.display(), mime = %mime_type, bytes = bytes.len(), "Read reference image");
    Ok(ImageReference::inline(mime_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use genrun_core::FailureKind;

    #[tokio::test]
    async fn test_local_file_inlined_with_extension_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.webp");
        std::fs::write(&path, b"webp-bytes").unwrap();

        let normalizer = ReferenceNormalizer::new(Arc::new(FakeFetcher::new()));
        let images = normalizer
            .normalize(&[path.to_string_lossy().to_string()])
            .await
            .unwrap();

        assert_eq!(images, vec![ImageReference::inline("image/webp", b"webp-bytes".to_vec())]);
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let normalizer = ReferenceNormalizer::new(Arc::new(FakeFetcher::new()));
        let err = normalizer
            .normalize(&["/definitely/not/here.png".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::FileNotFound);
        assert!(err.to_string().contains("/definitely/not/here.png"));
    }

    #[tokio::test]
    async fn test_remote_mime_from_header_then_extension() {
        let fetcher = FakeFetcher::new()
            .with_response("https://img.example/a", b"a".to_vec(), Some("image/gif"))
            .with_response("https://img.example/b.png", b"b".to_vec(), Some("text/plain"))
            .with_response("https://img.example/c", b"c".to_vec(), None);
        let normalizer = ReferenceNormalizer::new(Arc::new(fetcher));

        let images = normalizer
            .normalize(&[
                "https://img.example/a".to_string(),
                "https://img.example/b.png".to_string(),
                "https://img.example/c".to_string(),
            ])
            .await
            .unwrap();

        let mimes: Vec<&str> = images
            .iter()
            .filter_map(|image| match image {
                ImageReference::Inline { mime_type, .. } => Some(mime_type.as_str()),
                ImageReference::External { .. } => None,
            })
            .collect();
        assert_eq!(mimes, ["image/gif", "image/png", "image/jpeg"]);
    }

    #[tokio::test]
    async fn test_fail_fast_names_offending_locator() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("b.png");
        std::fs::write(&local, b"never read").unwrap();

        // The URL has no scripted response, so the fetch fails.
        let fetcher = Arc::new(FakeFetcher::new());
        let normalizer = ReferenceNormalizer::new(fetcher.clone());

        let err = normalizer
            .normalize(&[
                "https://img.example/broken.png".to_string(),
                local.to_string_lossy().to_string(),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::TransportError);
        assert!(err.to_string().contains("https://img.example/broken.png"));
        assert_eq!(fetcher.calls(), vec!["https://img.example/broken.png".to_string()]);
    }

    #[tokio::test]
    async fn test_later_urls_not_fetched_after_failure() {
        let fetcher = Arc::new(
            FakeFetcher::new().with_response("https://img.example/ok.jpg", b"ok".to_vec(), None),
        );
        let normalizer = ReferenceNormalizer::new(fetcher.clone());

        let result = normalizer
            .normalize(&[
                "https://img.example/ok.jpg".to_string(),
                "https://img.example/fails.jpg".to_string(),
                "https://img.example/never.jpg".to_string(),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_data_url_passes_through() {
        let normalizer = ReferenceNormalizer::new(Arc::new(FakeFetcher::new()));
        let images = normalizer
            .normalize(&["data:image/png;base64,aGVsbG8=".to_string()])
            .await
            .unwrap();
        assert_eq!(images[0], ImageReference::inline("image/png", b"hello".to_vec()));
    }

    #[test]
    fn test_absolutize_relative() {
        let resolved = absolutize("refs/a.png");
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("refs/a.png"));
        assert_eq!(absolutize("/abs/a.png"), PathBuf::from("/abs/a.png"));
    }
}
