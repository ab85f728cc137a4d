//! Image reference extraction from free-form response text.
//!
//! Three passes run in fixed priority order, each appending only locators not
//! already seen:
//! 1. inline `data:image/<subtype>;base64,<payload>` blocks, possibly
//!    line-wrapped
//! 2. markdown embeds `![alt](http(s)://...)`
//! 3. bare http(s) URLs whose path ends in a known image extension

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use genrun_core::ImageReference;

/// Extensions a bare URL must end in to count as an image.
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

// Continuation lines must follow a line break; a space alone ends the payload.
static INLINE_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/(?:png|jpeg|jpg|gif|webp);base64,[A-Za-z0-9+/]+(?:[ \t]*\r?\n[ \t]*[A-Za-z0-9+/]+)*=*")
        .expect("valid regex")
});

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[[^\]]*\]\((https?://[^\s)]+)").expect("valid regex")
});

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'()\[\]]+"#).expect("valid regex")
});

/// Ordered, deduplicated collector.
#[derive(Default)]
struct Collector {
    seen: HashSet<String>,
    out: Vec<ImageReference>,
}

impl Collector {
    /// Returns false if the locator was already collected.
    fn claim(&mut self, locator: &str) -> bool {
        self.seen.insert(locator.to_string())
    }

    fn push_inline(&mut self, block: &str) {
        let locator: String = block.split_ascii_whitespace().collect();
        if !self.claim(&locator) {
            return;
        }
        match ImageReference::from_data_url(&locator) {
            Ok(image) => self.out.push(image),
            Err(e) => warn!(error = %e, bytes = locator.len(), "Skipping undecodable inline image"),
        }
    }

    fn push_url(&mut self, url: &str) {
        if self.claim(url) {
            self.out.push(ImageReference::external(url));
        }
    }
}

/// Recover every image reference from `text`, in priority order.
///
/// An empty result is not an error here; callers decide what it means.
pub fn extract_images(text: &str) -> Vec<ImageReference> {
    let mut collector = Collector::default();

    for m in INLINE_DATA.find_iter(text) {
        collector.push_inline(m.as_str());
    }

    for caps in MARKDOWN_IMAGE.captures_iter(text) {
        if let Some(url) = caps.get(1) {
            collector.push_url(url.as_str());
        }
    }

    for m in BARE_URL.find_iter(text) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
        if has_image_extension(url) {
            collector.push_url(url);
        }
    }

    debug!(found = collector.out.len(), "Extracted image references");
    collector.out
}

/// Whether the URL's path (ignoring query and fragment) ends in an image extension.
pub fn has_image_extension(url: &str) -> bool {
    url_extension(url)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Lowercased extension of a URL's path, ignoring query and fragment.
pub fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
