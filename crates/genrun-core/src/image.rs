//! Resolved image payloads.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD as BASE64};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::CoreError;

/// MIME type used when neither the source nor the file extension says otherwise.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Providers do not reliably pad inline payloads.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A resolved image, either carried inline or pointed to by a locator.
///
/// Produced by the content extractor or by reference-image normalization;
/// never modified afterwards.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Raw image bytes with their declared MIME type.
    Inline { mime_type: String, data: Vec<u8> },
    /// A dereferenceable http(s) locator.
    External { url: String },
}

impl ImageReference {
    /// Build an inline reference from raw bytes.
    pub fn inline(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Inline {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Build an external reference from a URL.
    pub fn external(url: impl Into<String>) -> Self {
        Self::External { url: url.into() }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL into an inline reference.
    ///
    /// Whitespace inside the payload (line wrapping) is ignored and padding
    /// is optional.
    pub fn from_data_url(value: &str) -> Result<Self, CoreError> {
        let (meta, payload) = value
            .trim()
            .split_once(',')
            .ok_or_else(|| CoreError::InvalidDataUrl("missing ',' separator".to_string()))?;

        let meta = meta
            .strip_prefix("data:")
            .ok_or_else(|| CoreError::InvalidDataUrl("missing 'data:' prefix".to_string()))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| CoreError::InvalidDataUrl("only base64 payloads are supported".to_string()))?;
        if mime_type.is_empty() {
            return Err(CoreError::InvalidDataUrl("empty MIME type".to_string()));
        }

        let payload: Vec<u8> = payload.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        let data = LENIENT_BASE64
            .decode(&payload)
            .map_err(|e| CoreError::InvalidDataUrl(e.to_string()))?;

        Ok(Self::inline(mime_type, data))
    }

    /// The locator string: the URL itself, or a data URL for inline images.
    pub fn locator(&self) -> String {
        match self {
            Self::Inline { mime_type, data } => {
                format!("data:{};base64,{}", mime_type, BASE64.encode(data))
            }
            Self::External { url } => url.clone(),
        }
    }
}

impl std::fmt::Debug for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline { mime_type, data } => f
                .debug_struct("Inline")
                .field("mime_type", mime_type)
                .field("bytes", &data.len())
                .finish(),
            Self::External { url } => f.debug_struct("External").field("url", url).finish(),
        }
    }
}

/// Map a file extension (without the dot, any case) to an image MIME type.
///
/// Unknown extensions fall back to [`DEFAULT_MIME_TYPE`].
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Map an image MIME type to the file extension used when saving it.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}
