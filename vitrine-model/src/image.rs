use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{ModelError, Result};

/// Image reference exactly as declared in token metadata.
///
/// May be a decentralized-storage URI (`ipfs://...`) or an already resolved
/// gateway URL. Never rewritten in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ImageReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImageReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single-gateway form of an [`ImageReference`].
///
/// Produced by the address normalizer. An empty address means the token has
/// no image and must never be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct CanonicalAddress(String);

impl CanonicalAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache-bucket key derived from a [`CanonicalAddress`].
///
/// Rendered as an unsigned base-10 integer when used as a path segment on
/// the shared cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ContentFingerprint(u32);

impl ContentFingerprint {
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoding tag attached to a decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ImageEncoding {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
    Avif,
    Svg,
    /// Payload we could not classify; handed to the renderer as-is.
    Unknown,
}

impl ImageEncoding {
    pub const fn mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Gif => "image/gif",
            ImageEncoding::WebP => "image/webp",
            ImageEncoding::Bmp => "image/bmp",
            ImageEncoding::Avif => "image/avif",
            ImageEncoding::Svg => "image/svg+xml",
            ImageEncoding::Unknown => "application/octet-stream",
        }
    }

    /// Map a `Content-Type` header value to an encoding, ignoring parameters.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(ImageEncoding::Png),
            "image/jpeg" | "image/jpg" => Some(ImageEncoding::Jpeg),
            "image/gif" => Some(ImageEncoding::Gif),
            "image/webp" => Some(ImageEncoding::WebP),
            "image/bmp" => Some(ImageEncoding::Bmp),
            "image/avif" => Some(ImageEncoding::Avif),
            "image/svg+xml" => Some(ImageEncoding::Svg),
            _ => None,
        }
    }
}

/// A payload ready to hand to the renderer.
///
/// Cheap to clone; the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderableImage {
    bytes: Arc<[u8]>,
    encoding: ImageEncoding,
    dimensions: Option<(u32, u32)>,
}

impl RenderableImage {
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        encoding: ImageEncoding,
    ) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ModelError::EmptyPayload);
        }
        Ok(Self {
            bytes,
            encoding,
            dimensions: None,
        })
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Inline `data:` URI suitable for an `<img src>` attribute.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.encoding.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }
}

impl fmt::Debug for RenderableImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderableImage")
            .field("len", &self.bytes.len())
            .field("encoding", &self.encoding)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_rejected() {
        let err = RenderableImage::new(Vec::new(), ImageEncoding::Png)
            .expect_err("empty payload must not be renderable");
        assert_eq!(err, ModelError::EmptyPayload);
    }

    #[test]
    fn data_uri_carries_mime_and_base64_body() {
        let image =
            RenderableImage::new(b"abc".to_vec(), ImageEncoding::Jpeg).unwrap();
        assert_eq!(image.data_uri(), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn mime_parameters_are_ignored() {
        assert_eq!(
            ImageEncoding::from_mime("Image/PNG; charset=binary"),
            Some(ImageEncoding::Png)
        );
        assert_eq!(ImageEncoding::from_mime("text/html"), None);
    }

    #[test]
    fn fingerprint_renders_unsigned_decimal() {
        assert_eq!(
            ContentFingerprint::from_raw(u32::MAX).to_string(),
            "4294967295"
        );
    }
}
