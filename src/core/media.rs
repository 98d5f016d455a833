//! # Media Types and Source Assets
//!
//! The pipeline only compresses three formats: PNG, JPEG and WebP. Everything
//! else is carried through as [`MediaType::Other`] and bypasses compression.
//!
//! The output format of a compression attempt is a pure function of the
//! source type:
//!
//! | Source | Output |
//! |--------|--------|
//! | PNG    | WebP (lossy) |
//! | WebP   | WebP (lossy) |
//! | JPEG / anything else | JPEG |

use std::fmt;
use std::path::Path;

use image::ImageFormat;

/// Declared media type of an input or output image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    Png,
    Jpeg,
    Webp,
    /// Any other MIME type, lower-cased
    Other(String),
}

impl MediaType {
    /// Parse a MIME string. Case and parameters (`;charset=...`) are ignored.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Self::Jpeg,
            "image/webp" => Self::Webp,
            _ => Self::Other(essence),
        }
    }

    /// Guess the media type from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" | "jpe" | "jfif" => Self::Jpeg,
            "webp" => Self::Webp,
            "svg" => Self::Other("image/svg+xml".to_string()),
            "gif" => Self::Other("image/gif".to_string()),
            "bmp" => Self::Other("image/bmp".to_string()),
            "avif" => Self::Other("image/avif".to_string()),
            _ => Self::Other("application/octet-stream".to_string()),
        }
    }

    /// Guess the media type from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or_else(|| Self::Other("application/octet-stream".to_string()))
    }

    /// Canonical MIME string.
    pub fn mime(&self) -> &str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Other(mime) => mime,
        }
    }

    /// Canonical file extension, `None` for unknown types.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Png => Some("png"),
            Self::Jpeg => Some("jpg"),
            Self::Webp => Some("webp"),
            Self::Other(_) => None,
        }
    }

    /// Whether the pipeline will attempt compression for this type.
    pub fn is_compressible(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Lossy format a compression attempt encodes to.
    pub fn output_format(&self) -> OutputFormat {
        match self {
            Self::Png | Self::Webp => OutputFormat::Webp,
            _ => OutputFormat::Jpeg,
        }
    }

    /// Map a sniffed decoder format back to a media type.
    pub fn from_image_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => Self::Png,
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::WebP => Self::Webp,
            other => Self::Other(other.to_mime_type().to_string()),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Lossy output formats the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn media_type(self) -> MediaType {
        match self {
            Self::Jpeg => MediaType::Jpeg,
            Self::Webp => MediaType::Webp,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw bytes of a user-supplied image, as read. Never mutated.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    name: String,
    media_type: MediaType,
    bytes: Vec<u8>,
}

impl SourceAsset {
    pub fn new(name: impl Into<String>, media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type,
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
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

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
