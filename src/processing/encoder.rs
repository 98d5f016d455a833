//! # Lossy Encoder
//!
//! Encode-at-quality primitive used by the compression search. Quality is a
//! float in `[0, 1]`; each backend maps it onto its own scale.
//!
//! - JPEG: `image`'s baseline encoder, quality `round(q * 100)` clamped to 1..=100.
//!   Alpha is flattened onto black first.
//! - WebP: libwebp lossy mode via the `webp` crate, quality `q * 100`.
//!   Alpha is kept.
//!
//! Both backends are deterministic: the same pixels at the same quality
//! always produce the same bytes.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::core::media::OutputFormat;
use crate::error::{CompressError, CompressResult};
use crate::processing::raster::PixelBuffer;

/// Encode-at-quality primitive.
pub trait Encoder {
    /// Encode `pixels` as `format` at `quality` in `[0, 1]`.
    fn encode(&self, pixels: &PixelBuffer, format: OutputFormat, quality: f32) -> CompressResult<Vec<u8>>;
}

/// JPEG + WebP lossy [`Encoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LossyEncoder;

impl LossyEncoder {
    pub fn new() -> Self {
        Self
    }

    fn encode_jpeg(&self, pixels: &PixelBuffer, quality: f32) -> CompressResult<Vec<u8>> {
        let rgb = flatten_rgba(pixels.as_raw());
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality));
        encoder
            .encode(&rgb, pixels.width(), pixels.height(), ExtendedColorType::Rgb8)
            .map_err(|e| CompressError::encode(OutputFormat::Jpeg.name(), quality, e.to_string()))?;
        Ok(buf)
    }

    fn encode_webp(&self, pixels: &PixelBuffer, quality: f32) -> CompressResult<Vec<u8>> {
        let encoder = webp::Encoder::from_rgba(pixels.as_raw(), pixels.width(), pixels.height());
        let memory = encoder
            .encode_simple(false, quality * 100.0)
            .map_err(|e| CompressError::encode(OutputFormat::Webp.name(), quality, format!("{:?}", e)))?;
        Ok(memory.to_vec())
    }
}

impl Encoder for LossyEncoder {
    fn encode(&self, pixels: &PixelBuffer, format: OutputFormat, quality: f32) -> CompressResult<Vec<u8>> {
        if !(0.0..=1.0).contains(&quality) {
            return Err(CompressError::encode(format.name(), quality, "quality must be in [0, 1]"));
        }
        if pixels.size().is_empty() {
            return Err(CompressError::encode(format.name(), quality, "zero-area buffer"));
        }
        match format {
            OutputFormat::Jpeg => self.encode_jpeg(pixels, quality),
            OutputFormat::Webp => self.encode_webp(pixels, quality),
        }
    }
}

/// Map `[0, 1]` onto the JPEG 1..=100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

fn flatten_rgba(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            rgb.extend_from_slice(&px[..3]);
        } else {
            rgb.extend(px[..3].iter().map(|&c| ((u16::from(c) * a + 127) / 255) as u8));
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use budget_scale::plan::Size;

    fn gradient(w: u32, h: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255]);
            }
        }
        PixelBuffer::from_rgba(Size::new(w, h), data).unwrap()
    }

    #[test]
    fn test_jpeg_signature() {
        let bytes = LossyEncoder::new().encode(&gradient(64, 48), OutputFormat::Jpeg, 0.8).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_webp_signature() {
        let bytes = LossyEncoder::new().encode(&gradient(64, 48), OutputFormat::Webp, 0.8).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let pixels = gradient(96, 64);
        let encoder = LossyEncoder::new();
        for format in [OutputFormat::Jpeg, OutputFormat::Webp] {
            let a = encoder.encode(&pixels, format, 0.74).unwrap();
            let b = encoder.encode(&pixels, format, 0.74).unwrap();
            assert_eq!(a, b, "{} output differs between runs", format);
        }
    }

    #[test]
    fn test_lower_quality_is_not_larger() {
        let pixels = gradient(128, 128);
        let encoder = LossyEncoder::new();
        let high = encoder.encode(&pixels, OutputFormat::Jpeg, 0.95).unwrap();
        let low = encoder.encode(&pixels, OutputFormat::Jpeg, 0.3).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        let pixels = gradient(8, 8);
        let encoder = LossyEncoder::new();
        for q in [-0.1, 1.1, f32::NAN] {
            let err = encoder.encode(&pixels, OutputFormat::Jpeg, q).unwrap_err();
            assert_eq!(err.category(), "encode");
        }
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(jpeg_quality(0.86), 86);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(1.0), 100);
    }

    #[test]
    fn test_flatten_premultiplies_onto_black() {
        assert_eq!(flatten_rgba(&[200, 100, 50, 255, 200, 100, 50, 0]), vec![200, 100, 50, 0, 0, 0]);
        assert_eq!(flatten_rgba(&[255, 255, 255, 128]), vec![128, 128, 128]);
    }
}
