//! # Raster Transform
//!
//! Decodes compressible source bytes into a tightly packed RGBA8
//! [`PixelBuffer`] and re-renders it at smaller sizes through the
//! `budget-scale` resampler.
//!
//! Decoding sniffs the actual content rather than trusting the declared
//! type: browsers and file pickers label images by extension, and a `.png`
//! that is really a JPEG still decodes. Content that is not PNG, JPEG or WebP
//! is a decode error.

use std::fmt;
use std::io::Cursor;

use budget_scale::cpu::scale_rgba_to_vec;
use budget_scale::plan::Size;
use fast_image_resize::Resizer;
use image::{ImageError, ImageFormat, ImageReader};
use log::{debug, warn};

use crate::core::media::MediaType;
use crate::error::{CompressError, CompressResult};

/// Decoded image, RGBA8, rows tightly packed.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    size: Size,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA8 data. The length must be exactly `w * h * 4`.
    pub fn from_rgba(size: Size, data: Vec<u8>) -> CompressResult<Self> {
        if size.is_empty() {
            return Err(CompressError::validation("pixel buffer", "non-zero area", size.to_string()));
        }
        let expected = budget_scale::cpu::rgba_len(size)
            .ok_or_else(|| CompressError::resource("pixel buffer", format!("{} overflows", size)))?;
        if data.len() != expected {
            return Err(CompressError::validation(
                "pixel buffer",
                format!("{} bytes for {}", expected, size),
                data.len().to_string(),
            ));
        }
        Ok(Self { size, data })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.w
    }

    pub fn height(&self) -> u32 {
        self.size.h
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("size", &self.size)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Decode and resample operations the compression search relies on.
pub trait RasterTransform {
    /// Decode `bytes` declared as `media_type` into RGBA8 pixels.
    fn decode(&self, bytes: &[u8], media_type: &MediaType) -> CompressResult<PixelBuffer>;

    /// Render `pixels` at `size`. Callers only ask for sizes no larger than
    /// the source.
    fn resize(&mut self, pixels: &PixelBuffer, size: Size) -> CompressResult<PixelBuffer>;
}

/// [`RasterTransform`] backed by the `image` decoders and the SIMD resampler.
pub struct CpuRaster {
    resizer: Resizer,
}

impl CpuRaster {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }
}

impl Default for CpuRaster {
    fn default() -> Self {
        Self::new()
    }
}

// The resizer only holds scratch buffers, so a clone starts with fresh ones.
impl Clone for CpuRaster {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl RasterTransform for CpuRaster {
    fn decode(&self, bytes: &[u8], media_type: &MediaType) -> CompressResult<PixelBuffer> {
        let format = sniff_format(bytes, media_type)?;
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| image_error(media_type, e))?;
        let rgba = image.into_rgba8();
        let size = Size::new(rgba.width(), rgba.height());
        debug!("decoded {} source at {}", media_type, size);
        PixelBuffer::from_rgba(size, rgba.into_raw())
            .map_err(|e| CompressError::decode(media_type.mime(), e.to_string()))
    }

    fn resize(&mut self, pixels: &PixelBuffer, size: Size) -> CompressResult<PixelBuffer> {
        if size.w > pixels.width() || size.h > pixels.height() {
            return Err(CompressError::validation(
                "resize target",
                format!("no larger than {}", pixels.size()),
                size.to_string(),
            ));
        }
        let data = scale_rgba_to_vec(&mut self.resizer, pixels.as_raw(), pixels.size(), size)
            .map_err(|e| CompressError::from(e).with_operation("resize"))?;
        Ok(PixelBuffer { size, data })
    }
}

/// Read only the image header to get its dimensions.
pub fn header_dimensions(bytes: &[u8]) -> Option<Size> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format().ok()?;
    let (w, h) = reader.into_dimensions().ok()?;
    Some(Size::new(w, h))
}

fn sniff_format(bytes: &[u8], declared: &MediaType) -> CompressResult<ImageFormat> {
    let sniffed = image::guess_format(bytes)
        .map_err(|e| CompressError::decode(declared.mime(), e.to_string()))?;
    let actual = MediaType::from_image_format(sniffed);
    if !actual.is_compressible() {
        return Err(CompressError::decode(
            declared.mime(),
            format!("content is {}, not a supported image type", actual),
        ));
    }
    if &actual != declared {
        warn!("declared {} but content is {}; decoding as {}", declared, actual, actual);
    }
    Ok(sniffed)
}

fn image_error(media_type: &MediaType, error: ImageError) -> CompressError {
    match error {
        // decoder refused to allocate: not the caller's fault
        ImageError::Limits(e) => CompressError::resource("decode buffer", e.to_string()),
        other => CompressError::decode(media_type.mime(), other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let raster = CpuRaster::new();
        let pixels = raster.decode(&png_bytes(40, 30), &MediaType::Png).unwrap();
        assert_eq!(pixels.size(), Size::new(40, 30));
        assert_eq!(pixels.as_raw().len(), 40 * 30 * 4);
    }

    #[test]
    fn test_decode_sniffs_mislabelled_content() {
        let raster = CpuRaster::new();
        let pixels = raster.decode(&png_bytes(8, 8), &MediaType::Jpeg).unwrap();
        assert_eq!(pixels.size(), Size::new(8, 8));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let raster = CpuRaster::new();
        let err = raster.decode(b"definitely not an image", &MediaType::Png).unwrap_err();
        assert_eq!(err.category(), "decode");
    }

    #[test]
    fn test_decode_truncated_png_is_decode_error() {
        let raster = CpuRaster::new();
        let bytes = png_bytes(32, 32);
        let err = raster.decode(&bytes[..bytes.len() / 2], &MediaType::Png).unwrap_err();
        assert_eq!(err.category(), "decode");
    }

    #[test]
    fn test_resize_down() {
        let mut raster = CpuRaster::new();
        let pixels = raster.decode(&png_bytes(40, 30), &MediaType::Png).unwrap();
        let small = raster.resize(&pixels, Size::new(20, 15)).unwrap();
        assert_eq!(small.size(), Size::new(20, 15));
        assert_eq!(small.as_raw().len(), 20 * 15 * 4);
    }

    #[test]
    fn test_resize_refuses_upsampling() {
        let mut raster = CpuRaster::new();
        let pixels = raster.decode(&png_bytes(10, 10), &MediaType::Png).unwrap();
        assert!(raster.resize(&pixels, Size::new(20, 10)).is_err());
    }

    #[test]
    fn test_cloned_raster_resizes_independently() {
        let mut raster = CpuRaster::new();
        let pixels = raster.decode(&png_bytes(40, 30), &MediaType::Png).unwrap();
        let mut copy = raster.clone();
        let a = raster.resize(&pixels, Size::new(20, 15)).unwrap();
        let b = copy.resize(&pixels, Size::new(20, 15)).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_header_dimensions() {
        assert_eq!(header_dimensions(&png_bytes(17, 9)), Some(Size::new(17, 9)));
        assert_eq!(header_dimensions(b"nope"), None);
    }

    #[test]
    fn test_pixel_buffer_length_checked() {
        assert!(PixelBuffer::from_rgba(Size::new(2, 2), vec![0; 15]).is_err());
        assert!(PixelBuffer::from_rgba(Size::new(0, 2), vec![]).is_err());
        assert!(PixelBuffer::from_rgba(Size::new(2, 2), vec![0; 16]).is_ok());
    }
}
