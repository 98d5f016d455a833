// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, written into a caller-provided or freshly reserved buffer.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{FilterType, ResizeAlg, ResizeOptions, Resizer};

use crate::plan::Size;

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall { needed: usize, got: usize },
    EmptyImage(Size),
    TooLarge(Size),
    Allocation { bytes: usize },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall { needed, got } => write!(f, "Output buffer too small: need {} bytes, got {}", needed, got),
            ScaleError::EmptyImage(size) => write!(f, "Zero-area image: {}", size),
            ScaleError::TooLarge(size) => write!(f, "Image too large to address: {}", size),
            ScaleError::Allocation { bytes } => write!(f, "Could not reserve {} bytes for pixel buffer", bytes),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

impl ScaleError {
    /// Allocation and addressing failures, as opposed to bad input.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, ScaleError::Allocation { .. } | ScaleError::TooLarge(_))
    }
}

/// Byte length of a tightly packed RGBA8 buffer, `None` on overflow.
pub fn rgba_len(size: Size) -> Option<usize> {
    (size.w as usize)
        .checked_mul(size.h as usize)?
        .checked_mul(4)
}

/// Reserve a zeroed RGBA8 canvas without aborting on allocation failure.
pub fn alloc_rgba(size: Size) -> Result<Vec<u8>, ScaleError> {
    if size.is_empty() {
        return Err(ScaleError::EmptyImage(size));
    }
    let bytes = rgba_len(size).ok_or(ScaleError::TooLarge(size))?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| ScaleError::Allocation { bytes })?;
    buf.resize(bytes, 0);
    Ok(buf)
}

/// Main scaling entry point.
/// `src_rgba` must be tightly packed `src.w * src.h * 4` bytes.
/// `dst` must hold at least `out.w * out.h * 4` bytes (RGBA).
pub fn scale_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    out: Size,
    dst: &mut [u8],
) -> Result<(), ScaleError> {
    if src.is_empty() {
        return Err(ScaleError::EmptyImage(src));
    }
    if out.is_empty() {
        return Err(ScaleError::EmptyImage(out));
    }
    let dst_len = rgba_len(out).ok_or(ScaleError::TooLarge(out))?;
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall { needed: dst_len, got: dst.len() });
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, src_rgba)?;
    let mut dst_image = TypedImage::<U8x4>::from_buffer(out.w, out.h, &mut dst[..dst_len])?;

    // Premultiplied resampling so transparent edges don't bleed colour.
    let opts = ResizeOptions::new()
        .resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3))
        .use_alpha(true);

    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
    Ok(())
}

/// Scale into a newly reserved buffer of exactly `out` size.
pub fn scale_rgba_to_vec(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    out: Size,
) -> Result<Vec<u8>, ScaleError> {
    let mut dst = alloc_rgba(out)?;
    scale_rgba_cpu(resizer, src_rgba, src, out, &mut dst)?;
    Ok(dst)
}
