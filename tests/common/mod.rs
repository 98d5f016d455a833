//! Common test utilities and helpers for the image_budget tests
//!
//! Fixtures are generated in memory so the suite carries no binary assets.

#![allow(dead_code)]

/// Generated source images
pub mod fixtures {
    use std::io::Cursor;

    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    /// Smooth gradient with a mild texture, similar to a photo in how it compresses
    pub fn photo_like(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let r = (x * 255 / w.max(1)) as u8;
            let g = (y * 255 / h.max(1)) as u8;
            let b = (((x / 7 + y / 5) % 32) * 8) as u8;
            Rgb([r, g, b])
        })
    }

    /// JPEG at the given 1..=100 quality
    pub fn jpeg_bytes(w: u32, h: u32, quality: u8) -> Vec<u8> {
        let img = photo_like(w, h);
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality)
            .encode(img.as_raw(), w, h, ExtendedColorType::Rgb8)
            .expect("encode jpeg fixture");
        buf
    }

    /// PNG with a half-transparent band across the middle
    pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let base = photo_like(w, h);
        let img = RgbaImage::from_fn(w, h, |x, y| {
            let Rgb([r, g, b]) = *base.get_pixel(x, y);
            let a = if y > h / 3 && y < 2 * h / 3 { 128 } else { 255 };
            Rgba([r, g, b, a])
        });
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).expect("encode png fixture");
        buf.into_inner()
    }

    /// Valid PNG signature followed by junk
    pub fn corrupt_png() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
        bytes.extend(std::iter::repeat(0xAB).take(2048));
        bytes
    }
}

/// Consent gates that record how often they were asked
pub mod consent {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use image_budget::CompressionConsent;

    pub struct CountingConsent {
        asked: AtomicUsize,
        answer: bool,
    }

    impl CountingConsent {
        pub fn new(answer: bool) -> Self {
            Self {
                asked: AtomicUsize::new(0),
                answer,
            }
        }

        pub fn asked(&self) -> usize {
            self.asked.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompressionConsent for CountingConsent {
        async fn should_compress(&self, _original_size: usize, _file_name: &str) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }
}

/// Shared assertions
pub mod assertions {
    use image_budget::PreparedImage;

    /// Size invariants every prepared image must satisfy
    pub fn assert_never_grows(prepared: &PreparedImage, original: &[u8]) {
        assert_eq!(prepared.original_size, original.len());
        assert_eq!(prepared.final_size, prepared.bytes.len());
        assert!(prepared.final_size <= prepared.original_size);
        if prepared.compressed {
            assert!(prepared.final_size < prepared.original_size);
            assert!(prepared.bypass.is_none());
        } else {
            assert_eq!(prepared.bytes, original);
            assert!(prepared.bypass.is_some());
        }
    }
}
