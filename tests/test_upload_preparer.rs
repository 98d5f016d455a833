mod common;

use common::assertions::assert_never_grows;
use common::consent::CountingConsent;
use common::fixtures;

use image_budget::{
    AlwaysCompress, BypassReason, CompressionOptions, FileSource, MediaType, MemorySource,
    NeverCompress, UploadPreparer,
};

#[tokio::test]
async fn test_large_jpeg_is_downscaled_within_budget() {
    let original = fixtures::jpeg_bytes(2600, 1950, 95);
    let source = MemorySource::new("holiday.jpg", "image/jpeg", original.clone());
    let prepared = UploadPreparer::new(AlwaysCompress)
        .prepare(&source, &CompressionOptions::default())
        .await
        .unwrap();

    assert_never_grows(&prepared, &original);
    assert!(prepared.compressed);
    assert_eq!(prepared.media_type, MediaType::Jpeg);
    let size = prepared.dimensions.unwrap();
    assert!(size.long_side() <= 1920, "long edge {} over cap", size);
    assert!(prepared.final_size <= 1_048_576);
    assert_eq!(&prepared.bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_png_is_reencoded_as_webp() {
    let original = fixtures::png_bytes(2400, 1200);
    let source = MemorySource::new("diagram.png", "image/png", original.clone());
    let prepared = UploadPreparer::new(AlwaysCompress)
        .prepare(&source, &CompressionOptions::default())
        .await
        .unwrap();

    assert_never_grows(&prepared, &original);
    assert!(prepared.compressed);
    assert_eq!(prepared.media_type, MediaType::Webp);
    assert_eq!(&prepared.bytes[..4], b"RIFF");
    assert!(prepared.data_url().as_str().starts_with("data:image/webp;base64,"));
}

#[tokio::test]
async fn test_4000x3000_jpeg_lands_on_capped_tiers() {
    let original = fixtures::jpeg_bytes(4000, 3000, 90);
    let source = MemorySource::new("camera.jpg", "image/jpeg", original.clone());
    let prepared = UploadPreparer::new(AlwaysCompress)
        .prepare(&source, &CompressionOptions::default())
        .await
        .unwrap();

    assert_never_grows(&prepared, &original);
    assert!(prepared.compressed);
    assert!(prepared.final_size <= 1_048_576);
    let size = prepared.dimensions.unwrap();
    assert!(size.long_side() <= 1920, "long edge {} over cap", size);
    // every tier keeps 4:3 up to rounding
    let skew = (i64::from(size.w) * 3 - i64::from(size.h) * 4).abs();
    assert!(skew <= 4, "{} drifted from 4:3", size);
}

#[tokio::test]
async fn test_small_high_quality_jpeg_asks_once_and_shrinks() {
    let original = fixtures::jpeg_bytes(1200, 900, 100);
    let preparer = UploadPreparer::new(CountingConsent::new(true));
    let source = MemorySource::new("p.jpg", "image/jpeg", original.clone());
    let prepared = preparer.prepare(&source, &CompressionOptions::default()).await.unwrap();

    assert_never_grows(&prepared, &original);
    assert!(prepared.compressed);
    assert_eq!(prepared.dimensions.map(|s| s.long_side()), Some(1200));
    assert_eq!(preparer.consent().asked(), 1);
}

#[tokio::test]
async fn test_tiny_source_returned_unchanged() {
    // already coarser than the lowest quality in the sweep
    let original = fixtures::jpeg_bytes(64, 48, 20);
    let preparer = UploadPreparer::new(CountingConsent::new(true));
    let source = MemorySource::new("thumb.jpg", "image/jpeg", original.clone());
    let prepared = preparer.prepare(&source, &CompressionOptions::default()).await.unwrap();

    assert_never_grows(&prepared, &original);
    assert!(!prepared.compressed);
    assert_eq!(prepared.bypass, Some(BypassReason::NoImprovement));
    assert_eq!(prepared.media_type, MediaType::Jpeg);
    assert_eq!(preparer.consent().asked(), 1);
}

#[tokio::test]
async fn test_skip_within_budget_is_opt_in() {
    let original = fixtures::png_bytes(16, 16);
    let options = CompressionOptions {
        skip_within_budget: true,
        ..Default::default()
    };
    let preparer = UploadPreparer::new(CountingConsent::new(true));
    let source = MemorySource::new("icon.png", "image/png", original.clone());
    let prepared = preparer.prepare(&source, &options).await.unwrap();

    assert_never_grows(&prepared, &original);
    assert_eq!(prepared.bypass, Some(BypassReason::WithinBudget));
    assert_eq!(prepared.media_type, MediaType::Png);
    assert_eq!(preparer.consent().asked(), 0);
}

#[tokio::test]
async fn test_small_image_never_grows() {
    let options = CompressionOptions::default();
    for original in [fixtures::png_bytes(16, 16), fixtures::jpeg_bytes(64, 48, 30)] {
        let source = MemorySource::new("small", "image/png", original.clone());
        let prepared = UploadPreparer::new(AlwaysCompress)
            .prepare(&source, &options)
            .await
            .unwrap();
        assert_never_grows(&prepared, &original);
    }
}

#[tokio::test]
async fn test_svg_returns_immediately() {
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#.to_vec();
    let consent = CountingConsent::new(true);
    let preparer = UploadPreparer::new(consent);
    let source = MemorySource::new("logo.svg", "image/svg+xml", svg.clone());
    let prepared = preparer.prepare(&source, &CompressionOptions::default()).await.unwrap();

    assert_never_grows(&prepared, &svg);
    assert_eq!(prepared.bypass, Some(BypassReason::NotCompressible));
    assert_eq!(prepared.media_type, MediaType::Other("image/svg+xml".into()));
    assert_eq!(preparer.consent().asked(), 0);
}

#[tokio::test]
async fn test_ask_to_compress_false_never_searches() {
    // a corrupt image would fail to decode if the search ran
    let original = fixtures::corrupt_png();
    let consent = CountingConsent::new(true);
    let preparer = UploadPreparer::new(consent);
    let options = CompressionOptions {
        ask_to_compress: false,
        ..Default::default()
    };
    let source = MemorySource::new("broken.png", "image/png", original.clone());
    let prepared = preparer.prepare(&source, &options).await.unwrap();

    assert_never_grows(&prepared, &original);
    assert_eq!(prepared.bypass, Some(BypassReason::Disabled));
    assert_eq!(preparer.consent().asked(), 0);
}

#[tokio::test]
async fn test_declined_consent_asked_once() {
    let original = fixtures::jpeg_bytes(2200, 1400, 90);
    let consent = CountingConsent::new(false);
    let preparer = UploadPreparer::new(consent);
    let source = MemorySource::new("big.jpg", "image/jpeg", original.clone());
    let prepared = preparer.prepare(&source, &CompressionOptions::default()).await.unwrap();

    assert_never_grows(&prepared, &original);
    assert_eq!(prepared.bypass, Some(BypassReason::Declined));
    assert_eq!(preparer.consent().asked(), 1);

    let prepared = UploadPreparer::new(NeverCompress)
        .prepare(&source, &CompressionOptions::default())
        .await
        .unwrap();
    assert_eq!(prepared.bypass, Some(BypassReason::Declined));
}

#[tokio::test]
async fn test_corrupt_png_is_decode_error() {
    let source = MemorySource::new("broken.png", "image/png", fixtures::corrupt_png());
    let err = UploadPreparer::new(AlwaysCompress)
        .prepare(&source, &CompressionOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.category(), "decode");
}

#[tokio::test]
async fn test_prepare_is_deterministic() {
    let original = fixtures::jpeg_bytes(2000, 1000, 92);
    let source = MemorySource::new("same.jpg", "image/jpeg", original);
    let preparer = UploadPreparer::new(AlwaysCompress);
    let options = CompressionOptions::default();
    let a = preparer.prepare(&source, &options).await.unwrap();
    let b = preparer.prepare(&source, &options).await.unwrap();
    assert_eq!(a.bytes, b.bytes);
    assert_eq!(a.final_size, b.final_size);
    assert_eq!(a.quality, b.quality);
}

#[tokio::test]
async fn test_file_source_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.jpeg");
    let original = fixtures::jpeg_bytes(2100, 1500, 95);
    tokio::fs::write(&path, &original).await.unwrap();

    let source = FileSource::new(&path);
    assert_eq!(source.path(), path.as_path());
    let prepared = UploadPreparer::new(AlwaysCompress)
        .prepare(&source, &CompressionOptions::default())
        .await
        .unwrap();

    assert_eq!(prepared.name, "scan.jpeg");
    assert_never_grows(&prepared, &original);
    assert!(prepared.compressed);
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileSource::new(dir.path().join("missing.png"));
    let err = UploadPreparer::new(AlwaysCompress)
        .prepare(&source, &CompressionOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.category(), "io");
    assert!(err.to_string().contains("missing.png"));
}
