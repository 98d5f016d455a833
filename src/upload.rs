//! # Upload Preparation
//!
//! Public entry point of the pipeline. [`UploadPreparer::prepare`] reads an
//! [`ImageSource`], decides whether compression should be attempted, runs the
//! compression search off the async runtime and wraps the outcome in a
//! [`PreparedImage`].
//!
//! ## Decision Order
//!
//! 1. Media type not PNG, JPEG or WebP: returned as-is.
//! 2. `ask_to_compress` disabled: returned as-is.
//! 3. Opt-in `skip_within_budget`, and already within the byte budget and
//!    the dimension cap: returned as-is.
//! 4. The injected [`CompressionConsent`] declines: returned as-is.
//! 5. Otherwise decode and search. The result is used only when it is
//!    strictly smaller than the original.
//!
//! The consent gate is asked at most once per call, and never before the
//! cheap checks above have passed.
//!
//! ## Guarantees
//!
//! - `final_size <= original_size`
//! - `compressed` implies `final_size < original_size`
//! - When not compressed, the bytes and media type are the original ones.

// Standard library imports
use std::path::{Path, PathBuf};
use std::sync::Arc;

// External crate imports
use async_trait::async_trait;
use budget_scale::plan::Size;
use log::{debug, info, warn};

// Internal module imports
use crate::config::CompressionOptions;
use crate::core::media::{MediaType, SourceAsset};
use crate::core::sizing::{format_file_size, DataUrl, EstimateSize};
use crate::error::{CompressError, CompressResult, Recoverable, RecoveryStrategy};
use crate::processing::{
    header_dimensions, CompressionSearch, CpuRaster, Encoder, LossyEncoder, RasterTransform,
    SearchReport, Termination,
};

/// Where image bytes come from.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Display name, usually the file name.
    fn name(&self) -> &str;

    /// Declared media type.
    fn media_type(&self) -> MediaType;

    /// Size the source claims to have, if known up front.
    fn declared_len(&self) -> Option<u64> {
        None
    }

    /// Read the whole source into memory.
    async fn read_bytes(&self) -> CompressResult<Vec<u8>>;
}

/// Image file on disk. The media type comes from the extension.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    media_type: MediaType,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = MediaType::from_path(&path);
        Self {
            path,
            name,
            media_type,
        }
    }

    /// Override the extension-derived media type.
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_type(&self) -> MediaType {
        self.media_type.clone()
    }

    async fn read_bytes(&self) -> CompressResult<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| CompressError::io("read source", e).with_path(self.path.display().to_string()))
    }
}

/// In-memory image, e.g. bytes received from a browser upload.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    media_type: MediaType,
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, mime: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: MediaType::from_mime(mime),
            bytes,
        }
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_type(&self) -> MediaType {
        self.media_type.clone()
    }

    fn declared_len(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    async fn read_bytes(&self) -> CompressResult<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Asks whether an image should be compressed before any decoding happens.
#[async_trait]
pub trait CompressionConsent: Send + Sync {
    async fn should_compress(&self, original_size: usize, file_name: &str) -> bool;
}

/// Consent that always agrees.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCompress;

#[async_trait]
impl CompressionConsent for AlwaysCompress {
    async fn should_compress(&self, _original_size: usize, _file_name: &str) -> bool {
        true
    }
}

/// Consent that always declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCompress;

#[async_trait]
impl CompressionConsent for NeverCompress {
    async fn should_compress(&self, _original_size: usize, _file_name: &str) -> bool {
        false
    }
}

/// Adapts a synchronous closure into a [`CompressionConsent`].
pub struct FnConsent<F>(pub F);

#[async_trait]
impl<F> CompressionConsent for FnConsent<F>
where
    F: Fn(usize, &str) -> bool + Send + Sync,
{
    async fn should_compress(&self, original_size: usize, file_name: &str) -> bool {
        (self.0)(original_size, file_name)
    }
}

/// Why the original bytes were returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// Not PNG, JPEG or WebP
    NotCompressible,
    /// `ask_to_compress` is off
    Disabled,
    /// Already fits the byte budget and the dimension cap
    WithinBudget,
    /// The consent gate said no
    Declined,
    /// No candidate was smaller than the original
    NoImprovement,
    /// Buffers or encoders could not be acquired
    Unavailable,
}

impl BypassReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotCompressible => "not-compressible",
            Self::Disabled => "disabled",
            Self::WithinBudget => "within-budget",
            Self::Declined => "declined",
            Self::NoImprovement => "no-improvement",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for BypassReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`UploadPreparer::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub name: String,
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    pub compressed: bool,
    pub original_size: usize,
    pub final_size: usize,
    /// Output dimensions, when compressed
    pub dimensions: Option<Size>,
    /// Encoder quality, when compressed
    pub quality: Option<f32>,
    /// Set whenever the original bytes were returned
    pub bypass: Option<BypassReason>,
}

impl PreparedImage {
    fn original(asset: SourceAsset, reason: BypassReason) -> Self {
        let original_size = asset.bytes().estimate_size();
        let name = asset.name().to_string();
        let media_type = asset.media_type().clone();
        Self {
            name,
            bytes: asset.into_bytes(),
            media_type,
            compressed: false,
            original_size,
            final_size: original_size,
            dimensions: None,
            quality: None,
            bypass: Some(reason),
        }
    }

    /// `data:<mime>;base64,<payload>` rendering of the final bytes.
    pub fn data_url(&self) -> DataUrl {
        DataUrl::encode(&self.media_type, &self.bytes)
    }

    pub fn saved_bytes(&self) -> usize {
        self.original_size - self.final_size
    }

    /// `final_size / original_size`; 1.0 for empty sources.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 1.0;
        }
        self.final_size as f64 / self.original_size as f64
    }
}

/// Reads sources and applies the compression policy to them.
///
/// Generic over the raster and encoder stages so they can be swapped out;
/// [`UploadPreparer::new`] wires in the CPU implementations. Each call works
/// on its own clone of both.
pub struct UploadPreparer<C, R = CpuRaster, E = LossyEncoder> {
    consent: C,
    raster: R,
    encoder: E,
}

impl<C: CompressionConsent> UploadPreparer<C> {
    pub fn new(consent: C) -> Self {
        Self::with_stages(consent, CpuRaster::new(), LossyEncoder::new())
    }
}

impl<C, R, E> UploadPreparer<C, R, E>
where
    C: CompressionConsent,
    R: RasterTransform + Clone + Send + 'static,
    E: Encoder + Clone + Send + 'static,
{
    pub fn with_stages(consent: C, raster: R, encoder: E) -> Self {
        Self {
            consent,
            raster,
            encoder,
        }
    }

    pub fn consent(&self) -> &C {
        &self.consent
    }

    /// Prepare one image for upload.
    ///
    /// # Errors
    ///
    /// Invalid options, unreadable sources and undecodable images are
    /// errors. Encoder and resource failures are not: they resolve to the
    /// original bytes.
    pub async fn prepare<S>(&self, source: &S, options: &CompressionOptions) -> CompressResult<PreparedImage>
    where
        S: ImageSource + ?Sized,
    {
        options.validate()?;
        let options = options.normalized();

        let bytes = source.read_bytes().await?;
        if let Some(declared) = source.declared_len() {
            if declared != bytes.len() as u64 {
                debug!("{}: declared {} bytes, read {}", source.name(), declared, bytes.len());
            }
        }
        let asset = SourceAsset::new(source.name(), source.media_type(), bytes);
        let original_size = asset.bytes().estimate_size();

        if let Some(reason) = bypass_reason(&asset, &options) {
            info!("{}: {} ({}), left as-is", asset.name(), reason, format_file_size(original_size));
            return Ok(PreparedImage::original(asset, reason));
        }

        if !self.consent.should_compress(original_size, asset.name()).await {
            info!("{}: compression declined", asset.name());
            return Ok(PreparedImage::original(asset, BypassReason::Declined));
        }

        let asset = Arc::new(asset);
        let job = Arc::clone(&asset);
        let job_options = options.clone();
        let mut raster = self.raster.clone();
        let encoder = self.encoder.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            run_search(&job, &job_options, &mut raster, &encoder)
        })
        .await;
        let asset = Arc::try_unwrap(asset).unwrap_or_else(|shared| (*shared).clone());

        let report = match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(e)) if e.recovery_strategy() == RecoveryStrategy::Abort => return Err(e),
            Ok(Err(e)) => {
                warn!("{}: compression unavailable, keeping original: {}", asset.name(), e);
                return Ok(PreparedImage::original(asset, BypassReason::Unavailable));
            }
            Err(e) => {
                warn!("{}: compression task failed, keeping original: {}", asset.name(), e);
                return Ok(PreparedImage::original(asset, BypassReason::Unavailable));
            }
        };

        let termination = report.termination;
        match report.best.into_candidate() {
            Some(candidate) if candidate.byte_size < original_size => {
                info!(
                    "{}: {} -> {} ({} at q={:.2}, {})",
                    asset.name(),
                    format_file_size(original_size),
                    format_file_size(candidate.byte_size),
                    candidate.size,
                    candidate.quality,
                    termination
                );
                Ok(PreparedImage {
                    name: asset.name().to_string(),
                    media_type: candidate.format.media_type(),
                    compressed: true,
                    original_size,
                    final_size: candidate.byte_size,
                    dimensions: Some(candidate.size),
                    quality: Some(candidate.quality),
                    bypass: None,
                    bytes: candidate.bytes,
                })
            }
            _ => {
                let reason = if termination == Termination::Unavailable {
                    BypassReason::Unavailable
                } else {
                    BypassReason::NoImprovement
                };
                info!("{}: no smaller encoding found, keeping original", asset.name());
                Ok(PreparedImage::original(asset, reason))
            }
        }
    }
}

fn bypass_reason(asset: &SourceAsset, options: &CompressionOptions) -> Option<BypassReason> {
    if !asset.media_type().is_compressible() {
        return Some(BypassReason::NotCompressible);
    }
    if !options.ask_to_compress {
        return Some(BypassReason::Disabled);
    }
    if options.skip_within_budget && asset.len() <= options.target_max_bytes {
        let fits = header_dimensions(asset.bytes())
            .is_some_and(|size| size.long_side() <= options.max_dimension);
        if fits {
            return Some(BypassReason::WithinBudget);
        }
    }
    None
}

fn run_search<R, E>(
    asset: &SourceAsset,
    options: &CompressionOptions,
    raster: &mut R,
    encoder: &E,
) -> CompressResult<SearchReport>
where
    R: RasterTransform,
    E: Encoder,
{
    let pixels = raster
        .decode(asset.bytes(), asset.media_type())
        .map_err(|e| e.with_context(asset.name().to_string()))?;
    CompressionSearch::new(options).run(
        raster,
        encoder,
        &pixels,
        asset.media_type(),
        asset.len(),
    )
}
