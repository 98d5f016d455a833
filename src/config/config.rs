//! # Compression Options
//!
//! Configuration for one `prepare` call: the byte budget, the long-edge cap,
//! and the quality sweep the search walks at every resolution tier.
//!
//! ## Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `max_dimension` | `u32` | 1920 | Longest-edge cap in pixels |
//! | `target_max_bytes` | `usize` | 1 MiB | Byte budget |
//! | `initial_quality` | `f32` | 0.86 | First quality tried per tier, (0, 1] |
//! | `min_quality` | `f32` | 0.5 | Last quality tried per tier, [0, initial] |
//! | `quality_step` | `f32` | 0.06 | Decrement between qualities |
//! | `ask_to_compress` | `bool` | true | Whether compression is offered at all |
//! | `max_passes` | `u8` | 5 | Resolution tiers tried |
//! | `shrink_factor` | `f64` | 0.84 | Per-tier scale factor |
//! | `min_shrink_width` | `u32` | 480 | Width floor when shrinking |
//! | `min_shrink_height` | `u32` | 320 | Height floor when shrinking |
//! | `skip_within_budget` | `bool` | false | Leave sources already within budget and size cap untouched |
//!
//! ## Environment
//!
//! [`CompressionOptions::from_env`] overlays `IMAGE_BUDGET_*` variables on the
//! defaults, e.g. `IMAGE_BUDGET_TARGET_MAX_BYTES=524288`.
//!
//! ## Examples
//!
//! ```rust
//! use image_budget::config::config::CompressionOptions;
//!
//! let options = CompressionOptions::default();
//! assert!(options.validate().is_ok());
//!
//! let sweep = options.quality_sweep();
//! assert_eq!(sweep.first(), Some(&0.86));
//! assert_eq!(sweep.last(), Some(&0.5));
//! assert_eq!(sweep.len(), 7);
//! ```

use std::env;
use std::str::FromStr;

use budget_scale::plan::ShrinkPolicy;

use crate::error::{CompressError, CompressResult};

/// Default byte budget: 1 MiB.
pub const DEFAULT_TARGET_MAX_BYTES: usize = 1024 * 1024;

const ENV_PREFIX: &str = "IMAGE_BUDGET_";

/// Options controlling a single compression attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    /// Longest-edge cap in pixels for the first resolution tier.
    pub max_dimension: u32,

    /// Byte budget the search tries to meet or beat.
    pub target_max_bytes: usize,

    /// Quality tried first at every tier.
    pub initial_quality: f32,

    /// Lowest quality tried at a tier before shrinking.
    ///
    /// Values above `initial_quality` are clamped down to it, leaving a
    /// single-quality sweep.
    pub min_quality: f32,

    /// Decrement between consecutive qualities. Must be positive.
    pub quality_step: f32,

    /// Whether compression is offered at all. When `false` the source is
    /// returned as-is without consulting the consent gate.
    pub ask_to_compress: bool,

    /// Number of resolution tiers the search may try.
    pub max_passes: u8,

    /// Scale factor between consecutive tiers, in (0, 1).
    pub shrink_factor: f64,

    /// Minimum width once shrinking starts.
    pub min_shrink_width: u32,

    /// Minimum height once shrinking starts.
    ///
    /// Deliberately not proportional to `min_shrink_width`; the pair favours
    /// landscape sources.
    pub min_shrink_height: u32,

    /// Return sources that already fit both the byte budget and the
    /// dimension cap without asking or searching. Off by default: a small
    /// source can still shrink at `initial_quality`.
    pub skip_within_budget: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            target_max_bytes: DEFAULT_TARGET_MAX_BYTES,
            initial_quality: 0.86,
            min_quality: 0.5,
            quality_step: 0.06,
            ask_to_compress: true,
            max_passes: 5,
            shrink_factor: 0.84,
            min_shrink_width: 480,
            min_shrink_height: 320,
            skip_within_budget: false,
        }
    }
}

impl CompressionOptions {
    /// Defaults overlaid with any `IMAGE_BUDGET_*` environment variables.
    pub fn from_env() -> CompressResult<Self> {
        let mut options = Self::default();
        overlay(&mut options.max_dimension, "MAX_DIMENSION")?;
        overlay(&mut options.target_max_bytes, "TARGET_MAX_BYTES")?;
        overlay(&mut options.initial_quality, "INITIAL_QUALITY")?;
        overlay(&mut options.min_quality, "MIN_QUALITY")?;
        overlay(&mut options.quality_step, "QUALITY_STEP")?;
        overlay(&mut options.ask_to_compress, "ASK_TO_COMPRESS")?;
        overlay(&mut options.max_passes, "MAX_PASSES")?;
        overlay(&mut options.shrink_factor, "SHRINK_FACTOR")?;
        overlay(&mut options.min_shrink_width, "MIN_SHRINK_WIDTH")?;
        overlay(&mut options.min_shrink_height, "MIN_SHRINK_HEIGHT")?;
        overlay(&mut options.skip_within_budget, "SKIP_WITHIN_BUDGET")?;
        Ok(options)
    }

    /// Validates the option ranges.
    pub fn validate(&self) -> CompressResult<()> {
        if self.max_dimension == 0 {
            return Err(CompressError::validation("max_dimension", "must be greater than 0", "0"));
        }
        if self.target_max_bytes == 0 {
            return Err(CompressError::validation("target_max_bytes", "must be greater than 0", "0"));
        }
        if !(self.initial_quality > 0.0 && self.initial_quality <= 1.0) {
            return Err(CompressError::validation(
                "initial_quality",
                "must be in (0, 1]",
                self.initial_quality.to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err(CompressError::validation(
                "min_quality",
                "must be in [0, 1]",
                self.min_quality.to_string(),
            ));
        }
        if !(self.quality_step.is_finite() && self.quality_step > 0.0) {
            return Err(CompressError::validation(
                "quality_step",
                "must be a positive number",
                self.quality_step.to_string(),
            ));
        }
        if self.max_passes == 0 {
            return Err(CompressError::validation("max_passes", "must be at least 1", "0"));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(CompressError::validation(
                "shrink_factor",
                "must be in (0, 1)",
                self.shrink_factor.to_string(),
            ));
        }
        if self.min_shrink_width == 0 || self.min_shrink_height == 0 {
            return Err(CompressError::validation(
                "min_shrink_width/min_shrink_height",
                "must be greater than 0",
                format!("{}x{}", self.min_shrink_width, self.min_shrink_height),
            ));
        }
        Ok(())
    }

    /// Copy with `min_quality` clamped into `[0, initial_quality]`.
    pub fn normalized(&self) -> Self {
        let mut options = self.clone();
        options.min_quality = options.min_quality.max(0.0).min(options.initial_quality);
        options
    }

    /// Qualities tried at every tier, highest first.
    ///
    /// Steps down from `initial_quality` by `quality_step` while staying at or
    /// above `min_quality`. Always yields at least one value.
    pub fn quality_sweep(&self) -> Vec<f32> {
        let initial = f64::from(self.initial_quality);
        let min = f64::from(self.min_quality.min(self.initial_quality));
        let step = f64::from(self.quality_step);
        let mut sweep = vec![self.initial_quality];
        if !(step.is_finite() && step > 0.0) {
            return sweep;
        }
        let mut i = 1u32;
        loop {
            // recompute from the start each time so rounding error doesn't accumulate
            let q = ((initial - f64::from(i) * step) * 10_000.0).round() / 10_000.0;
            if q < min - 1e-9 {
                break;
            }
            sweep.push(q as f32);
            i += 1;
        }
        sweep
    }

    /// Shrink rule handed to the tier planner.
    pub fn shrink_policy(&self) -> ShrinkPolicy {
        ShrinkPolicy {
            factor: self.shrink_factor,
            min_width: self.min_shrink_width,
            min_height: self.min_shrink_height,
        }
    }
}

fn overlay<T: FromStr>(slot: &mut T, key: &str) -> CompressResult<()>
where
    T::Err: std::fmt::Display,
{
    let name = format!("{}{}", ENV_PREFIX, key);
    match env::var(&name) {
        Ok(raw) => {
            *slot = raw
                .trim()
                .parse()
                .map_err(|e: T::Err| CompressError::config(&name, &raw, e.to_string()))?;
            Ok(())
        }
        Err(env::VarError::NotPresent) => Ok(()),
        Err(e) => Err(CompressError::config(&name, "<non-unicode>", e.to_string())),
    }
}
