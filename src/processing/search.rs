//! # Compression Search
//!
//! Walks a bounded grid of (resolution, quality) pairs looking for the first
//! encoding that fits the byte budget.
//!
//! The walk is a small state machine. Each state is a resolution [`Tier`]
//! from the `budget-scale` tier plan; the action taken in a state is a full
//! quality sweep at that resolution. The machine ends in one of three
//! terminal states:
//!
//! - [`Termination::BudgetMet`]: a candidate fit the budget. First success wins.
//! - [`Termination::GridExhausted`]: every tier was swept without success.
//! - [`Termination::Unavailable`]: a pixel buffer or encoder could not be
//!   acquired. The search stops with whatever it had.
//!
//! The smallest encoding seen so far is carried as a [`BestSoFar`] value and
//! returned in every terminal state, so the caller can still use a result
//! that overshoots the budget but beats the original.
//!
//! ## Bounds
//!
//! The tier plan yields at most `max_passes` tiers and the sweep is finite,
//! so a search performs at most [`CompressionSearch::max_attempts`] encodes.

use std::borrow::Cow;
use std::fmt;

use budget_scale::plan::{build_tier_plan, Size, Tier, TierPlan};
use log::{debug, info, warn};

use crate::config::CompressionOptions;
use crate::core::media::{MediaType, OutputFormat};
use crate::core::sizing::EstimateSize;
use crate::error::{CompressError, CompressResult, Recoverable, RecoveryStrategy};
use crate::processing::encoder::Encoder;
use crate::processing::raster::{PixelBuffer, RasterTransform};

/// One encoded attempt.
#[derive(Clone, PartialEq)]
pub struct Candidate {
    pub size: Size,
    pub quality: f32,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
    pub byte_size: usize,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("size", &self.size)
            .field("quality", &self.quality)
            .field("format", &self.format)
            .field("byte_size", &self.byte_size)
            .finish()
    }
}

/// Smallest result seen so far. Starts as the untouched original.
#[derive(Debug, Clone, PartialEq)]
pub enum BestSoFar {
    Original { byte_size: usize },
    Candidate(Candidate),
}

impl BestSoFar {
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Original { byte_size } => *byte_size,
            Self::Candidate(c) => c.byte_size,
        }
    }

    /// Keep whichever is smaller. Ties keep the incumbent.
    pub fn offer(self, candidate: Candidate) -> Self {
        if candidate.byte_size < self.byte_size() {
            Self::Candidate(candidate)
        } else {
            self
        }
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Self::Candidate(c) => Some(c),
            Self::Original { .. } => None,
        }
    }

    pub fn into_candidate(self) -> Option<Candidate> {
        match self {
            Self::Candidate(c) => Some(c),
            Self::Original { .. } => None,
        }
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    BudgetMet,
    GridExhausted,
    Unavailable,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BudgetMet => "budget met",
            Self::GridExhausted => "grid exhausted",
            Self::Unavailable => "resources unavailable",
        })
    }
}

/// Outcome of one search.
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub best: BestSoFar,
    pub termination: Termination,
    /// Encode calls made, including failed ones
    pub attempts: u32,
    pub tiers_visited: u8,
}

impl SearchReport {
    pub fn met_budget(&self) -> bool {
        self.termination == Termination::BudgetMet
    }
}

enum SearchState {
    Tier(Tier),
    Done(Termination),
}

enum TierOutcome {
    Met,
    Swept,
    Unavailable,
}

/// Budget search over resolution tiers and encoder qualities.
#[derive(Debug, Clone)]
pub struct CompressionSearch {
    max_dimension: u32,
    target_max_bytes: usize,
    max_passes: u8,
    sweep: Vec<f32>,
    options: CompressionOptions,
}

impl CompressionSearch {
    pub fn new(options: &CompressionOptions) -> Self {
        let options = options.normalized();
        Self {
            max_dimension: options.max_dimension,
            target_max_bytes: options.target_max_bytes,
            max_passes: options.max_passes,
            sweep: options.quality_sweep(),
            options,
        }
    }

    /// Qualities tried at every tier.
    pub fn sweep(&self) -> &[f32] {
        &self.sweep
    }

    /// Upper bound on encode calls for one run.
    pub fn max_attempts(&self) -> u32 {
        u32::from(self.max_passes) * self.sweep.len() as u32
    }

    /// Tier plan for a source of `native` size.
    pub fn plan(&self, native: Size) -> TierPlan {
        build_tier_plan(native, self.max_dimension, self.max_passes, self.options.shrink_policy())
    }

    /// Search for an encoding of `pixels` within the byte budget.
    ///
    /// `original_size` seeds the best-so-far accumulator; only candidates
    /// strictly smaller than it are ever kept. Decode-class and validation
    /// errors propagate; encoder failures skip the candidate; resource
    /// failures end the search with the best result so far.
    pub fn run<R, E>(
        &self,
        raster: &mut R,
        encoder: &E,
        pixels: &PixelBuffer,
        media_type: &MediaType,
        original_size: usize,
    ) -> CompressResult<SearchReport>
    where
        R: RasterTransform + ?Sized,
        E: Encoder + ?Sized,
    {
        let format = media_type.output_format();
        let plan = self.plan(pixels.size());
        debug!(
            "searching {} -> {} from {} (initial scale {:.3}), budget {} bytes",
            media_type,
            format,
            pixels.size(),
            plan.initial_scale(),
            self.target_max_bytes
        );

        let mut tiers = plan.tiers();
        let mut best = BestSoFar::Original {
            byte_size: original_size,
        };
        let mut attempts = 0u32;
        let mut tiers_visited = 0u8;
        let mut state = tiers
            .next()
            .map_or(SearchState::Done(Termination::GridExhausted), SearchState::Tier);

        let termination = loop {
            state = match state {
                SearchState::Tier(tier) => {
                    tiers_visited += 1;
                    let (next_best, outcome) =
                        self.visit_tier(raster, encoder, pixels, format, tier, best, &mut attempts)?;
                    best = next_best;
                    match outcome {
                        TierOutcome::Met => SearchState::Done(Termination::BudgetMet),
                        TierOutcome::Unavailable => SearchState::Done(Termination::Unavailable),
                        TierOutcome::Swept => tiers
                            .next()
                            .map_or(SearchState::Done(Termination::GridExhausted), SearchState::Tier),
                    }
                }
                SearchState::Done(termination) => break termination,
            };
        };

        info!(
            "search finished ({}) after {} attempts over {} tiers, best {} bytes",
            termination,
            attempts,
            tiers_visited,
            best.byte_size()
        );
        Ok(SearchReport {
            best,
            termination,
            attempts,
            tiers_visited,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_tier<R, E>(
        &self,
        raster: &mut R,
        encoder: &E,
        pixels: &PixelBuffer,
        format: OutputFormat,
        tier: Tier,
        mut best: BestSoFar,
        attempts: &mut u32,
    ) -> CompressResult<(BestSoFar, TierOutcome)>
    where
        R: RasterTransform + ?Sized,
        E: Encoder + ?Sized,
    {
        let scaled: Cow<'_, PixelBuffer> = if tier.size == pixels.size() {
            Cow::Borrowed(pixels)
        } else {
            match raster.resize(pixels, tier.size) {
                Ok(resized) => Cow::Owned(resized),
                Err(e) => return Self::recover(e, best, tier).map(|b| (b, TierOutcome::Unavailable)),
            }
        };

        for &quality in &self.sweep {
            *attempts += 1;
            let bytes = match encoder.encode(&scaled, format, quality) {
                Ok(bytes) => bytes,
                Err(e) if e.recovery_strategy() == RecoveryStrategy::SkipCandidate => {
                    debug!("tier {} q={:.2}: skipped ({})", tier.index, quality, e);
                    continue;
                }
                Err(e) => return Self::recover(e, best, tier).map(|b| (b, TierOutcome::Unavailable)),
            };
            let byte_size = bytes.estimate_size();
            debug!("tier {} {} q={:.2}: {} bytes", tier.index, tier.size, quality, byte_size);

            let candidate = Candidate {
                size: tier.size,
                quality,
                format,
                bytes,
                byte_size,
            };
            if byte_size <= self.target_max_bytes {
                return Ok((best.offer(candidate), TierOutcome::Met));
            }
            best = best.offer(candidate);
        }
        Ok((best, TierOutcome::Swept))
    }

    fn recover(error: CompressError, best: BestSoFar, tier: Tier) -> CompressResult<BestSoFar> {
        match error.recovery_strategy() {
            RecoveryStrategy::Abort => Err(error),
            _ => {
                warn!("stopping search at tier {} ({}): {}", tier.index, tier.size, error);
                Ok(best)
            }
        }
    }
}
