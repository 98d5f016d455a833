// SPDX-License-Identifier: MIT
//! # Resolution Tier Planning
//!
//! Computes the sequence of output resolutions the compression search walks
//! through. Each tier is one "scale pass": the search sweeps encoder quality
//! at that resolution before asking for the next, smaller tier.
//!
//! ## Rules
//!
//! - Tier 0 clamps the longest side to `max_long`, preserving aspect ratio.
//!   Images already within the limit keep their native size.
//! - Every later tier multiplies both sides by the shrink factor and rounds,
//!   then applies independent width and height floors.
//! - A tier is never larger than the one before it, so floors cannot
//!   upsample a small source.
//! - Iteration stops after `passes` tiers, or earlier once shrinking stops
//!   making progress.
//!
//! The default floors (480 wide, 320 tall) are not proportional to each
//! other and favour landscape sources; they are exposed on
//! [`ShrinkPolicy`] so callers can tune them.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Length of the longest side.
    pub fn long_side(&self) -> u32 {
        self.w.max(self.h)
    }

    /// Pixel count, widened so large dimensions cannot overflow.
    pub fn area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// How each pass after the first shrinks the working resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShrinkPolicy {
    /// Multiplier applied to both sides per pass, in (0, 1).
    pub factor: f64,
    /// Width never drops below this (unless the source is narrower).
    pub min_width: u32,
    /// Height never drops below this (unless the source is shorter).
    pub min_height: u32,
}

impl Default for ShrinkPolicy {
    fn default() -> Self {
        Self {
            factor: 0.84,
            min_width: 480,
            min_height: 320,
        }
    }
}

impl ShrinkPolicy {
    /// Next tier size after `current`.
    pub fn apply(&self, current: Size) -> Size {
        let w = shrink_side(current.w, self.factor, self.min_width);
        let h = shrink_side(current.h, self.factor, self.min_height);
        Size { w, h }
    }
}

#[inline]
fn shrink_side(side: u32, factor: f64, floor: u32) -> u32 {
    let scaled = (f64::from(side) * factor).round() as u32;
    // floor first, then cap at the current side: never grow
    scaled.max(floor).min(side).max(1)
}

/// Fit image within max_long constraint while preserving aspect ratio.
///
/// Never upscales - returns original dimensions if already smaller than max_long.
/// Both sides are clamped to at least 1px.
pub fn fit_preserve(input: Size, max_long: u32) -> Size {
    let (w, h) = (f64::from(input.w), f64::from(input.h));
    let long = w.max(h);
    if long <= 0.0 {
        return Size { w: 1, h: 1 };
    }
    let s = (f64::from(max_long) / long).min(1.0); // don't upscale
    Size {
        w: ((w * s).round() as u32).max(1),
        h: ((h * s).round() as u32).max(1),
    }
}

/// Complete tier plan computed from the source size and search limits.
#[derive(Clone, Copy, Debug)]
pub struct TierPlan {
    /// Native source dimensions
    pub native: Size,
    /// First tier, clamped to the long-edge limit
    pub initial: Size,
    /// Maximum number of tiers handed out
    pub passes: u8,
    /// Shrink rule between tiers
    pub shrink: ShrinkPolicy,
}

/// One resolution tier of the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tier {
    /// Zero-based pass number
    pub index: u8,
    /// Output dimensions for this pass
    pub size: Size,
}

/// Build the tier plan for a source of `native` size.
pub fn build_tier_plan(native: Size, max_long: u32, passes: u8, shrink: ShrinkPolicy) -> TierPlan {
    TierPlan {
        native,
        initial: fit_preserve(native, max_long),
        passes,
        shrink,
    }
}

impl TierPlan {
    /// Scale factor of the first tier relative to the native size.
    pub fn initial_scale(&self) -> f64 {
        let long = self.native.long_side();
        if long == 0 {
            return 1.0;
        }
        f64::from(self.initial.long_side()) / f64::from(long)
    }

    /// Iterate the tiers in search order.
    pub fn tiers(&self) -> Tiers {
        Tiers {
            next: (self.passes > 0).then_some(self.initial),
            index: 0,
            passes: self.passes,
            shrink: self.shrink,
        }
    }
}

/// Finite iterator over the tiers of a [`TierPlan`].
#[derive(Clone, Debug)]
pub struct Tiers {
    next: Option<Size>,
    index: u8,
    passes: u8,
    shrink: ShrinkPolicy,
}

impl Iterator for Tiers {
    type Item = Tier;

    fn next(&mut self) -> Option<Tier> {
        let size = self.next.take()?;
        let tier = Tier {
            index: self.index,
            size,
        };
        self.index += 1;
        if self.index < self.passes {
            let shrunk = self.shrink.apply(size);
            // an identical tier would only repeat identical encodes
            if shrunk != size {
                self.next = Some(shrunk);
            }
        }
        Some(tier)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::from(self.passes.saturating_sub(self.index));
        match self.next {
            Some(_) => (1, Some(left)),
            None => (0, Some(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_preserve_clamps_long_side() {
        assert_eq!(fit_preserve(Size::new(4000, 3000), 1920), Size::new(1920, 1440));
        assert_eq!(fit_preserve(Size::new(3000, 4000), 1920), Size::new(1440, 1920));
    }

    #[test]
    fn test_fit_preserve_never_upscales() {
        assert_eq!(fit_preserve(Size::new(100, 100), 1920), Size::new(100, 100));
        assert_eq!(fit_preserve(Size::new(1920, 1080), 1920), Size::new(1920, 1080));
    }

    #[test]
    fn test_fit_preserve_minimum_one_pixel() {
        assert_eq!(fit_preserve(Size::new(10000, 1), 100), Size::new(100, 1));
    }

    #[test]
    fn test_shrink_applies_factor_and_floors() {
        let policy = ShrinkPolicy::default();
        assert_eq!(policy.apply(Size::new(1920, 1440)), Size::new(1613, 1210));
        // height floor
        assert_eq!(policy.apply(Size::new(1000, 350)), Size::new(840, 320));
        // width floor
        assert_eq!(policy.apply(Size::new(500, 1000)), Size::new(480, 840));
    }

    #[test]
    fn test_shrink_never_grows_small_sources() {
        let policy = ShrinkPolicy::default();
        assert_eq!(policy.apply(Size::new(300, 200)), Size::new(300, 200));
    }

    #[test]
    fn test_tiers_bounded_by_passes() {
        let plan = build_tier_plan(Size::new(8000, 6000), 1920, 5, ShrinkPolicy::default());
        let tiers: Vec<Tier> = plan.tiers().collect();
        assert_eq!(tiers.len(), 5);
        assert_eq!(tiers[0].size, Size::new(1920, 1440));
        assert_eq!(tiers[4].index, 4);
        for pair in tiers.windows(2) {
            assert!(pair[1].size.w <= pair[0].size.w);
            assert!(pair[1].size.h <= pair[0].size.h);
        }
    }

    #[test]
    fn test_tiers_stop_when_shrink_stalls() {
        let plan = build_tier_plan(Size::new(400, 300), 1920, 5, ShrinkPolicy::default());
        let tiers: Vec<Tier> = plan.tiers().collect();
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers[0].size, Size::new(400, 300));
    }

    #[test]
    fn test_zero_passes_yields_nothing() {
        let plan = build_tier_plan(Size::new(4000, 3000), 1920, 0, ShrinkPolicy::default());
        assert_eq!(plan.tiers().count(), 0);
    }

    #[test]
    fn test_initial_scale() {
        let plan = build_tier_plan(Size::new(3840, 2160), 1920, 5, ShrinkPolicy::default());
        assert!((plan.initial_scale() - 0.5).abs() < 1e-9);
        let plan = build_tier_plan(Size::new(640, 480), 1920, 5, ShrinkPolicy::default());
        assert_eq!(plan.initial_scale(), 1.0);
    }
}
