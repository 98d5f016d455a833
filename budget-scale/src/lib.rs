// SPDX-License-Identifier: MIT
//! # budget-scale: Resolution Tiers & RGBA Resampling for Byte-Budget Compression
//!
//! This crate holds the raster half of the adaptive compression pipeline: the
//! math that decides which resolutions get tried, and the SIMD-accelerated
//! resampler that produces them.
//!
//! ## Key Components
//!
//! - [`plan`]: Initial fit-to-longest-edge sizing and the bounded shrink tiers
//! - [`cpu`]: RGBA8 resampling on the CPU via `fast_image_resize`
//!
//! ## Tier Model
//!
//! A [`plan::TierPlan`] starts at the source size clamped to a maximum long
//! edge (never upscaling) and shrinks by a fixed factor per pass, with
//! independent width and height floors. The iterator it hands out is finite
//! by construction, which is what keeps the compression search bounded.
//!
//! ## Usage Example
//!
//! ```rust
//! use budget_scale::plan::{build_tier_plan, ShrinkPolicy, Size};
//!
//! let plan = build_tier_plan(Size::new(4000, 3000), 1920, 5, ShrinkPolicy::default());
//! let sizes: Vec<Size> = plan.tiers().map(|t| t.size).collect();
//!
//! assert_eq!(sizes[0], Size::new(1920, 1440));
//! assert_eq!(sizes[1], Size::new(1613, 1210));
//! assert!(sizes.len() <= 5);
//! ```

pub mod cpu;
pub mod plan;
