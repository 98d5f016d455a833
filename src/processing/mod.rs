//! # Processing Module
//!
//! Decode, resample and encode stages, plus the budget search that drives them.

pub mod encoder;
pub mod raster;
pub mod search;

// Re-export commonly used types for convenience
pub use encoder::{Encoder, LossyEncoder};
pub use raster::{header_dimensions, CpuRaster, PixelBuffer, RasterTransform};
pub use search::{BestSoFar, Candidate, CompressionSearch, SearchReport, Termination};
