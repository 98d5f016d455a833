//! # Core Value Types
//!
//! Media type handling and exact byte-size accounting shared by every stage
//! of the compression pipeline.

pub mod media;
pub mod sizing;

pub use media::{MediaType, OutputFormat, SourceAsset};
pub use sizing::{DataUrl, EstimateSize};
