//! # Image Budget
//!
//! Shrinks user-supplied images until they fit a byte budget, trading
//! resolution and encoder quality while keeping as much fidelity as the
//! budget allows.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `core`: Media types, source assets and exact byte-size accounting
//! - `processing`: Decode/resize/encode stages and the budget search
//! - `upload`: The public `prepare` entry point with its consent gate
//! - `config`: Compression options, validation and environment overlay
//! - `error`: Error types and recovery classification
//!
//! Resolution planning and SIMD resampling live in the `budget-scale` crate.
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_budget::{AlwaysCompress, CompressionOptions, FileSource, UploadPreparer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let preparer = UploadPreparer::new(AlwaysCompress);
//! let source = FileSource::new("holiday.jpg");
//! let prepared = preparer.prepare(&source, &CompressionOptions::default()).await?;
//!
//! if prepared.compressed {
//!     println!("{} -> {} bytes", prepared.original_size, prepared.final_size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod processing;
pub mod upload;

/// Re-export error types for convenience
pub use error::{
    CompressError, CompressResult, HasRecoverySuggestion, HasSeverity, Recoverable,
    RecoveryStrategy,
};

pub use config::CompressionOptions;
pub use crate::core::{DataUrl, EstimateSize, MediaType, OutputFormat, SourceAsset};
pub use processing::{CompressionSearch, SearchReport, Termination};
pub use upload::{
    AlwaysCompress, BypassReason, CompressionConsent, FileSource, FnConsent, ImageSource,
    MemorySource, NeverCompress, PreparedImage, UploadPreparer,
};

/// Re-export commonly used types from dependencies
pub use budget_scale::plan::Size;
