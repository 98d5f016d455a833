//! # Configuration Module
//!
//! This module provides the options structure shared by the CLI and library callers.

pub mod config;

pub use config::{CompressionOptions, DEFAULT_TARGET_MAX_BYTES};
