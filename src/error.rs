//! # Error Handling for the Compression Pipeline
//!
//! Every failure in the pipeline is a [`CompressError`] carrying an
//! [`ErrorContext`] with timestamp, operation, severity and an optional
//! recovery suggestion.
//!
//! ## Error Classification
//!
//! The pipeline treats errors in three tiers:
//!
//! - **Fatal** (`Decode`, `Io`, `Config`, `Validation`): surfaced to the caller,
//!   no partial result.
//! - **Skippable** (`Encode`): the failing candidate is dropped and the search
//!   moves on to the next (resolution, quality) pair.
//! - **Soft-fallback** (`Resource`): the pipeline gives up on compression and
//!   returns the original bytes unchanged.
//!
//! The [`Recoverable`] trait exposes this as a [`RecoveryStrategy`], so the
//! search and the upload preparer branch on the strategy rather than on
//! individual variants.
//!
//! ## Usage
//!
//! ```rust
//! use image_budget::error::{CompressError, Recoverable, RecoveryStrategy};
//!
//! let error = CompressError::encode("webp", 0.86, "encoder rejected buffer")
//!     .with_context("encoding 1920x1440 candidate");
//!
//! assert!(error.is_recoverable());
//! assert!(matches!(error.recovery_strategy(), RecoveryStrategy::SkipCandidate));
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Debug-level errors that don't affect the result
    Debug,
    /// Warnings that change the result but not its validity
    Warning,
    /// Errors that abort the current call
    Error,
    /// Fatal errors that cannot be recovered from
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action, phrased for an end user
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the compression pipeline
#[derive(Debug)]
pub enum CompressError {
    /// Bytes are not a valid image of a supported type
    Decode {
        media_type: String,
        reason: String,
        context: ErrorContext,
    },
    /// The encoder declined a buffer/quality combination
    Encode {
        format: String,
        quality: f32,
        reason: String,
        context: ErrorContext,
    },
    /// Pixel buffers or encode contexts could not be acquired
    Resource {
        resource: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors reading sources or writing results
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Configuration errors (environment, CLI)
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Option validation errors
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
}

impl CompressError {
    /// Create a decode error
    pub fn decode(media_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            media_type: media_type.into(),
            reason: reason.into(),
            context: ErrorContext::new()
                .with_severity(ErrorSeverity::Fatal),
        }
        .with_recovery_suggestion("Check that the file is a valid PNG, JPEG or WebP image")
    }

    /// Create an encode error
    pub fn encode(format: impl Into<String>, quality: f32, reason: impl Into<String>) -> Self {
        Self::Encode {
            format: format.into(),
            quality,
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Debug),
        }
    }

    /// Create a resource error
    pub fn resource(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            resource: resource.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Attach the path an I/O error refers to
    pub fn with_path(mut self, p: impl Into<String>) -> Self {
        if let Self::Io { path, .. } = &mut self {
            *path = Some(p.into());
        }
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Decode { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Resource { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Decode { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Resource { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Resource { .. } => "resource",
            Self::Io { .. } => "io",
            Self::Config { .. } => "config",
            Self::Validation { .. } => "validation",
        }
    }
}

impl fmt::Display for CompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressError::Decode {
                media_type, reason, ..
            } => {
                write!(f, "Could not decode {} image: {}", media_type, reason)
            }
            CompressError::Encode {
                format,
                quality,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Encoding {} at quality {:.2} failed: {}",
                    format, quality, reason
                )
            }
            CompressError::Resource {
                resource, reason, ..
            } => {
                write!(f, "Resource allocation failed for {}: {}", resource, reason)
            }
            CompressError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            CompressError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            CompressError::Validation {
                field,
                constraint,
                value,
                ..
            } => {
                write!(
                    f,
                    "Validation failed for '{}': {} (value: {})",
                    field, constraint, value
                )
            }
        }
    }
}

impl StdError for CompressError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type CompressResult<T> = Result<T, CompressError>;

/// How the pipeline reacts to an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Drop the current candidate and keep searching
    SkipCandidate,
    /// Stop compressing and hand back the original bytes
    FallBackToOriginal,
    /// Propagate to the caller
    Abort,
}

/// Trait for errors that can be recovered from
pub trait Recoverable {
    /// Check if this error can be recovered from
    fn is_recoverable(&self) -> bool;

    /// Get the recovery strategy for this error
    fn recovery_strategy(&self) -> RecoveryStrategy;
}

impl Recoverable for CompressError {
    fn is_recoverable(&self) -> bool {
        self.recovery_strategy() != RecoveryStrategy::Abort
    }

    fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            Self::Encode { .. } => RecoveryStrategy::SkipCandidate,
            Self::Resource { .. } => RecoveryStrategy::FallBackToOriginal,
            _ => RecoveryStrategy::Abort,
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for CompressError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for CompressError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Check if an error is fatal (cannot be recovered from)
    pub fn is_fatal(error: &CompressError) -> bool {
        matches!(
            error,
            CompressError::Decode { .. }
                | CompressError::Config { .. }
                | CompressError::Validation { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }

    /// Check if the caller never sees this error because it resolves to
    /// "no compression applied"
    pub fn is_invisible_to_caller(error: &CompressError) -> bool {
        error.is_recoverable()
    }

    /// Check if an error should be shown to the user as an actionable message
    pub fn requires_user_intervention(error: &CompressError) -> bool {
        error.severity() >= ErrorSeverity::Error && !error.is_recoverable()
    }
}

/// Error conversion implementations
impl From<std::io::Error> for CompressError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<budget_scale::cpu::ScaleError> for CompressError {
    fn from(error: budget_scale::cpu::ScaleError) -> Self {
        if error.is_resource_exhaustion() {
            Self::resource("pixel buffer", error.to_string())
        } else {
            Self::validation("pixel buffer", "consistent dimensions", error.to_string())
        }
    }
}
