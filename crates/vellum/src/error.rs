//! Crate-wide error type.
//!
//! Mirrors the shape used throughout this codebase: struct-like variants
//! carrying a human-readable `message` (and a `source` when an underlying
//! error is genuinely being wrapped), rather than a single opaque string.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, VellumError>;

/// The eight error kinds a caller of this crate's public surface can observe.
#[derive(Debug, Error)]
pub enum VellumError {
    /// Wrong kind of input was passed (e.g. an unrecognized strategy literal).
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Zero-length bytes where a non-empty buffer was required.
    #[error("empty input: {message}")]
    EmptyInput { message: String },

    /// A numeric parameter fell outside its accepted range.
    #[error("value out of range: {message}")]
    RangeError { message: String },

    /// Bytes could not be interpreted as a supported raster image.
    #[error("invalid image: {message}")]
    InvalidImage { message: String },

    /// The engine exists but is not currently available.
    #[error("engine '{engine}' is not available: {message}")]
    NotAvailable { engine: String, message: String },

    /// The engine cannot handle this content category.
    #[error("engine '{engine}' does not support this input: {message}")]
    Unsupported { engine: String, message: String },

    /// The orchestrator has no engines registered at all.
    #[error("no OCR engines registered")]
    NoEngines,

    /// An internal resource limit (e.g. accelerator memory) was exceeded.
    #[error("engine '{engine}' exhausted a resource: {message}")]
    Exhausted { engine: String, message: String },

    /// A query executor raised during `execute_query`. The inner message is
    /// re-surfaced to the caller verbatim; the metrics for the attempt are
    /// still recorded by the collector before this error is returned.
    #[error("query execution failed: {message}")]
    ExecutionError { message: String },

    /// A shared lock was found poisoned by a prior panic. Per the
    /// concurrency model, lock poisoning is fatal and not silently
    /// recovered.
    #[error("internal lock poisoned: {message}")]
    Lock { message: String },
}

impl VellumError {
    pub(crate) fn lock(message: impl Into<String>) -> Self {
        VellumError::Lock { message: message.into() }
    }
}
