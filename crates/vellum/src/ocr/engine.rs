//! The polymorphic contract every OCR back-end satisfies.

use super::types::OcrResult;
use crate::{Result, VellumError};

/// The smallest contract that makes OCR back-ends interchangeable.
///
/// Availability probing is an explicit method rather than try-then-catch,
/// because [`crate::ocr::MultiEngineOcr`] must enumerate engines before
/// dispatch (see the dynamic-dispatch design note). Implementations perform
/// engine-specific initialization during construction; if that
/// initialization fails, `is_available` must report `false` rather than the
/// constructor propagating an error — MEO must be able to enumerate engines
/// without one bad back-end poisoning the whole process.
pub trait OcrEngine: Send + Sync {
    /// Short, lowercase-ASCII, stable identifier (`"e1"`..`"e4"` for the
    /// built-ins).
    fn name(&self) -> &'static str;

    /// Pure, idempotent, thread-safe.
    fn is_available(&self) -> bool;

    /// Run detection/recognition over `image`.
    ///
    /// Must fail with [`VellumError::NotAvailable`] if availability is false
    /// at call time, [`VellumError::EmptyInput`] if `image` is empty,
    /// [`VellumError::InvalidImage`] if the bytes cannot be interpreted as a
    /// supported raster format, [`VellumError::Unsupported`] if the engine
    /// cannot handle the content category, or [`VellumError::Exhausted`] if
    /// an internal resource limit is hit. No other error kind may surface
    /// here.
    fn extract_text(&self, image: &[u8]) -> Result<OcrResult>;
}

/// Shared precondition every concrete engine runs before its own logic:
/// availability and non-empty input. Concrete engines call this first so the
/// "five failure categories, nothing else" contract is enforced uniformly.
pub(crate) fn check_preconditions(engine: &dyn OcrEngine, image: &[u8]) -> Result<()> {
    if !engine.is_available() {
        return Err(VellumError::NotAvailable {
            engine: engine.name().to_string(),
            message: "engine initialization did not complete successfully".to_string(),
        });
    }
    if image.is_empty() {
        return Err(VellumError::EmptyInput {
            message: format!("engine '{}' received a zero-length image buffer", engine.name()),
        });
    }
    Ok(())
}
