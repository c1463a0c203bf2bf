//! Internal failure classification for concrete engines.
//!
//! §4.1 only exposes five failure categories at the [`crate::ocr::OcrEngine`]
//! trait boundary, but engines distinguish *why* a decode failed internally
//! (bad header bytes vs. an unsupported color depth vs. a simulated resource
//! limit) so that diagnostic logs carry that detail even though it never
//! crosses the trait — mirroring an internal error enum feeding a narrower
//! public one.

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum EngineFailure {
    #[error("unrecognized or truncated header: {detail}")]
    BadHeader { detail: String },
    #[error("unsupported color depth or format: {detail}")]
    UnsupportedColorDepth { detail: String },
    #[error("internal resource limit reached: {detail}")]
    ResourceExhausted { detail: String },
}

impl EngineFailure {
    pub(crate) fn from_decode_error(err: &image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(inner) => {
                EngineFailure::UnsupportedColorDepth { detail: inner.to_string() }
            }
            other => EngineFailure::BadHeader { detail: other.to_string() },
        }
    }

    /// Logs the internal reason, then narrows to the one public variant
    /// decode failures are allowed to surface as.
    pub(crate) fn into_invalid_image(self, engine: &str) -> crate::VellumError {
        tracing::warn!(engine, reason = %self, "engine failed to decode image");
        crate::VellumError::InvalidImage { message: format!("engine '{engine}': {self}") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_color_depth_classification_feeds_invalid_image() {
        let bytes: &[u8] = b"garbage, not a real image header";
        let err = image::load_from_memory(bytes).unwrap_err();
        let failure = EngineFailure::from_decode_error(&err);
        let converted = failure.into_invalid_image("e1");
        assert!(matches!(converted, crate::VellumError::InvalidImage { .. }));
    }
}
