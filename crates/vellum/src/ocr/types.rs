//! Value types shared by every OCR engine and the orchestrator.

use serde::{Deserialize, Serialize};

/// An axis-aligned box `[x1, y1, x2, y2]` or a 4-point polygon `[[x, y]; 4]`.
///
/// Which shape a given engine produces is part of that engine's stable
/// contract (see the `Notable` column of the engine table): `e1`/`e2` emit
/// axis-aligned boxes, `e3` emits polygons, `e4` emits none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BBox {
    Axis([f32; 4]),
    Polygon([[f32; 2]; 4]),
}

/// A single spatial text fragment living inside an [`OcrResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// The outcome of one engine's `extract_text` call, or of MEO's dispatch.
///
/// `confidence` is always normalized into `[0.0, 1.0]`; `engine` is never
/// empty (it is `"none"` for the synthetic all-failed result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f32,
    pub engine: String,
    pub blocks: Option<Vec<TextBlock>>,
    /// Diagnostic set only on the synthetic "none" result produced when
    /// every engine in the dispatch failed.
    pub error: Option<String>,
}

impl OcrResult {
    pub(crate) fn new(engine: impl Into<String>, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            engine: engine.into(),
            blocks: None,
            error: None,
        }
    }

    pub(crate) fn with_blocks(mut self, blocks: Vec<TextBlock>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    /// The synthetic result MEO returns when every candidate engine failed.
    /// This is a successful return, not an exception — see the error
    /// handling design's propagation policy.
    pub(crate) fn none_with_diagnostic(diagnostic: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            engine: "none".to_string(),
            blocks: None,
            error: Some(diagnostic.into()),
        }
    }
}

/// Priority ordering over engines used by [`crate::ocr::MultiEngineOcr`].
///
/// The three literal strings `quality_first`, `speed_first`, `accuracy_first`
/// are the interop surface; [`Strategy::parse`] is the single place that
/// recognizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    QualityFirst,
    SpeedFirst,
    AccuracyFirst,
}

impl Strategy {
    pub fn parse(literal: &str) -> Option<Self> {
        match literal {
            "quality_first" => Some(Strategy::QualityFirst),
            "speed_first" => Some(Strategy::SpeedFirst),
            "accuracy_first" => Some(Strategy::AccuracyFirst),
            _ => None,
        }
    }

    /// The strategy-ordered engine names, before availability filtering.
    pub fn engine_order(self) -> [&'static str; 4] {
        match self {
            Strategy::QualityFirst => ["e1", "e2", "e3", "e4"],
            Strategy::SpeedFirst => ["e2", "e1", "e3", "e4"],
            Strategy::AccuracyFirst => ["e1", "e3", "e4", "e2"],
        }
    }
}

/// Coarse content-type hint returned by [`crate::ocr::MultiEngineOcr::classify_document_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentTypeHint {
    Printed,
    Handwritten,
    Scientific,
    Mixed,
}

impl std::fmt::Display for DocumentTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentTypeHint::Printed => "printed",
            DocumentTypeHint::Handwritten => "handwritten",
            DocumentTypeHint::Scientific => "scientific",
            DocumentTypeHint::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// Validate a confidence threshold: must be finite and within `[0.0, 1.0]`.
pub(crate) fn validate_threshold(threshold: f32) -> crate::Result<()> {
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(crate::VellumError::RangeError {
            message: format!("confidence_threshold must be a finite value in [0.0, 1.0], got {threshold}"),
        });
    }
    Ok(())
}
