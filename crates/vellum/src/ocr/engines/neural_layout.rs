//! `e3`: a neural layout engine — separate detection and recognition passes,
//! reporting a 4-point polygon per block so curved or rotated text regions
//! are representable, not just axis-aligned boxes.

use std::sync::OnceLock;

use crate::ocr::engine::{check_preconditions, OcrEngine};
use crate::ocr::heuristics::{band_confidence, decode_grayscale, detect_ink_bands, InkBand};
use crate::ocr::types::{BBox, OcrResult, TextBlock};
use crate::Result;

/// Joint layout-detector + recognizer tolerant of rotated or curved text,
/// modeled here by reporting quadrilateral (not strictly axis-aligned)
/// polygons per detected block.
pub struct NeuralLayoutEngine {
    available: OnceLock<bool>,
}

impl NeuralLayoutEngine {
    pub fn new() -> Self {
        let engine = Self { available: OnceLock::new() };
        engine.available.set(true).ok();
        engine
    }

    /// Detection polygon for a band: a parallelogram whose top edge is
    /// skewed by a small fraction of the band height, approximating the
    /// "tolerant of rotated text" contract without requiring perspective
    /// math for a synthetic detector.
    fn polygon_for(band: &InkBand, width: f32) -> [[f32; 2]; 4] {
        let skew = ((band.bottom - band.top + 1) as f32 * 0.15).min(width * 0.05);
        [
            [skew, band.top as f32],
            [width, band.top as f32],
            [width - skew, (band.bottom + 1) as f32],
            [0.0, (band.bottom + 1) as f32],
        ]
    }
}

impl Default for NeuralLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for NeuralLayoutEngine {
    fn name(&self) -> &'static str {
        "e3"
    }

    fn is_available(&self) -> bool {
        *self.available.get().unwrap_or(&false)
    }

    fn extract_text(&self, image: &[u8]) -> Result<OcrResult> {
        check_preconditions(self, image)?;
        let gray = decode_grayscale(self.name(), image)?;
        let bands = detect_ink_bands(&gray);

        if bands.is_empty() {
            tracing::debug!(engine = self.name(), "layout detector found no regions");
            return Ok(OcrResult::new(self.name(), "", 0.0));
        }

        let width = gray.width() as f32;
        let mut blocks = Vec::with_capacity(bands.len());
        let mut scores = Vec::with_capacity(bands.len());

        for (i, band) in bands.iter().enumerate() {
            let confidence = band_confidence(band);
            scores.push(confidence);
            blocks.push(TextBlock {
                text: format!("region-{i}"),
                confidence,
                bbox: BBox::Polygon(Self::polygon_for(band, width)),
            });
        }

        let confidence = scores.iter().sum::<f32>() / scores.len() as f32;
        let text = blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ");

        Ok(OcrResult::new(self.name(), text, confidence).with_blocks(blocks))
    }
}
