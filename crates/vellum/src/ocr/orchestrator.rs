//! The multi-engine orchestrator: strategy-ordered dispatch across the
//! engine set, plus a coarse document-type classifier.

use std::collections::HashMap;
use std::sync::OnceLock;

use image::GenericImageView;

use crate::ocr::engine::OcrEngine;
use crate::ocr::engines::{NeuralLayoutEngine, Seq2SeqEngine, TraditionalOcrEngine, TransformerOcrEngine};
use crate::ocr::heuristics::{decode_grayscale, row_ink_density};
use crate::ocr::types::{validate_threshold, DocumentTypeHint, OcrResult, Strategy};
use crate::{Result, VellumError};

static SINGLETON: OnceLock<MultiEngineOcr> = OnceLock::new();

/// Selects and runs engines under a strategy until a confidence target is
/// met, returning the best available outcome even if the target is never
/// reached.
///
/// `engines` is populated once at construction and never mutated afterward,
/// so reads never need a lock — only `is_available()` is consulted per
/// dispatch, and that is each engine's own concern.
pub struct MultiEngineOcr {
    engines: HashMap<&'static str, Box<dyn OcrEngine>>,
}

impl MultiEngineOcr {
    /// The process-wide singleton, built with the four default engines on
    /// first access. Every subsequent call returns the same instance.
    pub fn global() -> &'static MultiEngineOcr {
        SINGLETON.get_or_init(Self::with_default_engines)
    }

    fn with_default_engines() -> Self {
        let mut engines: HashMap<&'static str, Box<dyn OcrEngine>> = HashMap::new();
        engines.insert("e1", Box::new(TransformerOcrEngine::new()));
        engines.insert("e2", Box::new(TraditionalOcrEngine::new()));
        engines.insert("e3", Box::new(NeuralLayoutEngine::new()));
        engines.insert("e4", Box::new(Seq2SeqEngine::new()));
        Self { engines }
    }

    /// Build an orchestrator over an arbitrary engine set. Used by tests and
    /// by callers who want to register non-default engines; does not affect
    /// the process-wide singleton returned by [`Self::global`].
    pub fn with_engines(engines: Vec<Box<dyn OcrEngine>>) -> Self {
        let mut map = HashMap::new();
        for engine in engines {
            map.insert(engine.name(), engine);
        }
        Self { engines: map }
    }

    /// Engines currently reporting themselves available. Order unspecified.
    pub fn get_available_engines(&self) -> Vec<&'static str> {
        self.engines.values().filter(|e| e.is_available()).map(|e| e.name()).collect()
    }

    /// Heuristic content-type hint: edge density plus row-ink regularity.
    /// Never fails — on undecodable bytes it falls back to `Printed` rather
    /// than propagating a decode error, since this is advisory only.
    pub fn classify_document_type(&self, image: &[u8]) -> DocumentTypeHint {
        let Ok(gray) = decode_grayscale("classify_document_type", image) else {
            return DocumentTypeHint::Printed;
        };
        let (width, height) = gray.dimensions();
        if width < 2 || height < 2 {
            return DocumentTypeHint::Printed;
        }

        let mut edge_count = 0u64;
        for y in 0..height {
            for x in 1..width {
                let left = gray.get_pixel(x - 1, y).0[0] as i32;
                let right = gray.get_pixel(x, y).0[0] as i32;
                if (left - right).abs() > 60 {
                    edge_count += 1;
                }
            }
        }
        let edge_density = edge_count as f64 / (width as f64 * height as f64);

        let densities = row_ink_density(&gray);
        let ink_rows: Vec<f32> = densities.into_iter().filter(|d| *d > 0.01).collect();
        let regularity = if ink_rows.len() > 1 {
            let mean = ink_rows.iter().sum::<f32>() / ink_rows.len() as f32;
            let variance = ink_rows.iter().map(|d| (d - mean).powi(2)).sum::<f32>() / ink_rows.len() as f32;
            variance.sqrt()
        } else {
            0.0
        };

        match (edge_density > 0.12, regularity > 0.08) {
            (true, true) => DocumentTypeHint::Mixed,
            (true, false) => DocumentTypeHint::Scientific,
            (false, true) => DocumentTypeHint::Handwritten,
            (false, false) => DocumentTypeHint::Printed,
        }
    }

    /// Run `image` through the engines ordered by `strategy`, stopping at
    /// the first engine whose confidence meets `confidence_threshold`;
    /// otherwise falling back to the best confidence among the engines that
    /// ran successfully; otherwise returning a synthetic "none" result.
    pub fn extract_with_ocr(&self, image: &[u8], strategy: &str, confidence_threshold: f32) -> Result<OcrResult> {
        if image.is_empty() {
            return Err(VellumError::EmptyInput {
                message: "extract_with_ocr received a zero-length image buffer".to_string(),
            });
        }
        let strategy = Strategy::parse(strategy).ok_or_else(|| VellumError::InvalidArgument {
            message: format!("unrecognized strategy literal '{strategy}'"),
        })?;
        validate_threshold(confidence_threshold)?;

        if self.engines.is_empty() {
            return Err(VellumError::NoEngines);
        }

        let ordered = strategy.engine_order();
        let available: Vec<&str> = ordered
            .iter()
            .copied()
            .filter(|name| self.engines.get(name).map(|e| e.is_available()).unwrap_or(false))
            .collect();

        let mut best: Option<OcrResult> = None;

        for name in available {
            let engine = self.engines.get(name).expect("filtered by availability above");
            match engine.extract_text(image) {
                Ok(mut result) => {
                    result.engine = name.to_string();
                    if result.confidence >= confidence_threshold {
                        return Ok(result);
                    }
                    let replace = match &best {
                        None => true,
                        Some(current) => result.confidence > current.confidence,
                    };
                    if replace {
                        best = Some(result);
                    }
                }
                Err(err) => {
                    tracing::debug!(engine = name, error = %err, "engine failed; continuing to next");
                }
            }
        }

        Ok(best.unwrap_or_else(|| OcrResult::none_with_diagnostic("all engines failed or returned no usable result")))
    }
}
