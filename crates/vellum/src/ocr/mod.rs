//! Multi-engine OCR orchestration.

mod engine;
mod engines;
mod failure;
mod heuristics;
mod orchestrator;
mod types;

pub use engine::OcrEngine;
pub use engines::{NeuralLayoutEngine, Seq2SeqEngine, TraditionalEngineConfig, TraditionalOcrEngine, TransformerOcrEngine};
pub use orchestrator::MultiEngineOcr;
pub use types::{BBox, DocumentTypeHint, OcrResult, Strategy, TextBlock};
