//! Concrete OCR engine implementations.

mod neural_layout;
mod seq2seq;
mod traditional;
mod transformer;

pub use neural_layout::NeuralLayoutEngine;
pub use seq2seq::Seq2SeqEngine;
pub use traditional::{TraditionalEngineConfig, TraditionalOcrEngine};
pub use transformer::TransformerOcrEngine;
