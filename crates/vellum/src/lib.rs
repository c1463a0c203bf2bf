//! Core of a document-processing toolkit: a multi-engine OCR orchestrator
//! and a layered query optimizer stack.
//!
//! Everything outside these two subsystems — PDF rasterization,
//! content-addressed storage, CLI wrappers — is treated as an external
//! collaborator and lives in other crates.

mod error;
pub mod ocr;
pub mod query;

pub use error::{Result, VellumError};

// Re-exports: a thin `pub use` surface over the deep module tree, mirroring
// the teacher's convention of exposing stable types at the crate root while
// keeping implementation detail behind `ocr::` / `query::`.
pub use ocr::{
    DocumentTypeHint, MultiEngineOcr, NeuralLayoutEngine, OcrEngine, OcrResult, Seq2SeqEngine, Strategy,
    TextBlock, TraditionalEngineConfig, TraditionalOcrEngine, TransformerOcrEngine, BBox,
};
pub use query::{
    GraphOptimizerConfig, GraphQueryOptimizer, HybridOptimizerConfig, HybridQueryOptimizer, IndexDescriptor,
    IndexRegistry, LruQueryCache, OptimizerOptionsOverride, Plan, QueryKind, QueryMetrics, QueryOptimizer,
    QueryOptimizerStack, QueryParams, QueryStatsCollector, VectorIndexParams, VectorOptimizerConfig,
    VectorQueryOptimizer,
};
