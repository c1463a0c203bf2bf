//! Layered query planner + executor: an LRU result cache, an index
//! registry, a statistics collector, a base optimizer, and three
//! specializations (vector, graph, hybrid) that compose through it.

mod cache;
mod graph;
mod hybrid;
mod index;
mod metrics;
mod optimizer;
mod params;
mod plan;
mod stack;
mod vector;

pub use cache::LruQueryCache;
pub use graph::{GraphOptimizerConfig, GraphQueryOptimizer};
pub use hybrid::{HybridOptimizerConfig, HybridQueryOptimizer};
pub use index::{IndexDescriptor, IndexRegistry};
pub use metrics::{QueryMetrics, QueryStatsCollector};
pub use optimizer::{OptimizerOptionsOverride, QueryOptimizer};
pub use params::{QueryKind, QueryParams};
pub use plan::Plan;
pub use stack::QueryOptimizerStack;
pub use vector::{VectorIndexParams, VectorOptimizerConfig, VectorQueryOptimizer};
