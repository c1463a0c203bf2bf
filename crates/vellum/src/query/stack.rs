//! Convenience wiring: builds a base optimizer plus all three
//! specializations sharing one collector, cache, and index registry, so
//! callers don't have to hand-assemble the `Arc` graph themselves.

use std::sync::Arc;

use super::cache::LruQueryCache;
use super::graph::{GraphOptimizerConfig, GraphQueryOptimizer};
use super::hybrid::{HybridOptimizerConfig, HybridQueryOptimizer};
use super::index::IndexRegistry;
use super::metrics::QueryStatsCollector;
use super::optimizer::QueryOptimizer;
use super::vector::{VectorOptimizerConfig, VectorQueryOptimizer};

const DEFAULT_STATS_HISTORY_SIZE: usize = 1000;
const DEFAULT_CACHE_SIZE: usize = 1000;

/// A fully wired bundle of the base optimizer and its three specializations,
/// all sharing one `QueryStatsCollector`, `LruQueryCache`, and
/// `IndexRegistry` so that stats and cache entries recorded through one
/// specialization are visible through the others.
pub struct QueryOptimizerStack {
    pub base: Arc<QueryOptimizer>,
    pub vector: Arc<VectorQueryOptimizer>,
    pub graph: Arc<GraphQueryOptimizer>,
    pub hybrid: Arc<HybridQueryOptimizer>,
}

impl QueryOptimizerStack {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STATS_HISTORY_SIZE, DEFAULT_CACHE_SIZE)
    }

    pub fn with_capacity(stats_history_size: usize, cache_size: usize) -> Self {
        Self::with_configs(
            stats_history_size,
            cache_size,
            VectorOptimizerConfig::default(),
            GraphOptimizerConfig::default(),
            HybridOptimizerConfig::default(),
        )
    }

    /// Same wiring as [`Self::with_capacity`], but with every specialization's
    /// knobs overridable at construction time rather than left at their
    /// `Default`.
    #[allow(clippy::too_many_arguments)]
    pub fn with_configs(
        stats_history_size: usize,
        cache_size: usize,
        vector_config: VectorOptimizerConfig,
        graph_config: GraphOptimizerConfig,
        hybrid_config: HybridOptimizerConfig,
    ) -> Self {
        let collector = Arc::new(QueryStatsCollector::new(stats_history_size));
        let cache = Arc::new(LruQueryCache::new(cache_size));
        let registry = Arc::new(IndexRegistry::new());

        let base = Arc::new(QueryOptimizer::new(collector, cache, registry));
        let vector = Arc::new(VectorQueryOptimizer::new(base.clone(), vector_config));
        let graph = Arc::new(GraphQueryOptimizer::new(base.clone(), graph_config));
        let hybrid = Arc::new(HybridQueryOptimizer::new(base.clone(), vector.clone(), graph.clone(), hybrid_config));

        Self { base, vector, graph, hybrid }
    }
}

impl Default for QueryOptimizerStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryKind, QueryParams};
    use serde_json::json;

    #[test]
    fn stack_shares_collector_across_specializations() {
        let stack = QueryOptimizerStack::new();
        let mut params = QueryParams::new();
        params.insert("q", json!([0.1, 0.2]));
        stack.vector.execute_vector_search(&params, |_| Ok(json!([1, 2])), None).unwrap();

        let summary = stack.base.collector().get_stats_summary().unwrap();
        assert_eq!(summary["total_queries"], 1);
    }

    #[test]
    fn hybrid_component_reads_same_registry_as_base() {
        let stack = QueryOptimizerStack::new();
        stack.base.registry().register_index("idx_graph", "graph", vec!["Person".to_string()], None).unwrap();

        let mut params = QueryParams::new();
        params.insert("start_node_type", json!("Person"));
        let plan = stack.graph.optimize_graph_query(&params, None).unwrap();
        assert_eq!(plan.query_type, QueryKind::Graph);
        assert_eq!(plan.indexes, vec!["idx_graph".to_string()]);
    }
}
