//! Hybrid-query specialization: composes the vector and graph optimizers by
//! reference and adaptively blends their weights.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use super::graph::GraphQueryOptimizer;
use super::metrics::QueryMetrics;
use super::optimizer::{OptimizerOptionsOverride, QueryOptimizer};
use super::params::{query_id, QueryKind, QueryParams};
use super::plan::Plan;
use super::vector::VectorQueryOptimizer;
use crate::{Result, VellumError};

const DEFAULT_VECTOR_WEIGHT: f64 = 0.6;
const DEFAULT_GRAPH_WEIGHT: f64 = 0.4;
const WEIGHT_SHIFT_FACTOR: f64 = 1.2;
const MIN_VECTOR_WEIGHT: f64 = 0.3;
const MAX_VECTOR_WEIGHT: f64 = 0.8;
const WEIGHT_HISTORY_SIZE: usize = 10;

/// Construction-time knobs for [`HybridQueryOptimizer`].
///
/// Combinable via `..Default::default()`, the same way the crate's own
/// [`crate::TraditionalEngineConfig`] is.
#[derive(Debug, Clone)]
pub struct HybridOptimizerConfig {
    /// Whether weights adapt from observed per-kind average latency, or
    /// stay pinned at `default_vector_weight`/`default_graph_weight`.
    pub adaptive_weighting: bool,
    /// Starting/fallback vector weight.
    pub default_vector_weight: f64,
    /// Starting/fallback graph weight.
    pub default_graph_weight: f64,
    /// Multiplicative nudge applied to the vector weight toward whichever
    /// component is currently faster.
    pub weight_shift_factor: f64,
    /// Lower clamp on the vector weight.
    pub min_vector_weight: f64,
    /// Upper clamp on the vector weight.
    pub max_vector_weight: f64,
    /// Bound on the retained weight-history queue.
    pub weight_history_size: usize,
}

impl Default for HybridOptimizerConfig {
    fn default() -> Self {
        Self {
            adaptive_weighting: true,
            default_vector_weight: DEFAULT_VECTOR_WEIGHT,
            default_graph_weight: DEFAULT_GRAPH_WEIGHT,
            weight_shift_factor: WEIGHT_SHIFT_FACTOR,
            min_vector_weight: MIN_VECTOR_WEIGHT,
            max_vector_weight: MAX_VECTOR_WEIGHT,
            weight_history_size: WEIGHT_HISTORY_SIZE,
        }
    }
}

struct HybridState {
    weight_history: VecDeque<(f64, f64)>,
}

/// Holds shared references to both specializations, which each in turn
/// share the same base; the base remains the sole owner of the shared
/// collector/cache/registry. `Arc` rather than a lifetime-bound reference
/// avoids pinning the hybrid optimizer's lifetime to its collaborators'.
pub struct HybridQueryOptimizer {
    base: Arc<QueryOptimizer>,
    vector: Arc<VectorQueryOptimizer>,
    graph: Arc<GraphQueryOptimizer>,
    config: HybridOptimizerConfig,
    state: Mutex<HybridState>,
}

impl HybridQueryOptimizer {
    pub fn new(
        base: Arc<QueryOptimizer>,
        vector: Arc<VectorQueryOptimizer>,
        graph: Arc<GraphQueryOptimizer>,
        config: HybridOptimizerConfig,
    ) -> Self {
        Self { base, vector, graph, config, state: Mutex::new(HybridState { weight_history: VecDeque::new() }) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HybridState>> {
        self.state.lock().map_err(|_| VellumError::lock("hybrid optimizer weight history mutex poisoned"))
    }

    fn component(params: &QueryParams, key: &str) -> QueryParams {
        match params.get(key).and_then(Value::as_object) {
            Some(map) => QueryParams::from_map(map.clone()),
            None => QueryParams::new(),
        }
    }

    fn blended_weights(&self) -> Result<(f64, f64)> {
        if !self.config.adaptive_weighting {
            return Ok((self.config.default_vector_weight, self.config.default_graph_weight));
        }
        let vector_avg = self.base.collector().avg_duration_ms(QueryKind::Vector)?;
        let graph_avg = self.base.collector().avg_duration_ms(QueryKind::Graph)?;

        let (vector_avg, graph_avg) = match (vector_avg, graph_avg) {
            (Some(v), Some(g)) => (v, g),
            _ => return Ok((self.config.default_vector_weight, self.config.default_graph_weight)),
        };

        let mut vector_weight = self.config.default_vector_weight;
        if vector_avg < graph_avg {
            vector_weight *= self.config.weight_shift_factor;
        } else if graph_avg < vector_avg {
            vector_weight /= self.config.weight_shift_factor;
        }
        vector_weight = vector_weight.clamp(self.config.min_vector_weight, self.config.max_vector_weight);
        let graph_weight = 1.0 - vector_weight;

        let mut state = self.lock()?;
        if state.weight_history.len() >= self.config.weight_history_size {
            state.weight_history.pop_front();
        }
        state.weight_history.push_back((vector_weight, graph_weight));

        Ok((vector_weight, graph_weight))
    }

    pub fn optimize_hybrid_query(&self, params: &QueryParams, overrides: Option<OptimizerOptionsOverride>) -> Result<Plan> {
        let mut plan = self.base.optimize_query(QueryKind::Hybrid, params, overrides)?;

        let vector_params = Self::component(params, "vector_component");
        let graph_params = Self::component(params, "graph_component");

        let vector_plan = self.vector.optimize_vector_search(&vector_params, overrides)?;
        let graph_plan = self.graph.optimize_graph_query(&graph_params, overrides)?;
        let (vector_weight, graph_weight) = self.blended_weights()?;

        plan.component_plans = Some(json!({
            "vector": vector_plan.to_json(),
            "graph": graph_plan.to_json(),
        }));
        plan.adaptive_weights = Some(json!({"vector_weight": vector_weight, "graph_weight": graph_weight}));

        Ok(plan)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn execute_hybrid_query(
        &self,
        params: &QueryParams,
        vector_executor: impl FnOnce(&QueryParams) -> Result<Value>,
        graph_executor: impl FnOnce(&QueryParams) -> Result<Value>,
        merge_executor: impl FnOnce(&Value, &Value, f64, f64) -> Result<Value>,
    ) -> Result<(Value, QueryMetrics)> {
        let vector_params = Self::component(params, "vector_component");
        let graph_params = Self::component(params, "graph_component");
        let (vector_weight, graph_weight) = self.blended_weights()?;

        let (vector_result, vector_metrics) = self.vector.execute_vector_search(&vector_params, vector_executor, None)?;
        let (graph_result, graph_metrics) = self.graph.execute_graph_query(&graph_params, graph_executor, None)?;

        let merged = merge_executor(&vector_result, &graph_result, vector_weight, graph_weight)?;

        let mut metrics = QueryMetrics::start(query_id(QueryKind::Hybrid, params), QueryKind::Hybrid);
        let result_count = super::optimizer::value_count(&merged);
        let scan_count = vector_metrics.scan_count + graph_metrics.scan_count;
        let index_used = vector_metrics.index_used || graph_metrics.index_used;
        let index_name = vector_metrics.index_name.clone().or_else(|| graph_metrics.index_name.clone());
        metrics.complete(result_count, scan_count, index_used, index_name, None);
        self.base.collector().record_query(metrics.clone())?;

        Ok((
            json!({
                "merged": merged,
                "component_metrics": {
                    "vector": {"duration_ms": vector_metrics.duration_ms(), "scan_count": vector_metrics.scan_count},
                    "graph": {"duration_ms": graph_metrics.duration_ms(), "scan_count": graph_metrics.scan_count},
                },
            }),
            metrics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn base() -> Arc<QueryOptimizer> {
        Arc::new(QueryOptimizer::new(
            Arc::new(super::super::metrics::QueryStatsCollector::new(100)),
            Arc::new(super::super::cache::LruQueryCache::new(100)),
            Arc::new(super::super::index::IndexRegistry::new()),
        ))
    }

    #[test]
    fn optimize_hybrid_query_blends_default_weights_without_history() {
        let base = base();
        let vector = Arc::new(VectorQueryOptimizer::new(base.clone(), super::super::vector::VectorOptimizerConfig::default()));
        let graph = Arc::new(GraphQueryOptimizer::new(base.clone(), super::super::graph::GraphOptimizerConfig::default()));
        let hybrid = HybridQueryOptimizer::new(base, vector, graph, HybridOptimizerConfig::default());

        let params = QueryParams::new();
        let plan = hybrid.optimize_hybrid_query(&params, None).unwrap();
        let weights = plan.adaptive_weights.unwrap();
        assert_eq!(weights["vector_weight"], DEFAULT_VECTOR_WEIGHT);
        assert_eq!(weights["graph_weight"], DEFAULT_GRAPH_WEIGHT);
    }

    #[test]
    fn execute_hybrid_query_merges_components() {
        let base = base();
        let vector = Arc::new(VectorQueryOptimizer::new(base.clone(), super::super::vector::VectorOptimizerConfig::default()));
        let graph = Arc::new(GraphQueryOptimizer::new(base.clone(), super::super::graph::GraphOptimizerConfig::default()));
        let hybrid = HybridQueryOptimizer::new(base, vector, graph, HybridOptimizerConfig::default());

        let params = QueryParams::new();
        let (result, metrics) = hybrid
            .execute_hybrid_query(
                &params,
                |_| Ok(json!([1, 2])),
                |_| Ok(json!([3])),
                |v, g, wv, wg| Ok(json!({"vector": v, "graph": g, "weights": [wv, wg]})),
            )
            .unwrap();
        assert!(result["merged"]["weights"].is_array());
        assert_eq!(metrics.kind, QueryKind::Hybrid);
    }
}
