//! Vector-query specialization: curated HNSW-style parameters per dimension
//! and the exact/approximate search threshold policy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use super::metrics::QueryStatsCollector;
use super::optimizer::{OptimizerOptionsOverride, QueryOptimizer};
use super::params::{QueryKind, QueryParams};
use super::plan::Plan;
use crate::{Result, VellumError};

#[derive(Debug, Clone, Copy)]
pub struct VectorIndexParams {
    pub ef_search: u32,
    pub ef_construction: u32,
    pub m: u32,
}

impl VectorIndexParams {
    const fn new(ef_search: u32, ef_construction: u32, m: u32) -> Self {
        Self { ef_search, ef_construction, m }
    }
}

fn default_dimension_table() -> HashMap<u64, VectorIndexParams> {
    HashMap::from([
        (128, VectorIndexParams::new(100, 200, 16)),
        (256, VectorIndexParams::new(120, 200, 16)),
        (384, VectorIndexParams::new(150, 200, 24)),
        (512, VectorIndexParams::new(180, 250, 32)),
        (768, VectorIndexParams::new(200, 300, 32)),
        (1024, VectorIndexParams::new(220, 300, 48)),
        (1536, VectorIndexParams::new(260, 350, 48)),
    ])
}

const DEFAULT_EXACT_SEARCH_THRESHOLD: u64 = 50;
const DEFAULT_APPROXIMATE_SEARCH_THRESHOLD: u64 = 100;
const DEFAULT_PARAMS: VectorIndexParams = VectorIndexParams::new(150, 200, 16);

/// Construction-time knobs for [`VectorQueryOptimizer`].
///
/// Combinable via `..Default::default()`, the same way the crate's own
/// [`crate::TraditionalEngineConfig`] is.
#[derive(Debug, Clone)]
pub struct VectorOptimizerConfig {
    /// Dimensions at or below this use exact search.
    pub exact_search_threshold: u64,
    /// Dimensions at or above this use approximate search.
    pub approximate_search_threshold: u64,
    /// Fallback HNSW params for a dimension absent from the curated table.
    pub default_params: VectorIndexParams,
}

impl Default for VectorOptimizerConfig {
    fn default() -> Self {
        Self {
            exact_search_threshold: DEFAULT_EXACT_SEARCH_THRESHOLD,
            approximate_search_threshold: DEFAULT_APPROXIMATE_SEARCH_THRESHOLD,
            default_params: DEFAULT_PARAMS,
        }
    }
}

struct VectorConfigState {
    dimension_table: HashMap<u64, VectorIndexParams>,
}

/// Shares the base optimizer via `Arc` rather than owning it outright, per
/// the cyclic-reference avoidance note: the base never holds a reference
/// back to its specializations, so this is one-directional sharing, not a
/// reference cycle.
pub struct VectorQueryOptimizer {
    base: Arc<QueryOptimizer>,
    config: VectorOptimizerConfig,
    state: Mutex<VectorConfigState>,
}

impl VectorQueryOptimizer {
    pub fn new(base: Arc<QueryOptimizer>, config: VectorOptimizerConfig) -> Self {
        Self { base, config, state: Mutex::new(VectorConfigState { dimension_table: default_dimension_table() }) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VectorConfigState>> {
        self.state.lock().map_err(|_| VellumError::lock("vector optimizer config mutex poisoned"))
    }

    fn params_for_dimension(&self, dimension: u64) -> Result<VectorIndexParams> {
        let state = self.lock()?;
        Ok(state.dimension_table.get(&dimension).copied().unwrap_or(self.config.default_params))
    }

    pub fn optimize_vector_search(&self, params: &QueryParams, overrides: Option<OptimizerOptionsOverride>) -> Result<Plan> {
        let mut plan = self.base.optimize_query(QueryKind::Vector, params, overrides)?;

        let dimension = params.get("dimension").and_then(Value::as_u64).unwrap_or(0);
        let exact_search = dimension <= self.config.exact_search_threshold;
        let approximate = dimension >= self.config.approximate_search_threshold;
        let index_params = self.params_for_dimension(dimension)?;

        plan.optimized_params.insert("exact_search", Value::Bool(exact_search));
        plan.optimized_params.insert("ef_search", json!(index_params.ef_search));

        plan.vector_specific = Some(json!({
            "dimension": dimension,
            "exact_search": exact_search,
            "approximate_search": approximate,
            "ef_search": index_params.ef_search,
            "ef_construction": index_params.ef_construction,
            "m": index_params.m,
        }));

        Ok(plan)
    }

    pub fn execute_vector_search(
        &self,
        params: &QueryParams,
        executor: impl FnOnce(&QueryParams) -> Result<Value>,
        overrides: Option<OptimizerOptionsOverride>,
    ) -> Result<(Value, super::metrics::QueryMetrics)> {
        self.base.execute_query(QueryKind::Vector, params, executor, overrides)
    }

    /// Adjusts the curated `ef_search` for `dimension` based on observed
    /// accuracy/latency tradeoffs: shrink it when search is slow but
    /// already accurate, grow it when accuracy is poor and search is fast.
    pub fn tune_vector_index_params(&self, dimension: u64, avg_search_ms: f64, accuracy: f64) -> Result<VectorIndexParams> {
        let mut state = self.lock()?;
        let mut current = state.dimension_table.get(&dimension).copied().unwrap_or(self.config.default_params);

        if avg_search_ms > 10.0 && accuracy > 0.95 {
            current.ef_search = current.ef_search.saturating_sub(20).max(40);
        } else if accuracy < 0.9 && avg_search_ms < 5.0 {
            current.ef_search = (current.ef_search + 20).min(400);
        }

        state.dimension_table.insert(dimension, current);
        Ok(current)
    }

    pub fn collector(&self) -> &QueryStatsCollector {
        self.base.collector()
    }
}
