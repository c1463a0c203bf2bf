//! The base query optimizer: plan synthesis, index selection, and guarded
//! query execution shared by every specialization.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::cache::LruQueryCache;
use super::index::{IndexDescriptor, IndexRegistry};
use super::metrics::{QueryMetrics, QueryStatsCollector};
use super::params::{query_id, QueryKind, QueryParams};
use super::plan::Plan;
use crate::{Result, VellumError};

/// Optimization knobs, overridable per call.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerOptions {
    pub use_cache: bool,
    pub use_indexes: bool,
    pub limit_scan: bool,
    pub max_scan_count: u64,
    pub adaptive_optimization: bool,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            use_indexes: true,
            limit_scan: true,
            max_scan_count: 10_000,
            adaptive_optimization: true,
        }
    }
}

impl OptimizerOptions {
    /// `overrides ⊕ self`: fields present in `overrides` win.
    fn apply(mut self, overrides: Option<OptimizerOptionsOverride>) -> Self {
        let Some(overrides) = overrides else { return self };
        if let Some(v) = overrides.use_cache {
            self.use_cache = v;
        }
        if let Some(v) = overrides.use_indexes {
            self.use_indexes = v;
        }
        if let Some(v) = overrides.limit_scan {
            self.limit_scan = v;
        }
        if let Some(v) = overrides.max_scan_count {
            self.max_scan_count = v;
        }
        if let Some(v) = overrides.adaptive_optimization {
            self.adaptive_optimization = v;
        }
        self
    }
}

/// A sparse override set; only the fields a caller sets are applied on top
/// of the optimizer's defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizerOptionsOverride {
    pub use_cache: Option<bool>,
    pub use_indexes: Option<bool>,
    pub limit_scan: Option<bool>,
    pub max_scan_count: Option<u64>,
    pub adaptive_optimization: Option<bool>,
}

/// The base optimizer. Holds the shared collaborators by `Arc` so that
/// specializations can borrow it without creating an ownership cycle: the
/// base is the long-lived root, specializations are views over it.
pub struct QueryOptimizer {
    pub(crate) collector: Arc<QueryStatsCollector>,
    pub(crate) cache: Arc<LruQueryCache>,
    pub(crate) registry: Arc<IndexRegistry>,
    pub(crate) options: OptimizerOptions,
}

impl QueryOptimizer {
    pub fn new(collector: Arc<QueryStatsCollector>, cache: Arc<LruQueryCache>, registry: Arc<IndexRegistry>) -> Self {
        Self { collector, cache, registry, options: OptimizerOptions::default() }
    }

    pub fn collector(&self) -> &QueryStatsCollector {
        &self.collector
    }

    pub fn cache(&self) -> &LruQueryCache {
        &self.cache
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    pub fn choose_best_index(
        kind: QueryKind,
        params: &QueryParams,
        candidates: &[IndexDescriptor],
    ) -> Option<IndexDescriptor> {
        if candidates.is_empty() {
            return None;
        }
        match kind {
            QueryKind::Vector => {
                let dimension = params.get("dimension").and_then(Value::as_u64);
                candidates
                    .iter()
                    .find(|idx| {
                        idx.kind == "vector"
                            && dimension.is_some_and(|d| idx.metadata.get("dimension").and_then(Value::as_u64) == Some(d))
                    })
                    .or_else(|| candidates.iter().find(|idx| idx.kind == "vector"))
                    .or_else(|| candidates.first())
                    .cloned()
            }
            QueryKind::Property => candidates
                .iter()
                .find(|idx| idx.kind == "btree")
                .or_else(|| candidates.first())
                .cloned(),
            QueryKind::Graph => candidates
                .iter()
                .find(|idx| idx.kind == "graph")
                .or_else(|| candidates.first())
                .cloned(),
            QueryKind::Hybrid => candidates.first().cloned(),
        }
    }

    pub fn optimize_query(
        &self,
        kind: QueryKind,
        params: &QueryParams,
        overrides: Option<OptimizerOptionsOverride>,
    ) -> Result<Plan> {
        let started = Instant::now();
        let options = self.options.apply(overrides);
        let id = query_id(kind, params);

        let mut optimized_params = params.clone();
        let mut indexes = Vec::new();

        if options.use_indexes {
            let candidates = self.registry.find_indexes_for_query(kind, params)?;
            if let Some(best) = Self::choose_best_index(kind, params, &candidates) {
                indexes.push(best.name.clone());
                optimized_params.insert("use_index", Value::String(best.name));
            }
        }

        let mut max_scan_count = options.max_scan_count;
        if options.adaptive_optimization {
            if let Some(avg) = self.collector.avg_duration_ms(kind)? {
                if avg > 500.0 {
                    max_scan_count = max_scan_count.min(1000);
                }
            }
        }

        Ok(Plan {
            query_id: id,
            query_type: kind,
            original_params: params.clone(),
            optimized_params,
            use_cache: options.use_cache,
            use_indexes: options.use_indexes,
            indexes,
            limit_scan: options.limit_scan,
            max_scan_count,
            optimization_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            vector_specific: None,
            graph_specific: None,
            component_plans: None,
            adaptive_weights: None,
            component_metrics: None,
        })
    }

    /// Cache lookup strictly happens-before executor invocation, which
    /// strictly happens-before metrics recording, which strictly
    /// happens-before cache insertion.
    pub fn execute_query(
        &self,
        kind: QueryKind,
        params: &QueryParams,
        executor: impl FnOnce(&QueryParams) -> Result<Value>,
        overrides: Option<OptimizerOptionsOverride>,
    ) -> Result<(Value, QueryMetrics)> {
        let id = query_id(kind, params);
        let options = self.options.apply(overrides);
        let mut metrics = QueryMetrics::start(id, kind);

        if options.use_cache {
            if let Some(cached) = self.cache.get(kind, params)? {
                let result_count = value_count(&cached);
                metrics.mark_cache_hit(result_count);
                self.collector.record_query(metrics.clone())?;
                return Ok((cached, metrics));
            }
        }

        let plan = self.optimize_query(kind, params, overrides)?;

        match executor(&plan.optimized_params) {
            Ok(result) => {
                let result_count = value_count(&result);
                let scan_count = result.get("scan_count").and_then(Value::as_u64).unwrap_or(result_count * 2);
                let index_used = !plan.indexes.is_empty();
                let index_name = plan.indexes.first().cloned();
                metrics.complete(result_count, scan_count, index_used, index_name, None);
                self.collector.record_query(metrics.clone())?;

                if options.use_cache {
                    self.cache.put(kind, params, result.clone())?;
                }
                Ok((result, metrics))
            }
            Err(err) => {
                metrics.complete(0, 0, false, None, Some(err.to_string()));
                self.collector.record_query(metrics.clone())?;
                Err(err)
            }
        }
    }
}

pub(crate) fn value_count(value: &Value) -> u64 {
    match value {
        Value::Array(items) => items.len() as u64,
        Value::Null => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn optimizer() -> QueryOptimizer {
        QueryOptimizer::new(
            Arc::new(QueryStatsCollector::new(100)),
            Arc::new(LruQueryCache::new(100)),
            Arc::new(IndexRegistry::new()),
        )
    }

    #[test]
    fn execute_query_caches_on_second_call() {
        let opt = optimizer();
        let mut params = QueryParams::new();
        params.insert("q", json!([0.1, 0.2]));
        params.insert("dimension", json!(2));

        let calls = std::cell::Cell::new(0);
        let run = |_: &QueryParams| {
            calls.set(calls.get() + 1);
            Ok(json!([1, 2, 3]))
        };

        let (_, first) = opt.execute_query(QueryKind::Vector, &params, run, None).unwrap();
        assert!(!first.cache_hit);
        let (_, second) = opt.execute_query(QueryKind::Vector, &params, run, None).unwrap();
        assert!(second.cache_hit);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn executor_error_is_recorded_and_reraised() {
        let opt = optimizer();
        let params = QueryParams::new();
        let err = opt
            .execute_query(QueryKind::Property, &params, |_| Err(VellumError::ExecutionError { message: "boom".into() }), None)
            .unwrap_err();
        assert!(matches!(err, VellumError::ExecutionError { .. }));

        let summary = opt.collector.get_stats_summary().unwrap();
        assert_eq!(summary["error_rate"], 1.0);
    }

    #[test]
    fn optimize_query_is_deterministic_for_identical_inputs() {
        let opt = optimizer();
        let mut params = QueryParams::new();
        params.insert("a", json!(1));
        let plan_a = opt.optimize_query(QueryKind::Property, &params, None).unwrap();
        let plan_b = opt.optimize_query(QueryKind::Property, &params, None).unwrap();
        assert_eq!(plan_a.query_id, plan_b.query_id);
    }

    #[test]
    fn adaptive_optimization_tightens_max_scan_count() {
        let opt = optimizer();
        let mut metrics = QueryMetrics::start("seed", QueryKind::Property);
        metrics.start_time -= 0.8;
        metrics.complete(1, 1, false, None, None);
        opt.collector.record_query(metrics).unwrap();

        let params = QueryParams::new();
        let overrides = OptimizerOptionsOverride { max_scan_count: Some(9999), ..Default::default() };
        let plan = opt.optimize_query(QueryKind::Property, &params, Some(overrides)).unwrap();
        assert_eq!(plan.max_scan_count, 1000);
    }

    #[test]
    fn choose_best_index_prefers_matching_vector_dimension() {
        let mut meta_128 = std::collections::HashMap::new();
        meta_128.insert("dimension".to_string(), json!(128));
        let candidates = vec![
            IndexDescriptor { name: "v256".into(), kind: "vector".into(), fields: vec![], metadata: std::collections::HashMap::new(), created_at: 0.0 },
            IndexDescriptor { name: "v128".into(), kind: "vector".into(), fields: vec![], metadata: meta_128, created_at: 0.0 },
        ];
        let mut params = QueryParams::new();
        params.insert("dimension", json!(128));
        let chosen = QueryOptimizer::choose_best_index(QueryKind::Vector, &params, &candidates).unwrap();
        assert_eq!(chosen.name, "v128");
    }
}
