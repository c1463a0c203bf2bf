//! Graph-query specialization: bounded traversal depth, per-relationship
//! cost weighting, and a small pattern cache ahead of full execution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use super::cache::LruQueryCache;
use super::metrics::QueryMetrics;
use super::optimizer::{OptimizerOptionsOverride, QueryOptimizer};
use super::params::{QueryKind, QueryParams};
use super::plan::Plan;
use crate::{Result, VellumError};

const DEFAULT_MAX_TRAVERSE_DEPTH: u32 = 3;
const DEFAULT_RELATIONSHIP_COST: f64 = 1.0;
const DEFAULT_PATTERN_CACHE_SIZE: usize = 100;
const DEFAULT_BATCH_SIZE: u32 = 50;

/// Construction-time knobs for [`GraphQueryOptimizer`].
///
/// Combinable via `..Default::default()`, the same way the crate's own
/// [`crate::TraditionalEngineConfig`] is.
#[derive(Debug, Clone)]
pub struct GraphOptimizerConfig {
    /// Hard cap on traversal depth regardless of what a query requests.
    pub max_traverse_depth: u32,
    /// Per-hop cost for a relationship type absent from the cost table.
    pub default_relationship_cost: f64,
    /// Capacity of the pattern-signature result cache.
    pub pattern_cache_size: usize,
    /// Whether `execute_graph_query` consults/populates the pattern cache.
    pub cache_frequent_patterns: bool,
    /// Batch size recorded into the plan for path queries.
    pub batch_size_for_path_queries: u32,
}

impl Default for GraphOptimizerConfig {
    fn default() -> Self {
        Self {
            max_traverse_depth: DEFAULT_MAX_TRAVERSE_DEPTH,
            default_relationship_cost: DEFAULT_RELATIONSHIP_COST,
            pattern_cache_size: DEFAULT_PATTERN_CACHE_SIZE,
            cache_frequent_patterns: true,
            batch_size_for_path_queries: DEFAULT_BATCH_SIZE,
        }
    }
}

struct GraphConfigState {
    relationship_costs: HashMap<String, f64>,
    entity_type_priorities: HashMap<String, i64>,
}

/// A fresh optimizer is seeded with these common relationship kinds at the
/// default cost so `path_plan` is sane before any call to
/// `update_relationship_costs`, rather than starting from a table so empty
/// that every depth falls back to the default-cost branch.
fn seeded_relationship_costs(default_cost: f64) -> HashMap<String, f64> {
    HashMap::from([
        ("related_to".to_string(), default_cost),
        ("part_of".to_string(), default_cost),
        ("instance_of".to_string(), default_cost),
    ])
}

/// Shares the base optimizer via `Arc`; see
/// [`super::vector::VectorQueryOptimizer`] for the same rationale.
pub struct GraphQueryOptimizer {
    base: Arc<QueryOptimizer>,
    config: GraphOptimizerConfig,
    state: Mutex<GraphConfigState>,
    pattern_cache: LruQueryCache,
}

impl GraphQueryOptimizer {
    pub fn new(base: Arc<QueryOptimizer>, config: GraphOptimizerConfig) -> Self {
        let pattern_cache = LruQueryCache::new(config.pattern_cache_size);
        let state = Mutex::new(GraphConfigState {
            relationship_costs: seeded_relationship_costs(config.default_relationship_cost),
            entity_type_priorities: HashMap::new(),
        });
        Self { base, config, state, pattern_cache }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, GraphConfigState>> {
        self.state.lock().map_err(|_| VellumError::lock("graph optimizer config mutex poisoned"))
    }

    fn cost_for(&self, relationship: &str) -> Result<f64> {
        Ok(self.lock()?.relationship_costs.get(relationship).copied().unwrap_or(self.config.default_relationship_cost))
    }

    pub fn update_relationship_costs(&self, costs: HashMap<String, f64>) -> Result<()> {
        let mut state = self.lock()?;
        state.relationship_costs.extend(costs);
        Ok(())
    }

    pub fn set_entity_type_priority(&self, entity_type: impl Into<String>, priority: i64) -> Result<()> {
        self.lock()?.entity_type_priorities.insert(entity_type.into(), priority);
        Ok(())
    }

    pub fn invalidate_pattern_cache(&self) -> Result<()> {
        self.pattern_cache.invalidate(None)
    }

    fn path_plan(&self, max_depth: u32, relationship_types: &[String], has_start_type: bool) -> Result<Vec<Value>> {
        let mut steps = Vec::with_capacity(max_depth as usize);
        for depth in 1..=max_depth {
            let cost = if has_start_type && !relationship_types.is_empty() {
                let mut total = 0.0;
                for rel in relationship_types {
                    total += self.cost_for(rel)?;
                }
                total
            } else {
                self.config.default_relationship_cost * depth as f64
            };
            steps.push(json!({"depth": depth, "estimated_cost": cost}));
        }
        Ok(steps)
    }

    pub fn optimize_graph_query(&self, params: &QueryParams, overrides: Option<OptimizerOptionsOverride>) -> Result<Plan> {
        let mut plan = self.base.optimize_query(QueryKind::Graph, params, overrides)?;

        let requested_depth =
            params.get("max_depth").and_then(Value::as_u64).unwrap_or(self.config.max_traverse_depth as u64) as u32;
        let max_depth = requested_depth.min(self.config.max_traverse_depth);

        let relationship_types: Vec<String> = params
            .get("relationship_types")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let has_start_type = params.get("start_node_type").and_then(Value::as_str).is_some();

        let path_plan = self.path_plan(max_depth, &relationship_types, has_start_type)?;

        plan.optimized_params.insert("max_depth", json!(max_depth));
        plan.optimized_params.insert("batch_size", json!(self.config.batch_size_for_path_queries));
        plan.graph_specific = Some(json!({
            "max_depth": max_depth,
            "path_plan": path_plan,
            "batch_size": self.config.batch_size_for_path_queries,
        }));

        Ok(plan)
    }

    fn pattern_signature(params: &QueryParams) -> QueryParams {
        let mut signature = QueryParams::new();
        if let Some(v) = params.get("start_node_type") {
            signature.insert("start_node_type", v.clone());
        }
        if let Some(v) = params.get("relationship_types") {
            signature.insert("relationship_types", v.clone());
        }
        if let Some(v) = params.get("max_depth") {
            signature.insert("max_depth", v.clone());
        }
        signature
    }

    pub fn execute_graph_query(
        &self,
        params: &QueryParams,
        executor: impl FnOnce(&QueryParams) -> Result<Value>,
        overrides: Option<OptimizerOptionsOverride>,
    ) -> Result<(Value, QueryMetrics)> {
        let signature = Self::pattern_signature(params);

        if self.config.cache_frequent_patterns {
            if let Some(cached) = self.pattern_cache.get(QueryKind::Graph, &signature)? {
                let mut metrics = QueryMetrics::start(super::params::query_id(QueryKind::Graph, params), QueryKind::Graph);
                let count = super::optimizer::value_count(&cached);
                metrics.mark_cache_hit(count);
                self.base.collector().record_query(metrics.clone())?;
                return Ok((cached, metrics));
            }
        }

        let (result, metrics) = self.base.execute_query(QueryKind::Graph, params, executor, overrides)?;

        if self.config.cache_frequent_patterns {
            self.pattern_cache.put(QueryKind::Graph, &signature, result.clone())?;
        }
        Ok((result, metrics))
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
    fn requested_depth_is_capped_at_configured_max() {
        let base = base();
        let graph = GraphQueryOptimizer::new(base.clone(), GraphOptimizerConfig::default());
        let mut params = QueryParams::new();
        params.insert("max_depth", json!(10));
        let plan = graph.optimize_graph_query(&params, None).unwrap();
        assert_eq!(plan.graph_specific.unwrap()["max_depth"], 3);
    }

    #[test]
    fn path_plan_uses_default_cost_without_start_type() {
        let base = base();
        let graph = GraphQueryOptimizer::new(base.clone(), GraphOptimizerConfig::default());
        let mut params = QueryParams::new();
        params.insert("max_depth", json!(2));
        let plan = graph.optimize_graph_query(&params, None).unwrap();
        let steps = plan.graph_specific.unwrap()["path_plan"].as_array().unwrap().clone();
        assert_eq!(steps[1]["estimated_cost"], 2.0);
    }

    #[test]
    fn updated_relationship_costs_feed_path_plan() {
        let base = base();
        let graph = GraphQueryOptimizer::new(base.clone(), GraphOptimizerConfig::default());
        graph.update_relationship_costs(HashMap::from([("KNOWS".to_string(), 2.5)])).unwrap();

        let mut params = QueryParams::new();
        params.insert("max_depth", json!(1));
        params.insert("start_node_type", json!("Person"));
        params.insert("relationship_types", json!(["KNOWS"]));
        let plan = graph.optimize_graph_query(&params, None).unwrap();
        let steps = plan.graph_specific.unwrap()["path_plan"].as_array().unwrap().clone();
        assert_eq!(steps[0]["estimated_cost"], 2.5);
    }

    #[test]
    fn seeded_relationship_costs_are_usable_before_any_update() {
        let base = base();
        let graph = GraphQueryOptimizer::new(base.clone(), GraphOptimizerConfig::default());

        let mut params = QueryParams::new();
        params.insert("max_depth", json!(1));
        params.insert("start_node_type", json!("Person"));
        params.insert("relationship_types", json!(["related_to", "part_of"]));
        let plan = graph.optimize_graph_query(&params, None).unwrap();
        let steps = plan.graph_specific.unwrap()["path_plan"].as_array().unwrap().clone();
        assert_eq!(steps[0]["estimated_cost"], 2.0);
    }

    #[test]
    fn pattern_cache_hit_avoids_executor_invocation() {
        let base = base();
        let graph = GraphQueryOptimizer::new(base.clone(), GraphOptimizerConfig::default());
        let mut params = QueryParams::new();
        params.insert("start_node_type", json!("Person"));

        let calls = std::cell::Cell::new(0);
        let run = |_: &QueryParams| {
            calls.set(calls.get() + 1);
            Ok(json!([1, 2]))
        };

        graph.execute_graph_query(&params, run, None).unwrap();
        graph.execute_graph_query(&params, run, None).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn invalidate_pattern_cache_forces_recompute() {
        let base = base();
        let graph = GraphQueryOptimizer::new(base.clone(), GraphOptimizerConfig::default());
        let mut params = QueryParams::new();
        params.insert("start_node_type", json!("Person"));

        let calls = std::cell::Cell::new(0);
        let run = |_: &QueryParams| {
            calls.set(calls.get() + 1);
            Ok(json!([1, 2]))
        };

        graph.execute_graph_query(&params, run, None).unwrap();
        graph.invalidate_pattern_cache().unwrap();
        graph.execute_graph_query(&params, run, None).unwrap();
        assert_eq!(calls.get(), 2);
    }
}
