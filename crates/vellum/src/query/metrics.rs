//! Per-query metrics and the bounded-history collector that aggregates them.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use super::params::QueryKind;
use crate::Result;

fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// A value object created at dispatch and finalized exactly once via
/// [`QueryMetrics::complete`].
#[derive(Debug, Clone)]
pub struct QueryMetrics {
    pub query_id: String,
    pub kind: QueryKind,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub duration_ms: Option<f64>,
    pub result_count: u64,
    pub scan_count: u64,
    pub cache_hit: bool,
    pub index_used: bool,
    pub index_name: Option<String>,
    pub error: Option<String>,
}

impl QueryMetrics {
    pub fn start(query_id: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            query_id: query_id.into(),
            kind,
            start_time: now_secs(),
            end_time: None,
            duration_ms: None,
            result_count: 0,
            scan_count: 0,
            cache_hit: false,
            index_used: false,
            index_name: None,
            error: None,
        }
    }

    /// Finalizes the metric exactly once; `end_time` and `duration_ms` are
    /// derived, never supplied by the caller.
    pub fn complete(
        &mut self,
        result_count: u64,
        scan_count: u64,
        index_used: bool,
        index_name: Option<String>,
        error: Option<String>,
    ) {
        let end = now_secs();
        self.end_time = Some(end);
        self.duration_ms = Some((end - self.start_time) * 1000.0);
        self.result_count = result_count;
        self.scan_count = scan_count;
        self.index_used = index_used;
        self.index_name = index_name;
        self.error = error;
    }

    pub fn mark_cache_hit(&mut self, result_count: u64) {
        self.cache_hit = true;
        self.complete(result_count, 0, false, None, None);
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms.unwrap_or(0.0)
    }
}

#[derive(Default)]
struct CollectorState {
    history: VecDeque<QueryMetrics>,
    max_history: usize,
    counts_by_kind: HashMap<QueryKind, u64>,
    duration_sum_by_kind: HashMap<QueryKind, f64>,
    cache_hits: u64,
    cache_misses: u64,
    index_usage: HashMap<String, u64>,
    error_count: u64,
}

/// Aggregates the last `max_history` [`QueryMetrics`] under one exclusive
/// lock; both mutation and summarization happen while holding it.
pub struct QueryStatsCollector {
    state: Mutex<CollectorState>,
}

impl QueryStatsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Mutex::new(CollectorState { max_history, ..Default::default() }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CollectorState>> {
        self.state.lock().map_err(|_| crate::VellumError::lock("query stats collector mutex poisoned"))
    }

    pub fn record_query(&self, metrics: QueryMetrics) -> Result<()> {
        let mut state = self.lock()?;
        *state.counts_by_kind.entry(metrics.kind).or_insert(0) += 1;
        *state.duration_sum_by_kind.entry(metrics.kind).or_insert(0.0) += metrics.duration_ms();

        if metrics.cache_hit {
            state.cache_hits += 1;
        } else {
            state.cache_misses += 1;
        }
        if let Some(name) = &metrics.index_name {
            *state.index_usage.entry(name.clone()).or_insert(0) += 1;
        }
        if metrics.error.is_some() {
            state.error_count += 1;
        }

        if state.history.len() >= state.max_history {
            state.history.pop_front();
        }
        state.history.push_back(metrics);
        Ok(())
    }

    /// Average duration in ms recorded so far for `kind`, or `None` if no
    /// query of that kind has completed.
    pub fn avg_duration_ms(&self, kind: QueryKind) -> Result<Option<f64>> {
        let state = self.lock()?;
        let count = *state.counts_by_kind.get(&kind).unwrap_or(&0);
        if count == 0 {
            return Ok(None);
        }
        let sum = *state.duration_sum_by_kind.get(&kind).unwrap_or(&0.0);
        Ok(Some(sum / count as f64))
    }

    pub fn get_stats_summary(&self) -> Result<Value> {
        let state = self.lock()?;
        let total: u64 = state.counts_by_kind.values().sum();

        let kind_distribution: Value = state
            .counts_by_kind
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), json!(v)))
            .collect::<serde_json::Map<_, _>>()
            .into();

        let kind_averages: Value = state
            .counts_by_kind
            .iter()
            .map(|(k, count)| {
                let sum = state.duration_sum_by_kind.get(k).copied().unwrap_or(0.0);
                (k.as_str().to_string(), json!(sum / *count as f64))
            })
            .collect::<serde_json::Map<_, _>>()
            .into();

        let hit_rate = if state.cache_hits + state.cache_misses > 0 {
            state.cache_hits as f64 / (state.cache_hits + state.cache_misses) as f64
        } else {
            0.0
        };
        let error_rate = if total > 0 { state.error_count as f64 / total as f64 } else { 0.0 };

        let mut durations: Vec<f64> = state.history.iter().filter_map(|m| m.duration_ms).collect();
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let percentile = |p: f64| -> f64 {
            if durations.is_empty() {
                return 0.0;
            }
            let idx = ((p * durations.len() as f64).ceil() as usize).saturating_sub(1).min(durations.len() - 1);
            durations[idx]
        };

        let mut slowest: Vec<&QueryMetrics> = state.history.iter().filter(|m| m.error.is_none()).collect();
        slowest.sort_by(|a, b| b.duration_ms().partial_cmp(&a.duration_ms()).unwrap());
        let top_slowest: Vec<Value> = slowest
            .into_iter()
            .take(5)
            .map(|m| json!({"query_id": m.query_id, "kind": m.kind.as_str(), "duration_ms": m.duration_ms()}))
            .collect();

        let mut sorted_kinds: Vec<(&QueryKind, &u64)> = state.counts_by_kind.iter().collect();
        sorted_kinds.sort_by(|a, b| b.1.cmp(a.1));
        let sorted_kind_frequencies: Vec<Value> =
            sorted_kinds.into_iter().map(|(k, v)| json!({"kind": k.as_str(), "count": v})).collect();

        Ok(json!({
            "total_queries": total,
            "kind_distribution": kind_distribution,
            "kind_averages_ms": kind_averages,
            "cache_hit_rate": hit_rate,
            "error_rate": error_rate,
            "p50_duration_ms": percentile(0.50),
            "p90_duration_ms": percentile(0.90),
            "p99_duration_ms": percentile(0.99),
            "top_5_slowest": top_slowest,
            "sorted_kind_frequencies": sorted_kind_frequencies,
        }))
    }

    pub fn get_optimization_recommendations(&self) -> Result<Vec<Value>> {
        let state = self.lock()?;
        if state.history.is_empty() {
            return Ok(vec![json!({"type": "insufficient_data", "message": "no queries recorded yet"})]);
        }

        let mut recommendations = Vec::new();

        let mut high_scan_kinds: Vec<QueryKind> = Vec::new();
        for metric in &state.history {
            if metric.scan_count > 100 && metric.result_count > 0 {
                let ratio = metric.scan_count as f64 / metric.result_count as f64;
                if ratio > 10.0 && !high_scan_kinds.contains(&metric.kind) {
                    high_scan_kinds.push(metric.kind);
                }
            }
        }
        for kind in high_scan_kinds {
            recommendations.push(json!({
                "type": "suggest_index",
                "kind": kind.as_str(),
                "message": format!("queries of kind '{kind}' scan far more rows than they return; consider adding an index"),
            }));
        }

        for (kind, count) in &state.counts_by_kind {
            let sum = state.duration_sum_by_kind.get(kind).copied().unwrap_or(0.0);
            let avg = sum / *count as f64;
            if avg > 100.0 {
                recommendations.push(json!({
                    "type": "performance_warning",
                    "kind": kind.as_str(),
                    "message": format!("average duration for '{kind}' is {avg:.1}ms, above the 100ms threshold"),
                }));
            }
        }

        let total = state.cache_hits + state.cache_misses;
        if total >= 20 {
            let hit_rate = state.cache_hits as f64 / total as f64;
            if hit_rate < 0.5 {
                recommendations.push(json!({
                    "type": "cache_strategy",
                    "message": format!("cache hit rate is {hit_rate:.2}, below 0.5 over {total} queries; review caching strategy"),
                }));
            }
        }

        if recommendations.is_empty() {
            recommendations.push(json!({"type": "insufficient_data", "message": "no actionable patterns yet"}));
        }
        Ok(recommendations)
    }

    pub fn reset_stats(&self) -> Result<()> {
        let mut state = self.lock()?;
        let max_history = state.max_history;
        *state = CollectorState { max_history, ..Default::default() };
        Ok(())
    }
}

impl Default for QueryStatsCollector {
    fn default() -> Self {
        Self::new(1000)
    }
}
