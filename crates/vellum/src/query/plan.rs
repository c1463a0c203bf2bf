//! The plan shape produced by `optimize_query` and its specializations.

use serde_json::Value;

use super::params::{QueryKind, QueryParams};

/// A mapping with stable keys, extended by specialization-specific
/// subsections (`vector_specific`, `graph_specific`, `component_plans`,
/// `adaptive_weights`, `component_metrics`) that the base optimizer leaves
/// unset.
#[derive(Debug, Clone)]
pub struct Plan {
    pub query_id: String,
    pub query_type: QueryKind,
    pub original_params: QueryParams,
    pub optimized_params: QueryParams,
    pub use_cache: bool,
    pub use_indexes: bool,
    pub indexes: Vec<String>,
    pub limit_scan: bool,
    pub max_scan_count: u64,
    pub optimization_time_ms: f64,
    pub vector_specific: Option<Value>,
    pub graph_specific: Option<Value>,
    pub component_plans: Option<Value>,
    pub adaptive_weights: Option<Value>,
    pub component_metrics: Option<Value>,
}

impl Plan {
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("query_id".to_string(), Value::String(self.query_id.clone()));
        map.insert("query_type".to_string(), Value::String(self.query_type.as_str().to_string()));
        map.insert("original_params".to_string(), Value::Object(self.original_params.0.clone()));
        map.insert("optimized_params".to_string(), Value::Object(self.optimized_params.0.clone()));
        map.insert("use_cache".to_string(), Value::Bool(self.use_cache));
        map.insert("use_indexes".to_string(), Value::Bool(self.use_indexes));
        map.insert("indexes".to_string(), Value::Array(self.indexes.iter().cloned().map(Value::String).collect()));
        map.insert("limit_scan".to_string(), Value::Bool(self.limit_scan));
        map.insert("max_scan_count".to_string(), Value::Number(self.max_scan_count.into()));
        map.insert(
            "optimization_time_ms".to_string(),
            serde_json::Number::from_f64(self.optimization_time_ms).map(Value::Number).unwrap_or(Value::Null),
        );
        if let Some(v) = &self.vector_specific {
            map.insert("vector_specific".to_string(), v.clone());
        }
        if let Some(v) = &self.graph_specific {
            map.insert("graph_specific".to_string(), v.clone());
        }
        if let Some(v) = &self.component_plans {
            map.insert("component_plans".to_string(), v.clone());
        }
        if let Some(v) = &self.adaptive_weights {
            map.insert("adaptive_weights".to_string(), v.clone());
        }
        if let Some(v) = &self.component_metrics {
            map.insert("component_metrics".to_string(), v.clone());
        }
        Value::Object(map)
    }
}
