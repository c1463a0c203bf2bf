//! Mutex-guarded catalog of known indexes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use super::params::{QueryKind, QueryParams};
use crate::Result;

/// A registered index: its name, the query kind it serves, the fields it
/// covers, and freeform metadata (e.g. `dimension` for vector indexes).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    pub name: String,
    pub kind: String,
    pub fields: Vec<String>,
    pub metadata: HashMap<String, Value>,
    pub created_at: f64,
}

#[derive(Default)]
struct RegistryState {
    indexes: HashMap<String, IndexDescriptor>,
}

pub struct IndexRegistry {
    state: Mutex<RegistryState>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self { state: Mutex::new(RegistryState::default()) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| crate::VellumError::lock("index registry mutex poisoned"))
    }

    /// `name` must be unique in intent, but re-registration is permitted and
    /// overwrites silently — this mirrors the upstream contract rather than
    /// rejecting the second call.
    pub fn register_index(
        &self,
        name: impl Into<String>,
        kind: impl Into<String>,
        fields: Vec<String>,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<()> {
        let created_at = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
        let descriptor = IndexDescriptor {
            name: name.into(),
            kind: kind.into(),
            fields,
            metadata: metadata.unwrap_or_default(),
            created_at,
        };
        let mut state = self.lock()?;
        state.indexes.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn unregister_index(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.indexes.remove(name).is_some())
    }

    pub fn get_index(&self, name: &str) -> Result<Option<IndexDescriptor>> {
        Ok(self.lock()?.indexes.get(name).cloned())
    }

    pub fn get_all_indexes(&self) -> Result<Vec<IndexDescriptor>> {
        Ok(self.lock()?.indexes.values().cloned().collect())
    }

    /// Every index whose covered fields are a superset of `fields`.
    pub fn find_indexes_for_fields(&self, fields: &[String]) -> Result<Vec<IndexDescriptor>> {
        let state = self.lock()?;
        Ok(state
            .indexes
            .values()
            .filter(|idx| fields.iter().all(|f| idx.fields.contains(f)))
            .cloned()
            .collect())
    }

    pub fn find_indexes_for_query(&self, kind: QueryKind, params: &QueryParams) -> Result<Vec<IndexDescriptor>> {
        match kind {
            QueryKind::Vector => {
                let state = self.lock()?;
                Ok(state.indexes.values().filter(|idx| idx.kind == "vector").cloned().collect())
            }
            QueryKind::Property => {
                let fields = filter_fields(params);
                self.find_indexes_for_fields(&fields)
            }
            QueryKind::Graph => {
                let fields = graph_fields(params);
                self.find_indexes_for_fields(&fields)
            }
            QueryKind::Hybrid => Ok(Vec::new()),
        }
    }
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_fields(params: &QueryParams) -> Vec<String> {
    params
        .get("filters")
        .and_then(Value::as_array)
        .map(|filters| {
            filters
                .iter()
                .filter_map(|f| f.get("field").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn graph_fields(params: &QueryParams) -> Vec<String> {
    let mut fields = Vec::new();
    if let Some(node_type) = params.get("start_node_type").and_then(Value::as_str) {
        fields.push(node_type.to_string());
    }
    if let Some(rel_types) = params.get("relationship_types").and_then(Value::as_array) {
        fields.extend(rel_types.iter().filter_map(Value::as_str).map(str::to_string));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_then_get_returns_descriptor_until_unregistered() {
        let registry = IndexRegistry::new();
        registry.register_index("idx_a", "btree", vec!["type".to_string()], None).unwrap();
        assert!(registry.get_index("idx_a").unwrap().is_some());
        assert!(registry.unregister_index("idx_a").unwrap());
        assert!(registry.get_index("idx_a").unwrap().is_none());
    }

    #[test]
    fn unregister_missing_index_returns_false() {
        let registry = IndexRegistry::new();
        assert!(!registry.unregister_index("nope").unwrap());
    }

    #[test]
    fn reregistration_overwrites_silently() {
        let registry = IndexRegistry::new();
        registry.register_index("idx_a", "btree", vec!["type".to_string()], None).unwrap();
        registry.register_index("idx_a", "hash", vec!["other".to_string()], None).unwrap();
        let descriptor = registry.get_index("idx_a").unwrap().unwrap();
        assert_eq!(descriptor.kind, "hash");
    }

    #[test]
    fn find_indexes_for_fields_requires_superset() {
        let registry = IndexRegistry::new();
        registry
            .register_index("idx_full", "btree", vec!["a".to_string(), "b".to_string()], None)
            .unwrap();
        registry.register_index("idx_partial", "btree", vec!["a".to_string()], None).unwrap();

        let matches = registry.find_indexes_for_fields(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "idx_full");
    }

    #[test]
    fn find_indexes_for_vector_query_ignores_dimension() {
        let registry = IndexRegistry::new();
        registry
            .register_index("vector_index_128", "vector", vec![], Some(HashMap::from([("dimension".to_string(), json!(128))])))
            .unwrap();

        let mut params = QueryParams::new();
        params.insert("dimension", json!(128));
        let matches = registry.find_indexes_for_query(QueryKind::Vector, &params).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn find_indexes_for_property_query_derives_fields_from_filters() {
        let registry = IndexRegistry::new();
        registry.register_index("entity_type_index", "btree", vec!["type".to_string()], None).unwrap();

        let mut params = QueryParams::new();
        params.insert("filters", json!([{"field": "type", "op": "=", "value": "x"}]));
        let matches = registry.find_indexes_for_query(QueryKind::Property, &params).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "entity_type_index");
    }
}
