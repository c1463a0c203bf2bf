//! Query requests: `(kind, params)` pairs, their canonical encoding, and the
//! derived `query_id` used for plan caching and cache keys.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, VellumError};

/// The four request kinds this optimizer stack understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Vector,
    Property,
    Graph,
    Hybrid,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Vector => "vector",
            QueryKind::Property => "property",
            QueryKind::Graph => "graph",
            QueryKind::Hybrid => "hybrid",
        }
    }

    pub fn parse(literal: &str) -> Option<Self> {
        match literal {
            "vector" => Some(QueryKind::Vector),
            "property" => Some(QueryKind::Property),
            "graph" => Some(QueryKind::Graph),
            "hybrid" => Some(QueryKind::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JSON-serializable parameter mapping with string keys.
///
/// Canonicalization relies on [`serde_json::Map`]'s default (non
/// `preserve_order`) backing store, which is itself key-sorted at every
/// nesting level — so `to_canonical_string` is a plain serialization, not a
/// hand-rolled key sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(pub Map<String, Value>);

impl QueryParams {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Deterministic encoding: two params maps that canonicalize to the same
    /// string must collide, regardless of insertion order in the input.
    pub fn to_canonical_string(&self) -> String {
        serde_json::to_string(&Value::Object(self.0.clone())).expect("map of JSON values always serializes")
    }
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::new()
    }
}

/// `"{kind}_{md5(kind + canonical(params))[:8]}"`.
pub(crate) fn query_id(kind: QueryKind, params: &QueryParams) -> String {
    let mut hasher = Md5::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(params.to_canonical_string().as_bytes());
    let digest = hasher.finalize();
    format!("{}_{}", kind.as_str(), hex_prefix(&digest, 4))
}

fn hex_prefix(digest: &[u8], bytes: usize) -> String {
    digest.iter().take(bytes).map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn require_str<'a>(params: &'a QueryParams, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| VellumError::InvalidArgument { message: format!("params.{key} must be a string") })
}

pub(crate) fn require_u64(params: &QueryParams, key: &str) -> Result<u64> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| VellumError::InvalidArgument { message: format!("params.{key} must be a non-negative integer") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_string_is_independent_of_insertion_order() {
        let mut a = QueryParams::new();
        a.insert("b", json!(2));
        a.insert("a", json!(1));

        let mut b = QueryParams::new();
        b.insert("a", json!(1));
        b.insert("b", json!(2));

        assert_eq!(a.to_canonical_string(), b.to_canonical_string());
    }

    #[test]
    fn canonical_string_sorts_nested_objects_too() {
        let mut a = QueryParams::new();
        a.insert("outer", json!({"z": 1, "a": 2}));
        assert_eq!(a.to_canonical_string(), r#"{"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn query_id_is_deterministic_for_identical_inputs() {
        let mut params = QueryParams::new();
        params.insert("q", json!([0.1, 0.2]));
        params.insert("dimension", json!(2));
        assert_eq!(query_id(QueryKind::Vector, &params), query_id(QueryKind::Vector, &params));
    }

    #[test]
    fn query_kind_round_trips_through_literals() {
        for kind in [QueryKind::Vector, QueryKind::Property, QueryKind::Graph, QueryKind::Hybrid] {
            assert_eq!(QueryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(QueryKind::parse("nonsense"), None);
    }
}
