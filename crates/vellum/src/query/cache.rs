//! LRU result cache keyed by `"{kind}:{canonical_params}"`.

use std::sync::Mutex;

use indexmap::IndexMap;
use serde_json::Value;

use super::params::{QueryKind, QueryParams};
use crate::Result;

/// Insertion-order-preserving LRU cache. `get` is a mutating operation (it
/// promotes the key to most-recently-used) and therefore takes the same
/// exclusive lock as `put`.
pub struct LruQueryCache {
    entries: Mutex<IndexMap<String, Value>>,
    max_size: usize,
}

impl LruQueryCache {
    pub fn new(max_size: usize) -> Self {
        Self { entries: Mutex::new(IndexMap::new()), max_size }
    }

    pub fn cache_key(kind: QueryKind, params: &QueryParams) -> String {
        format!("{}:{}", kind.as_str(), params.to_canonical_string())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, IndexMap<String, Value>>> {
        self.entries.lock().map_err(|_| crate::VellumError::lock("query cache mutex poisoned"))
    }

    pub fn get(&self, kind: QueryKind, params: &QueryParams) -> Result<Option<Value>> {
        let key = Self::cache_key(kind, params);
        let mut entries = self.lock()?;
        match entries.shift_remove(&key) {
            Some(value) => {
                entries.insert(key, value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn put(&self, kind: QueryKind, params: &QueryParams, value: Value) -> Result<()> {
        let key = Self::cache_key(kind, params);
        let mut entries = self.lock()?;

        if entries.contains_key(&key) {
            entries.shift_remove(&key);
        } else if entries.len() >= self.max_size {
            entries.shift_remove_index(0);
        }
        entries.insert(key, value);
        Ok(())
    }

    /// Drops everything when `kind` is `None`; otherwise drops every entry
    /// whose key starts with `"{kind}:"`.
    pub fn invalidate(&self, kind: Option<QueryKind>) -> Result<()> {
        let mut entries = self.lock()?;
        match kind {
            None => entries.clear(),
            Some(kind) => {
                let prefix = format!("{}:", kind.as_str());
                entries.retain(|key, _| !key.starts_with(&prefix));
            }
        }
        Ok(())
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: i64) -> QueryParams {
        let mut p = QueryParams::new();
        p.insert("v", json!(value));
        p
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = LruQueryCache::new(10);
        cache.put(QueryKind::Vector, &params(1), json!("a")).unwrap();
        let hit = cache.get(QueryKind::Vector, &params(1)).unwrap();
        assert_eq!(hit, Some(json!("a")));
    }

    #[test]
    fn replacing_existing_key_does_not_grow_size() {
        let cache = LruQueryCache::new(10);
        cache.put(QueryKind::Vector, &params(1), json!("a")).unwrap();
        cache.put(QueryKind::Vector, &params(1), json!("b")).unwrap();
        assert_eq!(cache.size().unwrap(), 1);
        assert_eq!(cache.get(QueryKind::Vector, &params(1)).unwrap(), Some(json!("b")));
    }

    #[test]
    fn eviction_drops_least_recently_used() {
        let cache = LruQueryCache::new(2);
        cache.put(QueryKind::Vector, &params(1), json!("a")).unwrap();
        cache.put(QueryKind::Vector, &params(2), json!("b")).unwrap();
        cache.put(QueryKind::Vector, &params(3), json!("c")).unwrap();

        assert_eq!(cache.size().unwrap(), 2);
        assert_eq!(cache.get(QueryKind::Vector, &params(1)).unwrap(), None);
        assert_eq!(cache.get(QueryKind::Vector, &params(2)).unwrap(), Some(json!("b")));
    }

    #[test]
    fn get_promotes_to_most_recently_used() {
        let cache = LruQueryCache::new(2);
        cache.put(QueryKind::Vector, &params(1), json!("a")).unwrap();
        cache.put(QueryKind::Vector, &params(2), json!("b")).unwrap();
        cache.get(QueryKind::Vector, &params(1)).unwrap();
        cache.put(QueryKind::Vector, &params(3), json!("c")).unwrap();

        // (2) was least-recently-used after the get(1) promotion, so it is evicted.
        assert_eq!(cache.get(QueryKind::Vector, &params(2)).unwrap(), None);
        assert!(cache.get(QueryKind::Vector, &params(1)).unwrap().is_some());
    }

    #[test]
    fn invalidate_by_kind_only_drops_matching_prefix() {
        let cache = LruQueryCache::new(10);
        cache.put(QueryKind::Vector, &params(1), json!("a")).unwrap();
        cache.put(QueryKind::Graph, &params(1), json!("b")).unwrap();
        cache.invalidate(Some(QueryKind::Vector)).unwrap();

        assert_eq!(cache.get(QueryKind::Vector, &params(1)).unwrap(), None);
        assert!(cache.get(QueryKind::Graph, &params(1)).unwrap().is_some());
    }

    #[test]
    fn invalidate_with_no_kind_clears_everything() {
        let cache = LruQueryCache::new(10);
        cache.put(QueryKind::Vector, &params(1), json!("a")).unwrap();
        cache.invalidate(None).unwrap();
        assert_eq!(cache.size().unwrap(), 0);
    }
}
