use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

use super::IntegrationField;
use crate::nav::models::Destination;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FieldKey {
    pub agent_size: u8,
    pub destination: Destination,
}

/// Per-cluster memo of integration fields. Entries are never evicted; the
/// whole cache goes away with the graph on rebuild.
#[derive(Debug, Default)]
pub struct FieldCache {
    fields: RwLock<FxHashMap<FieldKey, Arc<IntegrationField>>>,
}

impl FieldCache {
    pub fn get(&self, key: &FieldKey) -> Option<Arc<IntegrationField>> {
        self.fields.read().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    /// Returns the cached field for `key`, solving it on a miss. Two threads
    /// racing on the same key may both solve; the first insert wins and both
    /// callers get that one.
    pub fn get_or_compute(&self, key: FieldKey, solve: impl FnOnce() -> IntegrationField) -> Arc<IntegrationField> {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let computed = Arc::new(solve());
        let mut guard = self.fields.write().unwrap_or_else(|e| e.into_inner());
        guard.entry(key).or_insert(computed).clone()
    }

    pub fn len(&self) -> usize {
        self.fields.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::flow::wavefront::WavefrontField;
    use crate::nav::models::{Cell, Rect};

    fn dummy() -> IntegrationField {
        IntegrationField::Discrete(WavefrontField::unreachable(Rect::new(0, 0, 2, 2)))
    }

    #[test]
    fn solves_each_key_once() {
        let cache = FieldCache::default();
        let key = FieldKey { agent_size: 1, destination: Destination::Cell(Cell::new(0, 0)) };
        let mut calls = 0;
        let a = cache.get_or_compute(key, || {
            calls += 1;
            dummy()
        });
        let b = cache.get_or_compute(key, || {
            calls += 1;
            dummy()
        });
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&a, &b));

        let other = FieldKey { agent_size: 2, ..key };
        cache.get_or_compute(other, dummy);
        assert_eq!(cache.len(), 2);
    }
}
