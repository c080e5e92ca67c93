use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

/// Scratch cache for expensive-to-recompute metadata.
///
/// Entries can be reclaimed wholesale when the cache fills up, so a `get`
/// after a successful `insert` may legitimately miss; callers must always
/// be prepared to recompute. There is no eviction API and `insert` never
/// fails.
pub struct MetadataCache {
    capacity: usize,
    entries: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl MetadataCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, key: &str, value: Arc<dyn Any + Send + Sync>) {
        if self.entries.len() >= self.capacity {
            tracing::warn!(
                "Metadata cache full ({} entries), reclaiming everything",
                self.entries.len()
            );
            self.entries.clear();
        }
        self.entries.insert(key.to_string(), value);
    }

    /// A miss means "never inserted" or "reclaimed"; the two are
    /// indistinguishable on purpose.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Typed lookup; a present entry of the wrong type is a miss.
    pub fn get_as<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(|value| value.downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
