use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// A submitted item awaiting its outcome, with the submission index it was
/// assigned when pulled off the queue.
#[derive(Debug, Clone)]
pub(crate) struct CorrelationEntry<T> {
    pub item: T,
    pub index: usize,
}

/// Correlation-key map reuniting a server-reported outcome with the
/// original caller item and its position in submission order.
///
/// An entry exists only between encoding (frame builder) and reconciliation
/// or replay (response reconciler), so no key is ever touched by both loops
/// at once; the lock only guards the map structure itself.
#[derive(Debug)]
pub(crate) struct CorrelationCache<T> {
    entries: Mutex<HashMap<String, CorrelationEntry<T>>>,
}

impl<T> CorrelationCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: String, item: T, index: usize) {
        self.entries
            .lock()
            .insert(key, CorrelationEntry { item, index });
    }

    pub fn remove(&self, key: &str) -> Option<CorrelationEntry<T>> {
        self.entries.lock().remove(key)
    }
}

/// Correlation keys sent to the transport but not yet acknowledged or
/// resolved; bounded by the current batch size.
#[derive(Debug)]
pub(crate) struct InFlightSet {
    keys: Mutex<HashSet<String>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
        }
    }

    pub fn insert_all(&self, keys: &[String]) {
        let mut set = self.keys.lock();
        for key in keys {
            set.insert(key.clone());
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.keys.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn has_room(&self, limit: usize) -> bool {
        self.len() < limit
    }
}
