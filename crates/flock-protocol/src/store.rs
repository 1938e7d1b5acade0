/// Deduplicating set of every value this node has observed.
///
/// Append-only for the life of the process. `try_insert` is the gate for
/// gossip: exactly one caller per value sees `true`.
use std::collections::HashSet;
use std::sync::Mutex;

use crate::types::Value;

#[derive(Debug, Default)]
pub struct MessageStore {
    values: Mutex<HashSet<Value>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` if absent. Returns `true` iff this call added it.
    ///
    /// Check and insert happen under one lock acquisition.
    pub fn try_insert(&self, value: Value) -> bool {
        self.lock().insert(value)
    }

    /// Point-in-time copy of all known values, in no particular order.
    pub fn snapshot(&self) -> Vec<Value> {
        self.lock().iter().copied().collect()
    }

    pub fn contains(&self, value: Value) -> bool {
        self.lock().contains(&value)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock can't leave the set half-updated
    // (HashSet::insert is all-or-nothing), so poisoning is ignored.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<Value>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}
