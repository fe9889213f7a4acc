// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Field-oriented key-value persistence.
//!
//! Mirrors the browser's `localStorage`: string keys to string values. The
//! one addition is [`WriteBatch`], which an implementation must apply as a
//! single step so multi-key records are never observed half-written.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::StorageResult;

/// A set of writes and removals applied together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<(String, Option<String>)>,
}

impl WriteBatch {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `key = value`.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push((key.into(), Some(value.into())));
        self
    }

    /// Queue removal of `key`.
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.ops.push((key.into(), None));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every queued op, in order, to an in-memory map.
    pub fn apply_to(&self, map: &mut HashMap<String, String>) {
        for (key, value) in &self.ops {
            match value {
                Some(value) => {
                    map.insert(key.clone(), value.clone());
                }
                None => {
                    map.remove(key);
                }
            }
        }
    }
}

/// Persistent string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read several keys from one consistent snapshot.
    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>>;

    /// Apply a batch atomically: readers see all of it or none of it.
    fn apply(&self, batch: &WriteBatch) -> StorageResult<()>;

    /// Read a single key.
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.get_many(&[key])?.pop().flatten())
    }
}

/// Volatile store, used by tests and by hosts without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.iter().map(|k| entries.get(*k).cloned()).collect())
    }

    fn apply(&self, batch: &WriteBatch) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        batch.apply_to(&mut entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_applies_in_order() {
        let store = MemoryStore::new();
        store
            .apply(&WriteBatch::new().set("a", "1").set("b", "2").remove("a"))
            .unwrap();

        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_many_preserves_key_order() {
        let store = MemoryStore::new();
        store
            .apply(&WriteBatch::new().set("x", "1").set("z", "3"))
            .unwrap();

        let values = store.get_many(&["z", "y", "x"]).unwrap();
        assert_eq!(
            values,
            vec![Some("3".to_string()), None, Some("1".to_string())]
        );
    }

    #[test]
    fn removing_missing_key_is_noop() {
        let store = MemoryStore::new();
        store.apply(&WriteBatch::new().remove("nope")).unwrap();
        assert!(store.is_empty());
    }
}
