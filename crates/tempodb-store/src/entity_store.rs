//! Type-safe entity storage with generic key types.
//!
//! `EntityStore<K, V>` layers typed CRUD on top of a `StorageBackend`
//! partition: keys go through the order-preserving `StorageKey` encoding,
//! entities through bincode.
//!
//! ```text
//! EntityStore<K, V>        ← typed entity CRUD (this file)
//!     ↓
//! StorageBackend           ← raw K/V operations (storage_trait.rs)
//! ```
//!
//! Catalog rows are mutated under a per-key blocking lock (`mutate` /
//! `upsert`), never through optimistic retry: a writer acquires the row
//! lock, reads, modifies and writes back while any concurrent writer for
//! the same key blocks.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use bincode::{Decode, Encode};
use dashmap::DashMap;
use tempodb_commons::StorageKey;

use crate::storage_trait::{Operation, Partition, Result, StorageBackend, StorageError};

/// Typed entity store over one backend partition.
pub struct EntityStore<K, V> {
    backend: Arc<dyn StorageBackend>,
    partition: Partition,
    row_locks: DashMap<Vec<u8>, Arc<Mutex<()>>>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> EntityStore<K, V>
where
    K: StorageKey,
    V: Encode + Decode<()> + Send + Sync,
{
    /// Create a store bound to the given partition.
    pub fn new(backend: Arc<dyn StorageBackend>, partition: &str) -> Self {
        let partition = Partition::new(partition);
        if let Err(e) = backend.create_partition(&partition) {
            log::warn!("could not provision partition {}: {}", partition, e);
        }
        Self {
            backend,
            partition,
            row_locks: DashMap::new(),
            _marker: PhantomData,
        }
    }

    fn serialize(&self, entity: &V) -> Result<Vec<u8>> {
        bincode::encode_to_vec(entity, bincode::config::standard())
            .map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<V> {
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .map(|(entity, _)| entity)
            .map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    /// Stores an entity under its key, replacing any existing value.
    pub fn put(&self, key: &K, entity: &V) -> Result<()> {
        let value = self.serialize(entity)?;
        self.backend.put(&self.partition, &key.storage_key(), &value)
    }

    /// Retrieves an entity by key. `Ok(None)` if absent.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        match self.backend.get(&self.partition, &key.storage_key())? {
            Some(bytes) => Ok(Some(self.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Removes an entity by key. Idempotent.
    pub fn delete(&self, key: &K) -> Result<()> {
        self.backend.delete(&self.partition, &key.storage_key())
    }

    /// Removes a set of entities atomically.
    pub fn delete_many(&self, keys: &[K]) -> Result<()> {
        let operations = keys
            .iter()
            .map(|key| Operation::Delete {
                partition: self.partition.clone(),
                key: key.storage_key(),
            })
            .collect();
        self.backend.batch(operations)
    }

    /// Returns all entities in key order.
    pub fn scan_all(&self, limit: Option<usize>) -> Result<Vec<(K, V)>> {
        self.scan_raw(None, limit)
    }

    /// Returns entities whose encoded key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(K, V)>> {
        self.scan_raw(Some(prefix), limit)
    }

    fn scan_raw(&self, prefix: Option<&[u8]>, limit: Option<usize>) -> Result<Vec<(K, V)>> {
        let iter = self.backend.scan(&self.partition, prefix, limit)?;
        let mut entries = Vec::new();
        for (key_bytes, value_bytes) in iter {
            let key = K::from_storage_key(&key_bytes)
                .map_err(StorageError::SerializationError)?;
            entries.push((key, self.deserialize(&value_bytes)?));
        }
        Ok(entries)
    }

    /// Mutates an existing entity under its row lock.
    ///
    /// Returns the updated entity, or `Ok(None)` when the key is absent
    /// (the caller decides whether that is an error). The closure runs
    /// while the row lock is held, so concurrent writers to the same key
    /// serialize; last writer within the lock wins, there is no version
    /// check.
    pub fn mutate<F>(&self, key: &K, f: F) -> Result<Option<V>>
    where
        F: FnOnce(&mut V),
    {
        let lock = self.row_lock(key);
        let _guard = acquire(&lock)?;
        match self.get(key)? {
            None => Ok(None),
            Some(mut entity) => {
                f(&mut entity);
                self.put(key, &entity)?;
                Ok(Some(entity))
            }
        }
    }

    /// Get-or-create variant of [`mutate`](Self::mutate).
    ///
    /// Missing entities are seeded from `init` before the mutation runs.
    pub fn upsert<I, F>(&self, key: &K, init: I, f: F) -> Result<V>
    where
        I: FnOnce() -> V,
        F: FnOnce(&mut V),
    {
        let lock = self.row_lock(key);
        let _guard = acquire(&lock)?;
        let mut entity = match self.get(key)? {
            Some(entity) => entity,
            None => init(),
        };
        f(&mut entity);
        self.put(key, &entity)?;
        Ok(entity)
    }

    fn row_lock(&self, key: &K) -> Arc<Mutex<()>> {
        self.row_locks
            .entry(key.storage_key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn acquire(lock: &Arc<Mutex<()>>) -> Result<MutexGuard<'_, ()>> {
    lock.lock()
        .map_err(|e| StorageError::LockPoisoned(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use bincode::{Decode, Encode};

    #[derive(Debug, Clone, PartialEq, Encode, Decode)]
    struct Counter {
        value: i64,
    }

    fn store() -> EntityStore<i32, Counter> {
        EntityStore::new(Arc::new(MemoryBackend::new()), "counters")
    }

    #[test]
    fn test_put_get_round_trip() {
        let store = store();
        store.put(&1, &Counter { value: 10 }).unwrap();
        assert_eq!(store.get(&1).unwrap(), Some(Counter { value: 10 }));
        assert_eq!(store.get(&2).unwrap(), None);
    }

    #[test]
    fn test_scan_all_in_key_order() {
        let store = store();
        store.put(&30, &Counter { value: 3 }).unwrap();
        store.put(&1, &Counter { value: 1 }).unwrap();
        store.put(&20, &Counter { value: 2 }).unwrap();

        let keys: Vec<i32> = store
            .scan_all(None)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![1, 20, 30]);
    }

    #[test]
    fn test_mutate_missing_returns_none() {
        let store = store();
        let result = store.mutate(&7, |c| c.value += 1).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_mutate_updates_in_place() {
        let store = store();
        store.put(&7, &Counter { value: 1 }).unwrap();
        let updated = store.mutate(&7, |c| c.value += 5).unwrap().unwrap();
        assert_eq!(updated.value, 6);
        assert_eq!(store.get(&7).unwrap().unwrap().value, 6);
    }

    #[test]
    fn test_upsert_seeds_missing_entity() {
        let store = store();
        let created = store
            .upsert(&9, || Counter { value: 0 }, |c| c.value += 1)
            .unwrap();
        assert_eq!(created.value, 1);

        let bumped = store
            .upsert(&9, || Counter { value: 0 }, |c| c.value += 1)
            .unwrap();
        assert_eq!(bumped.value, 2);
    }

    #[test]
    fn test_delete() {
        let store = store();
        store.put(&1, &Counter { value: 10 }).unwrap();
        store.delete(&1).unwrap();
        assert_eq!(store.get(&1).unwrap(), None);
    }

    #[test]
    fn test_delete_many() {
        let store = store();
        for key in 1..=3 {
            store.put(&key, &Counter { value: key as i64 }).unwrap();
        }
        store.delete_many(&[1, 3]).unwrap();
        assert_eq!(store.get(&1).unwrap(), None);
        assert!(store.get(&2).unwrap().is_some());
        assert_eq!(store.get(&3).unwrap(), None);
    }
}
