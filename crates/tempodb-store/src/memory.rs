//! In-memory storage backend.
//!
//! One ordered map per partition behind a single `RwLock`, which also
//! makes `batch` trivially atomic. This is the backend used by the test
//! fixtures and by embedded deployments that do not persist the job
//! catalog across restarts.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::storage_trait::{
    KvIterator, Operation, Partition, Result, StorageBackend, StorageError,
};

type PartitionMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory `StorageBackend` over ordered maps.
///
/// Partitions are created implicitly on first write; reads from a
/// partition that was never written behave as reads from an empty one.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    partitions: RwLock<HashMap<String, PartitionMap>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_guard(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, PartitionMap>>> {
        self.partitions
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }

    fn write_guard(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, PartitionMap>>> {
        self.partitions
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let guard = self.read_guard()?;
        Ok(guard
            .get(partition.name())
            .and_then(|map| map.get(key).cloned()))
    }

    fn put(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()> {
        let mut guard = self.write_guard()?;
        guard
            .entry(partition.name().to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, partition: &Partition, key: &[u8]) -> Result<()> {
        let mut guard = self.write_guard()?;
        if let Some(map) = guard.get_mut(partition.name()) {
            map.remove(key);
        }
        Ok(())
    }

    fn batch(&self, operations: Vec<Operation>) -> Result<()> {
        // All operations apply under one write guard, so the batch is atomic
        // with respect to readers.
        let mut guard = self.write_guard()?;
        for op in operations {
            match op {
                Operation::Put {
                    partition,
                    key,
                    value,
                } => {
                    guard
                        .entry(partition.name().to_string())
                        .or_default()
                        .insert(key, value);
                }
                Operation::Delete { partition, key } => {
                    if let Some(map) = guard.get_mut(partition.name()) {
                        map.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn scan(
        &self,
        partition: &Partition,
        prefix: Option<&[u8]>,
        limit: Option<usize>,
    ) -> Result<KvIterator<'_>> {
        let guard = self.read_guard()?;
        let entries: Vec<(Vec<u8>, Vec<u8>)> = match guard.get(partition.name()) {
            None => Vec::new(),
            Some(map) => {
                let iter = map
                    .iter()
                    .filter(|(k, _)| prefix.map_or(true, |p| k.starts_with(p)))
                    .map(|(k, v)| (k.clone(), v.clone()));
                match limit {
                    Some(n) => iter.take(n).collect(),
                    None => iter.collect(),
                }
            }
        };
        Ok(Box::new(entries.into_iter()))
    }

    fn partition_exists(&self, partition: &Partition) -> bool {
        self.read_guard()
            .map(|g| g.contains_key(partition.name()))
            .unwrap_or(false)
    }

    fn create_partition(&self, partition: &Partition) -> Result<()> {
        let mut guard = self.write_guard()?;
        guard.entry(partition.name().to_string()).or_default();
        Ok(())
    }
}
