//! Storage backend abstraction for pluggable storage implementations.
//!
//! The scheduler persists its catalog (job rows, job statistics, chunk run
//! records) through this trait so the entity stores stay independent of
//! the concrete engine. Partitions map to whatever namespace concept the
//! backend has; the bundled [`MemoryBackend`](crate::MemoryBackend) uses
//! one ordered map per partition.

use std::fmt;

use tempodb_commons::TempoDbError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Iterator over raw key/value pairs returned by a scan.
pub type KvIterator<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + Send + 'a>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Partition (column family, tree, namespace) not found
    PartitionNotFound(String),

    /// Generic I/O error from underlying storage
    IoError(String),

    /// Serialization/deserialization error
    SerializationError(String),

    /// Lock poisoning error (internal concurrency issue)
    LockPoisoned(String),

    /// Other errors
    Other(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::PartitionNotFound(p) => write!(f, "partition not found: {}", p),
            StorageError::IoError(msg) => write!(f, "I/O error: {}", msg),
            StorageError::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            StorageError::LockPoisoned(msg) => write!(f, "lock poisoned: {}", msg),
            StorageError::Other(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for TempoDbError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SerializationError(msg) => TempoDbError::SerializationError(msg),
            other => TempoDbError::Storage(other.to_string()),
        }
    }
}

/// A logical partition of data within a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    name: String,
}

impl Partition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Partition {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A single operation in a batch transaction.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Insert or update a key-value pair
    Put {
        partition: Partition,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    /// Delete a key
    Delete { partition: Partition, key: Vec<u8> },
}

/// Trait for pluggable storage backend implementations.
///
/// Implementations must be thread-safe; `batch` must apply all operations
/// or none. Scans return keys in ascending byte order, which together with
/// the order-preserving key encoding gives id-ordered iteration.
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key. `Ok(None)` if the key doesn't exist.
    fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores a key-value pair, replacing any existing value.
    fn put(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()>;

    /// Deletes a key. Idempotent.
    fn delete(&self, partition: &Partition, key: &[u8]) -> Result<()>;

    /// Executes multiple operations atomically.
    fn batch(&self, operations: Vec<Operation>) -> Result<()>;

    /// Scans keys in ascending order, optionally filtered by prefix and
    /// bounded by limit.
    fn scan(
        &self,
        partition: &Partition,
        prefix: Option<&[u8]>,
        limit: Option<usize>,
    ) -> Result<KvIterator<'_>>;

    /// Checks if a partition exists.
    fn partition_exists(&self, partition: &Partition) -> bool;

    /// Creates a new partition. Idempotent.
    fn create_partition(&self, partition: &Partition) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_creation() {
        let p1 = Partition::new("system_jobs");
        assert_eq!(p1.name(), "system_jobs");

        let p2 = Partition::from("system_job_stats");
        assert_eq!(p2.name(), "system_job_stats");
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::PartitionNotFound("system_jobs".to_string());
        assert_eq!(err.to_string(), "partition not found: system_jobs");

        let err = StorageError::IoError("disk full".to_string());
        assert_eq!(err.to_string(), "I/O error: disk full");
    }

    #[test]
    fn test_conversion_to_tempodb_error() {
        let err: TempoDbError = StorageError::SerializationError("bad bytes".into()).into();
        assert!(matches!(err, TempoDbError::SerializationError(_)));

        let err: TempoDbError = StorageError::IoError("disk full".into()).into();
        assert!(matches!(err, TempoDbError::Storage(_)));
    }
}
