//! # tempodb-store
//!
//! Low-level key/value layer for the scheduler's catalog: a pluggable
//! backend trait, an in-memory implementation, and the typed entity store
//! the system catalog providers build on.
//!
//! ```text
//! tempodb-system (catalog providers)
//!     ↓
//! tempodb-store (typed K/V operations)
//!     ↓
//! StorageBackend (pluggable engine)
//! ```

pub mod entity_store;
pub mod memory;
pub mod storage_trait;

pub use entity_store::EntityStore;
pub use memory::MemoryBackend;
pub use storage_trait::{KvIterator, Operation, Partition, StorageBackend, StorageError};
