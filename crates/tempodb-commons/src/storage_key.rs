//! Storage key trait for type-safe key serialization with lexicographic ordering
//!
//! Keys are encoded with the `storekey` crate so their byte representation
//! sorts in the same order as the original values. This matters for the
//! catalog scans in `tempodb-store`: job rows iterate in job-id order and
//! chunk statistics scan by `(job_id, chunk_id)` prefix, both of which rely
//! on order-preserving encoding.
//!
//! Composite keys encode as tuples; encoding the leading elements of the
//! tuple yields a byte prefix usable for range scans.

use storekey::{Decode, Encode};

/// Encode a value to bytes using storekey's order-preserving format.
pub fn encode_key<T: Encode>(value: &T) -> Vec<u8> {
    storekey::encode_vec(value).expect("storekey encoding should not fail for valid types")
}

/// Encode a value as a prefix for range scans.
///
/// Identical to `encode_key`; for composite tuple keys, encode just the
/// leading tuple `(first,)` to scan everything sharing that component.
pub fn encode_prefix<T: Encode>(value: &T) -> Vec<u8> {
    encode_key(value)
}

/// Decode a value from storekey-encoded bytes.
pub fn decode_key<T: Decode>(bytes: &[u8]) -> Result<T, String> {
    storekey::decode(&mut std::io::Cursor::new(bytes))
        .map_err(|e| format!("storekey decode error: {:?}", e))
}

/// Trait for keys that can be serialized for storage in an `EntityStore`.
///
/// The encoding must preserve the natural ordering of the key type and,
/// for composite keys, must cover the full composite representation.
pub trait StorageKey: Clone + Send + Sync + 'static {
    /// Serialize this key to bytes using order-preserving encoding.
    fn storage_key(&self) -> Vec<u8>;

    /// Deserialize this key from bytes
    fn from_storage_key(bytes: &[u8]) -> Result<Self, String>
    where
        Self: Sized;
}

impl StorageKey for String {
    fn storage_key(&self) -> Vec<u8> {
        encode_key(&self.as_str())
    }

    fn from_storage_key(bytes: &[u8]) -> Result<Self, String> {
        decode_key(bytes)
    }
}

impl StorageKey for i32 {
    fn storage_key(&self) -> Vec<u8> {
        encode_key(self)
    }

    fn from_storage_key(bytes: &[u8]) -> Result<Self, String> {
        decode_key(bytes)
    }
}

impl StorageKey for i64 {
    fn storage_key(&self) -> Vec<u8> {
        encode_key(self)
    }

    fn from_storage_key(bytes: &[u8]) -> Result<Self, String> {
        decode_key(bytes)
    }
}
