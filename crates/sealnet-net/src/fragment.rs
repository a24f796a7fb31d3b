//! Content-addressed fragments and the store interface

use async_trait::async_trait;
use parking_lot::RwLock;
use sealnet_core::RoutingKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Default cap on a fragment body (16 MiB)
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 16 * 1024 * 1024;

/// BLAKE3 hash of a fragment's content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentKey(pub [u8; 32]);

impl FragmentKey {
    pub fn for_content(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Does `bytes` hash to this key?
    pub fn matches(&self, bytes: &[u8]) -> bool {
        Self::for_content(bytes) == *self
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let mut buf = [0u8; 32];
        hex::decode_to_slice(s, &mut buf).ok()?;
        Some(Self(buf))
    }

    /// Fragments live at their own content hash
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey(self.0)
    }
}

impl std::fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Fragment store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Content does not match key {0}")]
    HashMismatch(FragmentKey),
}

/// Where fragment bytes live
#[async_trait]
pub trait FragmentStore: Send + Sync {
    async fn get(&self, key: &FragmentKey) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &FragmentKey, bytes: Vec<u8>) -> Result<(), StoreError>;
}

/// In-process fragment store
#[derive(Default)]
pub struct MemoryFragmentStore {
    fragments: RwLock<HashMap<FragmentKey, Vec<u8>>>,
}

impl MemoryFragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fragments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.read().is_empty()
    }
}

#[async_trait]
impl FragmentStore for MemoryFragmentStore {
    async fn get(&self, key: &FragmentKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.fragments.read().get(key).cloned())
    }

    async fn put(&self, key: &FragmentKey, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.fragments.write().insert(*key, bytes);
        Ok(())
    }
}
