//! Persistent storage using sled

use async_trait::async_trait;
use sealnet_net::{FragmentKey, FragmentStore, Message, StoreError};
use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] postcard::Error),
    #[error("Corrupt inbox key")]
    CorruptKey,
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Storage backend for sealnetd
pub struct Storage {
    db: Db,
    /// Fragment tree: fragment key -> bytes
    fragments: sled::Tree,
    /// Inbox tree: big-endian counter -> postcard Message
    inbox: sled::Tree,
    /// Metadata tree: key -> value
    metadata: sled::Tree,
}

impl Storage {
    /// Open storage at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let fragments = db.open_tree("fragments")?;
        let inbox = db.open_tree("inbox")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            fragments,
            inbox,
            metadata,
        })
    }

    pub fn put_fragment(&self, key: &FragmentKey, bytes: &[u8]) -> Result<(), StorageError> {
        self.fragments.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_fragment(&self, key: &FragmentKey) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.fragments.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Append a received message, returning its inbox position
    pub fn append_inbox(&self, message: &Message) -> Result<u64, StorageError> {
        let id = self.db.generate_id()?;
        let value = postcard::to_allocvec(message)?;
        self.inbox.insert(id.to_be_bytes(), value)?;
        Ok(id)
    }

    /// All inbox messages in arrival order
    pub fn inbox(&self) -> Result<Vec<(u64, Message)>, StorageError> {
        let mut out = Vec::with_capacity(self.inbox.len());
        for result in self.inbox.iter() {
            let (key, value) = result?;
            let id: [u8; 8] = key.as_ref().try_into().map_err(|_| StorageError::CorruptKey)?;
            let message: Message = postcard::from_bytes(&value)?;
            out.push((u64::from_be_bytes(id), message));
        }
        Ok(out)
    }

    pub fn remove_inbox(&self, id: u64) -> Result<bool, StorageError> {
        Ok(self.inbox.remove(id.to_be_bytes())?.is_some())
    }

    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    /// Store metadata
    pub fn put_metadata(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.metadata.insert(key, value)?;
        Ok(())
    }

    /// Get metadata
    pub fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.metadata.get(key)?.map(|v| v.to_vec()))
    }

    /// Flush all pending writes
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl FragmentStore for Storage {
    async fn get(&self, key: &FragmentKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.get_fragment(key)?)
    }

    async fn put(&self, key: &FragmentKey, bytes: Vec<u8>) -> Result<(), StoreError> {
        if !key.matches(&bytes) {
            return Err(StoreError::HashMismatch(*key));
        }
        Ok(self.put_fragment(key, &bytes)?)
    }
}
