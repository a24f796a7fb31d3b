//! Capabilities: encrypted, shareable pointers to remote data
//!
//! An [`EntryPoint`] names a resource through an opaque [`ResourceLocator`],
//! records the owning username and the usernames allowed to read or write
//! it. It is shared either boxed for one recipient or sealed under a
//! symmetric key.
//!
//! Canonical form: `[pointer: bytes, owner: text, readers: [text], writers: [text]]`
//! with both sets in byte-lexicographic order.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;

use crate::canonical::{self, Decoder};
use crate::crypto::{PublicBoxingKey, SymmetricKey, SYMMETRIC_KEY_SIZE};
use crate::error::{Error, Result};
use crate::identity::{Identity, PublicIdentity};
use crate::layout::{write_field, ByteReader};
use crate::limits::{CapabilityLimits, MAX_KEY_SIZE};
use crate::types::{RoutingKey, Username, DOMAIN_LOCATION};

/// Top-level arity of the canonical form
const ENTRY_POINT_FIELDS: usize = 4;

// =============================================================================
// RESOURCE LOCATOR
// =============================================================================

/// Opaque pointer to a remote resource.
///
/// `from_bytes(to_bytes(p)) == p` must hold for every locator.
pub trait ResourceLocator: Clone + Eq + Hash + Debug {
    fn to_bytes(&self) -> Vec<u8>;

    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Locator for a file: who owns it, who may write it, where it lives and
/// the key that opens it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilePointer {
    pub owner: PublicIdentity,
    pub writer: PublicIdentity,
    pub map_key: Vec<u8>,
    pub base_key: SymmetricKey,
}

impl FilePointer {
    pub fn new(
        owner: PublicIdentity,
        writer: PublicIdentity,
        map_key: Vec<u8>,
        base_key: SymmetricKey,
    ) -> Result<Self> {
        if map_key.is_empty() || map_key.len() > MAX_KEY_SIZE {
            return Err(Error::InvalidKey(format!(
                "map key must be 1..={} bytes, got {}",
                MAX_KEY_SIZE,
                map_key.len()
            )));
        }
        Ok(Self {
            owner,
            writer,
            map_key,
            base_key,
        })
    }

    /// A fresh pointer with a random map key and base key
    pub fn random(owner: PublicIdentity, writer: PublicIdentity) -> Self {
        let map_key = SymmetricKey::generate().as_bytes().to_vec();
        Self {
            owner,
            writer,
            map_key,
            base_key: SymmetricKey::generate(),
        }
    }

    /// `BLAKE3("location" || owner fingerprint || map_key)`
    pub fn location(&self) -> RoutingKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN_LOCATION);
        hasher.update(&self.owner.fingerprint());
        hasher.update(&self.map_key);
        RoutingKey(*hasher.finalize().as_bytes())
    }
}

impl ResourceLocator for FilePointer {
    /// `[owner][writer][len][map_key][base_key]`
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * 72 + 4 + self.map_key.len() + SYMMETRIC_KEY_SIZE);
        self.owner.write_to(&mut out);
        self.writer.write_to(&mut out);
        write_field(&mut out, &self.map_key);
        out.extend_from_slice(self.base_key.as_bytes());
        out
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes, Error::MalformedCapability);
        let owner = PublicIdentity::read_from(&mut reader).map_err(|e| in_pointer("owner", e))?;
        let writer = PublicIdentity::read_from(&mut reader).map_err(|e| in_pointer("writer", e))?;
        let map_key = reader.field("map key", MAX_KEY_SIZE)?;
        if map_key.is_empty() {
            return Err(Error::malformed("empty map key"));
        }
        let base_key = SymmetricKey::from_bytes(reader.take(SYMMETRIC_KEY_SIZE, "base key")?)?;
        reader.finish()?;
        Ok(Self {
            owner,
            writer,
            map_key: map_key.to_vec(),
            base_key,
        })
    }
}

/// Re-tag a nested decode error as a capability error, keeping size limit failures typed
fn in_pointer(context: &str, e: Error) -> Error {
    match e {
        Error::MalformedCapability(_) | Error::SizeLimitExceeded { .. } => e,
        other => Error::malformed(format!("{}: {}", context, other)),
    }
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// A capability granting access to the resource behind `pointer`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryPoint<P: ResourceLocator = FilePointer> {
    pub pointer: P,
    pub owner: Username,
    pub readers: BTreeSet<Username>,
    pub writers: BTreeSet<Username>,
}

impl<P: ResourceLocator> EntryPoint<P> {
    pub fn new(
        pointer: P,
        owner: impl Into<Username>,
        readers: BTreeSet<Username>,
        writers: BTreeSet<Username>,
    ) -> Self {
        Self {
            pointer,
            owner: owner.into(),
            readers,
            writers,
        }
    }

    /// An entry point with no readers or writers besides the owner
    pub fn private(pointer: P, owner: impl Into<Username>) -> Self {
        Self::new(pointer, owner, BTreeSet::new(), BTreeSet::new())
    }

    pub fn with_reader(&self, user: impl Into<Username>) -> Self {
        let mut next = self.clone();
        let user = user.into();
        if user != next.owner {
            next.readers.insert(user);
        }
        next
    }

    pub fn with_writer(&self, user: impl Into<Username>) -> Self {
        let mut next = self.clone();
        let user = user.into();
        if user != next.owner {
            next.writers.insert(user);
        }
        next
    }

    pub fn without_reader(&self, user: &str) -> Self {
        let mut next = self.clone();
        next.readers.remove(user);
        next
    }

    pub fn without_writer(&self, user: &str) -> Self {
        let mut next = self.clone();
        next.writers.remove(user);
        next
    }

    /// Writers may read, and the owner may do anything.
    pub fn can_read(&self, user: &str) -> bool {
        self.owner == user || self.readers.contains(user) || self.writers.contains(user)
    }

    pub fn can_write(&self, user: &str) -> bool {
        self.owner == user || self.writers.contains(user)
    }

    // -------------------------------------------------------------------------
    // Canonical encoding
    // -------------------------------------------------------------------------

    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        canonical::write_array_header(&mut out, ENTRY_POINT_FIELDS);
        canonical::write_bytes(&mut out, &self.pointer.to_bytes());
        canonical::write_text(&mut out, &self.owner);
        canonical::write_text_set(&mut out, &self.readers);
        canonical::write_text_set(&mut out, &self.writers);
        out
    }

    pub fn from_canonical_bytes(bytes: &[u8], limits: &CapabilityLimits) -> Result<Self> {
        let mut dec = Decoder::new(bytes);

        let arity = dec.array("entry point", usize::MAX)?;
        if arity != ENTRY_POINT_FIELDS {
            return Err(Error::malformed(format!(
                "expected {} fields, found {}",
                ENTRY_POINT_FIELDS, arity
            )));
        }

        let pointer = P::from_bytes(dec.bytes("pointer", limits.max_pointer_len)?)
            .map_err(|e| in_pointer("pointer", e))?;
        let owner = dec.text("owner", limits.max_username_len)?.to_owned();
        let readers = dec.text_set("readers", limits.max_set_len, limits.max_username_len)?;
        let writers = dec.text_set("writers", limits.max_set_len, limits.max_username_len)?;
        dec.finish()?;

        Ok(Self {
            pointer,
            owner,
            readers,
            writers,
        })
    }

    // -------------------------------------------------------------------------
    // Sharing
    // -------------------------------------------------------------------------

    /// Box the canonical form for `recipient`, sent by `sender`
    pub fn encrypt_for_recipient(
        &self,
        sender: &Identity,
        recipient: &PublicBoxingKey,
    ) -> Result<Vec<u8>> {
        sender.encrypt_for(&self.to_canonical_bytes(), recipient)
    }

    pub fn decrypt_from_sender(
        boxed: &[u8],
        recipient: &Identity,
        sender: &PublicBoxingKey,
        limits: &CapabilityLimits,
    ) -> Result<Self> {
        let clear = recipient.decrypt_from(boxed, sender)?;
        Self::from_canonical_bytes(&clear, limits)
    }

    /// `nonce || ciphertext` under a fresh nonce
    pub fn encrypt_with_shared_key(&self, key: &SymmetricKey) -> Result<Vec<u8>> {
        key.seal(&self.to_canonical_bytes())
    }

    pub fn decrypt_with_shared_key(
        sealed: &[u8],
        key: &SymmetricKey,
        limits: &CapabilityLimits,
    ) -> Result<Self> {
        let clear = key.open(sealed)?;
        Self::from_canonical_bytes(&clear, limits)
    }
}
