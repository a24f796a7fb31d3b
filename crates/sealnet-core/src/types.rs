//! Shared identifiers for SealNet
//!
//! Routing keys address both users and fragments in the DHT key space.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte fixed-size array used for hashes and identifiers.
pub type Bytes32 = [u8; 32];

/// Username as registered with the (external) username registry.
pub type Username = String;

// =============================================================================
// DOMAIN SEPARATION PREFIXES
// =============================================================================

/// Domain prefix for user routing keys
pub const DOMAIN_USER: &[u8] = b"user";
/// Domain prefix for resource location keys
pub const DOMAIN_LOCATION: &[u8] = b"location";
/// Domain prefix for identity fingerprints
pub const DOMAIN_IDENTITY: &[u8] = b"identity";

// =============================================================================
// ROUTING KEY
// =============================================================================

/// Address of a message or fragment in the DHT key space
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingKey(pub Bytes32);

impl RoutingKey {
    /// Routing key for a user's inbox.
    ///
    /// `RoutingKey = BLAKE3("user" || username)`
    pub fn for_username(username: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN_USER);
        hasher.update(username.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &Bytes32 {
        &self.0
    }

    /// Full hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut buf = [0u8; 32];
        hex::decode_to_slice(s, &mut buf).ok()?;
        Some(Self(buf))
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}
