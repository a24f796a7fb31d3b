//! Test vectors for interoperable capability and key encodings
//!
//! Other implementations must reproduce these bytes exactly.

use std::collections::BTreeSet;

use crate::capability::{EntryPoint, ResourceLocator};
use crate::crypto::*;
use crate::error::Result;
use crate::identity::Identity;
use crate::types::*;
use serde::Serialize;

/// Test vector output format (JSON serializable)
#[derive(Serialize)]
pub struct TestVector {
    pub name: String,
    pub description: String,
    pub inputs: serde_json::Value,
    pub canonical_bytes_hex: String,
    pub hash_hex: String,
}

/// Locator that serializes to its raw bytes
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct RawPointer(Vec<u8>);

impl ResourceLocator for RawPointer {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self(bytes.to_vec()))
    }
}

/// Generate all test vectors as JSON
pub fn generate_test_vectors() -> Vec<TestVector> {
    vec![
        entry_point_vector(),
        username_routing_key_vector(),
        public_identity_vector(),
    ]
}

fn entry_point_vector() -> TestVector {
    let readers: BTreeSet<String> = ["bob".to_string()].into_iter().collect();
    let ep = EntryPoint::new(RawPointer(vec![1, 2]), "alice", readers, BTreeSet::new());
    let bytes = ep.to_canonical_bytes();

    TestVector {
        name: "entry_point_canonical".into(),
        description: "[pointer, owner, sorted readers, sorted writers] as a CBOR subset".into(),
        inputs: serde_json::json!({
            "pointer_hex": "0102",
            "owner": "alice",
            "readers": ["bob"],
            "writers": [],
        }),
        canonical_bytes_hex: hex::encode(&bytes),
        hash_hex: hex::encode(blake3::hash(&bytes).as_bytes()),
    }
}

fn username_routing_key_vector() -> TestVector {
    let key = RoutingKey::for_username("alice");

    TestVector {
        name: "username_routing_key".into(),
        description: "RoutingKey = BLAKE3(\"user\" || username)".into(),
        inputs: serde_json::json!({ "username": "alice" }),
        canonical_bytes_hex: "".into(),
        hash_hex: key.to_hex(),
    }
}

fn public_identity_vector() -> TestVector {
    let signing = SigningKeyPair::from_secret(SecretSigningKey::from_seed(&[0x11; 32]));
    let boxing = BoxingKeyPair::from_secret(
        SecretBoxingKey::from_bytes(&[0x22; 32]).expect("32-byte secret"),
    );
    let identity = Identity::from_key_pairs(signing, boxing);
    let bytes = identity.public().to_bytes();

    TestVector {
        name: "public_identity_layout".into(),
        description: "[len][public signing][len][public boxing], fingerprint = BLAKE3(\"identity\" || layout)".into(),
        inputs: serde_json::json!({
            "signing_seed_hex": hex::encode([0x11; 32]),
            "boxing_secret_hex": hex::encode([0x22; 32]),
        }),
        canonical_bytes_hex: hex::encode(&bytes),
        hash_hex: identity.public().fingerprint_hex(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_vectors() {
        let vectors = generate_test_vectors();
        assert_eq!(vectors.len(), 3);

        let json = serde_json::to_string_pretty(&vectors).unwrap();
        println!("Test Vectors:\n{}", json);
    }

    #[test]
    fn test_entry_point_bytes_fixed() {
        let v = entry_point_vector();
        assert_eq!(v.canonical_bytes_hex, "8442010265616c6963658163626f6280");
    }

    #[test]
    fn test_public_identity_deterministic() {
        let v1 = public_identity_vector();
        let v2 = public_identity_vector();
        assert_eq!(v1.hash_hex, v2.hash_hex);
        assert!(v1.canonical_bytes_hex.starts_with("00000020"));
        assert_eq!(v1.canonical_bytes_hex.len(), 2 * (4 + 32 + 4 + 32));
    }
}
