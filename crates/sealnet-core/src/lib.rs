//! SealNet Core Library
//!
//! This crate provides the trust primitives of the SealNet storage network:
//! key pairs, identities, shareable capabilities and their canonical encoding.
//!
//! # Modules
//!
//! - [`types`]: Shared identifiers (RoutingKey, Bytes32)
//! - [`crypto`]: Signing, boxing and symmetric key primitives
//! - [`identity`]: Public and full identities, credential serialization
//! - [`canonical`]: Deterministic list/string encoding for capabilities
//! - [`capability`]: The `EntryPoint` capability and resource locators
//! - [`limits`]: Size ceilings applied to untrusted input
//! - [`error`]: Error types

pub mod canonical;
pub mod capability;
pub mod crypto;
pub mod error;
pub mod identity;
mod layout;
pub mod limits;
pub mod types;

#[cfg(test)]
mod test_vectors;

pub use capability::{EntryPoint, FilePointer, ResourceLocator};
pub use crypto::{
    Argon2Deriver, BoxingKeyPair, KeyDeriver, PublicBoxingKey, PublicSigningKey,
    SecretBoxingKey, SecretSigningKey, SigningKeyPair, SymmetricKey,
};
pub use error::{Error, Result};
pub use identity::{Credentials, Identity, PublicIdentity};
pub use limits::CapabilityLimits;
pub use types::*;
