//! Participant identities
//!
//! A [`PublicIdentity`] is what other nodes know about a participant: a
//! public signing key and a public boxing key. An [`Identity`] embeds the
//! public half together with the matching secret keys and is the only type
//! that can sign or open boxes.
//!
//! Credential layout (all key fields `u32`-length-prefixed):
//!
//! ```text
//! [has_private_keys: u8][secret_signing?][secret_boxing?][public_signing][public_boxing]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{
    BoxingKeyPair, KeyDeriver, PublicBoxingKey, PublicSigningKey, SecretBoxingKey,
    SecretSigningKey, SigningKeyPair,
};
use crate::error::{Error, Result};
use crate::layout::{write_field, ByteReader};
use crate::limits::MAX_KEY_SIZE;
use crate::types::{Bytes32, DOMAIN_IDENTITY};

const FLAG_PUBLIC: u8 = 0;
const FLAG_PRIVATE: u8 = 1;

// =============================================================================
// PUBLIC IDENTITY
// =============================================================================

/// Public half of a participant's credentials
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub signing: PublicSigningKey,
    pub boxing: PublicBoxingKey,
}

impl PublicIdentity {
    pub fn new(signing: PublicSigningKey, boxing: PublicBoxingKey) -> Self {
        Self { signing, boxing }
    }

    /// `[len][public_signing][len][public_boxing]`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 64);
        self.write_to(&mut out);
        out
    }

    /// Strict inverse of [`PublicIdentity::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes, Error::MalformedIdentity);
        let public = Self::read_from(&mut reader)?;
        reader.finish()?;
        Ok(public)
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        write_field(out, self.signing.as_bytes());
        write_field(out, self.boxing.as_bytes());
    }

    pub(crate) fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let signing = reader.field("public signing key", MAX_KEY_SIZE)?;
        let boxing = reader.field("public boxing key", MAX_KEY_SIZE)?;
        Ok(Self {
            signing: PublicSigningKey::from_bytes(signing)
                .map_err(|e| Error::MalformedIdentity(e.to_string()))?,
            boxing: PublicBoxingKey::from_bytes(boxing)
                .map_err(|e| Error::MalformedIdentity(e.to_string()))?,
        })
    }

    /// `BLAKE3("identity" || to_bytes())`
    pub fn fingerprint(&self) -> Bytes32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN_IDENTITY);
        hasher.update(&self.to_bytes());
        *hasher.finalize().as_bytes()
    }

    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }

    /// Check a `signature || message` blob and return the message
    pub fn verify(&self, signed: &[u8]) -> Result<Vec<u8>> {
        self.signing.unsign_message(signed)
    }

    /// Box `plaintext` for this identity, sent by `sender`
    pub fn encrypt_for(&self, plaintext: &[u8], sender: &Identity) -> Result<Vec<u8>> {
        self.boxing
            .encrypt_message_for(plaintext, sender.secret_boxing_key())
    }

    /// Serialize with the public-only flag
    pub fn export(&self) -> Vec<u8> {
        let mut out = vec![FLAG_PUBLIC];
        self.write_to(&mut out);
        out
    }
}

impl fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.fingerprint()[..8]))
    }
}

// =============================================================================
// FULL IDENTITY
// =============================================================================

/// A participant's full credentials
#[derive(Clone)]
pub struct Identity {
    public: PublicIdentity,
    secret_signing: SecretSigningKey,
    secret_boxing: SecretBoxingKey,
}

impl Identity {
    /// Assemble from key pairs
    pub fn from_key_pairs(signing: SigningKeyPair, boxing: BoxingKeyPair) -> Self {
        Self {
            public: PublicIdentity::new(signing.public, boxing.public),
            secret_signing: signing.secret,
            secret_boxing: boxing.secret,
        }
    }

    /// Fresh random identity from the OS CSPRNG
    pub fn random() -> Self {
        Self::from_key_pairs(SigningKeyPair::generate(), BoxingKeyPair::generate())
    }

    /// Deterministic identity from username and password
    pub fn derive(username: &str, password: &str, deriver: &dyn KeyDeriver) -> Result<Self> {
        let seeds = deriver.derive_seeds(username, password)?;
        let mut signing_seed = [0u8; 32];
        signing_seed.copy_from_slice(&seeds[..32]);
        let signing = SigningKeyPair::from_secret(SecretSigningKey::from_seed(&signing_seed));
        zeroize::Zeroize::zeroize(&mut signing_seed);
        let boxing = BoxingKeyPair::from_secret(SecretBoxingKey::from_bytes(&seeds[32..])?);
        Ok(Self::from_key_pairs(signing, boxing))
    }

    pub fn public(&self) -> &PublicIdentity {
        &self.public
    }

    pub fn secret_signing_key(&self) -> &SecretSigningKey {
        &self.secret_signing
    }

    pub fn secret_boxing_key(&self) -> &SecretBoxingKey {
        &self.secret_boxing
    }

    /// Produce `signature || message`
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.secret_signing.sign_message(message)
    }

    pub fn verify(&self, signed: &[u8]) -> Result<Vec<u8>> {
        self.public.verify(signed)
    }

    /// Box `plaintext` for `recipient`
    pub fn encrypt_for(&self, plaintext: &[u8], recipient: &PublicBoxingKey) -> Result<Vec<u8>> {
        recipient.encrypt_message_for(plaintext, &self.secret_boxing)
    }

    /// Open a box sent by the holder of `sender`
    pub fn decrypt_from(&self, boxed: &[u8], sender: &PublicBoxingKey) -> Result<Vec<u8>> {
        self.secret_boxing.decrypt_message(boxed, sender)
    }

    /// Export credentials including secret keys
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![FLAG_PRIVATE];
        write_field(&mut out, &self.secret_signing.to_keypair_bytes()[..]);
        write_field(&mut out, &self.secret_boxing.to_bytes()[..]);
        self.public.write_to(&mut out);
        out
    }
}

impl AsRef<PublicIdentity> for Identity {
    fn as_ref(&self) -> &PublicIdentity {
        &self.public
    }
}

/// Identities are equal when their public halves are. Secret halves are
/// never compared; construction guarantees they match the public keys.
impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public
    }
}

impl Eq for Identity {}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("fingerprint", &self.public.to_string())
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// SERIALIZED CREDENTIALS
// =============================================================================

/// Result of decoding exported credentials
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Full(Identity),
    Public(PublicIdentity),
}

impl Credentials {
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Credentials::Full(identity) => identity.serialize(),
            Credentials::Public(public) => public.export(),
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes, Error::MalformedIdentity);
        let credentials = match reader.u8("private key flag")? {
            FLAG_PRIVATE => {
                let signing = reader.field("secret signing key", MAX_KEY_SIZE)?;
                let boxing = reader.field("secret boxing key", MAX_KEY_SIZE)?;
                let secret_signing = SecretSigningKey::from_keypair_bytes(signing)
                    .map_err(|e| Error::MalformedIdentity(e.to_string()))?;
                let secret_boxing = SecretBoxingKey::from_bytes(boxing)
                    .map_err(|e| Error::MalformedIdentity(e.to_string()))?;
                let public = PublicIdentity::read_from(&mut reader)?;

                if secret_signing.public() != public.signing {
                    return Err(Error::MalformedIdentity(
                        "secret signing key does not match public signing key".into(),
                    ));
                }
                if secret_boxing.public() != public.boxing {
                    return Err(Error::MalformedIdentity(
                        "secret boxing key does not match public boxing key".into(),
                    ));
                }

                Credentials::Full(Identity {
                    public,
                    secret_signing,
                    secret_boxing,
                })
            }
            FLAG_PUBLIC => Credentials::Public(PublicIdentity::read_from(&mut reader)?),
            other => {
                return Err(Error::MalformedIdentity(format!(
                    "unknown private key flag {}",
                    other
                )))
            }
        };
        reader.finish()?;
        Ok(credentials)
    }

    pub fn public(&self) -> &PublicIdentity {
        match self {
            Credentials::Full(identity) => identity.public(),
            Credentials::Public(public) => public,
        }
    }

    pub fn has_private_keys(&self) -> bool {
        matches!(self, Credentials::Full(_))
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            Credentials::Full(identity) => Some(identity),
            Credentials::Public(_) => None,
        }
    }
}
