//! Key pair primitives for SealNet
//!
//! - Signing: Ed25519, signatures are prepended to the signed message
//! - Boxing: X25519 key agreement, HKDF-SHA256, XChaCha20-Poly1305
//! - Symmetric: XChaCha20-Poly1305 with random 192-bit nonces
//!
//! Secret halves are zeroized on drop and never appear in `Debug` output.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::hash::{Hash, Hasher};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Size of an Ed25519 public key
pub const PUBLIC_SIGNING_KEY_SIZE: usize = 32;
/// Size of an Ed25519 secret key in keypair form (seed || public)
pub const SECRET_SIGNING_KEY_SIZE: usize = 64;
/// Size of an Ed25519 signature
pub const SIGNATURE_SIZE: usize = 64;
/// Size of X25519 public and secret keys
pub const BOXING_KEY_SIZE: usize = 32;
/// Size of a symmetric key (256 bits)
pub const SYMMETRIC_KEY_SIZE: usize = 32;
/// Size of an XChaCha20 nonce (192 bits)
pub const NONCE_SIZE: usize = 24;
/// Size of the Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// HKDF info for public-key boxes
pub const DOMAIN_BOX: &[u8] = b"sealnet-box-v1";
/// Salt prefix for password-based derivation
pub const DOMAIN_SALT: &[u8] = b"sealnet-salt";

// =============================================================================
// SIGNING
// =============================================================================

/// Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicSigningKey(pub [u8; PUBLIC_SIGNING_KEY_SIZE]);

impl PublicSigningKey {
    /// Parse and validate a public key
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PUBLIC_SIGNING_KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "public signing key must be {} bytes, got {}",
                PUBLIC_SIGNING_KEY_SIZE,
                bytes.len()
            ))
        })?;
        VerifyingKey::from_bytes(&arr)
            .map_err(|_| Error::InvalidKey("public signing key is not a curve point".into()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_SIGNING_KEY_SIZE] {
        &self.0
    }

    /// Check `signature || message` and return the message.
    pub fn unsign_message(&self, signed: &[u8]) -> Result<Vec<u8>> {
        if signed.len() < SIGNATURE_SIZE {
            return Err(Error::Integrity);
        }
        let (sig_bytes, message) = signed.split_at(SIGNATURE_SIZE);
        let sig_bytes: [u8; SIGNATURE_SIZE] = sig_bytes.try_into().map_err(|_| Error::Integrity)?;
        let verifying_key = VerifyingKey::from_bytes(&self.0).map_err(|_| Error::Integrity)?;
        verifying_key
            .verify_strict(message, &Signature::from_bytes(&sig_bytes))
            .map_err(|_| Error::Integrity)?;
        Ok(message.to_vec())
    }
}

impl fmt::Debug for PublicSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicSigningKey({})", hex::encode(&self.0[..8]))
    }
}

/// Ed25519 secret key
#[derive(Clone)]
pub struct SecretSigningKey(SigningKey);

impl SecretSigningKey {
    /// Parse from the 64-byte keypair form (seed || public)
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: Zeroizing<[u8; SECRET_SIGNING_KEY_SIZE]> =
            Zeroizing::new(bytes.try_into().map_err(|_| {
                Error::InvalidKey(format!(
                    "secret signing key must be {} bytes, got {}",
                    SECRET_SIGNING_KEY_SIZE,
                    bytes.len()
                ))
            })?);
        let key = SigningKey::from_keypair_bytes(&arr)
            .map_err(|_| Error::InvalidKey("secret signing key does not match its public half".into()))?;
        Ok(Self(key))
    }

    /// Create from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    /// Export in the 64-byte keypair form
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; SECRET_SIGNING_KEY_SIZE]> {
        Zeroizing::new(self.0.to_keypair_bytes())
    }

    /// The matching public key
    pub fn public(&self) -> PublicSigningKey {
        PublicSigningKey(self.0.verifying_key().to_bytes())
    }

    /// Produce `signature || message`
    pub fn sign_message(&self, message: &[u8]) -> Vec<u8> {
        let signature = self.0.sign(message);
        let mut out = Vec::with_capacity(SIGNATURE_SIZE + message.len());
        out.extend_from_slice(&signature.to_bytes());
        out.extend_from_slice(message);
        out
    }
}

impl fmt::Debug for SecretSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretSigningKey([REDACTED])")
    }
}

/// Ed25519 signing key pair
#[derive(Clone, Debug)]
pub struct SigningKeyPair {
    pub secret: SecretSigningKey,
    pub public: PublicSigningKey,
}

impl SigningKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_secret(SecretSigningKey(SigningKey::generate(&mut OsRng)))
    }

    /// Build from an existing secret key
    pub fn from_secret(secret: SecretSigningKey) -> Self {
        let public = secret.public();
        Self { secret, public }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.secret.sign_message(message)
    }

    pub fn verify(&self, signed: &[u8]) -> Result<Vec<u8>> {
        self.public.unsign_message(signed)
    }
}

// =============================================================================
// BOXING
// =============================================================================

/// X25519 public key used as a box recipient or sender
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicBoxingKey(pub [u8; BOXING_KEY_SIZE]);

impl PublicBoxingKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; BOXING_KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "public boxing key must be {} bytes, got {}",
                BOXING_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; BOXING_KEY_SIZE] {
        &self.0
    }

    /// Encrypt `plaintext` from the holder of `sender` to this key.
    ///
    /// Output is `nonce || ciphertext`. A fresh nonce is drawn per call.
    pub fn encrypt_message_for(&self, plaintext: &[u8], sender: &SecretBoxingKey) -> Result<Vec<u8>> {
        let key = box_key(&sender.0, self).map_err(|_| {
            Error::InvalidKey("recipient boxing key yields a non-contributory secret".into())
        })?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|_| Error::Encryption)?;

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| Error::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

impl fmt::Debug for PublicBoxingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicBoxingKey({})", hex::encode(&self.0[..8]))
    }
}

/// X25519 secret key
#[derive(Clone)]
pub struct SecretBoxingKey(StaticSecret);

impl SecretBoxingKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: Zeroizing<[u8; BOXING_KEY_SIZE]> = Zeroizing::new(bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "secret boxing key must be {} bytes, got {}",
                BOXING_KEY_SIZE,
                bytes.len()
            ))
        })?);
        Ok(Self(StaticSecret::from(*arr)))
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; BOXING_KEY_SIZE]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public(&self) -> PublicBoxingKey {
        PublicBoxingKey(*X25519Public::from(&self.0).as_bytes())
    }

    /// Open a `nonce || ciphertext` box sent by the holder of `sender`.
    ///
    /// Every failure collapses to `Error::Decryption`.
    pub fn decrypt_message(&self, boxed: &[u8], sender: &PublicBoxingKey) -> Result<Vec<u8>> {
        if boxed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Decryption);
        }
        let key = box_key(&self.0, sender)?;
        let cipher =
            XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|_| Error::Decryption)?;
        let (nonce, ciphertext) = boxed.split_at(NONCE_SIZE);
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Decryption)
    }
}

impl fmt::Debug for SecretBoxingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBoxingKey([REDACTED])")
    }
}

/// X25519 boxing key pair
#[derive(Clone, Debug)]
pub struct BoxingKeyPair {
    pub secret: SecretBoxingKey,
    pub public: PublicBoxingKey,
}

impl BoxingKeyPair {
    pub fn generate() -> Self {
        Self::from_secret(SecretBoxingKey(StaticSecret::random_from_rng(OsRng)))
    }

    pub fn from_secret(secret: SecretBoxingKey) -> Self {
        let public = secret.public();
        Self { secret, public }
    }

    pub fn encrypt_for(&self, plaintext: &[u8], recipient: &PublicBoxingKey) -> Result<Vec<u8>> {
        recipient.encrypt_message_for(plaintext, &self.secret)
    }

    pub fn decrypt_from(&self, boxed: &[u8], sender: &PublicBoxingKey) -> Result<Vec<u8>> {
        self.secret.decrypt_message(boxed, sender)
    }
}

/// Derive the box key shared by `secret` and `public`.
///
/// `key = HKDF-SHA256(ikm = X25519(secret, public), info = "sealnet-box-v1")`
fn box_key(secret: &StaticSecret, public: &PublicBoxingKey) -> Result<Zeroizing<[u8; 32]>> {
    let shared = secret.diffie_hellman(&X25519Public::from(public.0));
    if !shared.was_contributory() {
        return Err(Error::Decryption);
    }
    let hkdf = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf.expand(DOMAIN_BOX, &mut key[..])
        .map_err(|_| Error::Decryption)?;
    Ok(key)
}

// =============================================================================
// SYMMETRIC
// =============================================================================

/// A 256-bit XChaCha20-Poly1305 key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; SYMMETRIC_KEY_SIZE],
}

impl SymmetricKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; SYMMETRIC_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SYMMETRIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "symmetric key must be {} bytes, got {}",
                SYMMETRIC_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self { bytes: arr })
    }

    /// Avoid logging or persisting the returned bytes.
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.bytes
    }

    /// Fresh random nonce for this key
    pub fn create_nonce(&self) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new_from_slice(&self.bytes).map_err(|_| Error::Encryption)?;
        cipher
            .encrypt(XNonce::from_slice(nonce), plaintext)
            .map_err(|_| Error::Encryption)
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new_from_slice(&self.bytes).map_err(|_| Error::Decryption)?;
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Decryption)
    }

    /// Encrypt under a fresh nonce, returning `nonce || ciphertext`
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.create_nonce();
        let ciphertext = self.encrypt(plaintext, &nonce)?;
        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Inverse of [`SymmetricKey::seal`]
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Decryption);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce: &[u8; NONCE_SIZE] = nonce.try_into().map_err(|_| Error::Decryption)?;
        self.decrypt(ciphertext, nonce)
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for SymmetricKey {}

impl Hash for SymmetricKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

// =============================================================================
// PASSWORD DERIVATION
// =============================================================================

/// Deterministic derivation of key material from credentials.
///
/// Returns 64 bytes: a 32-byte signing seed followed by a 32-byte boxing secret.
/// Implementations must be pure: equal inputs give equal outputs.
pub trait KeyDeriver: Send + Sync {
    fn derive_seeds(&self, username: &str, password: &str) -> Result<Zeroizing<[u8; 64]>>;
}

/// Argon2id-based [`KeyDeriver`]. The salt is bound to the username.
#[derive(Clone, Copy, Debug)]
pub struct Argon2Deriver {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for Argon2Deriver {
    fn default() -> Self {
        Self {
            m_cost_kib: 64 * 1024,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl Argon2Deriver {
    pub fn new(m_cost_kib: u32, t_cost: u32, p_cost: u32) -> Self {
        Self {
            m_cost_kib,
            t_cost,
            p_cost,
        }
    }
}

impl KeyDeriver for Argon2Deriver {
    fn derive_seeds(&self, username: &str, password: &str) -> Result<Zeroizing<[u8; 64]>> {
        use argon2::{Algorithm, Argon2, Params, Version};

        let params = Params::new(self.m_cost_kib, self.t_cost, self.p_cost, Some(64))
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut salt = blake3::Hasher::new();
        salt.update(DOMAIN_SALT);
        salt.update(username.as_bytes());
        let salt = salt.finalize();

        let mut output = Zeroizing::new([0u8; 64]);
        argon2
            .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut output[..])
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(output)
    }
}
