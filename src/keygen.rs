//! Key Generation
//!
//! Secret keys are produced by rejection sampling: draw 32 bytes from the
//! injected random source and retry until the curve library accepts them as a
//! valid scalar. A draw is rejected with probability ~2^-128, so the loop
//! terminates after one iteration in practice.
//!
//! SECURITY: Rejected candidate bytes are zeroized before the next draw.

use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::{Keypair, Parity, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::context::SigningContext;
use crate::schnorr::XOnlyPubKey;

/// Secret keys and x-only keys are exactly 32 bytes.
pub const SECRET_KEY_LEN: usize = 32;
/// Compressed public key length.
pub const PUBKEY_COMPRESSED_LEN: usize = 33;
/// Uncompressed public key length.
pub const PUBKEY_UNCOMPRESSED_LEN: usize = 65;

// MARK: - Key Errors

#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyError {
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

// MARK: - Random Source

/// Source of cryptographically secure random bytes.
///
/// The core cannot verify the quality of the bytes and trusts the caller.
/// Implementations must be thread-safe if the engines are shared across
/// threads.
pub trait RandomSource {
    /// Fill `buf` entirely with random bytes.
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), KeyError>;
}

/// Random source backed by the operating system (`OsRng`).
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), KeyError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| KeyError::EntropyUnavailable(e.to_string()))
    }
}

// MARK: - Public Key

/// Serialized EC point: 33 bytes compressed or 65 bytes uncompressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Parse from serialized bytes, validating the point.
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let key = secp256k1::PublicKey::from_slice(slice)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        let compressed = slice.len() == PUBKEY_COMPRESSED_LEN;
        Ok(Self::from_secp256k1(&key, compressed))
    }

    /// Serialize a curve library public key.
    pub fn from_secp256k1(key: &secp256k1::PublicKey, compressed: bool) -> Self {
        if compressed {
            Self(key.serialize().to_vec())
        } else {
            Self(key.serialize_uncompressed().to_vec())
        }
    }

    /// Get the raw serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether this is the 33-byte compressed form.
    pub fn is_compressed(&self) -> bool {
        self.0.len() == PUBKEY_COMPRESSED_LEN
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Convert to the curve library type.
    pub fn to_secp256k1(&self) -> Result<secp256k1::PublicKey, KeyError> {
        secp256k1::PublicKey::from_slice(&self.0)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
    }
}

// MARK: - Key Generation

/// Generate a secret key by rejection sampling.
///
/// Draws 32 bytes from `source` until the curve library accepts them as a
/// nonzero scalar below the curve order. The loop is unbounded but terminates
/// in O(1) expected iterations; it fails only if the random source itself
/// fails.
pub fn generate_secret_key(source: &mut dyn RandomSource) -> Result<SecretKey, KeyError> {
    let mut candidate = Zeroizing::new([0u8; SECRET_KEY_LEN]);
    loop {
        source.fill(candidate.as_mut())?;
        if let Ok(key) = SecretKey::from_slice(candidate.as_ref()) {
            return Ok(key);
        }
        // Rejected draw is overwritten on the next iteration and the buffer
        // is zeroized on drop.
    }
}

/// Derive the public key for a secret key.
///
/// Deterministic. Fails with `InvalidSecretKey` for externally supplied keys
/// that are not valid scalars.
pub fn derive_public_key(
    ctx: &SigningContext,
    secret_key: &[u8],
    compressed: bool,
) -> Result<PublicKey, KeyError> {
    let mut secret_key = SecretKey::from_slice(secret_key)
        .map_err(|e| KeyError::InvalidSecretKey(e.to_string()))?;
    let public_key = secp256k1::PublicKey::from_secret_key(ctx.secp(), &secret_key);
    secret_key.non_secure_erase();
    Ok(PublicKey::from_secp256k1(&public_key, compressed))
}

/// Derive the x-only public key and its parity.
///
/// Used as the internal key for Taproot; callers needing only the
/// x-coordinate discard the parity.
pub fn derive_x_only_key(
    ctx: &SigningContext,
    secret_key: &[u8],
) -> Result<(XOnlyPubKey, Parity), KeyError> {
    let mut secret_key = SecretKey::from_slice(secret_key)
        .map_err(|e| KeyError::InvalidSecretKey(e.to_string()))?;
    let mut keypair = Keypair::from_secret_key(ctx.secp(), &secret_key);
    secret_key.non_secure_erase();
    let (x_only, parity) = keypair.x_only_public_key();
    keypair.non_secure_erase();
    Ok((XOnlyPubKey::from(x_only), parity))
}

// MARK: - Tests
