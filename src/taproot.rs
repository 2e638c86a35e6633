//! Taproot Key Tweaking
//!
//! Tweaks an x-only internal key into an output key committing to an
//! optional script-tree merkle root, tracks the tweaked point's parity, and
//! verifies claimed tweaks without a secret key.
//!
//! The tweak hash itself is a caller-supplied strategy ([`TweakHasher`]);
//! [`TapTweakHasher`] provides the standard BIP-341 tagged hash for callers
//! without their own scheme.

use secp256k1::{Keypair, Parity, Scalar, SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::context::SigningContext;
use crate::schnorr::{SchnorrError, XOnlyPubKey};

// MARK: - Merkle Root

/// Merkle root of the script tree (32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapMerkleRoot(pub [u8; 32]);

impl TapMerkleRoot {
    /// Create from 32 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from slice (must be 32 bytes).
    pub fn from_slice(slice: &[u8]) -> Result<Self, TaprootError> {
        if slice.len() != 32 {
            return Err(TaprootError::InvalidMerkleRoot(format!(
                "Expected 32 bytes, got {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// MARK: - Taproot Errors

#[derive(Debug, Clone, thiserror::Error)]
pub enum TaprootError {
    #[error("invalid point: {0}")]
    InvalidPoint(String),
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
    #[error("invalid merkle root: {0}")]
    InvalidMerkleRoot(String),
    #[error("invalid tweak: {0}")]
    InvalidTweak(String),
    #[error("tweak failed: {0}")]
    TweakFailed(String),
    #[error("schnorr error: {0}")]
    Schnorr(String),
}

impl From<SchnorrError> for TaprootError {
    fn from(e: SchnorrError) -> Self {
        TaprootError::Schnorr(e.to_string())
    }
}

// MARK: - Tweak Hash Strategy

/// Caller-supplied tweak-hash scheme.
///
/// Produces the 32-byte tweak committing `internal_key` to `merkle_root`.
/// The engines treat the output as opaque.
pub trait TweakHasher {
    fn compute(&self, internal_key: &[u8; 32], merkle_root: Option<&TapMerkleRoot>) -> [u8; 32];
}

/// BIP-340 tagged hash computation.
///
/// tagged_hash(tag, msg) = SHA256(SHA256(tag) || SHA256(tag) || msg)
///
/// This provides domain separation between different uses of the hash
/// function.
pub fn tagged_hash(tag: &str, msg: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let tag_hash = {
        let mut hasher = Sha256::new();
        hasher.update(tag.as_bytes());
        hasher.finalize()
    };

    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(msg);

    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// The BIP-341 "TapTweak" tag.
pub const TAP_TWEAK_TAG: &str = "TapTweak";

/// Standard BIP-341 tweak hash.
///
/// tweak = tagged_hash("TapTweak", internal_key || merkle_root), with the
/// merkle root omitted entirely for key-path-only commitments.
pub struct TapTweakHasher;

impl TweakHasher for TapTweakHasher {
    fn compute(&self, internal_key: &[u8; 32], merkle_root: Option<&TapMerkleRoot>) -> [u8; 32] {
        match merkle_root {
            Some(root) => {
                let mut data = [0u8; 64];
                data[..32].copy_from_slice(internal_key);
                data[32..].copy_from_slice(root.as_bytes());
                tagged_hash(TAP_TWEAK_TAG, &data)
            }
            None => tagged_hash(TAP_TWEAK_TAG, internal_key),
        }
    }
}

// MARK: - Taproot Tweaker

/// Taproot key tweaker.
pub struct TaprootTweaker<'a> {
    ctx: &'a SigningContext,
}

impl<'a> TaprootTweaker<'a> {
    pub fn new(ctx: &'a SigningContext) -> Self {
        Self { ctx }
    }

    /// Tweak an internal public key into the output key and its parity.
    ///
    /// output = internal + tweak * G
    ///
    /// Fails with `InvalidPoint` if the internal key is not a valid
    /// x-coordinate or the tweaked sum is not a valid point (tweak to
    /// infinity).
    pub fn output_key(
        &self,
        internal_key: &XOnlyPubKey,
        merkle_root: Option<&TapMerkleRoot>,
        hasher: &dyn TweakHasher,
    ) -> Result<(XOnlyPubKey, Parity), TaprootError> {
        let base = XOnlyPublicKey::from_slice(internal_key.as_bytes())
            .map_err(|e| TaprootError::InvalidPoint(e.to_string()))?;
        let tweak = hasher.compute(internal_key.as_bytes(), merkle_root);
        let scalar =
            Scalar::from_be_bytes(tweak).map_err(|e| TaprootError::InvalidTweak(e.to_string()))?;
        let (output, parity) = base
            .add_tweak(self.ctx.secp(), &scalar)
            .map_err(|e| TaprootError::InvalidPoint(e.to_string()))?;
        Ok((XOnlyPubKey::from(output), parity))
    }

    /// Check that tweaking `internal_key` with the stated parity reproduces
    /// `output_key`.
    ///
    /// Validates a Taproot output against its claimed script commitment
    /// without any secret key. Malformed keys report `false`, never an
    /// error.
    pub fn check_tap_tweak(
        &self,
        internal_key: &XOnlyPubKey,
        output_key: &XOnlyPubKey,
        merkle_root: Option<&TapMerkleRoot>,
        parity: Parity,
        hasher: &dyn TweakHasher,
    ) -> bool {
        let base = match XOnlyPublicKey::from_slice(internal_key.as_bytes()) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let output = match XOnlyPublicKey::from_slice(output_key.as_bytes()) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let tweak = hasher.compute(internal_key.as_bytes(), merkle_root);
        let scalar = match Scalar::from_be_bytes(tweak) {
            Ok(scalar) => scalar,
            Err(_) => return false,
        };
        base.tweak_add_check(self.ctx.secp(), &output, parity, scalar)
    }

    /// Derive the tweaked secret scalar for later signing.
    ///
    /// Same tweak sequence as the signing path, but exposes the tweaked key
    /// itself, for wallets that sign with it outside this call. All
    /// intermediate keypair material is wiped before returning.
    pub fn tweaked_secret_key(
        &self,
        secret_key: &[u8],
        merkle_root: Option<&TapMerkleRoot>,
        hasher: &dyn TweakHasher,
    ) -> Result<SecretKey, TaprootError> {
        let secp = self.ctx.secp();
        let mut secret_key = SecretKey::from_slice(secret_key)
            .map_err(|e| TaprootError::InvalidSecretKey(e.to_string()))?;
        let mut keypair = Keypair::from_secret_key(secp, &secret_key);
        secret_key.non_secure_erase();

        let (internal, _parity) = keypair.x_only_public_key();
        let tweak = hasher.compute(&internal.serialize(), merkle_root);
        let scalar = match Scalar::from_be_bytes(tweak) {
            Ok(scalar) => scalar,
            Err(e) => {
                keypair.non_secure_erase();
                return Err(TaprootError::InvalidTweak(e.to_string()));
            }
        };
        let mut tweaked = match keypair.add_xonly_tweak(secp, &scalar) {
            Ok(tweaked) => tweaked,
            Err(e) => {
                keypair.non_secure_erase();
                return Err(TaprootError::TweakFailed(e.to_string()));
            }
        };
        keypair.non_secure_erase();

        let result = tweaked.secret_key();
        tweaked.non_secure_erase();
        Ok(result)
    }
}

// MARK: - Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen;
    use crate::schnorr::SchnorrSigner;

    fn fixtures() -> (SigningContext, [u8; 32], TapMerkleRoot) {
        let ctx = SigningContext::new();
        let secret = [0x44u8; 32];
        let root = TapMerkleRoot::from_bytes([0x88u8; 32]);
        (ctx, secret, root)
    }

    #[test]
    fn test_tagged_hash_shape() {
        let hash = tagged_hash(TAP_TWEAK_TAG, &[0u8; 32]);
        assert_eq!(hash.len(), 32);
        // Different tags must produce different hashes for the same input.
        assert_ne!(hash, tagged_hash("TapLeaf", &[0u8; 32]));
    }

    #[test]
    fn test_tweak_hash_depends_on_merkle_root() {
        let key = [0x01u8; 32];
        let hasher = TapTweakHasher;
        let bare = hasher.compute(&key, None);
        let committed = hasher.compute(&key, Some(&TapMerkleRoot::from_bytes([0u8; 32])));
        // An all-zero merkle root is a commitment, not an absence.
        assert_ne!(bare, committed);
    }

    #[test]
    fn test_output_key_roundtrip() {
        let (ctx, secret, root) = fixtures();
        let tweaker = TaprootTweaker::new(&ctx);
        let hasher = TapTweakHasher;
        let (internal, _) = keygen::derive_x_only_key(&ctx, &secret).unwrap();

        for merkle_root in [None, Some(&root)] {
            let (output, parity) = tweaker.output_key(&internal, merkle_root, &hasher).unwrap();
            assert!(tweaker.check_tap_tweak(&internal, &output, merkle_root, parity, &hasher));
        }
    }

    #[test]
    fn test_check_rejects_wrong_parity() {
        let (ctx, secret, root) = fixtures();
        let tweaker = TaprootTweaker::new(&ctx);
        let hasher = TapTweakHasher;
        let (internal, _) = keygen::derive_x_only_key(&ctx, &secret).unwrap();

        let (output, parity) = tweaker.output_key(&internal, Some(&root), &hasher).unwrap();
        let flipped = match parity {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        };
        assert!(!tweaker.check_tap_tweak(&internal, &output, Some(&root), flipped, &hasher));
    }

    #[test]
    fn test_check_rejects_wrong_root() {
        let (ctx, secret, root) = fixtures();
        let tweaker = TaprootTweaker::new(&ctx);
        let hasher = TapTweakHasher;
        let (internal, _) = keygen::derive_x_only_key(&ctx, &secret).unwrap();

        let (output, parity) = tweaker.output_key(&internal, Some(&root), &hasher).unwrap();
        let other = TapMerkleRoot::from_bytes([0x99u8; 32]);
        assert!(!tweaker.check_tap_tweak(&internal, &output, Some(&other), parity, &hasher));
    }

    #[test]
    fn test_output_key_rejects_invalid_point() {
        let (ctx, _, root) = fixtures();
        let tweaker = TaprootTweaker::new(&ctx);
        // 2^256 - 1 is not a valid x-coordinate.
        let bad = XOnlyPubKey::from_bytes([0xFF; 32]);
        assert!(matches!(
            tweaker.output_key(&bad, Some(&root), &TapTweakHasher),
            Err(TaprootError::InvalidPoint(_))
        ));
    }

    #[test]
    fn test_tweaked_secret_key_matches_output_key() {
        let (ctx, secret, root) = fixtures();
        let tweaker = TaprootTweaker::new(&ctx);
        let signer = SchnorrSigner::new(&ctx);
        let hasher = TapTweakHasher;
        let (internal, _) = keygen::derive_x_only_key(&ctx, &secret).unwrap();

        for merkle_root in [None, Some(&root)] {
            let tweaked = tweaker
                .tweaked_secret_key(&secret, merkle_root, &hasher)
                .unwrap();
            let (output, _parity) = tweaker.output_key(&internal, merkle_root, &hasher).unwrap();
            // The tweaked scalar's x-only public key is the output key.
            let derived = signer.internal_key(&tweaked.secret_bytes()).unwrap();
            assert_eq!(derived, output);
        }
    }

    #[test]
    fn test_tweaked_secret_key_signs_for_output_key() {
        let (ctx, secret, root) = fixtures();
        let tweaker = TaprootTweaker::new(&ctx);
        let signer = SchnorrSigner::new(&ctx);
        let hasher = TapTweakHasher;

        let msg = [0xEEu8; 32];
        let aux = [0x12u8; 32];

        // Signing later with the exported tweaked key (skipping the tweak)
        // must be equivalent to the in-call tweaked signing path.
        let tweaked = tweaker.tweaked_secret_key(&secret, Some(&root), &hasher).unwrap();
        let sig = signer
            .sign(&msg, &tweaked.secret_bytes(), None, true, &aux, &hasher)
            .unwrap();

        let (internal, _) = keygen::derive_x_only_key(&ctx, &secret).unwrap();
        let (output, _parity) = tweaker.output_key(&internal, Some(&root), &hasher).unwrap();
        assert!(signer.verify(&msg, &sig, &output));
    }

    #[test]
    fn test_merkle_root_from_slice() {
        assert!(TapMerkleRoot::from_slice(&[0u8; 32]).is_ok());
        assert!(matches!(
            TapMerkleRoot::from_slice(&[0u8; 31]),
            Err(TaprootError::InvalidMerkleRoot(_))
        ));
    }
}
