//! BIP-340 Schnorr Signatures
//!
//! Signing over x-only keys with optional Taproot tweaking. The tweak hash
//! is supplied by the caller through the [`TweakHasher`](crate::taproot::TweakHasher)
//! strategy; applying it mutates the in-memory keypair's effective secret
//! scalar, never the caller's original key.
//!
//! SECURITY: The keypair built for a signing call is wiped on every exit
//! path, success or failure. A freshly produced signature is re-verified
//! before it is returned; a failure there panics rather than handing out a
//! potentially corrupted signature.

use secp256k1::schnorr::Signature as SchnorrSignature;
use secp256k1::{Keypair, Message, Scalar, SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::context::SigningContext;
use crate::taproot::{TapMerkleRoot, TweakHasher};

// MARK: - Schnorr Key Types

/// X-only public key (32 bytes).
///
/// The y-coordinate is implicitly even.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XOnlyPubKey(pub [u8; 32]);

impl XOnlyPubKey {
    /// Create from 32 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from slice (must be 32 bytes).
    pub fn from_slice(slice: &[u8]) -> Result<Self, SchnorrError> {
        if slice.len() != 32 {
            return Err(SchnorrError::InvalidPublicKey(format!(
                "Expected 32 bytes, got {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, SchnorrError> {
        let bytes = hex::decode(s).map_err(|e| SchnorrError::InvalidPublicKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Convert to the curve library type, validating the x-coordinate.
    pub fn to_secp256k1(&self) -> Result<XOnlyPublicKey, SchnorrError> {
        XOnlyPublicKey::from_slice(&self.0)
            .map_err(|e| SchnorrError::InvalidPublicKey(e.to_string()))
    }
}

impl From<XOnlyPublicKey> for XOnlyPubKey {
    fn from(key: XOnlyPublicKey) -> Self {
        Self(key.serialize())
    }
}

/// Schnorr signature (64 bytes: 32-byte nonce-point x-coordinate plus
/// 32-byte scalar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchnorrSig(pub [u8; 64]);

impl Serialize for SchnorrSig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SchnorrSig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map(SchnorrSig)
            .map_err(|_| serde::de::Error::custom("expected 64 bytes"))
    }
}

impl SchnorrSig {
    /// Create from 64 bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Create from slice (must be 64 bytes).
    pub fn from_slice(slice: &[u8]) -> Result<Self, SchnorrError> {
        if slice.len() != 64 {
            return Err(SchnorrError::InvalidSignature(format!(
                "Expected 64 bytes, got {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Convert to the curve library type.
    pub fn to_secp256k1(&self) -> Result<SchnorrSignature, SchnorrError> {
        SchnorrSignature::from_slice(&self.0)
            .map_err(|e| SchnorrError::InvalidSignature(e.to_string()))
    }
}

impl From<SchnorrSignature> for SchnorrSig {
    fn from(sig: SchnorrSignature) -> Self {
        Self(*sig.as_ref())
    }
}

// MARK: - Schnorr Errors

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchnorrError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("invalid tweak: {0}")]
    InvalidTweak(String),
    #[error("tweak failed: {0}")]
    TweakFailed(String),
}

// MARK: - Schnorr Signer

/// BIP-340 Schnorr signer with Taproot tweaking.
pub struct SchnorrSigner<'a> {
    ctx: &'a SigningContext,
}

impl<'a> SchnorrSigner<'a> {
    pub fn new(ctx: &'a SigningContext) -> Self {
        Self { ctx }
    }

    /// Derive the x-only internal key for a secret key.
    pub fn internal_key(&self, secret_key: &[u8]) -> Result<XOnlyPubKey, SchnorrError> {
        let mut secret_key = SecretKey::from_slice(secret_key)
            .map_err(|e| SchnorrError::InvalidPrivateKey(e.to_string()))?;
        let mut keypair = Keypair::from_secret_key(self.ctx.secp(), &secret_key);
        secret_key.non_secure_erase();
        let (x_only, _parity) = keypair.x_only_public_key();
        keypair.non_secure_erase();
        Ok(XOnlyPubKey::from(x_only))
    }

    /// Sign a 32-byte message hash.
    ///
    /// Unless `skip_tweak` is set, the keypair is first tweaked with the
    /// hash of its x-only internal key and `merkle_root`, as computed by
    /// `hasher`. `aux_rand` feeds the BIP-340 nonce as auxiliary randomness.
    ///
    /// # Panics
    ///
    /// Panics if the freshly produced signature fails verification against
    /// the (possibly tweaked) keypair's own x-only key; see the module docs.
    pub fn sign(
        &self,
        msg32: &[u8; 32],
        secret_key: &[u8],
        merkle_root: Option<&TapMerkleRoot>,
        skip_tweak: bool,
        aux_rand: &[u8; 32],
        hasher: &dyn TweakHasher,
    ) -> Result<SchnorrSig, SchnorrError> {
        let mut secret_key = SecretKey::from_slice(secret_key)
            .map_err(|e| SchnorrError::InvalidPrivateKey(e.to_string()))?;
        let mut keypair = Keypair::from_secret_key(self.ctx.secp(), &secret_key);
        secret_key.non_secure_erase();

        let result = self.sign_with_keypair(&mut keypair, msg32, merkle_root, skip_tweak, aux_rand, hasher);
        keypair.non_secure_erase();
        result
    }

    fn sign_with_keypair(
        &self,
        keypair: &mut Keypair,
        msg32: &[u8; 32],
        merkle_root: Option<&TapMerkleRoot>,
        skip_tweak: bool,
        aux_rand: &[u8; 32],
        hasher: &dyn TweakHasher,
    ) -> Result<SchnorrSig, SchnorrError> {
        let secp = self.ctx.secp();

        if !skip_tweak {
            let (internal, _parity) = keypair.x_only_public_key();
            let tweak = hasher.compute(&internal.serialize(), merkle_root);
            let scalar = Scalar::from_be_bytes(tweak)
                .map_err(|e| SchnorrError::InvalidTweak(e.to_string()))?;
            let tweaked = keypair
                .add_xonly_tweak(secp, &scalar)
                .map_err(|e| SchnorrError::TweakFailed(e.to_string()))?;
            keypair.non_secure_erase();
            *keypair = tweaked;
        }

        let msg = Message::from_digest(*msg32);
        let sig = secp.sign_schnorr_with_aux_rand(&msg, keypair, aux_rand);

        // Additional verification step to prevent using a potentially
        // corrupted signature.
        let (public_key, _parity) = keypair.x_only_public_key();
        assert!(
            secp.verify_schnorr(&sig, &msg, &public_key).is_ok(),
            "freshly produced Schnorr signature failed its own verification"
        );

        Ok(SchnorrSig::from(sig))
    }

    /// Verify a BIP-340 Schnorr signature.
    ///
    /// Key or signature parse failures report `false`, never an error.
    pub fn verify(&self, msg32: &[u8; 32], signature: &SchnorrSig, public_key: &XOnlyPubKey) -> bool {
        let sig = match signature.to_secp256k1() {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        let key = match public_key.to_secp256k1() {
            Ok(key) => key,
            Err(_) => return false,
        };
        let msg = Message::from_digest(*msg32);
        self.ctx.secp().verify_schnorr(&sig, &msg, &key).is_ok()
    }

    /// Syntactic validity check for an x-only public key: is the value a
    /// valid x-coordinate on the curve?
    pub fn validate_public_key(&self, key_bytes: &[u8; 32]) -> bool {
        XOnlyPublicKey::from_slice(key_bytes).is_ok()
    }
}

// MARK: - Tests
