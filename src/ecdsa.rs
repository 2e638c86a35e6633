//! ECDSA Signing and Verification
//!
//! Signing uses RFC 6979 deterministic nonces with an optional low-R
//! grinding loop: when the compact signature's first byte has its high bit
//! set, the DER form needs a sign-padding byte for R and the encoding grows
//! by one byte. The grinder re-signs with a counter mixed into the nonce's
//! extra entropy until the high bit is clear, bounding the DER output to 71
//! bytes.
//!
//! Every signature is re-verified against the signer's own public key before
//! being returned. A failure there means the curve library or memory is
//! corrupted and panics rather than handing out an unverified signature.
//!
//! Verification decodes with the lax parser, normalizes to low-S, and
//! reports malformed input as `false`, never as an error.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SecretKey};

use crate::context::SigningContext;
use crate::der::{self, DerSignature};
use crate::keygen::PublicKey;

// MARK: - ECDSA Errors

#[derive(Debug, Clone, thiserror::Error)]
pub enum EcdsaError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("recovery failed: {0}")]
    RecoveryFailed(String),
}

// MARK: - Signing Engine

/// Deterministic-nonce ECDSA signer.
pub struct EcdsaSigner<'a> {
    ctx: &'a SigningContext,
}

impl<'a> EcdsaSigner<'a> {
    pub fn new(ctx: &'a SigningContext) -> Self {
        Self { ctx }
    }

    /// Sign a 32-byte message hash, optionally grinding for low R.
    ///
    /// With `grind` set, the returned DER signature is at most 71 bytes and
    /// its compact R's first byte is below 0x80. The grinding loop has no
    /// fixed cap; each attempt succeeds with probability 1/2, so it
    /// terminates after a couple of iterations in practice.
    ///
    /// # Panics
    ///
    /// Panics if the freshly produced signature fails verification against
    /// its own public key. That indicates a corrupted curve library or
    /// memory, and no signature is returned in that state.
    pub fn sign(
        &self,
        msg32: &[u8; 32],
        secret_key: &[u8],
        grind: bool,
    ) -> Result<DerSignature, EcdsaError> {
        let secp = self.ctx.secp();
        let mut secret_key = SecretKey::from_slice(secret_key)
            .map_err(|e| EcdsaError::InvalidSecretKey(e.to_string()))?;
        let msg = Message::from_digest(*msg32);

        let mut extra_entropy = [0u8; 32];
        let mut counter: u32 = 0;
        let mut sig = secp.sign_ecdsa(&msg, &secret_key);
        // Grind for low R
        while grind && !sig_has_low_r(&sig) {
            counter += 1;
            write_le32(&mut extra_entropy, counter);
            sig = secp.sign_ecdsa_with_noncedata(&msg, &secret_key, &extra_entropy);
        }

        let der = DerSignature::from_bytes(sig.serialize_der().to_vec());

        // Additional verification step to prevent using a potentially
        // corrupted signature.
        let public_key = secp256k1::PublicKey::from_secret_key(secp, &secret_key);
        secret_key.non_secure_erase();
        assert!(
            secp.verify_ecdsa(&msg, &sig, &public_key).is_ok(),
            "freshly produced ECDSA signature failed its own verification"
        );

        Ok(der)
    }

    /// Sign a 32-byte message hash, returning the compact signature and its
    /// recovery id.
    pub fn sign_recoverable(
        &self,
        msg32: &[u8; 32],
        secret_key: &[u8],
    ) -> Result<([u8; 64], u8), EcdsaError> {
        let secp = self.ctx.secp();
        let mut secret_key = SecretKey::from_slice(secret_key)
            .map_err(|e| EcdsaError::InvalidSecretKey(e.to_string()))?;
        let msg = Message::from_digest(*msg32);

        let sig = secp.sign_ecdsa_recoverable(&msg, &secret_key);
        secret_key.non_secure_erase();
        let (recovery_id, serialized) = sig.serialize_compact();
        Ok((serialized, recovery_id.to_i32() as u8))
    }

    /// Recover the signing public key from a compact signature.
    pub fn recover(
        &self,
        msg32: &[u8; 32],
        signature64: &[u8],
        recovery_id: u8,
    ) -> Result<PublicKey, EcdsaError> {
        let rec_id = RecoveryId::from_i32(recovery_id as i32)
            .map_err(|e| EcdsaError::InvalidSignature(format!("invalid recovery id: {}", e)))?;
        let sig = RecoverableSignature::from_compact(signature64, rec_id)
            .map_err(|e| EcdsaError::InvalidSignature(e.to_string()))?;
        let msg = Message::from_digest(*msg32);

        let public_key = self
            .ctx
            .secp()
            .recover_ecdsa(&msg, &sig)
            .map_err(|e| EcdsaError::RecoveryFailed(e.to_string()))?;
        Ok(PublicKey::from_secp256k1(&public_key, true))
    }
}

// MARK: - Verification Engine

/// ECDSA verifier tolerant of historically malformed encodings.
pub struct EcdsaVerifier<'a> {
    ctx: &'a SigningContext,
}

impl<'a> EcdsaVerifier<'a> {
    pub fn new(ctx: &'a SigningContext) -> Self {
        Self { ctx }
    }

    /// Verify a DER signature over a 32-byte message hash.
    ///
    /// The signature is decoded leniently and normalized to low-S before the
    /// algebraic check. Any malformed signature or public key makes this
    /// return `false`; adversarial input never raises an error.
    pub fn verify(&self, sig_bytes: &[u8], msg32: &[u8; 32], public_key: &[u8]) -> bool {
        let compact = match der::decode_der_lax(sig_bytes) {
            Ok(compact) => compact,
            Err(_) => return false,
        };
        // Components at or above the curve order cannot be represented;
        // such signatures are invalid by definition.
        let sig = match compact.to_signature() {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        let (sig, _was_high_s) = der::normalize(&sig);

        let public_key = match secp256k1::PublicKey::from_slice(public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let msg = Message::from_digest(*msg32);
        self.ctx.secp().verify_ecdsa(&msg, &sig, &public_key).is_ok()
    }
}

// MARK: - Helpers

/// Check that the sig has a low R value and will be less than 72 bytes in
/// DER form.
///
/// In DER serialization, all values are interpreted as big-endian, signed
/// integers. The highest bit in the integer indicates its signed-ness; 0 is
/// positive, 1 is negative. When the value is interpreted as a negative
/// integer, it must be converted to a positive value by prepending a 0x00
/// byte so that the highest bit is 0. We can avoid this prepending by
/// ensuring that our highest bit is always 0, and thus we must check that
/// the first byte is less than 0x80.
fn sig_has_low_r(sig: &secp256k1::ecdsa::Signature) -> bool {
    sig.serialize_compact()[0] < 0x80
}

fn write_le32(buf: &mut [u8; 32], value: u32) {
    buf[..4].copy_from_slice(&value.to_le_bytes());
}

// MARK: - Tests
