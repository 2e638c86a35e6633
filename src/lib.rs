//! ECC Signer
//!
//! Protocol-level signing and verification on top of the secp256k1 curve
//! library. The curve math itself (field/point arithmetic, raw sign/verify)
//! lives in the `secp256k1` crate; this crate layers the wire formats,
//! compatibility quirks, and safety requirements above it.
//!
//! # Architecture
//!
//! This crate provides:
//! - **context**: Caller-owned handle to the secp256k1 context
//! - **keygen**: Rejection-sampling secret-key generation and public-key
//!   derivation (compressed, uncompressed, x-only)
//! - **der**: Strict and lax DER signature codecs plus low-S normalization
//! - **ecdsa**: Deterministic-nonce signing with low-R grinding, lenient
//!   verification, recoverable signatures
//! - **schnorr**: BIP-340 signing over x-only keys with Taproot tweaking
//! - **taproot**: Tweak-hash strategy, output-key derivation with parity,
//!   tweak-check verification
//!
//! # Security
//!
//! Working copies of secret key material are zeroized on every exit path,
//! using `zeroize` for raw buffers and the curve library's own erase for its
//! key types. Freshly produced signatures are re-verified before being
//! returned; a failure there indicates a corrupted curve library and panics
//! rather than handing out an unverified signature.
//!
//! # Concurrency
//!
//! Every operation is a synchronous, stateless function over its explicit
//! inputs. A single [`SigningContext`] can be shared across threads; the
//! injected [`RandomSource`] and [`TweakHasher`] implementations must be
//! thread-safe themselves if shared.
//!
//! # Example
//!
//! ```rust,ignore
//! use ecc_signer::{EcdsaSigner, EcdsaVerifier, OsRandomSource, SigningContext};
//!
//! let ctx = SigningContext::new();
//! let key = ecc_signer::generate_secret_key(&mut OsRandomSource)?;
//! let public_key = ecc_signer::derive_public_key(&ctx, &key[..], true)?;
//!
//! let msg = [0u8; 32];
//! let sig = EcdsaSigner::new(&ctx).sign(&msg, &key[..], true)?;
//! assert!(EcdsaVerifier::new(&ctx).verify(sig.as_bytes(), &msg, public_key.as_bytes()));
//! ```

pub mod context;
pub mod der;
pub mod ecdsa;
pub mod keygen;
pub mod schnorr;
pub mod taproot;

// Re-export key types for convenience
pub use context::SigningContext;
pub use der::{
    decode_der_lax, decode_der_strict, encode_der, is_low_s, normalize, CompactSig, DerError,
    DerSignature, MAX_DER_LEN,
};
pub use ecdsa::{EcdsaError, EcdsaSigner, EcdsaVerifier};
pub use keygen::{
    derive_public_key, derive_x_only_key, generate_secret_key, KeyError, OsRandomSource,
    PublicKey, RandomSource,
};
pub use schnorr::{SchnorrError, SchnorrSig, SchnorrSigner, XOnlyPubKey};
pub use taproot::{
    tagged_hash, TapMerkleRoot, TapTweakHasher, TaprootError, TaprootTweaker, TweakHasher,
};

// The curve primitive library, re-exported for callers that need its types
// (SecretKey, Parity, ...) directly.
pub use secp256k1;
pub use secp256k1::{Parity, SecretKey};
