//! Process-wide signing context.
//!
//! Wraps the secp256k1 context object in a caller-owned handle. Construct one
//! `SigningContext` at startup, pass it by reference into every engine, and
//! drop it at shutdown. The context is immutable once built, so a single
//! instance can be shared freely across threads.

use secp256k1::{All, Secp256k1};

/// Caller-owned handle to the secp256k1 context.
pub struct SigningContext {
    secp: Secp256k1<All>,
}

impl SigningContext {
    /// Create a context capable of both signing and verification.
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Borrow the underlying secp256k1 context.
    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }
}

impl Default for SigningContext {
    fn default() -> Self {
        Self::new()
    }
}
