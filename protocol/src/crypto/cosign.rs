//! # Two-Party Schnorr Co-Signing
//!
//! Sender and receiver jointly produce one Schnorr signature over the
//! transaction kernel without either side learning the other's private
//! key (its blinding excess). The scheme is the standard two-round
//! aggregate:
//!
//! ```text
//! 1. Each party samples a nonce k_i, publishes K_i = k_i * G.
//! 2. K = K_s + K_r,  X = X_s + X_r        (public nonce / key sums)
//! 3. e = H(domain ‖ K ‖ X ‖ m)            (shared challenge)
//! 4. s_i = k_i + e * x_i                  (partial signatures)
//! 5. check: s_i * G == K_i + e * X_i      (partial verification)
//! 6. s = s_s + s_r, signature is (K, s)   (combination)
//! ```
//!
//! The final pair verifies as an ordinary Schnorr signature under the
//! combined key `X`, which for a balanced transaction is exactly the
//! kernel excess. Nobody ever holds the combined private key.
//!
//! ## Determinism
//!
//! Both parties MUST derive the same challenge bytes: compressed points,
//! fixed order, fixed domain tag. A single byte of drift and partial
//! verification fails on one side only — which looks exactly like a
//! malicious peer. Do not get creative with the serialization here.
//!
//! ## Nonce discipline
//!
//! A nonce is used for exactly one signature. Reusing `k` across two
//! challenges leaks the private excess through simple algebra
//! (`x = (s1 - s2) / (e1 - e2)`), so a failed negotiation is never
//! retried with the same nonce — the state machines abort instead.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::commitment::derive_public;

/// Domain separator for kernel challenges. Versioned so a future scheme
/// change cannot be replayed against old kernels.
const CHALLENGE_DOMAIN: &[u8] = b"umbra_cosign_challenge_v1";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the co-signing flow.
///
/// Intentionally coarse — we don't tell a counterparty which part of its
/// signature was wrong.
#[derive(Debug, Error)]
pub enum CosignError {
    /// A partial signature did not satisfy `s*G == K + e*X`. Always fatal
    /// to the negotiation; never retried.
    #[error("partial signature failed verification")]
    InvalidPartialSignature,

    /// A compressed point received from the peer does not decode to a
    /// valid group element.
    #[error("malformed curve point")]
    MalformedPoint,
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A completed Schnorr signature `(K, s)` as embedded in the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Combined public nonce `K = K_s + K_r`.
    pub nonce: CompressedRistretto,
    /// Combined scalar `s = s_s + s_r`.
    pub s: Scalar,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Sample a fresh signing nonce.
///
/// One per negotiation per party, never derived from the excess, never
/// reused. The RNG is injected; production callers pass `OsRng`.
pub fn generate_nonce<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    Scalar::random(rng)
}

/// Compute the shared challenge `e = H(domain ‖ K ‖ X ‖ m)`.
///
/// `public_nonce_sum` and `public_excess_sum` are the combined values of
/// both parties; `message` is the kernel's message hash, fixed before
/// either party signs.
pub fn challenge(
    public_nonce_sum: &RistrettoPoint,
    public_excess_sum: &RistrettoPoint,
    message: &[u8; 32],
) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(CHALLENGE_DOMAIN);
    hasher.update(public_nonce_sum.compress().as_bytes());
    hasher.update(public_excess_sum.compress().as_bytes());
    hasher.update(message);
    Scalar::from_bytes_mod_order(hasher.finalize().into())
}

/// Compute one party's partial signature `s_i = k_i + e * x_i`.
pub fn partial_sign(nonce: &Scalar, excess: &Scalar, challenge: &Scalar) -> Scalar {
    nonce + challenge * excess
}

/// Verify a partial signature against the signer's published points:
/// `s_i * G == K_i + e * X_i`.
///
/// Either party can run this on the other's contribution without any
/// secret material. A `false` here means the peer is lying about its
/// nonce, its excess, or its signature — the distinction doesn't matter,
/// the negotiation is over.
pub fn verify_partial(
    partial: &Scalar,
    public_nonce: &RistrettoPoint,
    public_excess: &RistrettoPoint,
    challenge: &Scalar,
) -> bool {
    derive_public(partial) == public_nonce + challenge * public_excess
}

/// Combine two verified partial signatures into the final signature.
///
/// Callers must have run [`verify_partial`] on the peer's half first;
/// combination itself cannot detect a bad input.
pub fn combine(s_a: &Scalar, s_b: &Scalar, public_nonce_sum: &RistrettoPoint) -> Signature {
    Signature {
        nonce: public_nonce_sum.compress(),
        s: s_a + s_b,
    }
}

/// Verify a completed signature under the combined public excess:
/// `s * G == K + e * X`.
///
/// This is what the ledger runs against the kernel.
pub fn verify_combined(
    signature: &Signature,
    public_excess_sum: &RistrettoPoint,
    message: &[u8; 32],
) -> bool {
    let Some(nonce_sum) = signature.nonce.decompress() else {
        return false;
    };
    let e = challenge(&nonce_sum, public_excess_sum, message);
    derive_public(&signature.s) == nonce_sum + e * public_excess_sum
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
