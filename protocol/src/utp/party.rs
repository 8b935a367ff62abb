//! The shared negotiation-role core.
//!
//! Sender and receiver are structurally symmetric: each builds its own
//! blinding contribution, verifies the peer's, and participates in the
//! same joint signature. Everything both roles do identically lives here,
//! so the two state machines cannot drift apart on the cryptography —
//! they differ only in protocol choreography.
//!
//! A role's capability set is exactly three things:
//!
//! 1. **build own contribution** — [`PartySecrets::build`] derives the
//!    blinding excess from the party's own inputs/outputs and samples a
//!    fresh nonce,
//! 2. **verify peer contribution** — [`PartySecrets::verify_peer`] checks
//!    the peer's partial signature under the joint challenge,
//! 3. **finalize** — [`PartySecrets::finalize`] combines both halves into
//!    the kernel signature.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::commitment::{aggregate_excess, derive_public, random_blind};
use crate::crypto::cosign::{self, Signature};
use crate::utp::error::NegotiationError;

// ---------------------------------------------------------------------------
// PeerPublics
// ---------------------------------------------------------------------------

/// The peer's published curve points, exactly as received off the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPublics {
    /// Peer's public blinding excess `x * G`.
    pub excess: CompressedRistretto,
    /// Peer's public nonce `k * G`.
    pub nonce: CompressedRistretto,
}

struct DecompressedPeer {
    excess: RistrettoPoint,
    nonce: RistrettoPoint,
}

impl PeerPublics {
    fn decompressed(&self) -> Result<DecompressedPeer, NegotiationError> {
        Ok(DecompressedPeer {
            excess: self
                .excess
                .decompress()
                .ok_or(NegotiationError::MalformedPoint)?,
            nonce: self
                .nonce
                .decompress()
                .ok_or(NegotiationError::MalformedPoint)?,
        })
    }
}

// ---------------------------------------------------------------------------
// PartySecrets
// ---------------------------------------------------------------------------

/// One party's private signing material for a single negotiation: its
/// blinding excess and its one-time nonce.
///
/// Serializable so it can ride inside the descriptor's FSM snapshot —
/// that snapshot is secret material and the external store must treat it
/// accordingly.
#[derive(Clone, Serialize, Deserialize)]
pub struct PartySecrets {
    excess: Scalar,
    nonce: Scalar,
}

impl fmt::Debug for PartySecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets stay out of logs, full stop.
        f.write_str("PartySecrets(..)")
    }
}

impl PartySecrets {
    /// Build a party's contribution from its own blinding factors.
    ///
    /// Inputs contribute positively, outputs negatively. The sender
    /// additionally subtracts the public kernel `offset` from its excess
    /// so that the kernel excess point stops identifying its inputs; the
    /// receiver passes `None`.
    ///
    /// The nonce is sampled fresh from `rng` and is independent of the
    /// excess. One negotiation, one nonce — the state machines never call
    /// this twice for the same `tx_id`.
    pub fn build<R: RngCore + CryptoRng>(
        input_blinds: &[Scalar],
        output_blinds: &[Scalar],
        offset: Option<&Scalar>,
        rng: &mut R,
    ) -> Self {
        let mut excess = aggregate_excess(input_blinds, output_blinds);
        if let Some(offset) = offset {
            excess -= offset;
        }
        Self {
            excess,
            nonce: cosign::generate_nonce(rng),
        }
    }

    /// This party's public excess `x * G`.
    pub fn public_excess(&self) -> RistrettoPoint {
        derive_public(&self.excess)
    }

    /// This party's public nonce `k * G`.
    pub fn public_nonce(&self) -> RistrettoPoint {
        derive_public(&self.nonce)
    }

    /// The joint challenge `e = H(K_s + K_r ‖ X_s + X_r ‖ m)`, identical
    /// on both sides because point addition commutes.
    pub fn joint_challenge(
        &self,
        peer: &PeerPublics,
        message: &[u8; 32],
    ) -> Result<Scalar, NegotiationError> {
        let peer = peer.decompressed()?;
        Ok(cosign::challenge(
            &(self.public_nonce() + peer.nonce),
            &(self.public_excess() + peer.excess),
            message,
        ))
    }

    /// Verify the peer's partial signature under the joint challenge.
    ///
    /// Returns the challenge on success so the caller can produce its own
    /// partial signature over the same value. Failure is fatal to the
    /// negotiation — there is no "verify again" path.
    pub fn verify_peer(
        &self,
        peer: &PeerPublics,
        peer_partial: &Scalar,
        message: &[u8; 32],
    ) -> Result<Scalar, NegotiationError> {
        let decompressed = peer.decompressed()?;
        let e = cosign::challenge(
            &(self.public_nonce() + decompressed.nonce),
            &(self.public_excess() + decompressed.excess),
            message,
        );
        if !cosign::verify_partial(peer_partial, &decompressed.nonce, &decompressed.excess, &e) {
            return Err(NegotiationError::InvalidPartialSignature);
        }
        Ok(e)
    }

    /// This party's partial signature `s = k + e * x`.
    pub fn partial_sign(&self, challenge: &Scalar) -> Scalar {
        cosign::partial_sign(&self.nonce, &self.excess, challenge)
    }

    /// Combine both partial signatures into the kernel signature, and
    /// return the combined public excess it verifies under.
    ///
    /// The peer's half must have passed [`verify_peer`](Self::verify_peer)
    /// first; combination cannot detect a bad input.
    pub fn finalize(
        &self,
        own_partial: &Scalar,
        peer_partial: &Scalar,
        peer: &PeerPublics,
    ) -> Result<(RistrettoPoint, Signature), NegotiationError> {
        let decompressed = peer.decompressed()?;
        let excess_sum = self.public_excess() + decompressed.excess;
        let signature = cosign::combine(
            own_partial,
            peer_partial,
            &(self.public_nonce() + decompressed.nonce),
        );
        Ok((excess_sum, signature))
    }

    /// Fresh random offset for the kernel. Lives here because it is part
    /// of contribution building, even though only the sender draws one.
    pub fn random_offset<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
        random_blind(rng)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
