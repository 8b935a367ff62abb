//! # Pedersen Commitments over Ristretto
//!
//! A Pedersen commitment to amount `v` with blinding factor `b` is:
//!
//! ```text
//! C = v * H + b * G
//! ```
//!
//! where `H` is the value generator and `G` the blinding generator, with
//! no known discrete-log relation between them. The commitment hides `v`
//! perfectly (any `v` is consistent with any `C` for some `b`) and binds
//! computationally (finding two openings breaks DLOG on Ristretto).
//!
//! ## Generator roles
//!
//! We reuse the Bulletproofs `PedersenGens`: its value generator is our
//! `H`, its blinding generator is our `G`. `G` pulls double duty as the
//! Schnorr key generator — a party's blinding excess `x` has the public
//! image `x * G`, which is exactly what the kernel signature is verified
//! against. Using one generator pair for both jobs is what makes the
//! balance equation and the signature equation line up.
//!
//! ## Homomorphism
//!
//! Commitments add component-wise:
//!
//! ```text
//! C(v1, b1) + C(v2, b2) = C(v1 + v2, b1 + b2)
//! ```
//!
//! so `sum(inputs) - sum(outputs) - fee*H` collapses to a pure multiple
//! of `G` exactly when the amounts balance. The whole ledger hangs off
//! this one identity.

use bulletproofs::{BulletproofGens, PedersenGens, RangeProof};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use merlin::Transcript;
use once_cell::sync::Lazy;
use rand_core::{CryptoRng, RngCore};
use thiserror::Error;

use crate::config;

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Shared Pedersen generator pair. `B` is the value generator `H`;
/// `B_blinding` is the blinding/key generator `G`.
pub static PC_GENS: Lazy<PedersenGens> = Lazy::new(PedersenGens::default);

/// Bulletproofs generator table, sized for single-output 64-bit proofs.
pub static BP_GENS: Lazy<BulletproofGens> =
    Lazy::new(|| BulletproofGens::new(config::RANGE_PROOF_BITS, 1));

/// Domain separator for output range-proof transcripts. Both the prover
/// and every verifier must start from this exact label or verification
/// fails spuriously.
const RANGE_PROOF_DOMAIN: &[u8] = b"umbra_output_range_proof_v1";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from commitment construction.
#[derive(Debug, Error)]
pub enum CommitmentError {
    /// The amount cannot be committed with a valid range proof. Surfaced
    /// before any message leaves the machine.
    #[error("amount {amount} exceeds the representable range (max {max})")]
    ProofConstruction {
        /// The offending amount.
        amount: u64,
        /// The policy ceiling it violated.
        max: u64,
    },
}

// ---------------------------------------------------------------------------
// Commit / Prove / Verify
// ---------------------------------------------------------------------------

/// Compute the Pedersen commitment `amount * H + blind * G`.
///
/// This is the input-side operation: inputs reference commitments that
/// already exist on the ledger, so no range proof is attached.
pub fn commit(amount: u64, blind: &Scalar) -> RistrettoPoint {
    PC_GENS.commit(Scalar::from(amount), *blind)
}

/// Commit to `amount` and prove it lies in `[0, 2^RANGE_PROOF_BITS)`.
///
/// This is the output-side operation. Returns the compressed commitment
/// together with the proof; the two travel together on the wire.
///
/// # Errors
///
/// [`CommitmentError::ProofConstruction`] when `amount` exceeds the
/// [`config::MAX_AMOUNT`] policy ceiling. The Bulletproofs prover itself
/// cannot fail for in-range `u64` amounts with a 64-bit circuit, so the
/// policy check is the only gate.
pub fn commit_with_proof(
    amount: u64,
    blind: &Scalar,
) -> Result<(CompressedRistretto, RangeProof), CommitmentError> {
    if amount > config::MAX_AMOUNT {
        return Err(CommitmentError::ProofConstruction {
            amount,
            max: config::MAX_AMOUNT,
        });
    }

    let mut transcript = Transcript::new(RANGE_PROOF_DOMAIN);
    let (proof, commitment) = RangeProof::prove_single(
        &BP_GENS,
        &PC_GENS,
        &mut transcript,
        amount,
        blind,
        config::RANGE_PROOF_BITS,
    )
    .map_err(|_| CommitmentError::ProofConstruction {
        amount,
        max: config::MAX_AMOUNT,
    })?;

    Ok((commitment, proof))
}

/// Verify a range proof against its commitment.
///
/// Returns `false` for any failure — a bad proof and a proof for a
/// different commitment are indistinguishable to the caller, on purpose.
pub fn verify_proof(commitment: &CompressedRistretto, proof: &RangeProof) -> bool {
    let mut transcript = Transcript::new(RANGE_PROOF_DOMAIN);
    proof
        .verify_single(
            &BP_GENS,
            &PC_GENS,
            &mut transcript,
            commitment,
            config::RANGE_PROOF_BITS,
        )
        .is_ok()
}

// ---------------------------------------------------------------------------
// Blinding arithmetic
// ---------------------------------------------------------------------------

/// Aggregate a party's blinding factors into its blinding excess.
///
/// Inputs contribute positively, outputs negatively:
///
/// ```text
/// x = sum(input blinds) - sum(output blinds)
/// ```
///
/// Each party computes this exactly once per negotiation, from its own
/// inputs and outputs only. The result acts as that party's Schnorr
/// private key and is never transmitted.
pub fn aggregate_excess(input_blinds: &[Scalar], output_blinds: &[Scalar]) -> Scalar {
    let inputs = input_blinds.iter().fold(Scalar::ZERO, |acc, b| acc + b);
    let outputs = output_blinds.iter().fold(Scalar::ZERO, |acc, b| acc + b);
    inputs - outputs
}

/// Derive the public image of a private scalar: `secret * G`.
///
/// Used to publish blinding excesses and nonces without revealing them.
pub fn derive_public(secret: &Scalar) -> RistrettoPoint {
    secret * PC_GENS.B_blinding
}

/// Draw a uniformly random scalar for use as a blinding factor.
///
/// The RNG is injected so tests can run deterministically; production
/// callers pass `OsRng`.
pub fn random_blind<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    Scalar::random(rng)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn commitment_deterministic() {
        let mut rng = rng();
        let b = random_blind(&mut rng);
        assert_eq!(commit(100, &b), commit(100, &b));
    }

    #[test]
    fn different_amounts_different_commitments() {
        let mut rng = rng();
        let b = random_blind(&mut rng);
        assert_ne!(commit(100, &b), commit(101, &b));
    }

    #[test]
    fn different_blinds_different_commitments() {
        let mut rng = rng();
        let b1 = random_blind(&mut rng);
        let b2 = random_blind(&mut rng);
        assert_ne!(
            commit(100, &b1),
            commit(100, &b2),
            "hiding: different blinds must produce different commitments"
        );
    }

    #[test]
    fn commitments_are_additively_homomorphic() {
        let mut rng = rng();
        let b1 = random_blind(&mut rng);
        let b2 = random_blind(&mut rng);

        let sum = commit(30, &b1) + commit(12, &b2);
        assert_eq!(sum, commit(42, &(b1 + b2)));
    }

    #[test]
    fn zero_amount_commitment_is_pure_blinding() {
        let mut rng = rng();
        let b = random_blind(&mut rng);
        // C(0, b) = b * G — the commitment degenerates to a public key.
        assert_eq!(commit(0, &b), derive_public(&b));
    }

    #[test]
    fn range_proof_round_trip() {
        let mut rng = rng();
        let b = random_blind(&mut rng);
        let (commitment, proof) = commit_with_proof(6_000, &b).unwrap();

        // The proven commitment is the same point commit() produces.
        assert_eq!(commitment.decompress().unwrap(), commit(6_000, &b));
        assert!(verify_proof(&commitment, &proof));
    }

    #[test]
    fn range_proof_rejects_foreign_commitment() {
        let mut rng = rng();
        let b = random_blind(&mut rng);
        let (_, proof) = commit_with_proof(6_000, &b).unwrap();

        let other = commit(6_001, &b).compress();
        assert!(!verify_proof(&other, &proof));
    }

    #[test]
    fn amount_above_cap_fails_proof_construction() {
        let mut rng = rng();
        let b = random_blind(&mut rng);
        let err = commit_with_proof(config::MAX_AMOUNT + 1, &b).unwrap_err();
        assert!(matches!(
            err,
            CommitmentError::ProofConstruction { amount, .. } if amount == config::MAX_AMOUNT + 1
        ));
    }

    #[test]
    fn excess_aggregation_matches_manual_sum() {
        let mut rng = rng();
        let in1 = random_blind(&mut rng);
        let in2 = random_blind(&mut rng);
        let out = random_blind(&mut rng);

        let excess = aggregate_excess(&[in1, in2], &[out]);
        assert_eq!(excess, in1 + in2 - out);
    }

    #[test]
    fn excess_of_nothing_is_zero() {
        assert_eq!(aggregate_excess(&[], &[]), Scalar::ZERO);
    }

    #[test]
    fn excess_public_image_matches_commitment_difference() {
        // The identity the whole ledger rests on: when amounts balance,
        // the commitment difference is the excess times G.
        let mut rng = rng();
        let b_in = random_blind(&mut rng);
        let b_out = random_blind(&mut rng);

        let c_in = commit(50, &b_in);
        let c_out = commit(50, &b_out);
        let excess = aggregate_excess(&[b_in], &[b_out]);

        assert_eq!(c_in - c_out, derive_public(&excess));
    }
}
