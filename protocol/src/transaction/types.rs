//! Core type definitions for Umbra transactions.
//!
//! These types form the vocabulary of every negotiated transaction. They
//! are intentionally kept small and `Copy`-friendly where possible; the
//! one deliberately heavy member is [`Output`], which drags a ~700-byte
//! range proof around because that proof IS the output's validity.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::crypto::commitment::{self, CommitmentError};
use crate::transaction::kernel::Kernel;

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A quantity of value in base units. All protocol arithmetic is integer
/// base units; see [`DisplayAmount`] for human-readable formatting.
pub type Amount = u64;

/// Fixed-point display wrapper for amounts.
///
/// `DisplayAmount(238_000_000)` renders as `2.38000000`. Display only —
/// the protocol never parses this back.
pub struct DisplayAmount(pub Amount);

impl fmt::Display for DisplayAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08}", self.0 / config::COIN, self.0 % config::COIN)
    }
}

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// Opaque 16-byte negotiation identifier.
///
/// Generated by the initiator, carried in every message of a negotiation,
/// and used to correlate replies with the state machine that is waiting
/// for them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId([u8; config::TX_ID_LENGTH]);

impl TxId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    /// Wrap existing bytes (deserialization, tests).
    pub fn from_bytes(bytes: [u8; config::TX_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; config::TX_ID_LENGTH] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// A transaction input: a reference to a commitment being spent.
///
/// The spender proves ownership implicitly — only someone who knows the
/// blinding factor can make the kernel signature balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// The commitment of the coin being spent.
    pub commitment: CompressedRistretto,
}

impl Input {
    /// Build an input spending a coin with the given amount and blinding.
    pub fn new(amount: Amount, blind: &Scalar) -> Self {
        Self {
            commitment: commitment::commit(amount, blind).compress(),
        }
    }
}

/// A newly created transaction output: commitment plus range proof.
///
/// The proof travels as opaque bytes so the wire format stays flat; it is
/// parsed back into a structured proof only at verification time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Pedersen commitment to the output amount.
    pub commitment: CompressedRistretto,
    /// Bulletproof attesting the hidden amount is in range.
    pub proof: Vec<u8>,
}

impl Output {
    /// Create an output committing to `amount` under `blind`, with its
    /// range proof attached.
    ///
    /// # Errors
    ///
    /// [`CommitmentError::ProofConstruction`] when the amount is outside
    /// the representable range. Surfaced before any message is sent.
    pub fn create(amount: Amount, blind: &Scalar) -> Result<Self, CommitmentError> {
        let (commitment, proof) = commitment::commit_with_proof(amount, blind)?;
        Ok(Self {
            commitment,
            proof: proof.to_bytes(),
        })
    }

    /// Verify this output's range proof against its commitment.
    pub fn verify_proof(&self) -> bool {
        match bulletproofs::RangeProof::from_bytes(&self.proof) {
            Ok(proof) => commitment::verify_proof(&self.commitment, &proof),
            Err(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Errors from ledger-side transaction validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    /// An output's range proof did not verify.
    #[error("output {index} carries an invalid range proof")]
    InvalidRangeProof {
        /// Index of the offending output.
        index: usize,
    },

    /// The kernel signature did not verify under the kernel excess.
    #[error("kernel signature failed verification")]
    InvalidKernelSignature,

    /// `sum(inputs) - sum(outputs) - fee*H != excess + offset*G`.
    #[error("commitments do not balance against the kernel excess")]
    Unbalanced,

    /// A compressed point in the transaction does not decode.
    #[error("malformed curve point in transaction")]
    MalformedPoint,

    /// The kernel is missing its excess or signature.
    #[error("kernel has not been finalized")]
    UnfinalizedKernel,

    /// [`Kernel::finalize`] was called on an already-finalized kernel.
    #[error("kernel is already finalized")]
    AlreadyFinalized,
}

/// A complete negotiated transaction, ready for the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Public kernel offset chosen by the sender. Splitting the total
    /// excess into `kernel excess + offset` stops an observer from
    /// linking a kernel to its inputs by point arithmetic alone.
    pub offset: Scalar,
    /// Commitments being spent.
    pub inputs: Vec<Input>,
    /// Commitments being created, each with its range proof.
    pub outputs: Vec<Output>,
    /// The co-signed kernel.
    pub kernel: Kernel,
}

impl Transaction {
    /// Run the full stateless validity check:
    ///
    /// 1. every output range proof verifies,
    /// 2. the kernel signature verifies,
    /// 3. the balance equation holds:
    ///    `sum(inputs) - sum(outputs) - fee*H == excess + offset*G`.
    ///
    /// Ownership of the inputs and double-spend checks are the ledger's
    /// problem; everything provable from the transaction alone is here.
    pub fn validate(&self) -> Result<(), TransactionError> {
        for (index, output) in self.outputs.iter().enumerate() {
            if !output.verify_proof() {
                return Err(TransactionError::InvalidRangeProof { index });
            }
        }

        self.kernel.verify()?;

        let excess = self
            .kernel
            .excess()
            .ok_or(TransactionError::UnfinalizedKernel)?
            .decompress()
            .ok_or(TransactionError::MalformedPoint)?;

        let sum_in = Self::sum_commitments(self.inputs.iter().map(|i| &i.commitment))?;
        let sum_out = Self::sum_commitments(self.outputs.iter().map(|o| &o.commitment))?;

        let fee_h = Scalar::from(self.kernel.fee()) * commitment::PC_GENS.B;
        let lhs = sum_in - sum_out - fee_h;
        let rhs = excess + commitment::derive_public(&self.offset);

        if lhs != rhs {
            return Err(TransactionError::Unbalanced);
        }
        Ok(())
    }

    fn sum_commitments<'a>(
        commitments: impl Iterator<Item = &'a CompressedRistretto>,
    ) -> Result<RistrettoPoint, TransactionError> {
        let mut sum = RistrettoPoint::identity();
        for c in commitments {
            sum += c.decompress().ok_or(TransactionError::MalformedPoint)?;
        }
        Ok(sum)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
