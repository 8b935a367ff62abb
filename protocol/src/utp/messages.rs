//! Wire messages exchanged between sender and receiver.
//!
//! Five flat records, each independently serializable and each carrying
//! the negotiation's `tx_id` as its correlation key. A message has no
//! effect until the addressed state machine consumes it — transport can
//! reorder, duplicate, or drop them and the machines stay consistent.
//!
//! ## Canonical encoding
//!
//! The wire format is `bincode` over these structs, which makes the
//! declared field order the serialization contract. Reordering fields is
//! a wire-breaking change; add new fields at the end or bump the protocol
//! major version.

use curve25519_dalek::ristretto::CompressedRistretto;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};

use crate::transaction::types::{Amount, Input, Output, TxId};

/// Sender → receiver: opens a negotiation.
///
/// Carries everything the receiver needs to build its own contribution
/// and compute the shared challenge: the public deal terms, the sender's
/// public excess and nonce, the kernel offset, and the sender's inputs
/// and change output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InviteReceiver {
    /// Correlation key for the negotiation.
    pub tx_id: TxId,
    /// Amount being paid to the receiver.
    pub amount: Amount,
    /// Transaction fee, fixed for the negotiation's lifetime.
    pub fee: Amount,
    /// Kernel lock height, fixed alongside the fee.
    pub min_height: u64,
    /// Sender's public blinding excess `x_s * G`.
    pub sender_public_excess: CompressedRistretto,
    /// Public kernel offset chosen by the sender.
    pub offset: Scalar,
    /// Sender's public nonce `k_s * G`.
    pub sender_public_nonce: CompressedRistretto,
    /// Commitments the sender is spending.
    pub inputs: Vec<Input>,
    /// Outputs the sender created (its change), proofs attached.
    pub outputs: Vec<Output>,
}

/// Receiver → sender: accepts the invitation.
///
/// Carries the receiver's public contribution and its half of the kernel
/// signature. The receiver signs first; it has nothing to lose by doing
/// so, since its partial signature is worthless without the sender's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmInvitation {
    /// Correlation key.
    pub tx_id: TxId,
    /// Receiver's public blinding excess `x_r * G`.
    pub peer_public_excess: CompressedRistretto,
    /// Receiver's public nonce `k_r * G`.
    pub peer_public_nonce: CompressedRistretto,
    /// Receiver's partial signature `s_r`.
    pub peer_partial_sig: Scalar,
}

/// Sender → receiver: the sender's half of the kernel signature.
///
/// After this message the receiver can combine both halves and register
/// the finished transaction with the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmTransaction {
    /// Correlation key.
    pub tx_id: TxId,
    /// Sender's partial signature `s_s`.
    pub sender_partial_sig: Scalar,
}

/// Receiver → sender: the ledger's verdict on the registered transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRegistered {
    /// Correlation key.
    pub tx_id: TxId,
    /// Whether the ledger accepted the transaction.
    pub success: bool,
}

/// Either direction: the peer has abandoned the negotiation.
///
/// Transport timeouts are reported to the state machines as if this
/// message had arrived — "no reply" and "explicit failure" are the same
/// terminal event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxFailed {
    /// Correlation key.
    pub tx_id: TxId,
}
