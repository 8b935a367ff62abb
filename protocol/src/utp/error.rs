//! Error types for the Umbra Transfer Protocol.
//!
//! Every negotiation operation that can fail returns a
//! [`NegotiationError`]. This enum is exhaustive over the failure modes
//! of the sender/receiver flow. All of them are fatal to the negotiation
//! that raised them — there is no retry path, because retrying a signing
//! round with a reused nonce is how private keys leak.

use thiserror::Error;

use crate::crypto::commitment::CommitmentError;
use crate::transaction::types::{Amount, TransactionError, TxId};
use crate::vault::VaultError;

/// Errors that can occur while driving a negotiation.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The peer's partial signature did not satisfy `s*G == K + e*X`.
    /// The peer is lying about its nonce, its excess, or its signature;
    /// the distinction doesn't matter and the negotiation is over.
    #[error("peer partial signature failed verification")]
    InvalidPartialSignature,

    /// A compressed point received from the peer does not decode to a
    /// valid group element.
    #[error("malformed curve point in peer message")]
    MalformedPoint,

    /// The offered fee does not meet the minimum for the transaction's
    /// shape. Checked by both parties before anything is signed.
    #[error("fee {fee} is below the minimum {minimum} for this transaction shape")]
    FeeTooLow {
        /// The fee the sender offered.
        fee: Amount,
        /// The policy minimum for this input/output count.
        minimum: Amount,
    },

    /// The payment amount is below the dust limit.
    #[error("amount {amount} is below the dust limit")]
    DustAmount {
        /// The offending amount.
        amount: Amount,
    },

    /// Coin reservation failed. Surfaced before the protocol starts;
    /// nothing was reserved.
    #[error("coin reservation failed: {0}")]
    CoinReservation(#[from] VaultError),

    /// Range-proof construction failed. Surfaced before any message is
    /// sent.
    #[error("proof construction failed: {0}")]
    Proof(#[from] CommitmentError),

    /// The assembled transaction failed local validation, or the kernel
    /// refused finalization.
    #[error("assembled transaction failed validation: {0}")]
    InvalidTransaction(#[from] TransactionError),

    /// The ledger refused the finished transaction.
    #[error("ledger rejected the registered transaction {tx_id}")]
    RegistrationRejected {
        /// The rejected negotiation.
        tx_id: TxId,
    },

    /// Signing secrets are not available in the current state — the
    /// machine was restored from a snapshot that predates them.
    #[error("signing secrets unavailable in current state")]
    MissingSecrets,

    /// A persisted state-machine snapshot could not be decoded.
    #[error("fsm snapshot could not be decoded: {0}")]
    SnapshotDecode(String),
}
