//! The transaction descriptor: a negotiation's durable record.
//!
//! One [`TxDescription`] exists per negotiation, created when the
//! negotiation starts and updated on every state transition. It is what
//! an external store persists, what a UI lists, and what a restarted
//! process uses to rejoin an in-flight negotiation — the `fsm_snapshot`
//! field carries the serialized state machine, secrets included.
//!
//! The descriptor outlives the negotiation: completed, cancelled, and
//! failed records are retained for audit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::transaction::types::{Amount, TxId};

// ---------------------------------------------------------------------------
// TxStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a negotiation, as visible to operators.
///
/// The numeric values are a persistence contract — they go to disk and
/// over RPC. Do not reorder, do not renumber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    /// Created, nothing sent yet.
    Pending = 0,
    /// Mid-negotiation: messages in flight, coins reserved.
    InProgress = 1,
    /// Terminal: locally cancelled before signature combination.
    Cancelled = 2,
    /// Terminal: registered on the ledger, outputs confirmed.
    Completed = 3,
    /// Terminal: verification failure, peer failure, or ledger rejection.
    Failed = 4,
}

impl TxStatus {
    /// The stable on-disk/wire discriminant.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a persisted discriminant. Unknown values get `None` — we
    /// don't guess.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::InProgress),
            2 => Some(Self::Cancelled),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether the negotiation has reached one of the three terminal
    /// statuses.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// TxDescription
// ---------------------------------------------------------------------------

/// The persisted record of one negotiation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxDescription {
    /// The negotiation this record describes.
    pub tx_id: TxId,
    /// Payment amount in base units.
    pub amount: Amount,
    /// Transaction fee in base units.
    pub fee: Amount,
    /// Opaque identifier of the counterparty, assigned by the transport.
    pub peer_id: u64,
    /// Free-form memo attached by the local user. The protocol never
    /// interprets it.
    pub message: Vec<u8>,
    /// Unix-epoch milliseconds when the negotiation was created.
    pub create_time: u64,
    /// Unix-epoch milliseconds of the last state transition.
    pub modify_time: u64,
    /// Whether the local party initiated (is the sender of) the payment.
    pub is_sender: bool,
    /// Operator-visible lifecycle status.
    pub status: TxStatus,
    /// Serialized state-machine snapshot for crash recovery.
    pub fsm_snapshot: Vec<u8>,
}

impl TxDescription {
    /// Create a fresh descriptor in `Pending` with both timestamps set to
    /// now.
    pub fn new(
        tx_id: TxId,
        amount: Amount,
        fee: Amount,
        peer_id: u64,
        message: Vec<u8>,
        is_sender: bool,
    ) -> Self {
        let now = now_millis();
        Self {
            tx_id,
            amount,
            fee,
            peer_id,
            message,
            create_time: now,
            modify_time: now,
            is_sender,
            status: TxStatus::Pending,
            fsm_snapshot: Vec::new(),
        }
    }

    /// Update the status, bumping `modify_time` on actual change.
    pub fn set_status(&mut self, status: TxStatus) {
        if self.status != status {
            self.status = status;
            self.modify_time = now_millis();
        }
    }

    /// Replace the state-machine snapshot, bumping `modify_time`.
    pub fn set_snapshot(&mut self, snapshot: Vec<u8>) {
        self.fsm_snapshot = snapshot;
        self.modify_time = now_millis();
    }

    /// Whether the negotiation is finished (in any of the three terminal
    /// statuses).
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Current Unix-epoch time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
