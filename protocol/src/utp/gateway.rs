//! The gateway: the state machines' only window to the outside world.
//!
//! Everything that leaves a state machine — wire messages to the peer,
//! submission of the finished transaction to the ledger, completion and
//! failure notifications to the host wallet — goes through these traits.
//! The machines never touch a socket, which is precisely what makes the
//! whole protocol testable with a fake gateway that just records calls.
//!
//! The capability set is split by role: both roles share the base
//! [`WalletGateway`], and each role adds the sends only it performs. The
//! split is static — a sender machine physically cannot call
//! `register_tx`, because registration is the receiver's duty.

use crate::transaction::types::Transaction;
use crate::utp::descriptor::TxDescription;
use crate::utp::messages::{
    ConfirmInvitation, ConfirmTransaction, InviteReceiver, TxFailed, TxRegistered,
};

/// Capabilities shared by both negotiation roles.
pub trait WalletGateway: Send + Sync {
    /// The negotiation reached `Completed`; the host wallet may update
    /// balances and history.
    fn on_tx_completed(&self, descriptor: &TxDescription);

    /// Tell the peer the negotiation is dead.
    fn send_tx_failed(&self, descriptor: &TxDescription, msg: TxFailed);
}

/// Capabilities of the initiating (sending) role.
pub trait SenderGateway: WalletGateway {
    /// Transmit the opening invitation to the receiver.
    fn send_tx_invitation(&self, descriptor: &TxDescription, msg: InviteReceiver);

    /// Transmit the sender's partial signature to the receiver.
    fn send_tx_confirmation(&self, descriptor: &TxDescription, msg: ConfirmTransaction);
}

/// Capabilities of the responding (receiving) role.
pub trait ReceiverGateway: WalletGateway {
    /// Transmit the invitation response (receiver contribution + partial
    /// signature) to the sender.
    fn send_invitation_response(&self, descriptor: &TxDescription, msg: ConfirmInvitation);

    /// Submit the finished transaction to the ledger. The verdict comes
    /// back asynchronously as a `TxRegistered` event.
    fn register_tx(&self, descriptor: &TxDescription, tx: Transaction);

    /// Forward the ledger's verdict to the sender.
    fn send_tx_registered(&self, descriptor: &TxDescription, msg: TxRegistered);
}
