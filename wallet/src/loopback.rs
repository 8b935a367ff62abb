//! In-process transport for the demo: a gateway whose "wire" is a set of
//! mailboxes the caller drains by hand.
//!
//! Both state machines share one `LoopbackGateway`. Each outbound message
//! lands in its own queue; the demo loop pops it and feeds it to the
//! other machine, playing transport and ledger at the same time.

use std::collections::VecDeque;

use parking_lot::Mutex;

use umbra_protocol::transaction::types::Transaction;
use umbra_protocol::utp::{
    ConfirmInvitation, ConfirmTransaction, InviteReceiver, ReceiverGateway, SenderGateway,
    TxDescription, TxFailed, TxRegistered, WalletGateway,
};

/// Gateway that parks every outbound message in a mailbox.
#[derive(Default)]
pub struct LoopbackGateway {
    invitations: Mutex<VecDeque<InviteReceiver>>,
    responses: Mutex<VecDeque<ConfirmInvitation>>,
    confirmations: Mutex<VecDeque<ConfirmTransaction>>,
    registrations: Mutex<VecDeque<Transaction>>,
    verdicts: Mutex<VecDeque<TxRegistered>>,
}

impl LoopbackGateway {
    pub fn pop_invitation(&self) -> Option<InviteReceiver> {
        self.invitations.lock().pop_front()
    }

    pub fn pop_response(&self) -> Option<ConfirmInvitation> {
        self.responses.lock().pop_front()
    }

    pub fn pop_confirmation(&self) -> Option<ConfirmTransaction> {
        self.confirmations.lock().pop_front()
    }

    pub fn pop_registration(&self) -> Option<Transaction> {
        self.registrations.lock().pop_front()
    }

    pub fn pop_verdict(&self) -> Option<TxRegistered> {
        self.verdicts.lock().pop_front()
    }
}

impl WalletGateway for LoopbackGateway {
    fn on_tx_completed(&self, descriptor: &TxDescription) {
        tracing::info!(
            tx_id = %descriptor.tx_id,
            is_sender = descriptor.is_sender,
            "negotiation completed"
        );
    }

    fn send_tx_failed(&self, descriptor: &TxDescription, msg: TxFailed) {
        // Single-process demo: the failing machine has already logged the
        // cause, so the notification just gets surfaced.
        tracing::warn!(tx_id = %msg.tx_id, is_sender = descriptor.is_sender, "negotiation failed");
    }
}

impl SenderGateway for LoopbackGateway {
    fn send_tx_invitation(&self, descriptor: &TxDescription, msg: InviteReceiver) {
        tracing::debug!(tx_id = %descriptor.tx_id, "invitation on the wire");
        self.invitations.lock().push_back(msg);
    }

    fn send_tx_confirmation(&self, descriptor: &TxDescription, msg: ConfirmTransaction) {
        tracing::debug!(tx_id = %descriptor.tx_id, "confirmation on the wire");
        self.confirmations.lock().push_back(msg);
    }
}

impl ReceiverGateway for LoopbackGateway {
    fn send_invitation_response(&self, descriptor: &TxDescription, msg: ConfirmInvitation) {
        tracing::debug!(tx_id = %descriptor.tx_id, "invitation response on the wire");
        self.responses.lock().push_back(msg);
    }

    fn register_tx(&self, descriptor: &TxDescription, tx: Transaction) {
        tracing::debug!(tx_id = %descriptor.tx_id, "transaction submitted to ledger");
        self.registrations.lock().push_back(tx);
    }

    fn send_tx_registered(&self, descriptor: &TxDescription, msg: TxRegistered) {
        tracing::debug!(tx_id = %descriptor.tx_id, success = msg.success, "verdict on the wire");
        self.verdicts.lock().push_back(msg);
    }
}
