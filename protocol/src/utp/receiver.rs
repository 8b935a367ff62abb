//! The receiver state machine.
//!
//! The receiver responds: given an invitation it builds the output that
//! will hold the payment, contributes its public excess and nonce, signs
//! first, and — once the sender's half arrives — combines the signature,
//! assembles the full transaction, and registers it with the ledger.
//!
//! Layered exactly like the sender: a pure [`transition`] table plus a
//! [`ReceiverNegotiation`] driver that owns secrets and executes actions.
//! The receiver reserves no coins, so its rollback duty is smaller: the
//! pending output it parked for itself must be discarded on every path
//! that does not end in `Completed`.

use std::sync::Arc;

use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::transaction::kernel::Kernel;
use crate::transaction::types::{Input, Output, Transaction, TxId};
use crate::utp::descriptor::{TxDescription, TxStatus};
use crate::utp::error::NegotiationError;
use crate::utp::gateway::ReceiverGateway;
use crate::utp::messages::{ConfirmInvitation, ConfirmTransaction, InviteReceiver, TxFailed, TxRegistered};
use crate::utp::party::{PartySecrets, PeerPublics};
use crate::vault::{Coin, CoinStore};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Receiver-side negotiation states. Named mirrors of the sender's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverState {
    /// Invitation accepted into the machine, nothing processed yet.
    Init,
    /// Building our output and partial signature.
    ConfirmingInvitation,
    /// Response sent; waiting for the sender's partial signature.
    AwaitingFinalSignature,
    /// Verifying the sender's half and submitting to the ledger.
    RegisteringTx,
    /// Submitted; waiting for the ledger's verdict.
    AwaitingRegistration,
    /// Terminal: registered, our output is spendable.
    Completed,
    /// Terminal: locally cancelled before signature combination.
    Cancelled,
    /// Something went fatally wrong; rollback in progress.
    Failed,
    /// Terminal: rollback finished.
    RollbackDone,
}

impl ReceiverState {
    /// Fully terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::RollbackDone)
    }

    /// `Failed` and its terminal `RollbackDone`.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed | Self::RollbackDone)
    }

    /// Cancellation window: open until we combine the signatures. Once
    /// `RegisteringTx` begins, the finished transaction exists and may
    /// already be on the ledger.
    pub fn can_cancel(self) -> bool {
        matches!(
            self,
            Self::Init | Self::ConfirmingInvitation | Self::AwaitingFinalSignature
        )
    }

    /// The operator-visible status this state maps to.
    pub fn status(self) -> TxStatus {
        match self {
            Self::Init => TxStatus::Pending,
            Self::ConfirmingInvitation
            | Self::AwaitingFinalSignature
            | Self::RegisteringTx
            | Self::AwaitingRegistration => TxStatus::InProgress,
            Self::Completed => TxStatus::Completed,
            Self::Cancelled => TxStatus::Cancelled,
            Self::Failed | Self::RollbackDone => TxStatus::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Events & Actions
// ---------------------------------------------------------------------------

/// Everything that can happen to a receiver machine.
#[derive(Clone, Debug)]
pub enum ReceiverEvent {
    /// The stored invitation is taken up for processing.
    InvitationReceived,
    /// Internal: our response went out.
    ResponseSent,
    /// Internal: the invitation was unacceptable (fee policy, dust,
    /// malformed data).
    InvitationRejected,
    /// The sender's partial signature arrived.
    FinalSignatureReceived(ConfirmTransaction),
    /// Internal: transaction assembled and handed to the ledger.
    RegistrationSubmitted,
    /// Internal: the sender's partial signature did not verify.
    SignatureRejected,
    /// The ledger's verdict.
    RegistrationResult(TxRegistered),
    /// The peer failed or the transport timed out.
    PeerFailed,
    /// Local user cancels.
    Cancel,
    /// Internal: rollback actions have run.
    RollbackComplete,
}

impl ReceiverEvent {
    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvitationReceived => "InvitationReceived",
            Self::ResponseSent => "ResponseSent",
            Self::InvitationRejected => "InvitationRejected",
            Self::FinalSignatureReceived(_) => "FinalSignatureReceived",
            Self::RegistrationSubmitted => "RegistrationSubmitted",
            Self::SignatureRejected => "SignatureRejected",
            Self::RegistrationResult(_) => "RegistrationResult",
            Self::PeerFailed => "PeerFailed",
            Self::Cancel => "Cancel",
            Self::RollbackComplete => "RollbackComplete",
        }
    }
}

/// Side effects the transition table asks the driver to perform.
#[derive(Clone, Debug, PartialEq)]
pub enum ReceiverAction {
    /// Build our output, excess, nonce and partial signature; send the
    /// invitation response. Consumes randomness, so the driver runs it
    /// inside `accept`.
    BuildAndSendResponse,
    /// Verify the sender's partial signature, combine, assemble the
    /// transaction, register it with the ledger.
    VerifyAndRegister(ConfirmTransaction),
    /// Promote our pending output to spendable.
    ConfirmOutput,
    /// Forward the ledger's verdict to the sender.
    ForwardRegistrationResult(TxRegistered),
    /// Tell the host wallet the negotiation completed.
    NotifyCompleted,
    /// Discard pending outputs (and release reservations, of which the
    /// receiver holds none). Idempotent.
    ReleaseFunds,
    /// Tell the peer the negotiation is dead.
    NotifyPeerFailed,
}

// ---------------------------------------------------------------------------
// Transition function
// ---------------------------------------------------------------------------

/// The pure receiver transition table. Same drop semantics as the
/// sender's: `None` means the event is ignored with no state change.
pub fn transition(
    state: ReceiverState,
    event: &ReceiverEvent,
) -> Option<(ReceiverState, Vec<ReceiverAction>)> {
    use ReceiverAction as A;
    use ReceiverEvent as E;
    use ReceiverState as S;

    match (state, event) {
        (S::Init, E::InvitationReceived) => Some((
            S::ConfirmingInvitation,
            vec![A::BuildAndSendResponse],
        )),

        (S::ConfirmingInvitation, E::ResponseSent) => Some((S::AwaitingFinalSignature, vec![])),
        (S::ConfirmingInvitation, E::InvitationRejected) => Some((
            S::Failed,
            vec![A::ReleaseFunds, A::NotifyPeerFailed],
        )),

        (S::AwaitingFinalSignature, E::FinalSignatureReceived(msg)) => Some((
            S::RegisteringTx,
            vec![A::VerifyAndRegister(msg.clone())],
        )),

        (S::RegisteringTx, E::RegistrationSubmitted) => Some((S::AwaitingRegistration, vec![])),
        (S::RegisteringTx, E::SignatureRejected) => Some((
            S::Failed,
            vec![A::ReleaseFunds, A::NotifyPeerFailed],
        )),

        (S::AwaitingRegistration, E::RegistrationResult(r)) if r.success => Some((
            S::Completed,
            vec![
                A::ConfirmOutput,
                A::ForwardRegistrationResult(*r),
                A::NotifyCompleted,
            ],
        )),
        (S::AwaitingRegistration, E::RegistrationResult(r)) => Some((
            S::Failed,
            vec![A::ReleaseFunds, A::ForwardRegistrationResult(*r)],
        )),

        (s, E::PeerFailed) if !s.is_terminal() && s != S::Failed => {
            Some((S::Failed, vec![A::ReleaseFunds]))
        }
        (s, E::Cancel) if s.can_cancel() => Some((
            S::Cancelled,
            vec![A::ReleaseFunds, A::NotifyPeerFailed],
        )),

        (S::Failed, E::RollbackComplete) => Some((S::RollbackDone, vec![])),

        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Serialized form of a mid-flight receiver machine.
#[derive(Serialize, Deserialize)]
struct ReceiverSnapshot {
    state: ReceiverState,
    secrets: Option<PartySecrets>,
    kernel: Kernel,
    offset: Scalar,
    sender_publics: PeerPublics,
    own_partial: Option<Scalar>,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
}

/// Drives one negotiation from the receiver's side.
///
/// Born from an [`InviteReceiver`]: the invitation's deal terms seed the
/// descriptor and the kernel, and its inputs/outputs are held until the
/// final transaction is assembled.
pub struct ReceiverNegotiation {
    gateway: Arc<dyn ReceiverGateway>,
    store: Arc<dyn CoinStore>,
    descriptor: TxDescription,
    state: ReceiverState,
    secrets: Option<PartySecrets>,
    kernel: Kernel,
    offset: Scalar,
    sender_publics: PeerPublics,
    own_partial: Option<Scalar>,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
}

impl ReceiverNegotiation {
    /// Create a receiver negotiation from an incoming invitation. The
    /// machine starts in `Init`; call [`accept`](Self::accept) to process
    /// the invitation and respond.
    pub fn new(
        gateway: Arc<dyn ReceiverGateway>,
        store: Arc<dyn CoinStore>,
        invite: InviteReceiver,
        peer_id: u64,
        message: Vec<u8>,
    ) -> Self {
        let kernel = Kernel::new(invite.fee, invite.min_height);
        let descriptor = TxDescription::new(
            invite.tx_id,
            invite.amount,
            invite.fee,
            peer_id,
            message,
            false,
        );
        Self {
            gateway,
            store,
            descriptor,
            state: ReceiverState::Init,
            secrets: None,
            kernel,
            offset: invite.offset,
            sender_publics: PeerPublics {
                excess: invite.sender_public_excess,
                nonce: invite.sender_public_nonce,
            },
            own_partial: None,
            inputs: invite.inputs,
            outputs: invite.outputs,
        }
    }

    /// Restore a mid-flight machine from its persisted descriptor.
    pub fn restore(
        gateway: Arc<dyn ReceiverGateway>,
        store: Arc<dyn CoinStore>,
        descriptor: TxDescription,
    ) -> Result<Self, NegotiationError> {
        let snapshot: ReceiverSnapshot = bincode::deserialize(&descriptor.fsm_snapshot)
            .map_err(|e| NegotiationError::SnapshotDecode(e.to_string()))?;
        Ok(Self {
            gateway,
            store,
            descriptor,
            state: snapshot.state,
            secrets: snapshot.secrets,
            kernel: snapshot.kernel,
            offset: snapshot.offset,
            sender_publics: snapshot.sender_publics,
            own_partial: snapshot.own_partial,
            inputs: snapshot.inputs,
            outputs: snapshot.outputs,
        })
    }

    /// The negotiation this machine drives.
    pub fn tx_id(&self) -> TxId {
        self.descriptor.tx_id
    }

    /// Current machine state.
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// The durable record, snapshot included.
    pub fn descriptor(&self) -> &TxDescription {
        &self.descriptor
    }

    // -- external events ----------------------------------------------------

    /// Process the invitation: build our output and partial signature,
    /// send `ConfirmInvitation`.
    ///
    /// On error the machine is in `Failed` and the sender was notified.
    pub fn accept<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), NegotiationError> {
        let Some(actions) = self.step(&ReceiverEvent::InvitationReceived) else {
            return Ok(());
        };
        debug_assert_eq!(actions, vec![ReceiverAction::BuildAndSendResponse]);

        match self.build_and_send_response(rng) {
            Ok(()) => self.advance(ReceiverEvent::ResponseSent),
            Err(err) => {
                self.advance(ReceiverEvent::InvitationRejected)?;
                Err(err)
            }
        }
    }

    /// Feed the sender's `ConfirmTransaction`.
    ///
    /// On success the full transaction has been handed to the ledger via
    /// [`ReceiverGateway::register_tx`]; on a bad signature the machine
    /// ends in `Failed` with the peer notified.
    pub fn handle_confirm_transaction(
        &mut self,
        msg: ConfirmTransaction,
    ) -> Result<(), NegotiationError> {
        if !self.correlates(msg.tx_id) {
            return Ok(());
        }
        self.advance(ReceiverEvent::FinalSignatureReceived(msg))
    }

    /// Feed the ledger's verdict on our registered transaction.
    ///
    /// A rejection is fatal: the machine rolls back, the verdict is still
    /// forwarded to the sender, and
    /// [`NegotiationError::RegistrationRejected`] is returned. Replays
    /// into a terminal state are dropped silently.
    pub fn handle_tx_registered(&mut self, msg: TxRegistered) -> Result<(), NegotiationError> {
        if !self.correlates(msg.tx_id) {
            return Ok(());
        }
        let success = msg.success;
        let Some(actions) = self.step(&ReceiverEvent::RegistrationResult(msg)) else {
            return Ok(());
        };
        self.run_actions(actions)?;
        if !success {
            return Err(NegotiationError::RegistrationRejected {
                tx_id: self.descriptor.tx_id,
            });
        }
        Ok(())
    }

    /// Feed a peer failure notification.
    pub fn handle_tx_failed(&mut self, msg: TxFailed) -> Result<(), NegotiationError> {
        if !self.correlates(msg.tx_id) {
            return Ok(());
        }
        self.advance(ReceiverEvent::PeerFailed)
    }

    /// The transport gave up waiting for the peer.
    pub fn peer_timed_out(&mut self) -> Result<(), NegotiationError> {
        self.advance(ReceiverEvent::PeerFailed)
    }

    /// Cancel locally. A no-op once signature combination has begun.
    pub fn cancel(&mut self) -> Result<(), NegotiationError> {
        self.advance(ReceiverEvent::Cancel)
    }

    // -- internals ----------------------------------------------------------

    fn correlates(&self, tx_id: TxId) -> bool {
        if tx_id != self.descriptor.tx_id {
            tracing::warn!(
                expected = %self.descriptor.tx_id,
                got = %tx_id,
                "message for a different negotiation, dropping"
            );
            return false;
        }
        true
    }

    fn step(&mut self, event: &ReceiverEvent) -> Option<Vec<ReceiverAction>> {
        match transition(self.state, event) {
            Some((next, actions)) => {
                tracing::info!(
                    tx_id = %self.descriptor.tx_id,
                    from = ?self.state,
                    to = ?next,
                    event = event.name(),
                    "receiver transition"
                );
                self.state = next;
                self.descriptor.set_status(next.status());
                let snapshot = self.snapshot_bytes();
                self.descriptor.set_snapshot(snapshot);
                Some(actions)
            }
            None => {
                tracing::debug!(
                    tx_id = %self.descriptor.tx_id,
                    state = ?self.state,
                    event = event.name(),
                    "event not accepted in this state, dropping"
                );
                None
            }
        }
    }

    fn advance(&mut self, event: ReceiverEvent) -> Result<(), NegotiationError> {
        match self.step(&event) {
            Some(actions) => self.run_actions(actions),
            None => Ok(()),
        }
    }

    fn run_actions(&mut self, actions: Vec<ReceiverAction>) -> Result<(), NegotiationError> {
        let mut result = Ok(());
        for action in actions {
            match action {
                ReceiverAction::BuildAndSendResponse => {
                    // Needs randomness; only reachable through `accept`.
                    tracing::warn!(
                        tx_id = %self.descriptor.tx_id,
                        "BuildAndSendResponse outside accept, ignoring"
                    );
                }
                ReceiverAction::VerifyAndRegister(msg) => match self.verify_and_register(&msg) {
                    Ok(()) => self.advance(ReceiverEvent::RegistrationSubmitted)?,
                    Err(err) => {
                        self.advance(ReceiverEvent::SignatureRejected)?;
                        result = Err(err);
                    }
                },
                ReceiverAction::ConfirmOutput => {
                    self.store.confirm_pending(self.descriptor.tx_id);
                }
                ReceiverAction::ForwardRegistrationResult(msg) => {
                    self.gateway.send_tx_registered(&self.descriptor, msg);
                }
                ReceiverAction::NotifyCompleted => {
                    self.gateway.on_tx_completed(&self.descriptor);
                }
                ReceiverAction::ReleaseFunds => {
                    self.store.release(self.descriptor.tx_id);
                    self.store.discard_pending(self.descriptor.tx_id);
                }
                ReceiverAction::NotifyPeerFailed => {
                    self.gateway.send_tx_failed(
                        &self.descriptor,
                        TxFailed {
                            tx_id: self.descriptor.tx_id,
                        },
                    );
                }
            }
        }
        if self.state == ReceiverState::Failed {
            if let Some(more) = self.step(&ReceiverEvent::RollbackComplete) {
                self.run_actions(more)?;
            }
        }
        result
    }

    fn build_and_send_response<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<(), NegotiationError> {
        let tx_id = self.descriptor.tx_id;
        let amount = self.descriptor.amount;
        let fee = self.descriptor.fee;

        if amount < config::DUST_LIMIT {
            return Err(NegotiationError::DustAmount { amount });
        }

        // The final transaction will carry the sender's outputs plus the
        // one we are about to add.
        let minimum = config::minimum_fee(self.inputs.len(), self.outputs.len() + 1);
        if fee < minimum {
            return Err(NegotiationError::FeeTooLow { fee, minimum });
        }

        let coin = Coin::new(amount, rng);
        let output = Output::create(amount, &coin.blinding)?;
        let secrets = PartySecrets::build(&[], &[coin.blinding], None, rng);

        let message = self.kernel.message_hash();
        let challenge = secrets.joint_challenge(&self.sender_publics, &message)?;
        let own_partial = secrets.partial_sign(&challenge);

        // Park the coin until the ledger confirms; it only becomes
        // spendable in `Completed`.
        self.store.add_pending(tx_id, coin);
        self.outputs.push(output);

        let response = ConfirmInvitation {
            tx_id,
            peer_public_excess: secrets.public_excess().compress(),
            peer_public_nonce: secrets.public_nonce().compress(),
            peer_partial_sig: own_partial,
        };

        self.secrets = Some(secrets);
        self.own_partial = Some(own_partial);

        tracing::info!(tx_id = %tx_id, amount, fee, "sending invitation response");
        self.gateway.send_invitation_response(&self.descriptor, response);
        Ok(())
    }

    fn verify_and_register(&mut self, msg: &ConfirmTransaction) -> Result<(), NegotiationError> {
        let secrets = self.secrets.as_ref().ok_or(NegotiationError::MissingSecrets)?;
        let own_partial = self.own_partial.ok_or(NegotiationError::MissingSecrets)?;

        let message = self.kernel.message_hash();
        secrets.verify_peer(&self.sender_publics, &msg.sender_partial_sig, &message)?;
        tracing::debug!(tx_id = %self.descriptor.tx_id, "sender partial signature verified");

        let (excess_sum, signature) =
            secrets.finalize(&own_partial, &msg.sender_partial_sig, &self.sender_publics)?;
        self.kernel.finalize(&excess_sum, signature)?;

        let tx = Transaction {
            offset: self.offset,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            kernel: self.kernel.clone(),
        };

        // Catch a broken transaction here rather than letting the ledger
        // bounce it: this also covers the sender's range proofs, which
        // nobody has checked yet.
        tx.validate()?;

        tracing::info!(
            tx_id = %self.descriptor.tx_id,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            "registering transaction with ledger"
        );
        self.gateway.register_tx(&self.descriptor, tx);
        Ok(())
    }

    fn snapshot_bytes(&self) -> Vec<u8> {
        bincode::serialize(&ReceiverSnapshot {
            state: self.state,
            secrets: self.secrets.clone(),
            kernel: self.kernel.clone(),
            offset: self.offset,
            sender_publics: self.sender_publics,
            own_partial: self.own_partial,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        })
        .expect("receiver snapshot serialization must not fail")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::random_blind;
    use crate::transaction::types::Amount;
    use crate::vault::InMemoryCoinStore;
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // -- fakes --------------------------------------------------------------

    #[derive(Debug)]
    enum Call {
        Response(ConfirmInvitation),
        Register(Transaction),
        Registered(TxRegistered),
        Failed(TxFailed),
        Completed,
    }

    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingGateway {
        fn count(&self) -> usize {
            self.calls.lock().len()
        }

        fn last_response(&self) -> Option<ConfirmInvitation> {
            self.calls.lock().iter().rev().find_map(|c| match c {
                Call::Response(m) => Some(m.clone()),
                _ => None,
            })
        }

        fn registrations(&self) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|c| matches!(c, Call::Register(_)))
                .count()
        }

        fn last_registered_tx(&self) -> Option<Transaction> {
            self.calls.lock().iter().rev().find_map(|c| match c {
                Call::Register(tx) => Some(tx.clone()),
                _ => None,
            })
        }

        fn forwarded_verdicts(&self) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|c| matches!(c, Call::Registered(_)))
                .count()
        }

        fn peer_failures(&self) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|c| matches!(c, Call::Failed(_)))
                .count()
        }
    }

    impl crate::utp::gateway::WalletGateway for RecordingGateway {
        fn on_tx_completed(&self, _descriptor: &TxDescription) {
            self.calls.lock().push(Call::Completed);
        }

        fn send_tx_failed(&self, _descriptor: &TxDescription, msg: TxFailed) {
            self.calls.lock().push(Call::Failed(msg));
        }
    }

    impl ReceiverGateway for RecordingGateway {
        fn send_invitation_response(&self, _descriptor: &TxDescription, msg: ConfirmInvitation) {
            self.calls.lock().push(Call::Response(msg));
        }

        fn register_tx(&self, _descriptor: &TxDescription, tx: Transaction) {
            self.calls.lock().push(Call::Register(tx));
        }

        fn send_tx_registered(&self, _descriptor: &TxDescription, msg: TxRegistered) {
            self.calls.lock().push(Call::Registered(msg));
        }
    }

    // -- helpers ------------------------------------------------------------

    fn rng() -> StdRng {
        StdRng::seed_from_u64(43)
    }

    /// A sender-side half-session: secrets plus the invitation they
    /// produced, without a full sender machine.
    struct FakeSender {
        secrets: PartySecrets,
        invite: InviteReceiver,
    }

    impl FakeSender {
        fn new(rng: &mut StdRng, amount: Amount, fee: Amount) -> Self {
            let input_amount = amount + fee + 3_800;
            let input_blind = random_blind(rng);
            let change_blind = random_blind(rng);
            let offset = PartySecrets::random_offset(rng);
            let secrets =
                PartySecrets::build(&[input_blind], &[change_blind], Some(&offset), rng);

            let invite = InviteReceiver {
                tx_id: TxId::generate(),
                amount,
                fee,
                min_height: 0,
                sender_public_excess: secrets.public_excess().compress(),
                offset,
                sender_public_nonce: secrets.public_nonce().compress(),
                inputs: vec![Input::new(input_amount, &input_blind)],
                outputs: vec![Output::create(3_800, &change_blind).unwrap()],
            };
            Self { secrets, invite }
        }

        /// Produce the sender's final confirmation for a receiver reply.
        fn confirm(&self, response: &ConfirmInvitation) -> ConfirmTransaction {
            let kernel = Kernel::new(self.invite.fee, self.invite.min_height);
            let receiver_publics = PeerPublics {
                excess: response.peer_public_excess,
                nonce: response.peer_public_nonce,
            };
            let challenge = self
                .secrets
                .verify_peer(
                    &receiver_publics,
                    &response.peer_partial_sig,
                    &kernel.message_hash(),
                )
                .expect("receiver reply must verify");
            ConfirmTransaction {
                tx_id: self.invite.tx_id,
                sender_partial_sig: self.secrets.partial_sign(&challenge),
            }
        }
    }

    fn receiver(
        gateway: &Arc<RecordingGateway>,
        store: &Arc<InMemoryCoinStore>,
        invite: InviteReceiver,
    ) -> ReceiverNegotiation {
        ReceiverNegotiation::new(
            gateway.clone(),
            store.clone(),
            invite,
            2,
            b"inbound".to_vec(),
        )
    }

    // -- transition table ---------------------------------------------------

    #[test]
    fn transition_table_is_exhaustive() {
        use ReceiverState as S;

        let all_states = [
            S::Init,
            S::ConfirmingInvitation,
            S::AwaitingFinalSignature,
            S::RegisteringTx,
            S::AwaitingRegistration,
            S::Completed,
            S::Cancelled,
            S::Failed,
            S::RollbackDone,
        ];

        let confirm = ConfirmTransaction {
            tx_id: TxId::generate(),
            sender_partial_sig: Scalar::ZERO,
        };
        let registered_ok = TxRegistered {
            tx_id: TxId::generate(),
            success: true,
        };
        let registered_bad = TxRegistered {
            tx_id: TxId::generate(),
            success: false,
        };

        let events = [
            ReceiverEvent::InvitationReceived,
            ReceiverEvent::ResponseSent,
            ReceiverEvent::InvitationRejected,
            ReceiverEvent::FinalSignatureReceived(confirm),
            ReceiverEvent::RegistrationSubmitted,
            ReceiverEvent::SignatureRejected,
            ReceiverEvent::RegistrationResult(registered_ok),
            ReceiverEvent::RegistrationResult(registered_bad),
            ReceiverEvent::PeerFailed,
            ReceiverEvent::Cancel,
            ReceiverEvent::RollbackComplete,
        ];

        for state in all_states {
            for event in &events {
                let accepted = transition(state, event).is_some();
                let expected = match (state, event) {
                    (S::Init, ReceiverEvent::InvitationReceived) => true,
                    (S::ConfirmingInvitation, ReceiverEvent::ResponseSent) => true,
                    (S::ConfirmingInvitation, ReceiverEvent::InvitationRejected) => true,
                    (S::AwaitingFinalSignature, ReceiverEvent::FinalSignatureReceived(_)) => true,
                    (S::RegisteringTx, ReceiverEvent::RegistrationSubmitted) => true,
                    (S::RegisteringTx, ReceiverEvent::SignatureRejected) => true,
                    (S::AwaitingRegistration, ReceiverEvent::RegistrationResult(_)) => true,
                    (S::Failed, ReceiverEvent::RollbackComplete) => true,
                    (s, ReceiverEvent::PeerFailed) => !s.is_terminal() && s != S::Failed,
                    (s, ReceiverEvent::Cancel) => s.can_cancel(),
                    _ => false,
                };
                assert_eq!(
                    accepted, expected,
                    "state {:?}, event {} — table disagrees with expected protocol",
                    state,
                    event.name()
                );
            }
        }
    }

    // -- driver -------------------------------------------------------------

    #[test]
    fn accept_builds_output_and_responds() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 200);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        receiver.accept(&mut rng).unwrap();

        assert_eq!(receiver.state(), ReceiverState::AwaitingFinalSignature);
        assert_eq!(receiver.descriptor().status, TxStatus::InProgress);

        let response = gateway.last_response().expect("response sent");
        assert_eq!(response.tx_id, fake_sender.invite.tx_id);

        // The payment output is parked until registration confirms.
        assert_eq!(store.pending_balance(), 6_000);
        assert_eq!(store.spendable_balance(), 0);
    }

    #[test]
    fn low_fee_invitation_rejected_before_signing() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 1);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        let err = receiver.accept(&mut rng).unwrap_err();
        assert!(matches!(err, NegotiationError::FeeTooLow { .. }));
        assert_eq!(receiver.state(), ReceiverState::RollbackDone);
        assert_eq!(receiver.descriptor().status, TxStatus::Failed);

        // No response went out, the sender was told, nothing is pending.
        assert!(gateway.last_response().is_none());
        assert_eq!(gateway.peer_failures(), 1);
        assert_eq!(store.pending_balance(), 0);
    }

    #[test]
    fn valid_final_signature_registers_transaction() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 200);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        receiver.accept(&mut rng).unwrap();
        let response = gateway.last_response().unwrap();
        receiver
            .handle_confirm_transaction(fake_sender.confirm(&response))
            .unwrap();

        assert_eq!(receiver.state(), ReceiverState::AwaitingRegistration);
        assert_eq!(gateway.registrations(), 1);

        // The registered transaction is fully valid ledger-side.
        let tx = gateway.last_registered_tx().unwrap();
        assert!(tx.validate().is_ok());
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.kernel.fee(), 200);
    }

    #[test]
    fn forged_final_signature_fails_without_registration() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 200);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        receiver.accept(&mut rng).unwrap();
        let response = gateway.last_response().unwrap();

        let mut confirm = fake_sender.confirm(&response);
        confirm.sender_partial_sig += Scalar::ONE;

        let err = receiver.handle_confirm_transaction(confirm).unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidPartialSignature));
        assert_eq!(receiver.state(), ReceiverState::RollbackDone);

        // Never registered, pending output discarded, peer notified.
        assert_eq!(gateway.registrations(), 0);
        assert_eq!(store.pending_balance(), 0);
        assert_eq!(gateway.peer_failures(), 1);
    }

    #[test]
    fn ledger_acceptance_completes_and_credits_output() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 200);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        receiver.accept(&mut rng).unwrap();
        let response = gateway.last_response().unwrap();
        receiver
            .handle_confirm_transaction(fake_sender.confirm(&response))
            .unwrap();

        receiver
            .handle_tx_registered(TxRegistered {
                tx_id: receiver.tx_id(),
                success: true,
            })
            .unwrap();

        assert_eq!(receiver.state(), ReceiverState::Completed);
        assert_eq!(receiver.descriptor().status, TxStatus::Completed);
        assert_eq!(store.spendable_balance(), 6_000);
        assert_eq!(store.pending_balance(), 0);
        assert_eq!(gateway.forwarded_verdicts(), 1);
    }

    #[test]
    fn ledger_rejection_rolls_back_and_forwards_verdict() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 200);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        receiver.accept(&mut rng).unwrap();
        let response = gateway.last_response().unwrap();
        receiver
            .handle_confirm_transaction(fake_sender.confirm(&response))
            .unwrap();

        let err = receiver
            .handle_tx_registered(TxRegistered {
                tx_id: receiver.tx_id(),
                success: false,
            })
            .unwrap_err();
        assert!(matches!(err, NegotiationError::RegistrationRejected { .. }));

        assert_eq!(receiver.state(), ReceiverState::RollbackDone);
        assert_eq!(receiver.descriptor().status, TxStatus::Failed);
        assert_eq!(store.spendable_balance(), 0);
        assert_eq!(store.pending_balance(), 0);
        assert_eq!(gateway.forwarded_verdicts(), 1);
    }

    #[test]
    fn peer_failure_discards_pending_output() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 200);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        receiver.accept(&mut rng).unwrap();
        receiver
            .handle_tx_failed(TxFailed {
                tx_id: receiver.tx_id(),
            })
            .unwrap();

        assert_eq!(receiver.state(), ReceiverState::RollbackDone);
        assert_eq!(store.pending_balance(), 0);
    }

    #[test]
    fn replayed_verdict_is_idempotent() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 200);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        receiver.accept(&mut rng).unwrap();
        let response = gateway.last_response().unwrap();
        receiver
            .handle_confirm_transaction(fake_sender.confirm(&response))
            .unwrap();

        let verdict = TxRegistered {
            tx_id: receiver.tx_id(),
            success: true,
        };
        receiver.handle_tx_registered(verdict).unwrap();

        let calls_before = gateway.count();
        let balance_before = store.spendable_balance();

        receiver.handle_tx_registered(verdict).unwrap();
        assert_eq!(receiver.state(), ReceiverState::Completed);
        assert_eq!(gateway.count(), calls_before);
        assert_eq!(store.spendable_balance(), balance_before);
    }

    #[test]
    fn snapshot_restores_mid_flight_machine() {
        let mut rng = rng();
        let gateway = Arc::new(RecordingGateway::default());
        let store = Arc::new(InMemoryCoinStore::new());
        let fake_sender = FakeSender::new(&mut rng, 6_000, 200);
        let mut receiver = receiver(&gateway, &store, fake_sender.invite.clone());

        receiver.accept(&mut rng).unwrap();
        let response = gateway.last_response().unwrap();
        let descriptor = receiver.descriptor().clone();
        drop(receiver);

        let mut restored = ReceiverNegotiation::restore(
            gateway.clone(),
            store.clone(),
            descriptor,
        )
        .unwrap();
        assert_eq!(restored.state(), ReceiverState::AwaitingFinalSignature);

        restored
            .handle_confirm_transaction(fake_sender.confirm(&response))
            .unwrap();
        assert_eq!(restored.state(), ReceiverState::AwaitingRegistration);
        assert_eq!(gateway.registrations(), 1);
    }
}
