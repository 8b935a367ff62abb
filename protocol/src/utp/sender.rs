//! The sender state machine.
//!
//! The sender initiates: it reserves coins, builds its inputs and change
//! output, publishes its public excess and nonce, and then walks the
//! message exchange to completion or rolls everything back.
//!
//! The machine is split in two layers:
//!
//! - [`transition`] — a pure function `(State, Event) -> (State, [Action])`.
//!   No I/O, no secrets, exhaustively testable over the whole
//!   state/event product. Events it doesn't accept are dropped, which is
//!   also what makes replayed messages harmless.
//! - [`SenderNegotiation`] — the driver. Owns the secrets, the kernel,
//!   and the descriptor; executes the actions the table emits against
//!   the [`SenderGateway`] and the [`CoinStore`].
//!
//! Coins reserved at initiation are released on every path that does not
//! end in `Completed`, and the release is idempotent — a rollback that
//! runs twice must not double-credit the wallet.

use std::sync::Arc;

use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::transaction::kernel::Kernel;
use crate::transaction::types::{Amount, Input, Output, TxId};
use crate::utp::descriptor::{TxDescription, TxStatus};
use crate::utp::error::NegotiationError;
use crate::utp::gateway::SenderGateway;
use crate::utp::messages::{ConfirmInvitation, ConfirmTransaction, InviteReceiver, TxFailed, TxRegistered};
use crate::utp::party::{PartySecrets, PeerPublics};
use crate::vault::{Coin, CoinStore};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Sender-side negotiation states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderState {
    /// Created, nothing done yet.
    Init,
    /// Reserving coins and building the invitation.
    InitiatingTx,
    /// Invitation sent; waiting for the receiver's contribution.
    AwaitingConfirmation,
    /// Verifying the receiver's partial signature and producing our own.
    FinalizingSignature,
    /// Our partial signature is out; waiting for the ledger's verdict.
    AwaitingRegistration,
    /// Terminal: transaction registered, outputs confirmed.
    Completed,
    /// Terminal: locally cancelled before our signature left.
    Cancelled,
    /// Something went fatally wrong; rollback in progress.
    Failed,
    /// Terminal: rollback finished.
    RollbackDone,
}

impl SenderState {
    /// Fully terminal states — nothing further can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::RollbackDone)
    }

    /// `Failed` and its terminal `RollbackDone`.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed | Self::RollbackDone)
    }

    /// Cancellation window: open until our partial signature is sent.
    /// After that the receiver can complete the transaction without us,
    /// so "cancelled" would be a lie.
    pub fn can_cancel(self) -> bool {
        matches!(self, Self::Init | Self::InitiatingTx | Self::AwaitingConfirmation)
    }

    /// The operator-visible status this state maps to.
    pub fn status(self) -> TxStatus {
        match self {
            Self::Init => TxStatus::Pending,
            Self::InitiatingTx
            | Self::AwaitingConfirmation
            | Self::FinalizingSignature
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

/// Everything that can happen to a sender machine. External events come
/// from the transport or the local user; internal events report the
/// outcome of executed actions.
#[derive(Clone, Debug)]
pub enum SenderEvent {
    /// Local user starts the negotiation.
    Start,
    /// Internal: the invitation went out.
    InvitationSent,
    /// Internal: initiation failed before anything was sent.
    InitiationFailed,
    /// The receiver's contribution arrived.
    ConfirmationReceived(ConfirmInvitation),
    /// Internal: peer verified, our partial signature sent.
    SignatureFinalized,
    /// Internal: peer's partial signature did not verify.
    SignatureRejected,
    /// The ledger's verdict, forwarded by the receiver.
    RegistrationResult(TxRegistered),
    /// The peer failed or the transport timed out.
    PeerFailed,
    /// Local user cancels.
    Cancel,
    /// Internal: rollback actions have run.
    RollbackComplete,
}

impl SenderEvent {
    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::InvitationSent => "InvitationSent",
            Self::InitiationFailed => "InitiationFailed",
            Self::ConfirmationReceived(_) => "ConfirmationReceived",
            Self::SignatureFinalized => "SignatureFinalized",
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
pub enum SenderAction {
    /// Reserve coins, build the invitation, send it. The only action that
    /// consumes randomness, so the driver runs it inside `start`.
    BuildAndSendInvitation,
    /// Verify the receiver's partial signature; on success co-sign and
    /// send `ConfirmTransaction`.
    VerifyAndCoSign(ConfirmInvitation),
    /// Mark reserved coins spent and promote the pending change output
    /// to spendable.
    ConfirmChangeOutput,
    /// Tell the host wallet the negotiation completed.
    NotifyCompleted,
    /// Release reserved coins and discard pending outputs. Idempotent.
    ReleaseFunds,
    /// Tell the peer the negotiation is dead.
    NotifyPeerFailed,
}

// ---------------------------------------------------------------------------
// Transition function
// ---------------------------------------------------------------------------

/// The pure sender transition table.
///
/// Returns `None` for any (state, event) pair the protocol does not
/// accept — the driver drops such events with a log line and no state
/// change. That single rule covers replay idempotence, late messages to
/// terminal machines, and out-of-order delivery.
pub fn transition(
    state: SenderState,
    event: &SenderEvent,
) -> Option<(SenderState, Vec<SenderAction>)> {
    use SenderAction as A;
    use SenderEvent as E;
    use SenderState as S;

    match (state, event) {
        (S::Init, E::Start) => Some((S::InitiatingTx, vec![A::BuildAndSendInvitation])),

        (S::InitiatingTx, E::InvitationSent) => Some((S::AwaitingConfirmation, vec![])),
        (S::InitiatingTx, E::InitiationFailed) => Some((S::Failed, vec![A::ReleaseFunds])),

        (S::AwaitingConfirmation, E::ConfirmationReceived(msg)) => Some((
            S::FinalizingSignature,
            vec![A::VerifyAndCoSign(msg.clone())],
        )),

        (S::FinalizingSignature, E::SignatureFinalized) => Some((S::AwaitingRegistration, vec![])),
        (S::FinalizingSignature, E::SignatureRejected) => Some((
            S::Failed,
            vec![A::ReleaseFunds, A::NotifyPeerFailed],
        )),

        (S::AwaitingRegistration, E::RegistrationResult(r)) if r.success => Some((
            S::Completed,
            vec![A::ConfirmChangeOutput, A::NotifyCompleted],
        )),
        (S::AwaitingRegistration, E::RegistrationResult(_)) => {
            Some((S::Failed, vec![A::ReleaseFunds]))
        }

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

/// Serialized form of a mid-flight sender machine, stored in the
/// descriptor's `fsm_snapshot`.
#[derive(Serialize, Deserialize)]
struct SenderSnapshot {
    state: SenderState,
    secrets: Option<PartySecrets>,
    kernel: Kernel,
    offset: Scalar,
}

/// Drives one negotiation from the sender's side.
pub struct SenderNegotiation {
    gateway: Arc<dyn SenderGateway>,
    store: Arc<dyn CoinStore>,
    descriptor: TxDescription,
    state: SenderState,
    secrets: Option<PartySecrets>,
    kernel: Kernel,
    offset: Scalar,
}

impl std::fmt::Debug for SenderNegotiation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderNegotiation")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state)
            .field("kernel", &self.kernel)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl SenderNegotiation {
    /// Create a sender negotiation in `Init`. Nothing happens until
    /// [`start`](Self::start).
    pub fn new(
        gateway: Arc<dyn SenderGateway>,
        store: Arc<dyn CoinStore>,
        amount: Amount,
        fee: Amount,
        min_height: u64,
        peer_id: u64,
        message: Vec<u8>,
    ) -> Self {
        let tx_id = TxId::generate();
        let kernel = Kernel::new(fee, min_height);
        let descriptor = TxDescription::new(tx_id, amount, fee, peer_id, message, true);
        Self {
            gateway,
            store,
            descriptor,
            state: SenderState::Init,
            secrets: None,
            kernel,
            offset: Scalar::ZERO,
        }
    }

    /// Restore a mid-flight machine from its persisted descriptor.
    pub fn restore(
        gateway: Arc<dyn SenderGateway>,
        store: Arc<dyn CoinStore>,
        descriptor: TxDescription,
    ) -> Result<Self, NegotiationError> {
        let snapshot: SenderSnapshot = bincode::deserialize(&descriptor.fsm_snapshot)
            .map_err(|e| NegotiationError::SnapshotDecode(e.to_string()))?;
        Ok(Self {
            gateway,
            store,
            descriptor,
            state: snapshot.state,
            secrets: snapshot.secrets,
            kernel: snapshot.kernel,
            offset: snapshot.offset,
        })
    }

    /// The negotiation this machine drives.
    pub fn tx_id(&self) -> TxId {
        self.descriptor.tx_id
    }

    /// Current machine state.
    pub fn state(&self) -> SenderState {
        self.state
    }

    /// The durable record, snapshot included.
    pub fn descriptor(&self) -> &TxDescription {
        &self.descriptor
    }

    // -- external events ----------------------------------------------------

    /// Kick off the negotiation: reserve coins, build inputs and change,
    /// publish the invitation.
    ///
    /// On error the machine is in `Failed` (rollback already done) and
    /// nothing reached the peer.
    pub fn start<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), NegotiationError> {
        let Some(actions) = self.step(&SenderEvent::Start) else {
            return Ok(());
        };
        debug_assert_eq!(actions, vec![SenderAction::BuildAndSendInvitation]);

        match self.build_and_send_invitation(rng) {
            Ok(()) => self.advance(SenderEvent::InvitationSent),
            Err(err) => {
                self.advance(SenderEvent::InitiationFailed)?;
                Err(err)
            }
        }
    }

    /// Feed the receiver's `ConfirmInvitation` reply.
    ///
    /// On a bad signature the machine ends in `Failed` with coins
    /// released and the peer notified; the verification error is
    /// returned.
    pub fn handle_confirm_invitation(
        &mut self,
        msg: ConfirmInvitation,
    ) -> Result<(), NegotiationError> {
        if !self.correlates(msg.tx_id) {
            return Ok(());
        }
        self.advance(SenderEvent::ConfirmationReceived(msg))
    }

    /// Feed the ledger's verdict, forwarded by the receiver.
    ///
    /// A rejection is fatal: the machine rolls back and
    /// [`NegotiationError::RegistrationRejected`] is returned. Replays
    /// into a terminal state are dropped silently.
    pub fn handle_tx_registered(&mut self, msg: TxRegistered) -> Result<(), NegotiationError> {
        if !self.correlates(msg.tx_id) {
            return Ok(());
        }
        let success = msg.success;
        let Some(actions) = self.step(&SenderEvent::RegistrationResult(msg)) else {
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
        self.advance(SenderEvent::PeerFailed)
    }

    /// The transport gave up waiting for the peer. Same terminal event as
    /// an explicit `TxFailed`.
    pub fn peer_timed_out(&mut self) -> Result<(), NegotiationError> {
        self.advance(SenderEvent::PeerFailed)
    }

    /// Cancel locally. A no-op once the cancellation window has closed.
    pub fn cancel(&mut self) -> Result<(), NegotiationError> {
        self.advance(SenderEvent::Cancel)
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

    /// Run the pure transition, update state + descriptor, return the
    /// actions. `None` means the event was dropped.
    fn step(&mut self, event: &SenderEvent) -> Option<Vec<SenderAction>> {
        match transition(self.state, event) {
            Some((next, actions)) => {
                tracing::info!(
                    tx_id = %self.descriptor.tx_id,
                    from = ?self.state,
                    to = ?next,
                    event = event.name(),
                    "sender transition"
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

    fn advance(&mut self, event: SenderEvent) -> Result<(), NegotiationError> {
        match self.step(&event) {
            Some(actions) => self.run_actions(actions),
            None => Ok(()),
        }
    }

    fn run_actions(&mut self, actions: Vec<SenderAction>) -> Result<(), NegotiationError> {
        let mut result = Ok(());
        for action in actions {
            match action {
                SenderAction::BuildAndSendInvitation => {
                    // Needs randomness; only reachable through `start`.
                    tracing::warn!(
                        tx_id = %self.descriptor.tx_id,
                        "BuildAndSendInvitation outside start, ignoring"
                    );
                }
                SenderAction::VerifyAndCoSign(msg) => match self.verify_and_cosign(&msg) {
                    Ok(()) => self.advance(SenderEvent::SignatureFinalized)?,
                    Err(err) => {
                        self.advance(SenderEvent::SignatureRejected)?;
                        result = Err(err);
                    }
                },
                SenderAction::ConfirmChangeOutput => {
                    self.store.mark_spent(self.descriptor.tx_id);
                    self.store.confirm_pending(self.descriptor.tx_id);
                }
                SenderAction::NotifyCompleted => {
                    self.gateway.on_tx_completed(&self.descriptor);
                }
                SenderAction::ReleaseFunds => {
                    self.store.release(self.descriptor.tx_id);
                    self.store.discard_pending(self.descriptor.tx_id);
                }
                SenderAction::NotifyPeerFailed => {
                    self.gateway.send_tx_failed(
                        &self.descriptor,
                        TxFailed {
                            tx_id: self.descriptor.tx_id,
                        },
                    );
                }
            }
        }
        // Rollback runs synchronously, so a machine that lands in
        // `Failed` finishes its rollback before control returns.
        if self.state == SenderState::Failed {
            if let Some(more) = self.step(&SenderEvent::RollbackComplete) {
                self.run_actions(more)?;
            }
        }
        result
    }

    fn build_and_send_invitation<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<(), NegotiationError> {
        let tx_id = self.descriptor.tx_id;
        let amount = self.descriptor.amount;
        let fee = self.descriptor.fee;

        if amount < config::DUST_LIMIT {
            return Err(NegotiationError::DustAmount { amount });
        }

        let coins = self.store.reserve(tx_id, amount + fee)?;

        let total: Amount = coins.iter().map(|c| c.amount).sum();
        let change = total - amount - fee;

        // Final shape: our inputs, our change (if any), the receiver's
        // output. The fee must cover all of it.
        let output_count = if change > 0 { 2 } else { 1 };
        let minimum = config::minimum_fee(coins.len(), output_count);
        if fee < minimum {
            return Err(NegotiationError::FeeTooLow { fee, minimum });
        }

        let inputs: Vec<Input> = coins
            .iter()
            .map(|c| Input::new(c.amount, &c.blinding))
            .collect();
        let input_blinds: Vec<Scalar> = coins.iter().map(|c| c.blinding).collect();

        let mut outputs = Vec::new();
        let mut output_blinds = Vec::new();
        if change > 0 {
            let change_coin = Coin::new(change, rng);
            outputs.push(Output::create(change, &change_coin.blinding)?);
            output_blinds.push(change_coin.blinding);
            self.store.add_pending(tx_id, change_coin);
        }

        let offset = PartySecrets::random_offset(rng);
        let secrets = PartySecrets::build(&input_blinds, &output_blinds, Some(&offset), rng);

        let invite = InviteReceiver {
            tx_id,
            amount,
            fee,
            min_height: self.kernel.min_height(),
            sender_public_excess: secrets.public_excess().compress(),
            offset,
            sender_public_nonce: secrets.public_nonce().compress(),
            inputs,
            outputs,
        };

        self.offset = offset;
        self.secrets = Some(secrets);

        tracing::info!(
            tx_id = %tx_id,
            amount,
            fee,
            change,
            inputs = coins.len(),
            "sending transaction invitation"
        );
        self.gateway.send_tx_invitation(&self.descriptor, invite);
        Ok(())
    }

    fn verify_and_cosign(&mut self, msg: &ConfirmInvitation) -> Result<(), NegotiationError> {
        let secrets = self.secrets.as_ref().ok_or(NegotiationError::MissingSecrets)?;
        let peer = PeerPublics {
            excess: msg.peer_public_excess,
            nonce: msg.peer_public_nonce,
        };

        let message = self.kernel.message_hash();
        let challenge = secrets.verify_peer(&peer, &msg.peer_partial_sig, &message)?;
        tracing::debug!(tx_id = %self.descriptor.tx_id, "receiver partial signature verified");

        let own_partial = secrets.partial_sign(&challenge);
        self.gateway.send_tx_confirmation(
            &self.descriptor,
            ConfirmTransaction {
                tx_id: self.descriptor.tx_id,
                sender_partial_sig: own_partial,
            },
        );
        Ok(())
    }

    fn snapshot_bytes(&self) -> Vec<u8> {
        bincode::serialize(&SenderSnapshot {
            state: self.state,
            secrets: self.secrets.clone(),
            kernel: self.kernel.clone(),
            offset: self.offset,
        })
        .expect("sender snapshot serialization must not fail")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
