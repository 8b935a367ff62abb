//! # Umbra Transfer Protocol (UTP)
//!
//! The UTP module implements the interactive flow in which a sender and
//! a receiver cooperatively construct one confidential transaction.
//! Neither party ever learns the other's blinding factors; the finished
//! kernel carries a joint Schnorr signature that proves the transaction
//! balances without revealing a single amount.
//!
//! ## The Flow
//!
//! ```text
//!   ┌──────────┐                                  ┌──────────┐
//!   │  Sender  │                                  │ Receiver │
//!   └────┬─────┘                                  └────┬─────┘
//!        │                                             │
//!        │  1. InviteReceiver (terms, inputs,          │
//!        │     change, excess, nonce, offset)          │
//!        ├────────────────────────────────────────────►│
//!        │                                             │
//!        │  2. ConfirmInvitation (excess, nonce,       │
//!        │     receiver partial signature)             │
//!        │◄────────────────────────────────────────────┤
//!        │                                             │
//!        │  3. ConfirmTransaction (sender              │
//!        │     partial signature)                      │
//!        ├────────────────────────────────────────────►│
//!        │                                             │
//!        │             4. register_tx ──► LEDGER       │
//!        │                                             │
//!        │  5. TxRegistered (ledger verdict)           │
//!        │◄────────────────────────────────────────────┤
//!        │                                             │
//! ```
//!
//! ### Step 1 — Invitation (`sender.rs`)
//! The sender reserves coins covering `amount + fee`, builds inputs and a
//! change output, derives its blinding excess (minus a random public
//! offset), samples a nonce, and publishes everything the receiver needs.
//!
//! ### Step 2 — Confirmation (`receiver.rs`)
//! The receiver builds the output that will hold the payment, derives its
//! own excess and nonce, computes the shared challenge, and signs first.
//!
//! ### Step 3 — Co-signature (`sender.rs`)
//! The sender verifies the receiver's partial signature — a failed check
//! kills the negotiation, no second chances — and answers with its own.
//!
//! ### Steps 4–5 — Registration (`receiver.rs`)
//! The receiver combines both halves into the kernel signature, assembles
//! the full transaction, and submits it. The ledger's verdict is
//! forwarded to the sender, and both sides finish in `Completed` — or
//! roll back their reserved coins and pending outputs.
//!
//! ## Recovery
//!
//! Every transition updates the negotiation's [`TxDescription`],
//! including a serialized snapshot of the state machine (secrets and
//! all). A process restart rebuilds the machine from the descriptor with
//! [`SenderNegotiation::restore`] / [`ReceiverNegotiation::restore`] and
//! picks up where it left off. Waiting for the peer is the only
//! suspension point; the transport's timeout is fed in as a peer-failure
//! event.

pub mod descriptor;
pub mod gateway;
pub mod messages;
pub mod party;
pub mod receiver;
pub mod sender;

mod error;

pub use descriptor::{TxDescription, TxStatus};
pub use error::NegotiationError;
pub use gateway::{ReceiverGateway, SenderGateway, WalletGateway};
pub use messages::{ConfirmInvitation, ConfirmTransaction, InviteReceiver, TxFailed, TxRegistered};
pub use party::{PartySecrets, PeerPublics};
pub use receiver::{ReceiverNegotiation, ReceiverState};
pub use sender::{SenderNegotiation, SenderState};
