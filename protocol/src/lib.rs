// Copyright (c) 2026 Umbra Labs. MIT License.
// See LICENSE for details.

//! # Umbra Protocol — Core Library
//!
//! This is the beating heart of Umbra: a confidential-transaction ledger
//! where two parties build every payment together and nobody — not the
//! peer, not the ledger, not the person reading the block explorer —
//! learns the amounts involved.
//!
//! Umbra takes a pragmatic stance: Pedersen commitments over Ristretto
//! (because the arithmetic has to be boring for the privacy to be
//! interesting), Bulletproofs for range proofs (because we're not rolling
//! our own), and a two-party Schnorr co-signature over the kernel
//! (because a transaction both parties signed is a transaction neither
//! can disown).
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! negotiating wallet:
//!
//! - **crypto** — Commitments and co-signing. Don't roll your own.
//! - **transaction** — Inputs, outputs, kernels, and the balance check.
//! - **utp** — The Umbra Transfer Protocol: messages, state machines,
//!   descriptors, and the gateway boundary. The negotiation lives here.
//! - **vault** — Coins and the reservation discipline that keeps two
//!   negotiations from spending the same coin.
//! - **config** — Protocol constants and the fee policy.
//!
//! ## Design Philosophy
//!
//! 1. Correctness over performance (but we're still fast).
//! 2. No unsafe code in crypto paths — we sleep at night.
//! 3. A failed signature check ends the negotiation. No retries, ever —
//!    retrying with a reused nonce is how private keys end up on
//!    pastebin.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod transaction;
pub mod utp;
pub mod vault;
