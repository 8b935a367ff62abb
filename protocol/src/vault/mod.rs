//! # Vault Module — Coins & Reservation Discipline
//!
//! The vault is where money lives between negotiations. Every spendable
//! coin, every mid-negotiation reservation, every not-yet-confirmed
//! output passes through here. If the `utp` module is the nervous system,
//! the vault is the circulatory system — it moves value around and keeps
//! the books straight.
//!
//! ## The one rule
//!
//! A coin selected for a negotiation's inputs belongs to that negotiation
//! until the negotiation ends, and to nobody else. Reservation is atomic
//! (no two negotiations can grab the same coin), release happens exactly
//! once, and releasing twice is a harmless no-op rather than a
//! double-credit. Everything else in this module is bookkeeping around
//! that rule.
//!
//! ## Ownership
//!
//! The store sits behind the [`CoinStore`] trait: the state machines
//! talk to it through that boundary and never hold coins themselves. The in-memory implementation here is what the tests
//! and the demo wallet run against; a durable backend implements the same
//! trait.

pub mod coins;

pub use coins::{Coin, CoinStore, InMemoryCoinStore, VaultError};
