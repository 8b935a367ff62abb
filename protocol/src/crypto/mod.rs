//! # Cryptographic Primitives for Umbra
//!
//! This module is the foundation of everything security-related in the
//! protocol. Every commitment, every co-signed kernel, every published
//! curve point flows through here.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **Ristretto over Curve25519** for the group — prime order, no cofactor
//!   footguns, and the dalek implementation has survived years of scrutiny.
//! - **Pedersen commitments** for hiding amounts — perfectly hiding,
//!   computationally binding, and additively homomorphic, which is the
//!   entire trick MimbleWimble-style ledgers are built on.
//! - **Bulletproofs** for range proofs — we do not roll our own.
//! - **SHA-256** for challenge hashing — both parties must derive the same
//!   challenge from the same bytes, so we use the most boring hash alive.
//!
//! ## A note on "rolling your own crypto"
//!
//! The co-signing module implements a textbook two-party Schnorr flow on
//! top of dalek's group operations. That is protocol composition, not
//! primitive design. If you're tempted to optimize the scalar arithmetic
//! in there, please reconsider. Then reconsider again. Then go read about
//! nonce-reuse attacks and come back when you've lost the urge.

pub mod commitment;
pub mod cosign;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy.
pub use commitment::{aggregate_excess, commit, derive_public, CommitmentError};
pub use cosign::{CosignError, Signature};
