//! # Transaction Model
//!
//! The vocabulary of everything the negotiation protocol produces:
//!
//! ```text
//! types.rs   — TxId, Amount, Input, Output, and the full Transaction
//! kernel.rs  — the kernel: fee, lock height, excess, combined signature
//! ```
//!
//! A finished transaction is `{offset, inputs, outputs, kernel}`. The
//! amounts are invisible; validity is the conjunction of three checks:
//!
//! 1. every output's range proof verifies,
//! 2. the kernel signature verifies under the kernel excess,
//! 3. `sum(inputs) - sum(outputs) - fee*H == excess + offset*G`.
//!
//! Check 3 is the Pedersen homomorphism doing all the work: it holds
//! exactly when the hidden amounts balance AND the excess point matches
//! the blinding arithmetic both parties performed. Nothing else about
//! ledger consensus lives in this crate.

pub mod kernel;
pub mod types;

pub use kernel::Kernel;
pub use types::{Amount, DisplayAmount, Input, Output, Transaction, TransactionError, TxId};
