//! # CLI Interface
//!
//! Defines the command-line argument structure for `umbra-wallet` using
//! `clap` derive. Supports two subcommands: `demo` and `version`.

use clap::{Parser, Subcommand};

/// Umbra wallet.
///
/// Drives confidential-transaction negotiations over the Umbra Transfer
/// Protocol. The `demo` subcommand runs a complete two-party negotiation
/// in-process against a stub ledger — useful for kicking the tires
/// without a network.
#[derive(Parser, Debug)]
#[command(
    name = "umbra-wallet",
    about = "Umbra confidential-transaction wallet",
    version,
    propagate_version = true
)]
pub struct UmbraWalletCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the wallet binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a local two-party negotiation end to end.
    Demo(DemoArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `demo` subcommand. All values are in whole coins.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Spendable funds the sender wallet starts with.
    #[arg(long, default_value_t = 100)]
    pub funds: u64,

    /// Amount to pay the receiver.
    #[arg(long, default_value_t = 60)]
    pub amount: u64,

    /// Transaction fee.
    #[arg(long, default_value_t = 2)]
    pub fee: u64,

    /// Log output format: "pretty" or "json".
    #[arg(long, default_value = "pretty", env = "UMBRA_LOG_FORMAT")]
    pub log_format: String,
}
