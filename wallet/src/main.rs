// Copyright (c) 2026 Umbra Labs. MIT License.
// See LICENSE for details.

//! # Umbra Wallet
//!
//! Entry point for the `umbra-wallet` binary. Parses CLI arguments,
//! initializes logging, and runs the requested command.
//!
//! The binary supports two subcommands:
//!
//! - `demo`    — run a complete two-party negotiation in-process
//! - `version` — print build version information

mod cli;
mod logging;
mod loopback;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::OsRng;

use umbra_protocol::config;
use umbra_protocol::transaction::types::DisplayAmount;
use umbra_protocol::utp::{ReceiverNegotiation, SenderNegotiation, TxRegistered};
use umbra_protocol::vault::{Coin, CoinStore, InMemoryCoinStore};

use cli::{Commands, DemoArgs, UmbraWalletCli};
use logging::LogFormat;
use loopback::LoopbackGateway;

fn main() -> Result<()> {
    let cli = UmbraWalletCli::parse();

    match cli.command {
        Commands::Demo(args) => run_demo(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs a full sender/receiver negotiation against an in-process stub
/// ledger and prints where the money ended up.
fn run_demo(args: DemoArgs) -> Result<()> {
    logging::init_logging(
        "umbra_wallet=info,umbra_protocol=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let funds = args.funds * config::COIN;
    let amount = args.amount * config::COIN;
    let fee = args.fee * config::COIN;

    tracing::info!(
        funds = %DisplayAmount(funds),
        amount = %DisplayAmount(amount),
        fee = %DisplayAmount(fee),
        "starting demo negotiation"
    );

    let gateway = Arc::new(LoopbackGateway::default());
    let sender_store = Arc::new(InMemoryCoinStore::new());
    let receiver_store = Arc::new(InMemoryCoinStore::new());
    sender_store.deposit(Coin::new(funds, &mut OsRng));

    // --- Sender opens the negotiation ---
    let mut sender = SenderNegotiation::new(
        gateway.clone(),
        sender_store.clone(),
        amount,
        fee,
        0,
        1,
        b"umbra-wallet demo".to_vec(),
    );
    sender
        .start(&mut OsRng)
        .context("sender failed to initiate the negotiation")?;
    let invite = gateway
        .pop_invitation()
        .context("sender emitted no invitation")?;

    // --- Receiver answers ---
    let mut receiver = ReceiverNegotiation::new(
        gateway.clone(),
        receiver_store.clone(),
        invite,
        1,
        b"umbra-wallet demo".to_vec(),
    );
    receiver
        .accept(&mut OsRng)
        .context("receiver rejected the invitation")?;
    let response = gateway
        .pop_response()
        .context("receiver emitted no response")?;

    // --- Sender verifies and co-signs ---
    sender
        .handle_confirm_invitation(response)
        .context("sender rejected the receiver's contribution")?;
    let confirmation = gateway
        .pop_confirmation()
        .context("sender emitted no confirmation")?;

    // --- Receiver combines signatures and registers ---
    receiver
        .handle_confirm_transaction(confirmation)
        .context("receiver rejected the sender's signature")?;
    let tx = gateway
        .pop_registration()
        .context("receiver registered no transaction")?;

    // --- Stub ledger: stateless validation is the whole consensus ---
    let success = match tx.validate() {
        Ok(()) => {
            tracing::info!("ledger accepted the transaction");
            true
        }
        Err(err) => {
            tracing::error!(%err, "ledger rejected the transaction");
            false
        }
    };

    receiver.handle_tx_registered(TxRegistered {
        tx_id: receiver.tx_id(),
        success,
    })?;
    let verdict = gateway
        .pop_verdict()
        .context("receiver forwarded no verdict")?;
    sender.handle_tx_registered(verdict)?;

    println!("negotiation {}", sender.tx_id());
    println!("  sender:   {}", sender.descriptor().status);
    println!("  receiver: {}", receiver.descriptor().status);
    println!(
        "  sender balance:   {}",
        DisplayAmount(sender_store.spendable_balance())
    );
    println!(
        "  receiver balance: {}",
        DisplayAmount(receiver_store.spendable_balance())
    );
    println!("  fee paid:         {}", DisplayAmount(fee));
    Ok(())
}

fn print_version() {
    println!(
        "umbra-wallet {} (protocol {})",
        env!("CARGO_PKG_VERSION"),
        config::PROTOCOL_VERSION
    );
}
