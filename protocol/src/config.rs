//! # Protocol Configuration & Constants
//!
//! Every magic number in Umbra lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These values define the shape of every transaction the protocol will
//! ever negotiate. Changing them after launch is somewhere between
//! "difficult" and "career-ending", so choose wisely during devnet.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Major version — bump on breaking changes to the negotiation flow.
/// Peers with mismatched majors cannot co-sign a kernel.
pub const PROTOCOL_VERSION_MAJOR: u16 = 0;

/// Minor version — bump on backward-compatible additions.
pub const PROTOCOL_VERSION_MINOR: u16 = 1;

/// The full version string, assembled by hand so we don't allocate for
/// something this trivial at runtime.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// The group everything lives in: Ristretto over Curve25519. Prime order,
/// no cofactor headaches, and the dalek implementation has been audited
/// more times than we've had production incidents.
pub const GROUP: &str = "ristretto255";

/// Transaction identifier length in bytes. 16 random bytes (a UUID's worth)
/// is collision-proof for any realistic number of concurrent negotiations.
pub const TX_ID_LENGTH: usize = 16;

/// Compressed Ristretto point length. Always 32 bytes.
pub const POINT_LENGTH: usize = 32;

/// Scalar length in bytes. Also 32. The symmetry is not a coincidence.
pub const SCALAR_LENGTH: usize = 32;

/// Bit length of the range proved for every output amount. 64 bits covers
/// the full `u64` amount space; Bulletproofs only accepts 8/16/32/64 here.
pub const RANGE_PROOF_BITS: usize = 64;

/// Policy ceiling on any single output amount, well below 2^64 so that
/// sums of outputs cannot overflow during fee arithmetic. Roughly 1.15e18
/// base units — if you need more than that in one output, you ARE the
/// ledger and should know better.
pub const MAX_AMOUNT: u64 = 1 << 60;

// ---------------------------------------------------------------------------
// Amounts & Denominations
// ---------------------------------------------------------------------------

/// Base units per whole coin. 8 decimals, same as Bitcoin. We're not
/// reinventing this wheel.
pub const COIN: u64 = 100_000_000;

/// Number of decimal places, for display formatting only. The protocol
/// itself never divides — all arithmetic is integer base units.
pub const AMOUNT_DECIMALS: u32 = 8;

/// Outputs below this are rejected at construction time. Dust outputs
/// bloat the UTXO set forever while carrying value nobody will ever
/// bother to spend.
pub const DUST_LIMIT: u64 = 100;

// ---------------------------------------------------------------------------
// Fee & Weight Policy
// ---------------------------------------------------------------------------

/// Weight contributed by each input. Inputs are a single commitment, so
/// they're cheap.
pub const INPUT_WEIGHT: u64 = 1;

/// Weight contributed by each output. An output carries a commitment plus
/// a ~700-byte range proof, hence the 4x multiplier over inputs.
pub const OUTPUT_WEIGHT: u64 = 4;

/// Weight contributed by the kernel (excess point + signature).
pub const KERNEL_WEIGHT: u64 = 1;

/// Minimum fee per weight unit, in base units. Low enough to be basically
/// free, high enough that spamming the mempool costs real money.
pub const FEE_PER_WEIGHT_UNIT: u64 = 10;

/// Total weight of a transaction with the given shape. Every negotiated
/// transaction carries exactly one kernel.
pub fn tx_weight(inputs: usize, outputs: usize) -> u64 {
    INPUT_WEIGHT * inputs as u64 + OUTPUT_WEIGHT * outputs as u64 + KERNEL_WEIGHT
}

/// Minimum acceptable fee for a transaction with the given shape. Both
/// parties enforce this before signing anything; a sender offering less
/// never gets a reply worth having.
pub fn minimum_fee(inputs: usize, outputs: usize) -> u64 {
    FEE_PER_WEIGHT_UNIT * tx_weight(inputs, outputs)
}
