//! Coins, the store interface, and the in-memory store.
//!
//! A [`Coin`] is an amount plus the blinding factor that opens its
//! on-ledger commitment. Whoever knows the blinding factor owns the coin;
//! losing it means the value is gone forever, which is why pending
//! outputs are parked in the store before the transaction is even
//! registered.
//!
//! Coins move through three buckets:
//!
//! ```text
//! spendable --reserve--> reserved --mark_spent--> (gone)
//!     ^                     |
//!     +------release--------+
//!
//! (new) --add_pending--> pending --confirm_pending--> spendable
//!                           |
//!                           +--discard_pending--> (gone)
//! ```

use std::collections::HashMap;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use parking_lot::Mutex;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::commitment;
use crate::transaction::types::{Amount, TxId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from coin store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    /// Not enough spendable value to cover the request. Nothing was
    /// reserved.
    #[error("insufficient spendable funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the caller asked for.
        required: Amount,
        /// Total spendable value at the time of the call.
        available: Amount,
    },

    /// The negotiation already holds a reservation. One reservation per
    /// `TxId`, no topping up.
    #[error("negotiation {tx_id} already holds a reservation")]
    ReservationExists {
        /// The offending negotiation.
        tx_id: TxId,
    },
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// A spendable coin: an amount and the blinding factor opening its
/// commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Store-local identifier, for bookkeeping and logs only.
    pub id: Uuid,
    /// The coin's value in base units.
    pub amount: Amount,
    /// The blinding factor. Secret — this IS ownership.
    pub blinding: Scalar,
}

impl Coin {
    /// Mint a coin with a fresh random blinding factor.
    pub fn new<R: RngCore + CryptoRng>(amount: Amount, rng: &mut R) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            blinding: commitment::random_blind(rng),
        }
    }

    /// The coin's on-ledger commitment.
    pub fn commitment(&self) -> RistrettoPoint {
        commitment::commit(self.amount, &self.blinding)
    }
}

// ---------------------------------------------------------------------------
// CoinStore
// ---------------------------------------------------------------------------

/// The storage boundary the state machines depend on.
///
/// Implementations must make [`reserve`](CoinStore::reserve) atomic with
/// respect to concurrent negotiations and must tolerate repeated
/// `release`/`confirm_pending`/`discard_pending` calls for the same
/// negotiation — rollback paths may run more than once.
pub trait CoinStore: Send + Sync {
    /// Add a spendable coin (funding, or a confirmed inbound payment).
    fn deposit(&self, coin: Coin);

    /// Atomically select and reserve spendable coins whose total covers
    /// `target`. On error, nothing is reserved.
    fn reserve(&self, tx_id: TxId, target: Amount) -> Result<Vec<Coin>, VaultError>;

    /// Return a negotiation's reserved coins to the spendable pool.
    /// Idempotent.
    fn release(&self, tx_id: TxId);

    /// Forget a negotiation's reserved coins — they are now spent on the
    /// ledger. Idempotent.
    fn mark_spent(&self, tx_id: TxId);

    /// Park a newly created output coin until its transaction registers.
    fn add_pending(&self, tx_id: TxId, coin: Coin);

    /// Promote a negotiation's pending coins to spendable. Idempotent.
    fn confirm_pending(&self, tx_id: TxId);

    /// Drop a negotiation's pending coins (rollback). Idempotent.
    fn discard_pending(&self, tx_id: TxId);

    /// Total spendable value.
    fn spendable_balance(&self) -> Amount;

    /// Total value currently reserved across all negotiations.
    fn reserved_balance(&self) -> Amount;

    /// Total value parked as pending outputs.
    fn pending_balance(&self) -> Amount;
}

// ---------------------------------------------------------------------------
// InMemoryCoinStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Buckets {
    spendable: Vec<Coin>,
    reserved: HashMap<TxId, Vec<Coin>>,
    pending: HashMap<TxId, Vec<Coin>>,
}

/// In-memory coin store with a single-writer lock.
///
/// Every operation takes the one mutex, so reservation is trivially
/// atomic: a coin is in exactly one bucket at any observable moment.
#[derive(Default)]
pub struct InMemoryCoinStore {
    inner: Mutex<Buckets>,
}

impl InMemoryCoinStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CoinStore for InMemoryCoinStore {
    fn deposit(&self, coin: Coin) {
        tracing::debug!(coin_id = %coin.id, amount = coin.amount, "coin deposited");
        self.inner.lock().spendable.push(coin);
    }

    fn reserve(&self, tx_id: TxId, target: Amount) -> Result<Vec<Coin>, VaultError> {
        let mut inner = self.inner.lock();

        if inner.reserved.contains_key(&tx_id) {
            return Err(VaultError::ReservationExists { tx_id });
        }

        let available: Amount = inner.spendable.iter().map(|c| c.amount).sum();
        if available < target {
            return Err(VaultError::InsufficientFunds {
                required: target,
                available,
            });
        }

        // Greedy in-order selection; smarter strategies are a policy of
        // the store, not of the protocol.
        let mut selected = Vec::new();
        let mut total: Amount = 0;
        while total < target {
            let coin = inner.spendable.remove(0);
            total += coin.amount;
            selected.push(coin);
        }

        tracing::info!(
            tx_id = %tx_id,
            coins = selected.len(),
            total,
            target,
            "coins reserved"
        );
        inner.reserved.insert(tx_id, selected.clone());
        Ok(selected)
    }

    fn release(&self, tx_id: TxId) {
        let mut inner = self.inner.lock();
        match inner.reserved.remove(&tx_id) {
            Some(coins) => {
                tracing::info!(tx_id = %tx_id, coins = coins.len(), "reservation released");
                inner.spendable.extend(coins);
            }
            None => tracing::debug!(tx_id = %tx_id, "release with no reservation, ignoring"),
        }
    }

    fn mark_spent(&self, tx_id: TxId) {
        let mut inner = self.inner.lock();
        if let Some(coins) = inner.reserved.remove(&tx_id) {
            tracing::info!(tx_id = %tx_id, coins = coins.len(), "reserved coins spent");
        }
    }

    fn add_pending(&self, tx_id: TxId, coin: Coin) {
        tracing::debug!(tx_id = %tx_id, coin_id = %coin.id, amount = coin.amount, "output pending");
        self.inner
            .lock()
            .pending
            .entry(tx_id)
            .or_default()
            .push(coin);
    }

    fn confirm_pending(&self, tx_id: TxId) {
        let mut inner = self.inner.lock();
        if let Some(coins) = inner.pending.remove(&tx_id) {
            tracing::info!(tx_id = %tx_id, coins = coins.len(), "pending outputs confirmed");
            inner.spendable.extend(coins);
        }
    }

    fn discard_pending(&self, tx_id: TxId) {
        let mut inner = self.inner.lock();
        if let Some(coins) = inner.pending.remove(&tx_id) {
            tracing::info!(tx_id = %tx_id, coins = coins.len(), "pending outputs discarded");
        }
    }

    fn spendable_balance(&self) -> Amount {
        self.inner.lock().spendable.iter().map(|c| c.amount).sum()
    }

    fn reserved_balance(&self) -> Amount {
        self.inner
            .lock()
            .reserved
            .values()
            .flatten()
            .map(|c| c.amount)
            .sum()
    }

    fn pending_balance(&self) -> Amount {
        self.inner
            .lock()
            .pending
            .values()
            .flatten()
            .map(|c| c.amount)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(31)
    }

    fn funded_store(rng: &mut StdRng, amounts: &[Amount]) -> InMemoryCoinStore {
        let store = InMemoryCoinStore::new();
        for &a in amounts {
            store.deposit(Coin::new(a, rng));
        }
        store
    }

    #[test]
    fn reserve_moves_coins_out_of_spendable() {
        let mut rng = rng();
        let store = funded_store(&mut rng, &[40, 40, 40]);

        let coins = store.reserve(TxId::generate(), 60).unwrap();
        assert_eq!(coins.len(), 2);
        assert_eq!(store.spendable_balance(), 40);
        assert_eq!(store.reserved_balance(), 80);
    }

    #[test]
    fn insufficient_funds_reserves_nothing() {
        let mut rng = rng();
        let store = funded_store(&mut rng, &[40, 40]);

        let err = store.reserve(TxId::generate(), 100).unwrap_err();
        assert_eq!(
            err,
            VaultError::InsufficientFunds {
                required: 100,
                available: 80
            }
        );
        assert_eq!(store.spendable_balance(), 80);
        assert_eq!(store.reserved_balance(), 0);
    }

    #[test]
    fn second_reservation_for_same_negotiation_rejected() {
        let mut rng = rng();
        let store = funded_store(&mut rng, &[40, 40]);
        let tx_id = TxId::generate();

        store.reserve(tx_id, 30).unwrap();
        assert!(matches!(
            store.reserve(tx_id, 30),
            Err(VaultError::ReservationExists { .. })
        ));
    }

    #[test]
    fn concurrent_negotiations_get_disjoint_coins() {
        let mut rng = rng();
        let store = funded_store(&mut rng, &[50, 50, 50, 50]);

        let a = store.reserve(TxId::generate(), 100).unwrap();
        let b = store.reserve(TxId::generate(), 100).unwrap();

        for coin in &a {
            assert!(!b.iter().any(|c| c.id == coin.id));
        }
        assert_eq!(store.spendable_balance(), 0);
    }

    #[test]
    fn release_restores_balance_and_is_idempotent() {
        let mut rng = rng();
        let store = funded_store(&mut rng, &[40, 40]);
        let tx_id = TxId::generate();

        store.reserve(tx_id, 80).unwrap();
        assert_eq!(store.spendable_balance(), 0);

        store.release(tx_id);
        assert_eq!(store.spendable_balance(), 80);

        // Second release must not duplicate value out of thin air.
        store.release(tx_id);
        assert_eq!(store.spendable_balance(), 80);
        assert_eq!(store.reserved_balance(), 0);
    }

    #[test]
    fn spent_coins_never_come_back() {
        let mut rng = rng();
        let store = funded_store(&mut rng, &[40, 40]);
        let tx_id = TxId::generate();

        store.reserve(tx_id, 80).unwrap();
        store.mark_spent(tx_id);

        // Releasing after spending is a no-op, not a resurrection.
        store.release(tx_id);
        assert_eq!(store.spendable_balance(), 0);
        assert_eq!(store.reserved_balance(), 0);
    }

    #[test]
    fn pending_outputs_confirm_to_spendable() {
        let mut rng = rng();
        let store = InMemoryCoinStore::new();
        let tx_id = TxId::generate();

        store.add_pending(tx_id, Coin::new(38, &mut rng));
        assert_eq!(store.spendable_balance(), 0);
        assert_eq!(store.pending_balance(), 38);

        store.confirm_pending(tx_id);
        assert_eq!(store.spendable_balance(), 38);
        assert_eq!(store.pending_balance(), 0);

        // Idempotent.
        store.confirm_pending(tx_id);
        assert_eq!(store.spendable_balance(), 38);
    }

    #[test]
    fn discarded_pending_outputs_vanish() {
        let mut rng = rng();
        let store = InMemoryCoinStore::new();
        let tx_id = TxId::generate();

        store.add_pending(tx_id, Coin::new(38, &mut rng));
        store.discard_pending(tx_id);
        assert_eq!(store.spendable_balance(), 0);
        assert_eq!(store.pending_balance(), 0);

        store.discard_pending(tx_id);
        assert_eq!(store.pending_balance(), 0);
    }

    #[test]
    fn coin_commitment_opens_correctly() {
        let mut rng = rng();
        let coin = Coin::new(1234, &mut rng);
        assert_eq!(
            coin.commitment(),
            commitment::commit(1234, &coin.blinding)
        );
    }
}
