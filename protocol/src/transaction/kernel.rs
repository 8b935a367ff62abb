//! The transaction kernel: the public heart of a negotiated transaction.
//!
//! A kernel commits to the transaction's fee and lock height, carries the
//! excess point once both parties' blinding arithmetic is combined, and
//! holds the joint Schnorr signature that proves the whole thing balances.
//!
//! Lifecycle is strictly two-phase: created at negotiation start with fee
//! and lock height fixed (which fixes the signing message), then finalized
//! exactly once with the excess and combined signature. Immutable after
//! that — a finalized kernel that changes is a forged kernel.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::cosign::{self, Signature};
use crate::transaction::types::{Amount, TransactionError};

/// Domain separator for the kernel signing message.
const KERNEL_DOMAIN: &[u8] = b"umbra_kernel_v1";

/// The transaction kernel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kernel {
    /// Transaction fee, paid to whoever mines the block.
    fee: Amount,
    /// Earliest block height at which the transaction may be included.
    min_height: u64,
    /// Combined public excess `X_total`, set at finalization.
    excess: Option<CompressedRistretto>,
    /// Joint Schnorr signature over [`Kernel::message_hash`], set at
    /// finalization.
    signature: Option<Signature>,
}

impl Kernel {
    /// Create an unsigned kernel. Fee and lock height are fixed for the
    /// lifetime of the negotiation — both parties sign over them.
    pub fn new(fee: Amount, min_height: u64) -> Self {
        Self {
            fee,
            min_height,
            excess: None,
            signature: None,
        }
    }

    /// The transaction fee.
    pub fn fee(&self) -> Amount {
        self.fee
    }

    /// The lock height.
    pub fn min_height(&self) -> u64 {
        self.min_height
    }

    /// The combined excess point, if finalized.
    pub fn excess(&self) -> Option<&CompressedRistretto> {
        self.excess.as_ref()
    }

    /// The combined signature, if finalized.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Whether [`Kernel::finalize`] has run.
    pub fn is_finalized(&self) -> bool {
        self.excess.is_some() && self.signature.is_some()
    }

    /// The message both parties sign: a hash binding the fee and lock
    /// height. Deterministic by construction — same fields, same bytes,
    /// same hash on both sides of the wire.
    pub fn message_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(KERNEL_DOMAIN);
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.min_height.to_le_bytes());
        hasher.finalize().into()
    }

    /// Attach the combined excess and signature. Allowed exactly once.
    ///
    /// # Errors
    ///
    /// [`TransactionError::AlreadyFinalized`] on a second call — callers
    /// holding a finalized kernel have no business re-signing it.
    pub fn finalize(
        &mut self,
        excess: &RistrettoPoint,
        signature: Signature,
    ) -> Result<(), TransactionError> {
        if self.is_finalized() {
            return Err(TransactionError::AlreadyFinalized);
        }
        self.excess = Some(excess.compress());
        self.signature = Some(signature);
        Ok(())
    }

    /// Verify the kernel signature under the kernel excess.
    pub fn verify(&self) -> Result<(), TransactionError> {
        let (excess, signature) = match (&self.excess, &self.signature) {
            (Some(e), Some(s)) => (e, s),
            _ => return Err(TransactionError::UnfinalizedKernel),
        };
        let excess = excess
            .decompress()
            .ok_or(TransactionError::MalformedPoint)?;

        if !cosign::verify_combined(signature, &excess, &self.message_hash()) {
            return Err(TransactionError::InvalidKernelSignature);
        }
        Ok(())
    }
}
