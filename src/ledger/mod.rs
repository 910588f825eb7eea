//! Ledger/broadcast collaborator
//!
//! The escrow core never talks to a node. Funding an escrow output, submitting
//! a spend and watching for the counterparty's spend all go through the
//! [`Ledger`] trait; [`mock::MockLedger`] is an in-memory implementation that
//! enforces the same script and timelock rules a node would.

pub mod mock;

pub use mock::MockLedger;

use crate::error::Result;
use crate::script::EscrowScript;
use crate::types::TxID;
use bitcoin::script::{Script, ScriptBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Reference to an escrow output on the ledger
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxID,
    pub vout: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A spend submitted to the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRequest {
    pub outpoint: OutPoint,
    /// Input script: witness elements followed by the redeem script
    pub script_sig: ScriptBuf,
    /// `nLockTime` of the spending transaction
    pub lock_time: u32,
}

/// Confirmation of an accepted spend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendReceipt {
    pub txid: TxID,
    pub outpoint: OutPoint,
    pub amount: u64,
    /// Height the spend was included at
    pub height: u32,
}

#[allow(async_fn_in_trait)]
pub trait Ledger {
    /// Current chain height
    async fn height(&self) -> u32;

    /// Lock `amount` into the P2SH output of `script`
    async fn fund(&self, script: &EscrowScript, amount: u64) -> Result<OutPoint>;

    /// Validate and include a spend of an escrow output
    async fn spend(&self, request: SpendRequest) -> Result<SpendReceipt>;

    /// Input script of the accepted spend of `outpoint`, once there is one
    async fn published_spend(&self, outpoint: &OutPoint) -> Option<ScriptBuf>;
}

/// Digest both branches sign: double SHA-256 over the spent outpoint, the
/// spend's lock time and the redeem script.
pub fn spend_digest(outpoint: &OutPoint, lock_time: u32, redeem_script: &Script) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(outpoint.txid.0.as_bytes());
    hasher.update(outpoint.vout.to_le_bytes());
    hasher.update(lock_time.to_le_bytes());
    hasher.update(redeem_script.as_bytes());
    Sha256::digest(hasher.finalize()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outpoint(vout: u32) -> OutPoint {
        OutPoint {
            txid: TxID::from_bytes(b"funding"),
            vout,
        }
    }

    #[test]
    fn test_spend_digest_binds_inputs() {
        let script = Script::from_bytes(&[0x51]);
        let base = spend_digest(&outpoint(0), 100, script);

        assert_eq!(base, spend_digest(&outpoint(0), 100, script));
        assert_ne!(base, spend_digest(&outpoint(1), 100, script));
        assert_ne!(base, spend_digest(&outpoint(0), 101, script));
        assert_ne!(base, spend_digest(&outpoint(0), 100, Script::from_bytes(&[0x52])));
    }

    #[test]
    fn test_outpoint_display() {
        let outpoint = OutPoint {
            txid: TxID("ab".repeat(32)),
            vout: 3,
        };
        assert_eq!(outpoint.to_string(), format!("{}:3", "ab".repeat(32)));
    }
}
