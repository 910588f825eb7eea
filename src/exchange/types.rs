//! Exchange types and state machine

use crate::crypto::EncryptedContent;
use crate::ledger::OutPoint;
use crate::script::EscrowScript;
use serde::{Deserialize, Serialize};

/// Side of the exchange
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Holds `K` and claims the escrow by revealing it
    Seller,
    /// Funds the escrow and learns `K` from the claim
    Buyer,
}

/// Exchange state machine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeState {
    /// Seller has published the encrypted content and escrow template
    Offered,
    /// Buyer has locked funds in the escrow output
    Funded { outpoint: OutPoint, amount: u64 },
    /// Seller spent through the hash branch, revealing `K`
    Claimed { outpoint: OutPoint },
    /// Buyer recovered the funds through the refund branch
    Refunded { outpoint: OutPoint },
    /// Exchange dropped before funding
    Abandoned { reason: String },
}

impl ExchangeState {
    /// Check if the exchange is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExchangeState::Claimed { .. }
                | ExchangeState::Refunded { .. }
                | ExchangeState::Abandoned { .. }
        )
    }

    /// Check if the exchange is still running
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// What the seller sends the buyer before funding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub content: EncryptedContent,
    pub script: EscrowScript,
}
