//! Exchange session management

use crate::error::{Result, ZkcpError};
use crate::ledger::OutPoint;
use crate::types::ContentKey;
use std::time::SystemTime;

use super::types::{ExchangeState, Offer, Role};

/// One side's view of a single exchange
#[derive(Clone, Debug)]
pub struct ExchangeSession {
    role: Role,
    offer: Offer,
    state: ExchangeState,
    key: Option<ContentKey>,
    created_at: SystemTime,
}

impl ExchangeSession {
    /// Create new session as seller; the seller knows `K` from the start
    pub fn new_seller(offer: Offer, key: ContentKey) -> Self {
        Self {
            role: Role::Seller,
            offer,
            state: ExchangeState::Offered,
            key: Some(key),
            created_at: SystemTime::now(),
        }
    }

    /// Create new session as buyer
    pub fn new_buyer(offer: Offer) -> Self {
        Self {
            role: Role::Buyer,
            offer,
            state: ExchangeState::Offered,
            key: None,
            created_at: SystemTime::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    /// `K`, if this side knows it
    pub fn key(&self) -> Option<&ContentKey> {
        self.key.as_ref()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Escrow output, once funded
    pub fn outpoint(&self) -> Option<&OutPoint> {
        match &self.state {
            ExchangeState::Offered | ExchangeState::Abandoned { .. } => None,
            ExchangeState::Funded { outpoint, .. }
            | ExchangeState::Claimed { outpoint }
            | ExchangeState::Refunded { outpoint } => Some(outpoint),
        }
    }

    /// Record the funding output
    pub fn mark_funded(&mut self, outpoint: OutPoint, amount: u64) -> Result<()> {
        if self.state != ExchangeState::Offered {
            return Err(ZkcpError::InvalidStateTransition(format!(
                "cannot fund from {:?}",
                self.state
            )));
        }

        self.state = ExchangeState::Funded { outpoint, amount };
        Ok(())
    }

    /// Record the claim spend; the buyer passes the key it recovered
    pub fn mark_claimed(&mut self, key: Option<ContentKey>) -> Result<()> {
        let outpoint = self.funded_outpoint("claim")?;
        if let Some(key) = key {
            self.key = Some(key);
        }

        self.state = ExchangeState::Claimed { outpoint };
        Ok(())
    }

    /// Record the refund spend
    pub fn mark_refunded(&mut self) -> Result<()> {
        let outpoint = self.funded_outpoint("refund")?;
        self.state = ExchangeState::Refunded { outpoint };
        Ok(())
    }

    /// Drop an exchange that was never funded
    pub fn abandon(&mut self, reason: String) -> Result<()> {
        if self.state != ExchangeState::Offered {
            return Err(ZkcpError::InvalidStateTransition(format!(
                "cannot abandon from {:?}",
                self.state
            )));
        }

        self.state = ExchangeState::Abandoned { reason };
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_terminal()
    }

    fn funded_outpoint(&self, action: &str) -> Result<OutPoint> {
        match &self.state {
            ExchangeState::Funded { outpoint, .. } => Ok(outpoint.clone()),
            other => Err(ZkcpError::InvalidStateTransition(format!(
                "cannot {} from {:?}",
                action, other
            ))),
        }
    }
}
