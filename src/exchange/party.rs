//! Seller and buyer drivers
//!
//! Each side wraps its signing oracle and walks an [`ExchangeSession`]
//! through the ledger. The seller claims by publishing `K`; the buyer either
//! reads `K` out of that claim or takes the refund branch.

use crate::crypto::EncryptedContent;
use crate::error::{Result, ZkcpError};
use crate::ledger::{spend_digest, Ledger, OutPoint, SpendReceipt, SpendRequest};
use crate::script::{
    extract_preimage, ConditionalScriptBuilder, EscrowScript, RedemptionBuilder, MAX_PUSH_LEN,
};
use crate::signer::SigningOracle;
use crate::types::ContentKey;
use bitcoin::secp256k1::PublicKey;

use super::session::ExchangeSession;
use super::types::{ExchangeState, Offer, Role};

/// Claim spends carry no lock time so they are final at any height
const CLAIM_LOCK_TIME: u32 = 0;

pub struct Seller<S> {
    signer: S,
    builder: ConditionalScriptBuilder,
}

impl<S: SigningOracle> Seller<S> {
    pub fn new(signer: S, builder: ConditionalScriptBuilder) -> Self {
        Self { signer, builder }
    }

    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Seal `plaintext` under a fresh random key and build the escrow template
    pub fn offer(
        &self,
        plaintext: &[u8],
        buyer_pubkey: &PublicKey,
        locktime: Option<i64>,
    ) -> Result<ExchangeSession> {
        self.offer_with_key(ContentKey::random(), plaintext, buyer_pubkey, locktime)
    }

    /// Same as [`Seller::offer`] with a caller-chosen key
    pub fn offer_with_key(
        &self,
        key: ContentKey,
        plaintext: &[u8],
        buyer_pubkey: &PublicKey,
        locktime: Option<i64>,
    ) -> Result<ExchangeSession> {
        // the claim pushes K whole, so it must fit in one stack element
        if key.as_bytes().len() > MAX_PUSH_LEN {
            return Err(ZkcpError::KeyTooLong {
                len: key.as_bytes().len(),
                max: MAX_PUSH_LEN,
            });
        }
        let content = EncryptedContent::seal(plaintext, key.as_bytes())?;
        let script = self.builder.build(
            content.commitment.as_bytes(),
            &self.signer.public_key().serialize(),
            &buyer_pubkey.serialize(),
            locktime,
        )?;

        tracing::info!(
            commitment = %content.commitment,
            content_len = content.len(),
            variant = ?script.variant(),
            "offer created"
        );
        Ok(ExchangeSession::new_seller(Offer { content, script }, key))
    }

    /// Spend the escrow through the hash branch, publishing `K`
    pub async fn claim<L: Ledger>(
        &self,
        ledger: &L,
        session: &mut ExchangeSession,
    ) -> Result<SpendReceipt> {
        expect_role(session, Role::Seller, "claim")?;
        let outpoint = funded_outpoint(session)?;
        let key = session
            .key()
            .ok_or_else(|| ZkcpError::InvalidStateTransition("seller session has no key".to_string()))?;

        let script = &session.offer().script;
        let digest = spend_digest(&outpoint, CLAIM_LOCK_TIME, script.template());
        let witness =
            RedemptionBuilder::build_claim(key.as_bytes(), &self.signer.sign(&digest), script);

        let receipt = ledger
            .spend(SpendRequest {
                outpoint,
                script_sig: witness.to_script_sig()?,
                lock_time: CLAIM_LOCK_TIME,
            })
            .await?;
        session.mark_claimed(None)?;

        tracing::info!(txid = %receipt.txid, amount = receipt.amount, "escrow claimed");
        Ok(receipt)
    }
}

pub struct Buyer<S> {
    signer: S,
}

impl<S: SigningOracle> Buyer<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }

    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Check an offer and lock `amount` into its escrow.
    ///
    /// The template must be canonical, commit to the same key the content
    /// was sealed under, and pay refunds to this buyer.
    pub async fn accept_offer<L: Ledger>(
        &self,
        ledger: &L,
        offer: Offer,
        amount: u64,
    ) -> Result<ExchangeSession> {
        let script = EscrowScript::parse(offer.script.template())
            .map_err(|e| ZkcpError::OfferRejected(e.to_string()))?;
        if script.commitment() != &offer.content.commitment {
            return Err(ZkcpError::OfferRejected(
                "escrow commitment does not match the content commitment".to_string(),
            ));
        }
        if script.params().refund_pubkey != self.signer.public_key() {
            return Err(ZkcpError::OfferRejected(
                "refund branch does not pay this buyer".to_string(),
            ));
        }

        let outpoint = ledger.fund(&script, amount).await?;
        let mut session = ExchangeSession::new_buyer(offer);
        session.mark_funded(outpoint, amount)?;

        tracing::info!(commitment = %script.commitment(), amount, "offer accepted");
        Ok(session)
    }

    /// Read `K` from the seller's claim and decrypt the content.
    ///
    /// `Ok(None)` while the escrow is still unspent.
    pub async fn recover<L: Ledger>(
        &self,
        ledger: &L,
        session: &mut ExchangeSession,
    ) -> Result<Option<Vec<u8>>> {
        expect_role(session, Role::Buyer, "recover")?;
        let outpoint = funded_outpoint(session)?;

        let Some(script_sig) = ledger.published_spend(&outpoint).await else {
            return Ok(None);
        };
        let content = &session.offer().content;
        let key = extract_preimage(&script_sig, &content.commitment)
            .ok_or(ZkcpError::PreimageNotFound)?;
        let plaintext = content.open(&key)?.ok_or(ZkcpError::PreimageNotFound)?;

        session.mark_claimed(Some(ContentKey::new(key)))?;
        tracing::info!(%outpoint, plaintext_len = plaintext.len(), "content recovered");
        Ok(Some(plaintext))
    }

    /// Spend the escrow through the refund branch.
    ///
    /// Timed escrows sign with the template's locktime, so the ledger
    /// refuses the spend until its height reaches it.
    pub async fn refund<L: Ledger>(
        &self,
        ledger: &L,
        session: &mut ExchangeSession,
    ) -> Result<SpendReceipt> {
        expect_role(session, Role::Buyer, "refund")?;
        let outpoint = funded_outpoint(session)?;

        let script = &session.offer().script;
        let lock_time = script.variant().locktime().unwrap_or(0);
        let digest = spend_digest(&outpoint, lock_time, script.template());
        let witness = RedemptionBuilder::build_refund(&self.signer.sign(&digest), script);

        let receipt = ledger
            .spend(SpendRequest {
                outpoint,
                script_sig: witness.to_script_sig()?,
                lock_time,
            })
            .await?;
        session.mark_refunded()?;

        tracing::info!(txid = %receipt.txid, amount = receipt.amount, "escrow refunded");
        Ok(receipt)
    }
}

fn expect_role(session: &ExchangeSession, role: Role, action: &str) -> Result<()> {
    if session.role() != role {
        return Err(ZkcpError::InvalidStateTransition(format!(
            "{} requires a {:?} session",
            action, role
        )));
    }
    Ok(())
}

fn funded_outpoint(session: &ExchangeSession) -> Result<OutPoint> {
    match session.state() {
        ExchangeState::Funded { outpoint, .. } => Ok(outpoint.clone()),
        other => Err(ZkcpError::InvalidStateTransition(format!(
            "escrow is not funded: {:?}",
            other
        ))),
    }
}
