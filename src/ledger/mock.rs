//! In-memory ledger for tests and demos

use crate::error::{Result, ZkcpError};
use crate::script::{EscrowScript, ScriptEvaluator, SpendContext};
use crate::signer::Secp256k1Verifier;
use crate::types::TxID;
use bitcoin::script::ScriptBuf;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{spend_digest, Ledger, OutPoint, SpendReceipt, SpendRequest};

#[derive(Clone, Debug)]
struct EscrowOutput {
    script_pubkey: ScriptBuf,
    redeem_script: ScriptBuf,
    amount: u64,
    spent_by: Option<ScriptBuf>,
}

#[derive(Debug, Default)]
struct LedgerState {
    height: u32,
    outputs: HashMap<OutPoint, EscrowOutput>,
    funded: u64,
}

/// Ledger mock shared between parties; clones see the same chain
#[derive(Clone)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
    evaluator: Arc<ScriptEvaluator<Secp256k1Verifier>>,
}

impl MockLedger {
    /// Create a ledger starting at `height`
    pub fn new(height: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                height,
                ..LedgerState::default()
            })),
            evaluator: Arc::new(ScriptEvaluator::new(Secp256k1Verifier::new())),
        }
    }

    /// Move the chain tip forward to `height`; never moves it back
    pub async fn advance_to(&self, height: u32) {
        let mut state = self.state.lock().await;
        if height > state.height {
            tracing::debug!(from = state.height, to = height, "ledger advanced");
            state.height = height;
        }
    }

    /// Mine `blocks` empty blocks
    pub async fn mine(&self, blocks: u32) -> u32 {
        let mut state = self.state.lock().await;
        state.height = state.height.saturating_add(blocks);
        state.height
    }

    /// Whether `outpoint` exists and has not been spent
    pub async fn is_unspent(&self, outpoint: &OutPoint) -> bool {
        let state = self.state.lock().await;
        state
            .outputs
            .get(outpoint)
            .map_or(false, |output| output.spent_by.is_none())
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Ledger for MockLedger {
    async fn height(&self) -> u32 {
        self.state.lock().await.height
    }

    async fn fund(&self, script: &EscrowScript, amount: u64) -> Result<OutPoint> {
        if amount == 0 {
            return Err(ZkcpError::InvalidAmount(amount));
        }

        let mut state = self.state.lock().await;
        state.funded += 1;

        let script_pubkey = script.script_pubkey();
        let mut preimage = state.funded.to_le_bytes().to_vec();
        preimage.extend_from_slice(&amount.to_le_bytes());
        preimage.extend_from_slice(script_pubkey.as_bytes());

        let outpoint = OutPoint {
            txid: TxID::from_bytes(&preimage),
            vout: 0,
        };
        state.outputs.insert(
            outpoint.clone(),
            EscrowOutput {
                script_pubkey,
                redeem_script: script.template().to_owned(),
                amount,
                spent_by: None,
            },
        );

        tracing::info!(%outpoint, amount, commitment = %script.commitment(), "escrow funded");
        Ok(outpoint)
    }

    async fn spend(&self, request: SpendRequest) -> Result<SpendReceipt> {
        let mut state = self.state.lock().await;
        let height = state.height;

        let output = state
            .outputs
            .get_mut(&request.outpoint)
            .ok_or_else(|| ZkcpError::OutputNotFound(request.outpoint.to_string()))?;
        if output.spent_by.is_some() {
            return Err(ZkcpError::OutputAlreadySpent(request.outpoint.to_string()));
        }
        if request.lock_time > height {
            return Err(ZkcpError::NonFinalSpend {
                lock_time: request.lock_time,
                height,
            });
        }

        let ctx = SpendContext {
            lock_time: request.lock_time,
            digest: spend_digest(&request.outpoint, request.lock_time, &output.redeem_script),
        };
        if let Err(e) =
            self.evaluator
                .evaluate(&request.script_sig, &output.script_pubkey, &ctx)
        {
            tracing::warn!(outpoint = %request.outpoint, error = %e, "spend rejected");
            return Err(ZkcpError::SpendRejected(e.to_string()));
        }

        output.spent_by = Some(request.script_sig.clone());
        let amount = output.amount;

        let mut preimage = request.script_sig.to_bytes();
        preimage.extend_from_slice(request.outpoint.txid.0.as_bytes());
        preimage.extend_from_slice(&request.lock_time.to_le_bytes());
        let txid = TxID::from_bytes(&preimage);

        tracing::info!(outpoint = %request.outpoint, %txid, height, "spend accepted");
        Ok(SpendReceipt {
            txid,
            outpoint: request.outpoint,
            amount,
            height,
        })
    }

    async fn published_spend(&self, outpoint: &OutPoint) -> Option<ScriptBuf> {
        let state = self.state.lock().await;
        state.outputs.get(outpoint)?.spent_by.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commit;
    use crate::script::{ConditionalScriptBuilder, RedemptionBuilder};
    use crate::signer::{Secp256k1Oracle, SigningOracle};

    struct Fixture {
        ledger: MockLedger,
        seller: Secp256k1Oracle,
        buyer: Secp256k1Oracle,
        script: EscrowScript,
        outpoint: OutPoint,
    }

    async fn funded(locktime: Option<i64>) -> Fixture {
        let ledger = MockLedger::new(10);
        let seller = Secp256k1Oracle::random();
        let buyer = Secp256k1Oracle::random();
        let script = ConditionalScriptBuilder::default()
            .build(
                &commit(b"HELLO").0,
                &seller.public_key().serialize(),
                &buyer.public_key().serialize(),
                locktime,
            )
            .unwrap();
        let outpoint = ledger.fund(&script, 50_000).await.unwrap();

        Fixture {
            ledger,
            seller,
            buyer,
            script,
            outpoint,
        }
    }

    fn claim_request(f: &Fixture, preimage: &[u8], lock_time: u32) -> SpendRequest {
        let digest = spend_digest(&f.outpoint, lock_time, f.script.template());
        let witness = RedemptionBuilder::build_claim(preimage, &f.seller.sign(&digest), &f.script);
        SpendRequest {
            outpoint: f.outpoint.clone(),
            script_sig: witness.to_script_sig().unwrap(),
            lock_time,
        }
    }

    fn refund_request(f: &Fixture, lock_time: u32) -> SpendRequest {
        let digest = spend_digest(&f.outpoint, lock_time, f.script.template());
        let witness = RedemptionBuilder::build_refund(&f.buyer.sign(&digest), &f.script);
        SpendRequest {
            outpoint: f.outpoint.clone(),
            script_sig: witness.to_script_sig().unwrap(),
            lock_time,
        }
    }

    #[tokio::test]
    async fn test_fund_rejects_zero_amount() {
        let f = funded(Some(100)).await;
        assert!(matches!(
            f.ledger.fund(&f.script, 0).await,
            Err(ZkcpError::InvalidAmount(0))
        ));
    }

    #[tokio::test]
    async fn test_fund_creates_distinct_outputs() {
        let f = funded(Some(100)).await;
        let second = f.ledger.fund(&f.script, 50_000).await.unwrap();

        assert_ne!(second, f.outpoint);
        assert!(f.ledger.is_unspent(&f.outpoint).await);
        assert!(f.ledger.is_unspent(&second).await);
    }

    #[tokio::test]
    async fn test_claim_publishes_preimage() {
        let f = funded(Some(100)).await;

        let receipt = f.ledger.spend(claim_request(&f, b"HELLO", 0)).await.unwrap();
        assert_eq!(receipt.amount, 50_000);
        assert_eq!(receipt.height, 10);

        let published = f.ledger.published_spend(&f.outpoint).await.unwrap();
        assert_eq!(
            crate::script::extract_preimage(&published, &commit(b"HELLO")),
            Some(b"HELLO".to_vec())
        );
    }

    #[tokio::test]
    async fn test_output_consumed_once() {
        let f = funded(Some(100)).await;
        f.ledger.spend(claim_request(&f, b"HELLO", 0)).await.unwrap();

        f.ledger.advance_to(100).await;
        assert!(matches!(
            f.ledger.spend(refund_request(&f, 100)).await,
            Err(ZkcpError::OutputAlreadySpent(_))
        ));
    }

    #[tokio::test]
    async fn test_refund_not_final_before_height() {
        let f = funded(Some(100)).await;

        assert!(matches!(
            f.ledger.spend(refund_request(&f, 100)).await,
            Err(ZkcpError::NonFinalSpend {
                lock_time: 100,
                height: 10
            })
        ));

        // final, but below the script's locktime
        assert!(matches!(
            f.ledger.spend(refund_request(&f, 10)).await,
            Err(ZkcpError::SpendRejected(_))
        ));
        assert!(f.ledger.is_unspent(&f.outpoint).await);

        f.ledger.advance_to(100).await;
        assert!(f.ledger.spend(refund_request(&f, 100)).await.is_ok());
        assert!(!f.ledger.is_unspent(&f.outpoint).await);
    }

    #[tokio::test]
    async fn test_wrong_preimage_leaves_output_unspent() {
        let f = funded(Some(100)).await;

        assert!(matches!(
            f.ledger.spend(claim_request(&f, b"WRONG", 0)).await,
            Err(ZkcpError::SpendRejected(_))
        ));
        assert!(f.ledger.is_unspent(&f.outpoint).await);
        assert!(f.ledger.published_spend(&f.outpoint).await.is_none());
    }

    #[tokio::test]
    async fn test_signature_bound_to_lock_time() {
        let f = funded(Some(100)).await;
        f.ledger.advance_to(200).await;

        let mut request = refund_request(&f, 150);
        request.lock_time = 160;
        assert!(matches!(
            f.ledger.spend(request).await,
            Err(ZkcpError::SpendRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_outpoint() {
        let f = funded(None).await;
        let mut request = claim_request(&f, b"HELLO", 0);
        request.outpoint.vout = 7;

        assert!(matches!(
            f.ledger.spend(request).await,
            Err(ZkcpError::OutputNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_height_is_monotonic() {
        let ledger = MockLedger::new(50);
        ledger.advance_to(20).await;
        assert_eq!(ledger.height().await, 50);

        assert_eq!(ledger.mine(5).await, 55);
        ledger.advance_to(60).await;
        assert_eq!(ledger.height().await, 60);
    }
}
