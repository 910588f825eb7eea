//! ZKCP demo: one exchange that completes and one the seller abandons
//!
//! 1. Seller seals the content under `K` and builds the escrow template
//! 2. Buyer checks the offer and funds the escrow
//! 3. Seller claims, revealing `K` on the ledger
//! 4. Buyer reads `K` from the claim and decrypts
//! 5. In a second exchange the seller never claims and the buyer refunds
//!    once the locktime passes
//!
//! Run with: cargo run --example zkcp_demo

use anyhow::Context;
use zkcp::{
    Buyer, ConditionalScriptBuilder, ContentKey, Ledger, MockLedger, Secp256k1Oracle, Seller,
    ZkcpConfig,
};

const LOCKTIME: i64 = 500;
const AMOUNT: u64 = 100_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,zkcp=debug")),
        )
        .init();

    let config = ZkcpConfig::from_env().context("loading configuration")?;
    let ledger = MockLedger::new(100);
    let seller = Seller::new(
        Secp256k1Oracle::random(),
        ConditionalScriptBuilder::new(config.escrow.clone()),
    );
    let buyer = Buyer::new(Secp256k1Oracle::random());

    println!("\n=== Exchange 1: seller claims ===\n");

    let mut seller_session = seller.offer_with_key(
        ContentKey::new(b"HELLO".to_vec()),
        b"secret content",
        &buyer.public_key(),
        Some(LOCKTIME),
    )?;
    let offer = seller_session.offer().clone();
    println!("ciphertext:  {}", hex::encode(&offer.content.ciphertext));
    println!("commitment:  {}", offer.content.commitment);
    println!("template:    {}", offer.script.to_asm());

    let mut buyer_session = buyer.accept_offer(&ledger, offer, AMOUNT).await?;
    let outpoint = buyer_session
        .outpoint()
        .cloned()
        .context("funded session has an outpoint")?;
    println!("funded:      {}", outpoint);

    seller_session.mark_funded(outpoint, AMOUNT)?;
    let receipt = seller.claim(&ledger, &mut seller_session).await?;
    println!("claimed in:  {}", receipt.txid);

    let plaintext = buyer
        .recover(&ledger, &mut buyer_session)
        .await?
        .context("claim is published")?;
    println!("recovered:   {}", String::from_utf8_lossy(&plaintext));

    println!("\n=== Exchange 2: seller walks away ===\n");

    let abandoned = seller.offer(b"never delivered", &buyer.public_key(), Some(LOCKTIME))?;
    let mut session = buyer
        .accept_offer(&ledger, abandoned.offer().clone(), AMOUNT)
        .await?;

    match buyer.refund(&ledger, &mut session).await {
        Ok(_) => anyhow::bail!("refund accepted before the locktime"),
        Err(e) => println!("early refund: {}", e),
    }

    ledger.advance_to(LOCKTIME as u32).await;
    let receipt = buyer.refund(&ledger, &mut session).await?;
    println!(
        "refunded {} at height {} in {}",
        receipt.amount,
        ledger.height().await,
        receipt.txid
    );

    Ok(())
}
