//! ZKCP core
//!
//! Building blocks for a zero-knowledge contingent payment: a buyer pays for
//! a secret key `K` without trusting the seller.
//!
//! - A hash-counter keystream cipher seals the content under `K`
//! - A SHA-256 commitment `H = SHA-256(K)` binds the escrow to that key
//! - A conditional P2SH script releases funds to the seller only when `K` is
//!   revealed, with an optional locktime refund path for the buyer
//! - Claim and refund witnesses for spending the escrow
//!
//! Signing and the ledger are collaborators behind the [`signer`] and
//! [`ledger`] traits; [`ledger::MockLedger`] evaluates spends in memory.

pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod script;
pub mod signer;
pub mod types;

// Re-export commonly used types and functions
pub use config::ZkcpConfig;
pub use crypto::{
    commit, decrypt, encrypt, verify_commitment, Blake2bKeystream, EncryptedContent,
    KeystreamCipher, Sha256Keystream,
};
pub use error::{Result, ZkcpError};
pub use exchange::{Buyer, ExchangeSession, ExchangeState, Offer, Seller};
pub use ledger::{Ledger, MockLedger, OutPoint, SpendReceipt, SpendRequest};
pub use script::{
    extract_preimage, ConditionalScriptBuilder, EscrowScript, EscrowVariant, RedemptionBuilder,
    SpendWitness,
};
pub use signer::{Secp256k1Oracle, Secp256k1Verifier, SignatureVerifier, SigningOracle};
pub use types::{Commitment, ContentKey, TxID};
