//! Exchange driver tying the seller and buyer to a ledger

pub mod party;
pub mod session;
pub mod types;

pub use party::{Buyer, Seller};
pub use session::ExchangeSession;
pub use types::{ExchangeState, Offer, Role};
