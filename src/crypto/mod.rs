//! Cryptography module for the ZKCP core

pub mod commitment;
pub mod keystream;
pub mod types;

pub use commitment::{commit, verify_commitment};
pub use keystream::{decrypt, encrypt, Blake2bKeystream, KeystreamCipher, Sha256Keystream};
pub use types::EncryptedContent;
