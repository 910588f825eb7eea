//! Error types for the ZKCP core

use thiserror::Error;

/// Main error type for ZKCP operations
#[derive(Error, Debug)]
pub enum ZkcpError {
    // Input validation errors
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid commitment length: expected 32 bytes, got {0}")]
    InvalidCommitmentLength(usize),

    #[error("Commitment to the empty key would block the refund branch")]
    DegenerateCommitment,

    #[error("Content key of {len} bytes exceeds the {max}-byte push limit")]
    KeyTooLong { len: usize, max: usize },

    #[error("Invalid locktime: {0}")]
    InvalidLocktime(String),

    #[error("Message too long: {len} bytes exceeds the keystream limit of {max} bytes")]
    MessageTooLong { len: u64, max: u64 },

    // Script errors
    #[error("Not a ZKCP escrow template: {0}")]
    UnrecognizedTemplate(String),

    #[error("Script evaluation failed: {0}")]
    ScriptEvaluation(String),

    #[error("Witness encoding error: {0}")]
    WitnessEncoding(String),

    #[error("Preimage not found in spend")]
    PreimageNotFound,

    // Ledger errors
    #[error("Output not found: {0}")]
    OutputNotFound(String),

    #[error("Output already spent: {0}")]
    OutputAlreadySpent(String),

    #[error("Transaction not final: lock_time {lock_time} is above height {height}")]
    NonFinalSpend { lock_time: u32, height: u32 },

    #[error("Script hash mismatch for output {0}")]
    ScriptHashMismatch(String),

    #[error("Spend rejected: {0}")]
    SpendRejected(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),

    // Exchange errors
    #[error("Invalid exchange state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Offer rejected: {0}")]
    OfferRejected(String),

    // Configuration errors
    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    // General errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Result type alias for ZKCP operations
pub type Result<T> = std::result::Result<T, ZkcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ZkcpError::OutputNotFound("ab:0".to_string());
        assert_eq!(err.to_string(), "Output not found: ab:0");
    }

    #[test]
    fn test_commitment_length_error() {
        let err = ZkcpError::InvalidCommitmentLength(0);
        assert_eq!(
            err.to_string(),
            "Invalid commitment length: expected 32 bytes, got 0"
        );
    }

    #[test]
    fn test_error_conversion() {
        fn hex_function() -> Result<Vec<u8>> {
            Ok(hex::decode("zz")?)
        }

        let result = hex_function();
        assert!(matches!(result.unwrap_err(), ZkcpError::HexDecode(_)));
    }

    #[test]
    fn test_non_final_error() {
        let err = ZkcpError::NonFinalSpend {
            lock_time: 100,
            height: 99,
        };
        assert_eq!(
            err.to_string(),
            "Transaction not final: lock_time 100 is above height 99"
        );
    }
}
