//! Core types used throughout the ZKCP core

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 commitment `H = SHA-256(K)` embedded in the escrow script
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// Length of a commitment in bytes
    pub const LEN: usize = 32;

    /// Hash arbitrary data into a commitment
    pub fn of(data: &[u8]) -> Self {
        Commitment(Sha256::digest(data).into())
    }

    /// Create a commitment from a byte slice, rejecting anything but 32 bytes
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| crate::ZkcpError::InvalidCommitmentLength(bytes.len()))?;
        Ok(Commitment(digest))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get commitment as hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create commitment from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != Self::LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes);
        Ok(Commitment(digest))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Commitment::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The secret content key `K` the buyer pays for.
///
/// Any length is accepted. An empty key is legal for the cipher but gives a
/// keystream that depends on nothing secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKey(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl ContentKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        ContentKey(bytes.into())
    }

    /// Generate a random 32-byte key
    pub fn random() -> Self {
        use rand::RngCore;
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        ContentKey(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Compute the public commitment to this key
    pub fn commitment(&self) -> Commitment {
        crate::crypto::commit(&self.0)
    }

    /// Get key as hex string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Create key from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        Ok(ContentKey(hex::decode(hex_str)?))
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey(<{} bytes>)", self.0.len())
    }
}

/// Ledger transaction ID
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxID(pub String);

impl TxID {
    /// Derive an ID from the serialized transaction bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        let mut id: [u8; 32] = Sha256::digest(first).into();
        id.reverse();
        TxID(hex::encode(id))
    }
}

impl fmt::Display for TxID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serde helpers encoding byte vectors as lowercase hex strings
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for lists of byte vectors encoded as hex strings
pub mod hex_bytes_list {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = items.iter().map(hex::encode).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_known_vector() {
        // SHA-256("HELLO")
        let commitment = Commitment::of(b"HELLO");
        assert_eq!(
            commitment.to_hex(),
            "3733cd977ff8eb18b987357e22ced99f46097f31ecb239e878ae63760e83e4d5"
        );
    }

    #[test]
    fn test_commitment_from_slice_rejects_wrong_length() {
        assert!(matches!(
            Commitment::from_slice(&[]),
            Err(crate::ZkcpError::InvalidCommitmentLength(0))
        ));
        assert!(matches!(
            Commitment::from_slice(&[1u8; 20]),
            Err(crate::ZkcpError::InvalidCommitmentLength(20))
        ));
        assert!(Commitment::from_slice(&[1u8; 32]).is_ok());
    }

    #[test]
    fn test_commitment_hex_conversion() {
        let commitment = Commitment::of(b"test data");
        let restored = Commitment::from_hex(&commitment.to_hex()).unwrap();
        assert_eq!(commitment, restored);

        assert!(Commitment::from_hex("abcd").is_err());
    }

    #[test]
    fn test_commitment_serializes_as_hex() {
        let commitment = Commitment([0xab; 32]);
        let json = serde_json::to_string(&commitment).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));

        let back: Commitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, commitment);
    }

    #[test]
    fn test_content_key_random() {
        let key1 = ContentKey::random();
        let key2 = ContentKey::random();

        assert_eq!(key1.as_bytes().len(), 32);
        assert_ne!(key1, key2);
        assert_ne!(key1.commitment(), key2.commitment());
    }

    #[test]
    fn test_content_key_debug_is_redacted() {
        let key = ContentKey::new(b"HELLO".to_vec());
        let debug = format!("{:?}", key);
        assert!(!debug.contains("HELLO"));
        assert!(debug.contains("5 bytes"));
    }

    #[test]
    fn test_content_key_serialization() {
        let key = ContentKey::new(b"HELLO".to_vec());
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"48454c4c4f\"");

        let back: ContentKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
