//! Signing and verification collaborators
//!
//! The escrow core never computes signatures itself. It hands a 32-byte spend
//! digest to a [`SigningOracle`] and treats the returned bytes as opaque; the
//! ledger side checks them through a [`SignatureVerifier`].

use bitcoin::ecdsa;
use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey, VerifyOnly};
use bitcoin::sighash::EcdsaSighashType;

/// Produces signatures over spend digests
pub trait SigningOracle {
    /// Key the signatures verify under
    fn public_key(&self) -> PublicKey;

    /// Sign a spend digest, returning the encoded signature
    fn sign(&self, digest: &[u8; 32]) -> Vec<u8>;
}

/// Validates signatures produced by a [`SigningOracle`]
pub trait SignatureVerifier {
    fn verify(&self, digest: &[u8; 32], signature: &[u8], pubkey: &[u8]) -> bool;
}

/// secp256k1 ECDSA signer emitting DER signatures with `SIGHASH_ALL`
pub struct Secp256k1Oracle {
    secp: Secp256k1<All>,
    secret: SecretKey,
    public: PublicKey,
}

impl Secp256k1Oracle {
    pub fn new(secret: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public = secret.public_key(&secp);
        Self {
            secp,
            secret,
            public,
        }
    }

    /// Oracle over a freshly generated key
    pub fn random() -> Self {
        Self::new(SecretKey::new(&mut rand::thread_rng()))
    }
}

impl SigningOracle for Secp256k1Oracle {
    fn public_key(&self) -> PublicKey {
        self.public
    }

    fn sign(&self, digest: &[u8; 32]) -> Vec<u8> {
        let message = Message::from_digest(*digest);
        let signature = self.secp.sign_ecdsa(&message, &self.secret);
        ecdsa::Signature::sighash_all(signature).to_vec()
    }
}

/// Verifies DER + `SIGHASH_ALL` secp256k1 signatures
pub struct Secp256k1Verifier {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Verifier {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }
}

impl Default for Secp256k1Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, digest: &[u8; 32], signature: &[u8], pubkey: &[u8]) -> bool {
        let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
            return false;
        };
        let Ok(signature) = ecdsa::Signature::from_slice(signature) else {
            return false;
        };
        if signature.sighash_type != EcdsaSighashType::All {
            return false;
        }

        let message = Message::from_digest(*digest);
        self.secp
            .verify_ecdsa(&message, &signature.signature, &pubkey)
            .is_ok()
    }
}
