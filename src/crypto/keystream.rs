//! Hash-counter keystream cipher
//!
//! Block `i` of the keystream is `D(key || be32(i))`. Encryption and
//! decryption are the same XOR transform. Blocks depend only on the key and
//! their index, so any block can be computed on its own: this is what
//! [`KeystreamCipher::apply_at`] and [`KeystreamCipher::transform_parallel`]
//! build on. Both must agree byte-for-byte with the sequential
//! [`KeystreamCipher::transform`].
//!
//! An empty key is accepted but weak: every message is then XORed with
//! `D(be32(i))`, which anyone can compute.

use crate::config::CipherConfig;
use crate::error::{Result, ZkcpError};
use blake2::Blake2b512;
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use std::marker::PhantomData;

/// Reference keystream over SHA-256 (32-byte blocks)
pub type Sha256Keystream = KeystreamCipher<Sha256>;

/// Keystream over BLAKE2b-512 (64-byte blocks)
pub type Blake2bKeystream = KeystreamCipher<Blake2b512>;

/// Symmetric stream cipher generated from a hash function
#[derive(Clone, Debug)]
pub struct KeystreamCipher<D = Sha256> {
    config: CipherConfig,
    _digest: PhantomData<fn() -> D>,
}

impl<D: Digest> Default for KeystreamCipher<D> {
    fn default() -> Self {
        Self::new(CipherConfig::default())
    }
}

impl<D: Digest> KeystreamCipher<D> {
    /// Create a cipher with the given worker configuration
    pub fn new(config: CipherConfig) -> Self {
        Self {
            config,
            _digest: PhantomData,
        }
    }

    /// Size of one keystream block in bytes
    pub fn block_len() -> usize {
        <D as Digest>::output_size()
    }

    /// Largest message the 32-bit block counter can cover
    pub fn max_message_len() -> u64 {
        (u32::MAX as u64 + 1) * Self::block_len() as u64
    }

    /// Compute keystream block `counter` for `key`
    pub fn keystream_block(key: &[u8], counter: u32) -> Output<D> {
        let mut hasher = D::new();
        hasher.update(key);
        hasher.update(counter.to_be_bytes());
        hasher.finalize()
    }

    /// Encrypt `data` under `key`
    pub fn encrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        self.process(data, key)
    }

    /// Decrypt `data` under `key`
    pub fn decrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        self.process(data, key)
    }

    /// Transform with the configured strategy; sequential unless the
    /// message spans at least `parallel_threshold` blocks and more than one
    /// worker is configured.
    pub fn process(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let blocks = data.len().div_ceil(Self::block_len());
        if self.config.workers > 1 && blocks >= self.config.parallel_threshold {
            self.transform_parallel(data, key, self.config.workers)
        } else {
            Self::transform(data, key)
        }
    }

    /// XOR `data` against the keystream from byte 0
    pub fn transform(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        Self::check_len(data.len() as u64)?;

        let mut output = Vec::with_capacity(data.len());
        let mut counter: u32 = 0;
        while output.len() < data.len() {
            let block = Self::keystream_block(key, counter);
            let take = (data.len() - output.len()).min(block.len());
            let start = output.len();
            output.extend(
                data[start..start + take]
                    .iter()
                    .zip(block.iter())
                    .map(|(byte, ks)| byte ^ ks),
            );
            counter = counter.wrapping_add(1);
        }

        Ok(output)
    }

    /// XOR `data` against the keystream starting at stream byte `offset`
    pub fn apply_at(data: &[u8], key: &[u8], offset: u64) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(ZkcpError::MessageTooLong {
                len: u64::MAX,
                max: Self::max_message_len(),
            })?;
        Self::check_len(end)?;

        let block_len = Self::block_len() as u64;
        let mut output = Vec::with_capacity(data.len());
        let mut position = offset;
        while output.len() < data.len() {
            // check_len bounds every index reached here below 2^32
            let counter = (position / block_len) as u32;
            let within = (position % block_len) as usize;
            let block = Self::keystream_block(key, counter);
            let take = (data.len() - output.len()).min(block.len() - within);
            let start = output.len();
            output.extend(
                data[start..start + take]
                    .iter()
                    .zip(block[within..].iter())
                    .map(|(byte, ks)| byte ^ ks),
            );
            position += take as u64;
        }

        Ok(output)
    }

    /// Split the transform across `workers` scoped threads by block range.
    ///
    /// Every chunk boundary falls on a block boundary, so each worker starts
    /// from a whole counter value.
    pub fn transform_parallel(&self, data: &[u8], key: &[u8], workers: usize) -> Result<Vec<u8>> {
        Self::check_len(data.len() as u64)?;

        let block_len = Self::block_len();
        let blocks = data.len().div_ceil(block_len);
        let workers = workers.clamp(1, blocks.max(1));
        if workers == 1 {
            return Self::transform(data, key);
        }

        let chunk_len = blocks.div_ceil(workers) * block_len;
        let mut output = vec![0u8; data.len()];

        std::thread::scope(|scope| {
            for (index, (input, out)) in data
                .chunks(chunk_len)
                .zip(output.chunks_mut(chunk_len))
                .enumerate()
            {
                scope.spawn(move || {
                    let first_counter = (index * chunk_len / block_len) as u32;
                    for (offset, (in_block, out_block)) in input
                        .chunks(block_len)
                        .zip(out.chunks_mut(block_len))
                        .enumerate()
                    {
                        let block =
                            Self::keystream_block(key, first_counter.wrapping_add(offset as u32));
                        for ((o, i), ks) in out_block.iter_mut().zip(in_block).zip(block.iter()) {
                            *o = i ^ ks;
                        }
                    }
                });
            }
        });

        tracing::debug!(
            bytes = data.len(),
            workers,
            "keystream transformed in parallel"
        );

        Ok(output)
    }

    fn check_len(len: u64) -> Result<()> {
        let max = Self::max_message_len();
        if len > max {
            return Err(ZkcpError::MessageTooLong { len, max });
        }
        Ok(())
    }
}

/// Encrypt `data` with the reference SHA-256 keystream
pub fn encrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Sha256Keystream::transform(data, key)
}

/// Decrypt `data` with the reference SHA-256 keystream
pub fn decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Sha256Keystream::transform(data, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore};

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    #[test]
    fn test_known_vector() {
        let ciphertext = encrypt(b"secret content", b"HELLO").unwrap();
        assert_eq!(hex::encode(&ciphertext), "4088626bf13b4f200caf8e14e79e");
    }

    #[test]
    fn test_known_vector_spans_two_blocks() {
        let plaintext: Vec<u8> = (0u8..40).collect();
        let ciphertext = encrypt(&plaintext, b"k").unwrap();
        assert_eq!(
            hex::encode(&ciphertext),
            "c2b498c715ec6bf373d195f71734a1acba28058932f437352ebdf86f7f8538a61dde1e450c2c4944"
        );
    }

    #[test]
    fn test_keystream_block_layout() {
        let block0 = Sha256Keystream::keystream_block(b"HELLO", 0);
        let block1 = Sha256Keystream::keystream_block(b"HELLO", 1);
        assert_eq!(
            hex::encode(block0),
            "33ed0119944f6f4363c1fa7189eac6c669cd3242ff9c8104215bde4ae2cca6fa"
        );
        assert_eq!(
            hex::encode(block1),
            "6d7a47d37db49b39245906942c5bd6fd403f454600a14a211f13070f63ca1ac3"
        );
    }

    #[test]
    fn test_round_trip_lengths() {
        for key_len in [1usize, 16, 32, 64] {
            let key = random_bytes(key_len);
            for len in [0usize, 1, 31, 32, 33, 1000] {
                let plaintext = random_bytes(len);
                let ciphertext = encrypt(&plaintext, &key).unwrap();
                assert_eq!(ciphertext.len(), plaintext.len());
                assert_eq!(decrypt(&ciphertext, &key).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn test_empty_plaintext() {
        assert!(encrypt(&[], b"key").unwrap().is_empty());
    }

    #[test]
    fn test_empty_key_is_accepted() {
        let plaintext = b"weak but legal".to_vec();
        let ciphertext = encrypt(&plaintext, &[]).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert_eq!(decrypt(&ciphertext, &[]).unwrap(), plaintext);
    }

    #[test]
    fn test_deterministic() {
        let plaintext = random_bytes(100);
        let key = random_bytes(32);
        assert_eq!(
            encrypt(&plaintext, &key).unwrap(),
            encrypt(&plaintext, &key).unwrap()
        );
    }

    #[test]
    fn test_key_sensitivity() {
        let plaintext = random_bytes(64);
        for _ in 0..32 {
            let key1 = random_bytes(32);
            let key2 = random_bytes(32);
            if key1 == key2 {
                continue;
            }
            assert_ne!(
                encrypt(&plaintext, &key1).unwrap(),
                encrypt(&plaintext, &key2).unwrap()
            );
        }
    }

    #[test]
    fn test_single_bit_key_flip_changes_every_block() {
        let plaintext = vec![0u8; 96];
        let key = random_bytes(32);
        let mut flipped = key.clone();
        flipped[7] ^= 0x01;

        let a = encrypt(&plaintext, &key).unwrap();
        let b = encrypt(&plaintext, &flipped).unwrap();
        for (block_a, block_b) in a.chunks(32).zip(b.chunks(32)) {
            assert_ne!(block_a, block_b);
        }
    }

    #[test]
    fn test_apply_at_matches_full_transform() {
        let key = random_bytes(20);
        let plaintext = random_bytes(200);
        let full = Sha256Keystream::transform(&plaintext, &key).unwrap();

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let start = rng.gen_range(0..plaintext.len());
            let end = rng.gen_range(start..=plaintext.len());
            let part =
                Sha256Keystream::apply_at(&plaintext[start..end], &key, start as u64).unwrap();
            assert_eq!(part, full[start..end]);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let cipher = Sha256Keystream::default();
        let key = random_bytes(32);
        for len in [0usize, 1, 31, 32, 33, 1000, 4097] {
            let plaintext = random_bytes(len);
            let sequential = Sha256Keystream::transform(&plaintext, &key).unwrap();
            for workers in [1usize, 2, 3, 8] {
                assert_eq!(
                    cipher.transform_parallel(&plaintext, &key, workers).unwrap(),
                    sequential
                );
            }
        }
    }

    #[test]
    fn test_configured_parallel_process() {
        let cipher = Sha256Keystream::new(CipherConfig {
            workers: 4,
            parallel_threshold: 2,
        });
        let key = random_bytes(32);
        let plaintext = random_bytes(777);
        let ciphertext = cipher.encrypt(&plaintext, &key).unwrap();
        assert_eq!(ciphertext, encrypt(&plaintext, &key).unwrap());
        assert_eq!(cipher.decrypt(&ciphertext, &key).unwrap(), plaintext);
    }

    #[test]
    fn test_blake2b_keystream_uses_64_byte_blocks() {
        assert_eq!(Blake2bKeystream::block_len(), 64);

        let key = random_bytes(32);
        let plaintext = random_bytes(130);
        let ciphertext = Blake2bKeystream::transform(&plaintext, &key).unwrap();
        assert_ne!(ciphertext, encrypt(&plaintext, &key).unwrap());
        assert_eq!(
            Blake2bKeystream::transform(&ciphertext, &key).unwrap(),
            plaintext
        );

        let parallel = Blake2bKeystream::default()
            .transform_parallel(&plaintext, &key, 3)
            .unwrap();
        assert_eq!(parallel, ciphertext);
    }

    #[test]
    fn test_offset_past_counter_range_rejected() {
        let max = Sha256Keystream::max_message_len();
        let result = Sha256Keystream::apply_at(&[0u8; 2], b"k", max - 1);
        assert!(matches!(result, Err(ZkcpError::MessageTooLong { .. })));

        // the very last byte of the stream is still reachable
        assert!(Sha256Keystream::apply_at(&[0u8; 1], b"k", max - 1).is_ok());
    }
}
