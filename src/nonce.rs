//! Challenge nonces.
//!
//! Every challenge the reader issues is a fresh 16-byte value drawn from a
//! CSPRNG. On target the generator is a ChaCha20 stream seeded from the
//! SoftDevice's hardware RNG at boot; tests seed it with a constant.

use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore};

use crate::cipher::Block;
use crate::config::BLOCK_LEN;

/// Source of challenge nonces.
pub struct NonceGenerator<R> {
    rng: R,
}

impl NonceGenerator<ChaCha20Rng> {
    /// ChaCha20-backed generator from a 256-bit seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::new(ChaCha20Rng::from_seed(seed))
    }
}

impl<R: RngCore + CryptoRng> NonceGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draw a new 16-byte nonce.
    pub fn generate(&mut self) -> Block {
        let mut nonce = [0u8; BLOCK_LEN];
        self.rng.fill_bytes(&mut nonce);
        nonce
    }
}

/// Compare two blocks without an early exit on the first differing byte.
pub fn blocks_match(a: &Block, b: &Block) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
