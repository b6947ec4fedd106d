//! AES-128-CBC session with explicit IV lifecycle.
//!
//! CBC chaining carries state from one block to the next. Phones never see
//! each other's traffic, so the reader cannot let that state leak from one
//! peer (or one handshake phase) into the next: callers reset the IV on
//! every new connection and right before each cipher operation that
//! answers a peer write. With the IV freshly reset a single block is
//! `AES(key, block ^ initial_iv)`, which is what the phone-side middleware
//! computes.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;

use crate::config::{BLOCK_LEN, KEY_LEN};

/// One 16-byte cipher block (nonce, ciphertext, plaintext).
pub type Block = [u8; BLOCK_LEN];

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// CBC-AES128 context keyed with the shared secret.
pub struct CipherSession {
    key: [u8; KEY_LEN],
    initial_iv: Block,
    encryptor: Aes128CbcEnc,
    decryptor: Aes128CbcDec,
}

impl CipherSession {
    /// Key the session; the IV starts at `initial_iv`.
    pub fn new(key: [u8; KEY_LEN], initial_iv: Block) -> Self {
        Self {
            key,
            initial_iv,
            encryptor: Aes128CbcEnc::new(&key.into(), &initial_iv.into()),
            decryptor: Aes128CbcDec::new(&key.into(), &initial_iv.into()),
        }
    }

    /// Restore the chaining state of both directions to the initial IV.
    pub fn reset_iv(&mut self) {
        self.encryptor = Aes128CbcEnc::new(&self.key.into(), &self.initial_iv.into());
        self.decryptor = Aes128CbcDec::new(&self.key.into(), &self.initial_iv.into());
    }

    /// Encrypt one block, advancing the encrypt-side chain.
    pub fn encrypt(&mut self, plaintext: &Block) -> Block {
        let mut block = aes::Block::from(*plaintext);
        self.encryptor.encrypt_block_mut(&mut block);
        to_block(&block)
    }

    /// Decrypt one block, advancing the decrypt-side chain.
    pub fn decrypt(&mut self, ciphertext: &Block) -> Block {
        let mut block = aes::Block::from(*ciphertext);
        self.decryptor.decrypt_block_mut(&mut block);
        to_block(&block)
    }
}

fn to_block(block: &aes::Block) -> Block {
    let mut out = [0u8; BLOCK_LEN];
    out.copy_from_slice(block.as_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 Appendix C.1
    const FIPS_KEY: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];
    const FIPS_PLAIN: Block = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];
    const FIPS_CIPHER: Block = [
        0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4, 0xc5,
        0x5a,
    ];

    #[test]
    fn zero_iv_first_block_matches_fips_vector() {
        let mut session = CipherSession::new(FIPS_KEY, [0; 16]);
        assert_eq!(session.encrypt(&FIPS_PLAIN), FIPS_CIPHER);
        assert_eq!(session.decrypt(&FIPS_CIPHER), FIPS_PLAIN);
    }

    #[test]
    fn decrypt_inverts_encrypt_after_reset() {
        let mut session = CipherSession::new(FIPS_KEY, [0x5a; 16]);
        let x: Block = *b"0123456789abcdef";
        session.reset_iv();
        let c = session.encrypt(&x);
        session.reset_iv();
        assert_eq!(session.decrypt(&c), x);
    }

    #[test]
    fn chaining_changes_repeated_ciphertext() {
        let mut session = CipherSession::new(FIPS_KEY, [0; 16]);
        let first = session.encrypt(&FIPS_PLAIN);
        let second = session.encrypt(&FIPS_PLAIN);
        assert_ne!(first, second);
    }

    #[test]
    fn reset_restores_initial_chain() {
        let mut session = CipherSession::new(FIPS_KEY, [0; 16]);
        let first = session.encrypt(&FIPS_PLAIN);
        let _ = session.encrypt(&FIPS_PLAIN);
        session.reset_iv();
        assert_eq!(session.encrypt(&FIPS_PLAIN), first);
    }

    #[test]
    fn stale_decrypt_chain_corrupts_result() {
        let mut session = CipherSession::new(FIPS_KEY, [0; 16]);
        let c = session.encrypt(&FIPS_PLAIN);
        // Advance the decrypt chain with an unrelated block first.
        let _ = session.decrypt(&[0xee; 16]);
        assert_ne!(session.decrypt(&c), FIPS_PLAIN);
        session.reset_iv();
        assert_eq!(session.decrypt(&c), FIPS_PLAIN);
    }
}
