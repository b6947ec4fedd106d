//! Decoding of peer-originated payloads.
//!
//! Peer writes arrive either as ASCII hex text (two characters per byte)
//! or as raw bytes, depending on [`PeerEncoding`]. Decoding is strict:
//! a payload of the wrong length or with a non-hex character is rejected
//! rather than packed into garbage.
//!
//! # Identity message layout (32 bytes decoded)
//!
//! ```text
//! 0..8    user id, right-aligned, zero padded
//! 8..16   message time, big-endian u64 unix seconds
//! 16..24  expiration time, big-endian u64 unix seconds
//! 24..32  reserved
//! ```

use crate::cipher::Block;
use crate::config::{PeerEncoding, BLOCK_LEN, IDENTITY_LEN};
use crate::error::ProtocolError;

/// Number of user id characters carried in an identity message.
pub const USER_ID_LEN: usize = 16;

const USER_ID_BYTES: core::ops::Range<usize> = 0..8;
const MESSAGE_TIME_BYTES: core::ops::Range<usize> = 8..16;
const EXPIRATION_BYTES: core::ops::Range<usize> = 16..24;

/// Decode one cipher block written by the peer.
pub fn decode_peer_block(encoding: PeerEncoding, raw: &[u8]) -> Result<Block, ProtocolError> {
    let mut block = [0u8; BLOCK_LEN];
    decode_into(encoding, raw, encoding.block_wire_len(), &mut block)?;
    Ok(block)
}

/// Decode the peer's signed identity message.
pub fn decode_identity(
    encoding: PeerEncoding,
    raw: &[u8],
) -> Result<IdentityRecord, ProtocolError> {
    let mut message = [0u8; IDENTITY_LEN];
    decode_into(encoding, raw, encoding.identity_wire_len(), &mut message)?;

    let mut user_id = [0u8; USER_ID_LEN];
    match encoding {
        // The hex text of bytes 0..8 already is the printable id.
        PeerEncoding::AsciiHex => user_id.copy_from_slice(&raw[..USER_ID_LEN]),
        PeerEncoding::Raw => hex::encode_to_slice(&message[USER_ID_BYTES], &mut user_id)
            .map_err(|_| ProtocolError::MalformedPayload)?,
    }

    Ok(IdentityRecord {
        user_id,
        message_time: be_u64(&message[MESSAGE_TIME_BYTES]),
        expiration_time: be_u64(&message[EXPIRATION_BYTES]),
    })
}

fn decode_into(
    encoding: PeerEncoding,
    raw: &[u8],
    wire_len: usize,
    out: &mut [u8],
) -> Result<(), ProtocolError> {
    if raw.len() != wire_len {
        return Err(ProtocolError::MalformedPayload);
    }
    match encoding {
        PeerEncoding::AsciiHex => {
            hex::decode_to_slice(raw, out).map_err(|_| ProtocolError::MalformedPayload)
        }
        PeerEncoding::Raw => {
            out.copy_from_slice(raw);
            Ok(())
        }
    }
}

fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// A decoded identity message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityRecord {
    /// ASCII user id, zero padded on the left.
    pub user_id: [u8; USER_ID_LEN],
    /// Backend time when the message was signed (unix seconds).
    pub message_time: u64,
    /// Last second the message is valid (unix seconds).
    pub expiration_time: u64,
}

impl IdentityRecord {
    /// Check both timestamps against each other and the reader clock.
    ///
    /// Expiring exactly at `reader_now` is still valid.
    pub fn validate(&self, reader_now: u64) -> Result<(), ProtocolError> {
        if self.expiration_time < self.message_time {
            return Err(ProtocolError::InvalidTimestamps);
        }
        if self.expiration_time < reader_now {
            return Err(ProtocolError::Expired);
        }
        Ok(())
    }

    /// User id without its leading `'0'` padding. An all-zero id renders
    /// as a single `"0"`.
    pub fn display_id(&self) -> &[u8] {
        let start = self
            .user_id
            .iter()
            .position(|&c| c != b'0')
            .unwrap_or(USER_ID_LEN - 1);
        &self.user_id[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_bytes(user: [u8; 8], message_time: u64, expiration: u64) -> [u8; 32] {
        let mut m = [0u8; 32];
        m[..8].copy_from_slice(&user);
        m[8..16].copy_from_slice(&message_time.to_be_bytes());
        m[16..24].copy_from_slice(&expiration.to_be_bytes());
        m
    }

    #[test]
    fn hex_block_decodes_both_cases() {
        let block = decode_peer_block(
            PeerEncoding::AsciiHex,
            b"00112233445566778899AABBCCDDEEff",
        )
        .unwrap();
        assert_eq!(block[0], 0x00);
        assert_eq!(block[10], 0xaa);
        assert_eq!(block[15], 0xff);
    }

    #[test]
    fn hex_block_rejects_bad_char_and_length() {
        assert_eq!(
            decode_peer_block(PeerEncoding::AsciiHex, b"0011223344556677889900aabbccddzz"),
            Err(ProtocolError::MalformedPayload)
        );
        assert_eq!(
            decode_peer_block(PeerEncoding::AsciiHex, b"0011"),
            Err(ProtocolError::MalformedPayload)
        );
        assert_eq!(
            decode_peer_block(PeerEncoding::AsciiHex, &[b'0'; 64]),
            Err(ProtocolError::MalformedPayload)
        );
    }

    #[test]
    fn raw_block_requires_exact_length() {
        assert_eq!(decode_peer_block(PeerEncoding::Raw, &[7; 16]), Ok([7; 16]));
        assert_eq!(
            decode_peer_block(PeerEncoding::Raw, &[7; 15]),
            Err(ProtocolError::MalformedPayload)
        );
    }

    #[test]
    fn hex_identity_fields() {
        let m = identity_bytes([0, 0, 0, 0, 0x12, 0x34, 0xab, 0xcd], 1_700_000_000, 1_700_000_600);
        let text = hex::encode(m);
        let record = decode_identity(PeerEncoding::AsciiHex, text.as_bytes()).unwrap();
        assert_eq!(&record.user_id, b"000000001234abcd");
        assert_eq!(record.message_time, 1_700_000_000);
        assert_eq!(record.expiration_time, 1_700_000_600);
        assert_eq!(record.display_id(), b"1234abcd");
    }

    #[test]
    fn raw_identity_renders_lowercase_hex_id() {
        let m = identity_bytes([0, 0, 0, 0, 0, 0, 0x0B, 0xEE], 5, 6);
        let record = decode_identity(PeerEncoding::Raw, &m).unwrap();
        assert_eq!(&record.user_id, b"0000000000000bee");
        assert_eq!(record.display_id(), b"bee");
    }

    #[test]
    fn identity_rejects_wrong_wire_length() {
        let m = identity_bytes([0; 8], 1, 2);
        let text = hex::encode(m);
        assert_eq!(
            decode_identity(PeerEncoding::AsciiHex, &text.as_bytes()[..62]),
            Err(ProtocolError::MalformedPayload)
        );
        assert_eq!(
            decode_identity(PeerEncoding::AsciiHex, &m),
            Err(ProtocolError::MalformedPayload)
        );
        assert_eq!(
            decode_identity(PeerEncoding::Raw, text.as_bytes()),
            Err(ProtocolError::MalformedPayload)
        );
    }

    #[test]
    fn padding_strip_keeps_inner_zeros() {
        let record = IdentityRecord {
            user_id: *b"0000000010203000",
            message_time: 0,
            expiration_time: 0,
        };
        assert_eq!(record.display_id(), b"10203000");
    }

    #[test]
    fn all_zero_id_renders_single_zero() {
        let record = IdentityRecord {
            user_id: [b'0'; 16],
            message_time: 0,
            expiration_time: 0,
        };
        assert_eq!(record.display_id(), b"0");
    }

    #[test]
    fn identity_wrong_length_rejected() {
        assert_eq!(
            decode_identity(PeerEncoding::AsciiHex, &[b'0'; 32]),
            Err(ProtocolError::MalformedPayload)
        );
        assert_eq!(
            decode_identity(PeerEncoding::Raw, &[0; 64]),
            Err(ProtocolError::MalformedPayload)
        );
    }

    #[test]
    fn expiration_boundary() {
        let record = IdentityRecord {
            user_id: [b'0'; 16],
            message_time: 1_000,
            expiration_time: 2_000,
        };
        assert_eq!(record.validate(2_000), Ok(()));
        assert_eq!(record.validate(2_001), Err(ProtocolError::Expired));
    }

    #[test]
    fn expiration_before_message_time_is_invalid() {
        let record = IdentityRecord {
            user_id: [b'0'; 16],
            message_time: 2_000,
            expiration_time: 1_999,
        };
        assert_eq!(record.validate(0), Err(ProtocolError::InvalidTimestamps));
    }
}
