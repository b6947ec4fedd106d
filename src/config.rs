//! Application-wide constants and runtime configuration.
//!
//! Hardware pin assignments, timing parameters, and protocol constants
//! live here so they can be tuned in one place. The shared AES key is
//! not a constant: it is provisioned at build time (see `build.rs`) and
//! handed to [`ReaderConfig::new`].

// Protocol sizes

/// Nonce / cipher block length in bytes.
pub const BLOCK_LEN: usize = 16;

/// Shared key length in bytes (AES-128).
pub const KEY_LEN: usize = 16;

/// Decoded identity message length in bytes.
pub const IDENTITY_LEN: usize = 32;

/// Largest value the authentication characteristic can hold
/// (a 64-character hex identity message).
pub const ATTRIBUTE_MAX_LEN: usize = 2 * IDENTITY_LEN;

/// Length of the value written when scrubbing the characteristic.
pub const SCRUB_LEN: usize = BLOCK_LEN;

// Timing

/// Card presence timeout (ms). A card must be re-seen within this window
/// or the channel forgets it.
pub const CARD_TIMEOUT_MS: u64 = 2_000;

/// BLE session inactivity deadline (ms), armed when a peer connects.
pub const SESSION_TIMEOUT_MS: u64 = 10_000;

/// Cooperative scheduler tick period (ms).
pub const TICK_PERIOD_MS: u64 = 10;

/// Reader clock start value (unix seconds) until a trusted peer advances it.
pub const DEFAULT_READER_EPOCH_SECS: u64 = 1_690_495_200;

// Card channel

/// Maximum UID length considered when building a card string (bytes).
pub const MAX_CARD_ID_LEN: usize = 32;

/// Maximum card string length (two hex characters per UID byte).
pub const MAX_CARD_STRING_LEN: usize = 2 * MAX_CARD_ID_LEN;

// BLE

/// Advertised device name.
pub const BLE_DEVICE_NAME: &str = "RFID-BLE Reader";

/// Authentication service UUID (128-bit).
pub const AUTH_SERVICE_UUID: &str = "5a44c004-4112-4274-880e-cd9b3daedf8e";

/// [`AUTH_SERVICE_UUID`] in advertising byte order (little-endian).
pub const AUTH_SERVICE_UUID_LE: [u8; 16] = [
    0x8e, 0xdf, 0xae, 0x3d, 0x9b, 0xcd, 0x0e, 0x88, 0x74, 0x42, 0x12, 0x41, 0x04, 0xc0, 0x44, 0x5a,
];

/// Advertising interval (in 0.625 ms units). 320 = 200 ms.
pub const BLE_ADV_INTERVAL: u32 = 320;

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Green LED      → P0.13
//   Red LED        → P0.14
//   Buzzer         → P0.15
//   MFRC522 SCK    → P0.19
//   MFRC522 MOSI   → P0.20
//   MFRC522 MISO   → P0.21
//   MFRC522 NSS    → P0.22
//   Host UART TX   → P0.06 (115200 8N1)
//   Host UART RX   → P0.08

/// LED blink half-period while a card or peer is active (ms).
pub const LED_BLINK_MS: u64 = 200;

/// Short beep duration (ms).
pub const BEEP_SHORT_MS: u64 = 100;

/// Long beep duration (ms).
pub const BEEP_LONG_MS: u64 = 500;

/// Wire representation of peer-originated writes.
///
/// Phones built against the middleware send hex text; early firmware
/// variants expected raw bytes. Reader-originated writes are always raw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeerEncoding {
    /// Two ASCII hex characters per byte (32 chars per block).
    #[default]
    AsciiHex,
    /// Raw bytes (16 per block).
    Raw,
}

impl PeerEncoding {
    /// Wire length of one peer-originated cipher block.
    pub const fn block_wire_len(self) -> usize {
        match self {
            PeerEncoding::AsciiHex => 2 * BLOCK_LEN,
            PeerEncoding::Raw => BLOCK_LEN,
        }
    }

    /// Wire length of the peer's identity message.
    pub const fn identity_wire_len(self) -> usize {
        match self {
            PeerEncoding::AsciiHex => 2 * IDENTITY_LEN,
            PeerEncoding::Raw => IDENTITY_LEN,
        }
    }
}

/// Runtime configuration owned by the reader context.
///
/// Deliberately not `Debug`: it carries the shared key.
#[derive(Clone)]
pub struct ReaderConfig {
    /// Shared AES-128 key, identical on the reader and every authorised phone.
    pub shared_key: [u8; KEY_LEN],
    /// CBC initialisation vector restored on every reset.
    pub initial_iv: [u8; BLOCK_LEN],
    /// How the peer encodes its writes.
    pub peer_encoding: PeerEncoding,
    /// Card presence timeout (ms).
    pub card_timeout_ms: u64,
    /// Session inactivity deadline (ms).
    pub session_timeout_ms: u64,
    /// Reader clock start value (unix seconds).
    pub reader_epoch_secs: u64,
}

impl ReaderConfig {
    /// Configuration with the documented defaults for everything but the key.
    pub const fn new(shared_key: [u8; KEY_LEN]) -> Self {
        Self {
            shared_key,
            initial_iv: [0; BLOCK_LEN],
            peer_encoding: PeerEncoding::AsciiHex,
            card_timeout_ms: CARD_TIMEOUT_MS,
            session_timeout_ms: SESSION_TIMEOUT_MS,
            reader_epoch_secs: DEFAULT_READER_EPOCH_SECS,
        }
    }

    /// Builder-style override of the peer encoding.
    pub const fn with_peer_encoding(mut self, encoding: PeerEncoding) -> Self {
        self.peer_encoding = encoding;
        self
    }
}
