//! Unified error type for the reader.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use core::fmt;

/// Top-level error type used across the authentication path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The BLE transport refused or failed an operation.
    Transport(TransportError),

    /// The peer broke the handshake protocol.
    Protocol(ProtocolError),

    /// The session inactivity deadline expired.
    Timeout,
}

/// Failures reported by the transport adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Reading the attribute value failed.
    ReadFailed,
    /// Writing (or notifying) the attribute value failed.
    WriteFailed,
    /// The forced disconnect could not be issued.
    DisconnectFailed,
    /// Re-initialising the radio failed.
    ReinitFailed,
    /// No peer is connected.
    NotConnected,
    /// The attribute value does not fit the receive buffer.
    BufferOverflow,
}

/// Handshake violations detected by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Payload has the wrong length or is not valid hex.
    MalformedPayload,
    /// The decrypted app response does not match the issued challenge.
    ChallengeMismatch,
    /// The identity expires before its own message time.
    InvalidTimestamps,
    /// The identity expired before the reader's current time.
    Expired,
    /// A write was attempted before the peer touched the characteristic.
    NoActiveHandle,
}

// Convenience conversions

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport: {e:?}"),
            Error::Protocol(e) => write!(f, "protocol: {e:?}"),
            Error::Timeout => f.write_str("session timeout"),
        }
    }
}
