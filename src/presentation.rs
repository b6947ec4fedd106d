//! Side-effect sink for user and host feedback.
//!
//! The protocol core reports what happened; what that means for LEDs, the
//! buzzer and the host terminal is up to the implementation.

use crate::config::MAX_CARD_STRING_LEN;
use crate::error::TransportError;

/// Terminator appended to every host output line.
pub const HOST_LINE_TERMINATOR: u8 = b'\r';

/// Longest host line: a full card string plus the terminator.
pub const HOST_LINE_MAX_LEN: usize = MAX_CARD_STRING_LEN + 1;

/// One framed host output line.
pub type HostLine = heapless::Vec<u8, HOST_LINE_MAX_LEN>;

/// Reader feedback callbacks.
pub trait PresentationSink {
    /// Called once before the first tick.
    fn on_startup(&mut self) {}

    /// A new card was detected.
    fn on_card_found(&mut self, card: &str);

    /// The last card left the field and its timeout expired.
    fn on_card_timeout(&mut self);

    /// A phone connected.
    fn on_device_connected(&mut self);

    /// The phone connection ended (closed by either side).
    fn on_device_disconnected(&mut self);

    /// A phone completed authentication; `identity` is the printable user id.
    fn on_identity(&mut self, identity: &[u8]);

    /// The handshake failed or timed out.
    fn on_auth_failed(&mut self);
}

/// Frame `payload` as one host line: the bytes followed by `'\r'`.
/// No escaping is applied.
pub fn host_line(payload: &[u8]) -> Result<HostLine, TransportError> {
    let mut line = HostLine::new();
    line.extend_from_slice(payload)
        .map_err(|_| TransportError::BufferOverflow)?;
    line.push(HOST_LINE_TERMINATOR)
        .map_err(|_| TransportError::BufferOverflow)?;
    Ok(line)
}
