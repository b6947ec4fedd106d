//! BLE transport seam.
//!
//! The protocol core never touches the radio directly. It polls one
//! [`TransportEvent`] per tick and reads/writes the authentication
//! characteristic through a [`Transport`] implementation: the SoftDevice
//! GATT server on target, a scripted fake in tests.
//!
//! ## Attribute handle bit 15
//!
//! The radio stack multiplexes two paths on one 16-bit handle:
//!
//! ```text
//! bit 15 = 1  value access following an attribute-changed event
//!             (writes through this handle notify the client)
//! bit 15 = 0  direct value write, the client is not notified
//! ```
//!
//! [`AttributeHandle`] keeps the raw value intact so adapters see exactly
//! the bit pattern the stack expects.

use crate::error::TransportError;

/// Opaque GATT attribute handle, bit 15 included.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttributeHandle(u16);

impl AttributeHandle {
    /// Bit marking the notification-triggered access path.
    pub const NOTIFY_PATH_BIT: u16 = 0x8000;

    /// Wrap a raw handle as reported by the stack.
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw value, bit 15 included.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Handle with bit 15 set: used to read a value after an
    /// attribute-changed event and to write with notification.
    pub const fn notify_path(self) -> Self {
        Self(self.0 | Self::NOTIFY_PATH_BIT)
    }

    /// Handle with bit 15 cleared: direct write, no client notification.
    pub const fn direct_path(self) -> Self {
        Self(self.0 & !Self::NOTIFY_PATH_BIT)
    }

    /// True if bit 15 is set.
    pub const fn is_notify_path(self) -> bool {
        self.0 & Self::NOTIFY_PATH_BIT != 0
    }

    /// Handle value as the GATT table knows it (bit 15 stripped).
    pub const fn value_handle(self) -> u16 {
        self.0 & !Self::NOTIFY_PATH_BIT
    }
}

/// Events the transport reports, at most one per poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportEvent {
    /// A central connected.
    ConnectionOpened,
    /// The central disconnected (or the link dropped).
    ConnectionClosed,
    /// The peer wrote the characteristic behind this handle.
    AttributeChanged(AttributeHandle),
}

/// Non-blocking access to the BLE link.
///
/// Every call either completes synchronously or reports failure; nothing
/// here may suspend the tick loop.
pub trait Transport {
    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Copy the attribute value into `buf` and return its length.
    fn read_attribute(
        &mut self,
        handle: AttributeHandle,
        buf: &mut [u8],
    ) -> Result<usize, TransportError>;

    /// Replace the attribute value; push it to the client when `notify`.
    fn write_attribute(
        &mut self,
        handle: AttributeHandle,
        data: &[u8],
        notify: bool,
    ) -> Result<(), TransportError>;

    /// Drop the current peer.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Bring the radio back to a clean advertising state.
    fn reinitialize(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_path_sets_bit_15_only() {
        let h = AttributeHandle::new(0x0012);
        assert_eq!(h.notify_path().raw(), 0x8012);
        assert!(h.notify_path().is_notify_path());
        assert_eq!(h.notify_path().value_handle(), 0x0012);
    }

    #[test]
    fn direct_path_clears_bit_15() {
        let h = AttributeHandle::new(0x8012);
        assert_eq!(h.direct_path().raw(), 0x0012);
        assert!(!h.direct_path().is_notify_path());
    }

    #[test]
    fn path_conversions_are_idempotent() {
        let h = AttributeHandle::new(0x0034);
        assert_eq!(h.notify_path().notify_path(), h.notify_path());
        assert_eq!(h.direct_path().direct_path(), h);
    }
}
