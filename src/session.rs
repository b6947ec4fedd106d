//! The single BLE peer session.

use crate::transport::AttributeHandle;

/// One open peer connection.
///
/// The deadline is armed when the connection opens and is not extended:
/// the whole handshake has to finish within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    handle: Option<AttributeHandle>,
    deadline_ms: u64,
}

impl Session {
    pub fn open(now_ms: u64, timeout_ms: u64) -> Self {
        Self {
            handle: None,
            deadline_ms: now_ms.saturating_add(timeout_ms),
        }
    }

    /// Attribute handle of the last peer write, as reported by the stack.
    pub fn handle(&self) -> Option<AttributeHandle> {
        self.handle
    }

    pub fn set_handle(&mut self, handle: AttributeHandle) {
        self.handle = Some(handle);
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_inclusive() {
        let s = Session::open(1_000, 10_000);
        assert!(!s.is_expired(10_999));
        assert!(s.is_expired(11_000));
    }

    #[test]
    fn handle_starts_unknown() {
        let mut s = Session::open(0, 10);
        assert_eq!(s.handle(), None);
        s.set_handle(AttributeHandle::new(0x8010));
        assert_eq!(s.handle(), Some(AttributeHandle::new(0x8010)));
    }
}
