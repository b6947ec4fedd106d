//! Card channel: tag polling with new-card edge detection and an idle
//! timeout.
//!
//! The channel remembers the last card string it reported. A card that
//! stays on the antenna is reported once; it is forgotten after
//! `card_timeout_ms` without a sighting, so presenting it again later is
//! a new edge. While a BLE session is open the scanner is not polled and
//! the channel is frozen: no output, no timeout. The timeout window
//! restarts when the session ends.

use core::fmt::Write;

use crate::config::{MAX_CARD_ID_LEN, MAX_CARD_STRING_LEN};
use crate::presentation::PresentationSink;

/// Printable card identifier.
pub type CardString = heapless::String<MAX_CARD_STRING_LEN>;

/// Source of card sightings (the RFID front-end).
pub trait CardScanner {
    /// Look for a tag in the field and return its identifier.
    fn search(&mut self) -> Option<CardString>;
}

/// Render a card UID as uppercase hex, two characters per byte.
///
/// UIDs longer than [`MAX_CARD_ID_LEN`] bytes are truncated.
pub fn card_string_from_uid(uid: &[u8]) -> CardString {
    let mut s = CardString::new();
    for byte in uid.iter().take(MAX_CARD_ID_LEN) {
        // Capacity covers MAX_CARD_ID_LEN bytes.
        let _ = write!(s, "{byte:02X}");
    }
    s
}

/// Debounce and timeout state of the card reader.
#[derive(Debug)]
pub struct CardChannel {
    last_seen: CardString,
    deadline_ms: Option<u64>,
    present: bool,
    suspended: bool,
    timeout_ms: u64,
}

impl CardChannel {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            last_seen: CardString::new(),
            deadline_ms: None,
            present: false,
            suspended: false,
            timeout_ms,
        }
    }

    /// Last reported card, empty when none.
    pub fn last_seen(&self) -> &str {
        &self.last_seen
    }

    /// Poll the scanner once.
    ///
    /// Reports a card to `sink` only when it differs from the last one and
    /// re-arms the timeout on every sighting.
    pub fn poll<S, P>(&mut self, now_ms: u64, session_active: bool, scanner: &mut S, sink: &mut P)
    where
        S: CardScanner,
        P: PresentationSink,
    {
        if session_active {
            self.suspended = true;
            return;
        }
        if self.suspended {
            self.suspended = false;
            if self.deadline_ms.is_some() {
                self.deadline_ms = Some(now_ms.saturating_add(self.timeout_ms));
            }
        }

        match scanner.search() {
            Some(card) => {
                self.present = true;
                if card != self.last_seen {
                    info!("card found");
                    sink.on_card_found(&card);
                    self.last_seen = card;
                }
                self.deadline_ms = Some(now_ms.saturating_add(self.timeout_ms));
            }
            None => self.present = false,
        }
    }

    /// Forget the last card once its deadline passed with no card present.
    /// Does nothing while the channel is suspended by a session.
    pub fn check_timeout<P: PresentationSink>(&mut self, now_ms: u64, sink: &mut P) {
        let Some(deadline) = self.deadline_ms else {
            return;
        };
        if self.suspended || self.present || now_ms < deadline {
            return;
        }
        debug!("card timeout");
        self.deadline_ms = None;
        self.last_seen.clear();
        sink.on_card_timeout();
    }
}
