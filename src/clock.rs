//! Reader wall clock in unix seconds.
//!
//! The reader has no RTC. It starts from a configured epoch, counts
//! elapsed milliseconds from the monotonic tick and is pulled forward by
//! the message time of every identity that passes validation.

/// Unix-seconds clock driven by a wrapping 32-bit millisecond counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderClock {
    secs: u64,
    last_tick_ms: Option<u32>,
    remainder_ms: u64,
}

impl ReaderClock {
    pub const fn new(epoch_secs: u64) -> Self {
        Self {
            secs: epoch_secs,
            last_tick_ms: None,
            remainder_ms: 0,
        }
    }

    /// Current reader time (unix seconds).
    pub const fn now_secs(&self) -> u64 {
        self.secs
    }

    /// Account for the time elapsed since the previous tick.
    ///
    /// Only the low 32 bits of `now_ms` are used, so a counter that wraps
    /// at 2^32 ms keeps the clock correct. Sub-second leftovers carry
    /// over to the next tick.
    pub fn tick(&mut self, now_ms: u64) {
        let now = now_ms as u32;
        if let Some(last) = self.last_tick_ms {
            let elapsed = u64::from(now.wrapping_sub(last)) + self.remainder_ms;
            self.secs = self.secs.saturating_add(elapsed / 1000);
            self.remainder_ms = elapsed % 1000;
        }
        self.last_tick_ms = Some(now);
    }

    /// Move the clock to `secs` if that is later than the current time.
    ///
    /// Returns `true` if the clock moved.
    pub fn advance_to(&mut self, secs: u64) -> bool {
        if secs > self.secs {
            self.secs = secs;
            true
        } else {
            false
        }
    }
}
