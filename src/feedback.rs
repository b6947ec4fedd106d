//! LED, buzzer and host-UART feedback.
//!
//! Callbacks from the reader only change the desired output pattern;
//! [`FeedbackSink::service`] is called every tick and drives the pins, so
//! no callback ever waits on a timer.
//!
//! | Event              | Green | Red   | Buzzer          | Host line     |
//! |--------------------|-------|-------|-----------------|---------------|
//! | startup            | on    | off   | long + short    |               |
//! | card found         | off   | blink | short           | card string   |
//! | card timeout       | on    | off   |                 |               |
//! | phone connected    | off   | blink | short           |               |
//! | phone disconnected | on    | off   |                 |               |
//! | identity           |       |       | short + short   | user id       |
//! | auth failed        |       |       | long            |               |

use ble_rfid_reader::config::{BEEP_LONG_MS, BEEP_SHORT_MS, LED_BLINK_MS};
use ble_rfid_reader::presentation::{host_line, PresentationSink};
use defmt::{info, warn};
use embassy_nrf::gpio::Output;
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::uarte::Uarte;
use embassy_time::{Duration, Instant};
use heapless::Deque;

/// Silence between two queued beeps (ms).
const BEEP_GAP_MS: u64 = 80;

#[derive(Clone, Copy)]
enum Buzzer {
    Quiet,
    Sounding { until: Instant },
    Gap { until: Instant },
}

pub struct FeedbackSink {
    green: Output<'static>,
    red: Output<'static>,
    buzzer_pin: Output<'static>,
    host: Uarte<'static, UARTE0>,
    red_blink_next: Option<Instant>,
    buzzer: Buzzer,
    beeps: Deque<u64, 4>,
}

impl FeedbackSink {
    pub fn new(
        green: Output<'static>,
        red: Output<'static>,
        buzzer_pin: Output<'static>,
        host: Uarte<'static, UARTE0>,
    ) -> Self {
        Self {
            green,
            red,
            buzzer_pin,
            host,
            red_blink_next: None,
            buzzer: Buzzer::Quiet,
            beeps: Deque::new(),
        }
    }

    /// Advance blink and beep patterns.
    pub fn service(&mut self, now: Instant) {
        if let Some(next) = self.red_blink_next {
            if now >= next {
                self.red.toggle();
                self.red_blink_next = Some(now + Duration::from_millis(LED_BLINK_MS));
            }
        }

        match self.buzzer {
            Buzzer::Sounding { until } if now >= until => {
                self.buzzer_pin.set_low();
                self.buzzer = Buzzer::Gap {
                    until: now + Duration::from_millis(BEEP_GAP_MS),
                };
            }
            Buzzer::Gap { until } if now >= until => self.buzzer = Buzzer::Quiet,
            _ => {}
        }

        if matches!(self.buzzer, Buzzer::Quiet) {
            if let Some(ms) = self.beeps.pop_front() {
                self.buzzer_pin.set_high();
                self.buzzer = Buzzer::Sounding {
                    until: now + Duration::from_millis(ms),
                };
            }
        }
    }

    fn beep(&mut self, pattern: &[u64]) {
        for &ms in pattern {
            if self.beeps.push_back(ms).is_err() {
                break;
            }
        }
    }

    fn idle_leds(&mut self) {
        self.red_blink_next = None;
        self.red.set_low();
        self.green.set_high();
    }

    fn busy_leds(&mut self) {
        self.green.set_low();
        self.red.set_high();
        self.red_blink_next = Some(Instant::now() + Duration::from_millis(LED_BLINK_MS));
    }

    fn write_host(&mut self, payload: &[u8]) {
        let line = match host_line(payload) {
            Ok(line) => line,
            Err(e) => {
                warn!("host line dropped: {}", e);
                return;
            }
        };
        if self.host.blocking_write(&line).is_err() {
            warn!("host UART write failed");
        }
    }
}

impl PresentationSink for FeedbackSink {
    fn on_startup(&mut self) {
        self.idle_leds();
        self.beep(&[BEEP_LONG_MS, BEEP_SHORT_MS]);
    }

    fn on_card_found(&mut self, card: &str) {
        info!("card {}", card);
        self.write_host(card.as_bytes());
        self.busy_leds();
        self.beep(&[BEEP_SHORT_MS]);
    }

    fn on_card_timeout(&mut self) {
        self.idle_leds();
    }

    fn on_device_connected(&mut self) {
        self.busy_leds();
        self.beep(&[BEEP_SHORT_MS]);
    }

    fn on_device_disconnected(&mut self) {
        self.idle_leds();
    }

    fn on_identity(&mut self, identity: &[u8]) {
        self.write_host(identity);
        self.beep(&[BEEP_SHORT_MS, BEEP_SHORT_MS]);
    }

    fn on_auth_failed(&mut self) {
        self.beep(&[BEEP_LONG_MS]);
    }
}
