//! The reader context and its cooperative tick.
//!
//! Everything the firmware mutates lives here and is owned by the tick
//! loop: no statics, no locks. One [`ReaderContext::tick`] does, in order:
//!
//! 1. advance the reader clock
//! 2. poll the card channel and check its timeout
//! 3. check the session deadline
//! 4. run state machine entry actions
//! 5. poll exactly one transport event

use rand_core::{CryptoRng, RngCore};

use crate::auth::{AuthMachine, AuthState};
use crate::card::{CardChannel, CardScanner};
use crate::clock::ReaderClock;
use crate::config::ReaderConfig;
use crate::nonce::NonceGenerator;
use crate::presentation::PresentationSink;
use crate::transport::Transport;

pub struct ReaderContext<T, S, P, R> {
    transport: T,
    scanner: S,
    sink: P,
    clock: ReaderClock,
    card: CardChannel,
    auth: AuthMachine<R>,
}

impl<T, S, P, R> ReaderContext<T, S, P, R>
where
    T: Transport,
    S: CardScanner,
    P: PresentationSink,
    R: RngCore + CryptoRng,
{
    pub fn new(
        config: &ReaderConfig,
        transport: T,
        scanner: S,
        sink: P,
        nonces: NonceGenerator<R>,
    ) -> Self {
        Self {
            transport,
            scanner,
            sink,
            clock: ReaderClock::new(config.reader_epoch_secs),
            card: CardChannel::new(config.card_timeout_ms),
            auth: AuthMachine::new(config, nonces),
        }
    }

    /// Startup feedback. Call once before the first tick.
    pub fn start(&mut self) {
        info!("reader started");
        self.sink.on_startup();
    }

    /// One iteration of the cooperative loop.
    pub fn tick(&mut self, now_ms: u64) {
        self.clock.tick(now_ms);

        let session_active = self.auth.is_session_active();
        self.card
            .poll(now_ms, session_active, &mut self.scanner, &mut self.sink);
        self.card.check_timeout(now_ms, &mut self.sink);

        self.auth.check_deadline(now_ms);
        self.auth
            .advance(&mut self.transport, &mut self.sink, &mut self.clock);

        if let Some(event) = self.transport.poll_event() {
            trace!("transport event {}", event);
            self.auth
                .handle_event(event, &mut self.transport, &mut self.sink, now_ms);
        }
    }

    pub fn auth_state(&self) -> &AuthState {
        self.auth.state()
    }

    pub fn is_session_active(&self) -> bool {
        self.auth.is_session_active()
    }

    pub fn clock(&self) -> &ReaderClock {
        &self.clock
    }

    pub fn card(&self) -> &CardChannel {
        &self.card
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn scanner_mut(&mut self) -> &mut S {
        &mut self.scanner
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }
}
