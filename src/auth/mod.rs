//! Mutual-authentication state machine.
//!
//! The reader proves itself to the phone first, then the phone proves
//! itself to the reader, then the phone sends its signed identity:
//!
//! ```text
//!  phone                                   reader
//!  ConnectionOpened  ───────────────────▶  reset IV, arm deadline
//!  peer nonce N      ───────────────────▶  WaitPeerNonce
//!                    ◀───────────────────  E(N)              (notify)
//!  ack               ───────────────────▶  WaitReaderAuthAck
//!                    ◀───────────────────  challenge C       (notify)
//!  E(C)              ───────────────────▶  WaitAppAuthResponse, D(E(C)) == C ?
//!                    ◀───────────────────  go-ahead nonce    (notify)
//!  identity message  ───────────────────▶  WaitIdentification
//!                                          validate, emit id, scrub, disconnect
//! ```
//!
//! Action states run their entry action from [`AuthMachine::advance`];
//! `Wait*` states react to [`TransportEvent`]s in
//! [`AuthMachine::handle_event`]. Any error moves the machine to
//! [`AuthState::Failed`], whose entry action tears the session down and
//! returns to [`AuthState::Idle`].

use rand_core::{CryptoRng, RngCore};

use crate::cipher::{Block, CipherSession};
use crate::clock::ReaderClock;
use crate::config::{PeerEncoding, ReaderConfig, ATTRIBUTE_MAX_LEN, SCRUB_LEN};
use crate::error::{Error, ProtocolError, TransportError};
use crate::nonce::{blocks_match, NonceGenerator};
use crate::presentation::PresentationSink;
use crate::session::Session;
use crate::transport::{AttributeHandle, Transport, TransportEvent};
use crate::wire::{self, IdentityRecord};


/// Value written over the characteristic when a session ends.
const SCRUB_PATTERN: [u8; SCRUB_LEN] = [0; SCRUB_LEN];

/// Handshake state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// No peer connected.
    Idle,
    /// Connected, waiting for the phone's nonce.
    WaitPeerNonce,
    /// Encrypt the phone's nonce and send it back.
    ReaderAuthenticating { peer_nonce: Block },
    /// Waiting for the phone to accept the reader.
    WaitReaderAuthAck,
    /// Issue a challenge to the phone.
    AppAuthenticating,
    /// Waiting for the phone's encrypted challenge.
    WaitAppAuthResponse { challenge: Block },
    /// Phone proven; send the go-ahead nonce.
    AppAuthenticated,
    /// Waiting for the identity message.
    WaitIdentification,
    /// Validate and emit the identity.
    Identification { record: IdentityRecord },
    /// Tear down after an error.
    Failed(Error),
}

impl AuthState {
    /// State name for logs. Payloads (nonces) are never logged.
    pub const fn name(&self) -> &'static str {
        match self {
            AuthState::Idle => "Idle",
            AuthState::WaitPeerNonce => "WaitPeerNonce",
            AuthState::ReaderAuthenticating { .. } => "ReaderAuthenticating",
            AuthState::WaitReaderAuthAck => "WaitReaderAuthAck",
            AuthState::AppAuthenticating => "AppAuthenticating",
            AuthState::WaitAppAuthResponse { .. } => "WaitAppAuthResponse",
            AuthState::AppAuthenticated => "AppAuthenticated",
            AuthState::WaitIdentification => "WaitIdentification",
            AuthState::Identification { .. } => "Identification",
            AuthState::Failed(_) => "Failed",
        }
    }

    /// True for the states that wait on a peer write.
    pub const fn is_waiting(&self) -> bool {
        matches!(
            self,
            AuthState::WaitPeerNonce
                | AuthState::WaitReaderAuthAck
                | AuthState::WaitAppAuthResponse { .. }
                | AuthState::WaitIdentification
        )
    }
}

/// Write the scrub pattern over the characteristic without notifying the
/// client. Writing it twice leaves the same value.
pub fn scrub<T: Transport>(
    transport: &mut T,
    handle: AttributeHandle,
) -> Result<(), TransportError> {
    transport.write_attribute(handle.direct_path(), &SCRUB_PATTERN, false)
}

/// The handshake state machine together with the state it owns: the
/// session, the cipher context and the nonce source.
pub struct AuthMachine<R> {
    state: AuthState,
    session: Option<Session>,
    cipher: CipherSession,
    nonces: NonceGenerator<R>,
    encoding: PeerEncoding,
    session_timeout_ms: u64,
}

impl<R: RngCore + CryptoRng> AuthMachine<R> {
    pub fn new(config: &ReaderConfig, nonces: NonceGenerator<R>) -> Self {
        Self {
            state: AuthState::Idle,
            session: None,
            cipher: CipherSession::new(config.shared_key, config.initial_iv),
            nonces,
            encoding: config.peer_encoding,
            session_timeout_ms: config.session_timeout_ms,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_session_active(&self) -> bool {
        self.session.is_some()
    }

    /// Fail the session once its deadline has passed, whatever the state.
    pub fn check_deadline(&mut self, now_ms: u64) {
        let Some(session) = self.session else {
            return;
        };
        if session.is_expired(now_ms) && !matches!(self.state, AuthState::Failed(_)) {
            warn!("session deadline expired in {=str}", self.state.name());
            self.transition(AuthState::Failed(Error::Timeout));
        }
    }

    /// Run entry actions until the machine rests in `Idle` or a `Wait*`
    /// state.
    pub fn advance<T, P>(&mut self, transport: &mut T, sink: &mut P, clock: &mut ReaderClock)
    where
        T: Transport,
        P: PresentationSink,
    {
        while let Some(next) = self.run_entry_action(transport, sink, clock) {
            self.transition(next);
        }
    }

    /// React to one transport event.
    pub fn handle_event<T, P>(
        &mut self,
        event: TransportEvent,
        transport: &mut T,
        sink: &mut P,
        now_ms: u64,
    ) where
        T: Transport,
        P: PresentationSink,
    {
        match event {
            TransportEvent::ConnectionOpened => self.open_session(sink, now_ms),
            TransportEvent::ConnectionClosed => self.close_session(sink),
            TransportEvent::AttributeChanged(handle) => {
                self.on_attribute_changed(transport, handle)
            }
        }
    }

    fn transition(&mut self, next: AuthState) {
        debug!("auth: {=str} -> {=str}", self.state.name(), next.name());
        self.state = next;
    }

    fn teardown(&mut self) {
        self.session = None;
        self.cipher.reset_iv();
    }

    // Connection lifecycle

    fn open_session<P: PresentationSink>(&mut self, sink: &mut P, now_ms: u64) {
        if self.session.is_some() {
            warn!("connection opened over a live session, restarting handshake");
        }
        info!("peer connected");
        self.cipher.reset_iv();
        self.session = Some(Session::open(now_ms, self.session_timeout_ms));
        sink.on_device_connected();
        self.transition(AuthState::WaitPeerNonce);
    }

    fn close_session<P: PresentationSink>(&mut self, sink: &mut P) {
        if self.session.is_none() {
            debug!("connection closed with no session");
            return;
        }
        info!("peer disconnected");
        self.teardown();
        sink.on_device_disconnected();
        self.transition(AuthState::Idle);
    }

    // Peer writes

    fn on_attribute_changed<T: Transport>(&mut self, transport: &mut T, handle: AttributeHandle) {
        let Some(session) = self.session.as_mut() else {
            warn!("attribute changed with no session");
            return;
        };
        session.set_handle(handle);

        let next = match self.state.clone() {
            AuthState::WaitPeerNonce => self
                .read_block(transport, handle)
                .map(|peer_nonce| AuthState::ReaderAuthenticating { peer_nonce }),
            AuthState::WaitReaderAuthAck => self
                .read_ack(transport, handle)
                .map(|()| AuthState::AppAuthenticating),
            AuthState::WaitAppAuthResponse { challenge } => self
                .verify_response(transport, handle, &challenge)
                .map(|()| AuthState::AppAuthenticated),
            AuthState::WaitIdentification => self
                .read_identity(transport, handle)
                .map(|record| AuthState::Identification { record }),
            other => {
                warn!("attribute changed ignored in {=str}", other.name());
                return;
            }
        };
        self.transition(next.unwrap_or_else(AuthState::Failed));
    }

    fn read_block<T: Transport>(
        &mut self,
        transport: &mut T,
        handle: AttributeHandle,
    ) -> Result<Block, Error> {
        let mut buf = [0u8; ATTRIBUTE_MAX_LEN];
        let data = read_value(transport, handle, &mut buf)?;
        Ok(wire::decode_peer_block(self.encoding, data)?)
    }

    fn read_ack<T: Transport>(
        &mut self,
        transport: &mut T,
        handle: AttributeHandle,
    ) -> Result<(), Error> {
        // Content is not checked; the phone only has to answer.
        let mut buf = [0u8; ATTRIBUTE_MAX_LEN];
        read_value(transport, handle, &mut buf)?;
        Ok(())
    }

    fn verify_response<T: Transport>(
        &mut self,
        transport: &mut T,
        handle: AttributeHandle,
        challenge: &Block,
    ) -> Result<(), Error> {
        let response = self.read_block(transport, handle)?;
        self.cipher.reset_iv();
        let plain = self.cipher.decrypt(&response);
        if blocks_match(&plain, challenge) {
            info!("phone authenticated");
            Ok(())
        } else {
            Err(ProtocolError::ChallengeMismatch.into())
        }
    }

    fn read_identity<T: Transport>(
        &mut self,
        transport: &mut T,
        handle: AttributeHandle,
    ) -> Result<IdentityRecord, Error> {
        let mut buf = [0u8; ATTRIBUTE_MAX_LEN];
        let data = read_value(transport, handle, &mut buf)?;
        Ok(wire::decode_identity(self.encoding, data)?)
    }

    // Entry actions

    fn run_entry_action<T, P>(
        &mut self,
        transport: &mut T,
        sink: &mut P,
        clock: &mut ReaderClock,
    ) -> Option<AuthState>
    where
        T: Transport,
        P: PresentationSink,
    {
        let next = match self.state.clone() {
            AuthState::ReaderAuthenticating { peer_nonce } => self
                .answer_peer_nonce(transport, &peer_nonce)
                .map(|()| AuthState::WaitReaderAuthAck),
            AuthState::AppAuthenticating => self
                .send_fresh_nonce(transport)
                .map(|challenge| AuthState::WaitAppAuthResponse { challenge }),
            AuthState::AppAuthenticated => self
                .send_fresh_nonce(transport)
                .map(|_go_ahead| AuthState::WaitIdentification),
            AuthState::Identification { record } => self
                .identify(transport, sink, clock, &record)
                .map(|()| AuthState::Idle),
            AuthState::Failed(reason) => {
                self.fail(transport, sink, reason);
                Ok(AuthState::Idle)
            }
            AuthState::Idle
            | AuthState::WaitPeerNonce
            | AuthState::WaitReaderAuthAck
            | AuthState::WaitAppAuthResponse { .. }
            | AuthState::WaitIdentification => return None,
        };
        Some(next.unwrap_or_else(AuthState::Failed))
    }

    fn active_handle(&self) -> Result<AttributeHandle, ProtocolError> {
        self.session
            .and_then(|s| s.handle())
            .ok_or(ProtocolError::NoActiveHandle)
    }

    fn notify_peer<T: Transport>(&self, transport: &mut T, data: &Block) -> Result<(), Error> {
        let handle = self.active_handle()?;
        transport.write_attribute(handle.notify_path(), data, true)?;
        Ok(())
    }

    fn answer_peer_nonce<T: Transport>(
        &mut self,
        transport: &mut T,
        peer_nonce: &Block,
    ) -> Result<(), Error> {
        self.cipher.reset_iv();
        let ciphertext = self.cipher.encrypt(peer_nonce);
        self.notify_peer(transport, &ciphertext)
    }

    fn send_fresh_nonce<T: Transport>(&mut self, transport: &mut T) -> Result<Block, Error> {
        let nonce = self.nonces.generate();
        self.notify_peer(transport, &nonce)?;
        Ok(nonce)
    }

    fn identify<T, P>(
        &mut self,
        transport: &mut T,
        sink: &mut P,
        clock: &mut ReaderClock,
        record: &IdentityRecord,
    ) -> Result<(), Error>
    where
        T: Transport,
        P: PresentationSink,
    {
        record.validate(clock.now_secs())?;
        let handle = self.active_handle()?;

        info!("identity accepted");
        sink.on_identity(record.display_id());
        if clock.advance_to(record.message_time) {
            debug!("reader clock advanced to {=u64}", record.message_time);
        }

        scrub(transport, handle)?;
        if let Err(e) = transport.disconnect() {
            warn!("disconnect after identification failed: {}", e);
        }
        self.teardown();
        sink.on_device_disconnected();
        Ok(())
    }

    fn fail<T, P>(&mut self, transport: &mut T, sink: &mut P, reason: Error)
    where
        T: Transport,
        P: PresentationSink,
    {
        warn!("authentication failed: {}", reason);

        if let Ok(handle) = self.active_handle() {
            if let Err(e) = scrub(transport, handle) {
                warn!("scrub failed: {}", e);
            }
        }
        if let Err(e) = transport.disconnect() {
            warn!("disconnect failed: {}", e);
        }
        if let Err(e) = transport.reinitialize() {
            warn!("transport reinit failed: {}", e);
        }

        self.teardown();
        sink.on_auth_failed();
        sink.on_device_disconnected();
    }
}

fn read_value<'b, T: Transport>(
    transport: &mut T,
    handle: AttributeHandle,
    buf: &'b mut [u8; ATTRIBUTE_MAX_LEN],
) -> Result<&'b [u8], TransportError> {
    let len = transport.read_attribute(handle.notify_path(), buf)?;
    buf.get(..len).ok_or(TransportError::BufferOverflow)
}
