//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Advertiser** - advertises the authentication service as a
//!    connectable, scannable peripheral and accepts one central at a time.
//! 2. **GATT server** - hosts the authentication characteristic and turns
//!    client writes into [`TransportEvent::AttributeChanged`].
//! 3. **Transport adapter** - [`SoftdeviceTransport`] gives the reader's
//!    tick loop synchronous access to the link through the library's
//!    [`Transport`] trait.
//!
//! The advertiser task and the tick loop share an event channel, the
//! current [`Connection`] and a restart signal; both run on the same
//! executor thread.

pub mod gatt;

use core::cell::RefCell;

use ble_rfid_reader::config::{AUTH_SERVICE_UUID_LE, BLE_ADV_INTERVAL, BLE_DEVICE_NAME};
use ble_rfid_reader::error::TransportError;
use ble_rfid_reader::transport::{AttributeHandle, Transport, TransportEvent};
use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_futures::select::{select, Either};
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::advertisement_builder::{
    Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
};
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::Softdevice;

use self::gatt::{AuthServiceEvent, Server, ServerEvent};

/// Depth of the event queue between the BLE task and the tick loop.
const EVENT_QUEUE_LEN: usize = 8;

/// Back-off before re-advertising after an advertising error.
const ADV_RETRY_MS: u64 = 500;

static EVENTS: Channel<CriticalSectionRawMutex, TransportEvent, EVENT_QUEUE_LEN> = Channel::new();

/// Raised by [`SoftdeviceTransport::reinitialize`]: abandon the current
/// advertising set and start a fresh one.
static RESTART: Signal<CriticalSectionRawMutex, ()> = Signal::new();

static CONNECTION: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>> =
    Mutex::new(RefCell::new(None));

static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .services_128(ServiceList::Complete, &[AUTH_SERVICE_UUID_LE])
    .build();

static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .full_name(BLE_DEVICE_NAME)
    .build();

fn push_event(event: TransportEvent) {
    if EVENTS.try_send(event).is_err() {
        warn!("BLE event queue full, dropping {}", event);
    }
}

fn current_connection() -> Option<Connection> {
    CONNECTION.lock(|c| c.borrow().clone())
}

/// Advertise, serve one central until it leaves, repeat.
pub async fn peripheral_loop(sd: &'static Softdevice, server: &'static Server) -> ! {
    let config = peripheral::Config {
        interval: BLE_ADV_INTERVAL,
        ..Default::default()
    };
    let channel_handle = AttributeHandle::new(server.auth.channel_value_handle);

    loop {
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &SCAN_DATA,
        };
        let advertise = peripheral::advertise_connectable(sd, adv, &config);
        let conn = match select(advertise, RESTART.wait()).await {
            Either::First(Ok(conn)) => conn,
            Either::First(Err(e)) => {
                warn!("advertising failed: {}", e);
                Timer::after(Duration::from_millis(ADV_RETRY_MS)).await;
                continue;
            }
            Either::Second(()) => {
                info!("advertising restarted");
                continue;
            }
        };

        info!("central connected");
        CONNECTION.lock(|c| c.replace(Some(conn.clone())));
        push_event(TransportEvent::ConnectionOpened);

        let reason = gatt_server::run(&conn, server, |event| match event {
            ServerEvent::Auth(AuthServiceEvent::ChannelWrite(_)) => {
                push_event(TransportEvent::AttributeChanged(channel_handle));
            }
            ServerEvent::Auth(AuthServiceEvent::ChannelCccdWrite { notifications }) => {
                debug!("auth channel notifications: {}", notifications);
            }
        })
        .await;

        CONNECTION.lock(|c| c.replace(None));
        push_event(TransportEvent::ConnectionClosed);
        info!("central disconnected: {}", reason);
    }
}

/// [`Transport`] over the SoftDevice GATT server.
///
/// Handles arrive with bit 15 as the state machine set it; the GATT
/// table only knows the plain value handle.
pub struct SoftdeviceTransport {
    sd: &'static Softdevice,
    channel: u16,
}

impl SoftdeviceTransport {
    pub fn new(sd: &'static Softdevice, server: &Server) -> Self {
        Self {
            sd,
            channel: server.auth.channel_value_handle,
        }
    }
}

impl Transport for SoftdeviceTransport {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        EVENTS.try_receive().ok()
    }

    fn read_attribute(
        &mut self,
        handle: AttributeHandle,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        gatt_server::get_value(self.sd, handle.value_handle(), buf)
            .map_err(|_| TransportError::ReadFailed)
    }

    fn write_attribute(
        &mut self,
        handle: AttributeHandle,
        data: &[u8],
        notify: bool,
    ) -> Result<(), TransportError> {
        gatt_server::set_value(self.sd, handle.value_handle(), data)
            .map_err(|_| TransportError::WriteFailed)?;
        if notify {
            let conn = current_connection().ok_or(TransportError::NotConnected)?;
            gatt_server::notify_value(&conn, handle.value_handle(), data)
                .map_err(|_| TransportError::WriteFailed)?;
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        match current_connection() {
            Some(conn) => conn
                .disconnect()
                .map_err(|_| TransportError::DisconnectFailed),
            None => Ok(()),
        }
    }

    /// Reset the link layer to its power-on behaviour: forget events still
    /// queued from the torn-down peer, clear the characteristic and make the
    /// BLE task start a fresh advertising set.
    fn reinitialize(&mut self) -> Result<(), TransportError> {
        let mut dropped = 0usize;
        while EVENTS.try_receive().is_ok() {
            dropped += 1;
        }
        debug!("transport reinit, {} stale events dropped", dropped);

        gatt_server::set_value(self.sd, self.channel, &[])
            .map_err(|_| TransportError::ReinitFailed)?;
        RESTART.signal(());
        Ok(())
    }
}
