//! GATT table: one authentication service with a single
//! read/write/notify characteristic used as the handshake channel.
//!
//! The service UUID must match `config::AUTH_SERVICE_UUID`, which the
//! advertiser uses (the macros only accept literals).

use ble_rfid_reader::config::ATTRIBUTE_MAX_LEN;

#[nrf_softdevice::gatt_service(uuid = "5a44c004-4112-4274-880e-cd9b3daedf8e")]
pub struct AuthService {
    #[characteristic(uuid = "495f449c-fc60-4048-b53e-bdb3046d4495", read, write, notify)]
    pub channel: heapless::Vec<u8, ATTRIBUTE_MAX_LEN>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub auth: AuthService,
}
