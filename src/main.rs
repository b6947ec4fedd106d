//! ble-rfid-reader - RFID/BLE access-control reader firmware.
//!
//! Runs on an nRF52840 with the SoftDevice S140. A card on the MFRC522
//! antenna prints its UID on the host UART; a phone connecting over BLE
//! runs the mutual authentication handshake and, once trusted, prints
//! its user id instead.
//!
//! ## Tasks
//!
//! - `softdevice_task` - SoftDevice event pump
//! - `ble_task`        - advertising + GATT server, feeds transport events
//! - `reader_task`     - fixed-rate tick of the reader context

#![no_std]
#![no_main]

mod ble;
mod feedback;
mod rfid;

use core::mem;

use ble_rfid_reader::config::{ReaderConfig, BLE_DEVICE_NAME, TICK_PERIOD_MS};
use ble_rfid_reader::nonce::NonceGenerator;
use ble_rfid_reader::reader::ReaderContext;
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::interrupt::Priority;
use embassy_nrf::{bind_interrupts, peripherals, spim, uarte};
use embassy_time::{Duration, Instant, Ticker, Timer};
use nrf_softdevice::{raw, Softdevice};
use rand_chacha::ChaCha20Rng;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::ble::gatt::Server;
use crate::ble::SoftdeviceTransport;
use crate::feedback::FeedbackSink;
use crate::rfid::{Mfrc522Scanner, SpiDev};

include!(concat!(env!("OUT_DIR"), "/shared_key.rs"));

bind_interrupts!(struct Irqs {
    SPIM3 => spim::InterruptHandler<peripherals::SPI3>;
    UARTE0_UART0 => uarte::InterruptHandler<peripherals::UARTE0>;
});

type Reader =
    ReaderContext<SoftdeviceTransport, Mfrc522Scanner<SpiDev>, FeedbackSink, ChaCha20Rng>;

static SERVER: StaticCell<Server> = StaticCell::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    ble::peripheral_loop(sd, server).await
}

#[embassy_executor::task]
async fn reader_task(mut reader: Reader) -> ! {
    reader.start();
    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));
    loop {
        let now = Instant::now();
        reader.tick(now.as_millis());
        reader.sink_mut().service(now);
        ticker.next().await;
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: BLE_DEVICE_NAME.as_ptr() as _,
            current_len: BLE_DEVICE_NAME.len() as u16,
            max_len: BLE_DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

/// Seed for the nonce generator from the SoftDevice RNG. The entropy pool
/// fills shortly after enable, so early calls may have to wait.
async fn nonce_seed(sd: &Softdevice) -> [u8; 32] {
    let mut seed = [0u8; 32];
    while nrf_softdevice::random_bytes(sd, &mut seed).is_err() {
        Timer::after(Duration::from_millis(1)).await;
    }
    seed
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble-rfid-reader starting");

    // SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    // Pin mapping: see config.rs
    let green = Output::new(p.P0_13, Level::Low, OutputDrive::Standard);
    let red = Output::new(p.P0_14, Level::Low, OutputDrive::Standard);
    let buzzer = Output::new(p.P0_15, Level::Low, OutputDrive::Standard);

    let mut uart_config = uarte::Config::default();
    uart_config.baudrate = uarte::Baudrate::BAUD115200;
    let host = uarte::Uarte::new(p.UARTE0, Irqs, p.P0_08, p.P0_06, uart_config);

    let mut spi_config = spim::Config::default();
    spi_config.frequency = spim::Frequency::M1;
    let spi = spim::Spim::new(p.SPI3, Irqs, p.P0_19, p.P0_21, p.P0_20, spi_config);
    let nss = Output::new(p.P0_22, Level::High, OutputDrive::Standard);
    let rfid_spi = unwrap!(rfid::spi_device(spi, nss));
    let scanner = unwrap!(Mfrc522Scanner::new(rfid_spi));

    let sd = Softdevice::enable(&softdevice_config());
    let server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let seed = nonce_seed(sd).await;
    let config = ReaderConfig::new(SHARED_KEY);
    let reader: Reader = ReaderContext::new(
        &config,
        SoftdeviceTransport::new(sd, server),
        scanner,
        FeedbackSink::new(green, red, buzzer, host),
        NonceGenerator::from_seed(seed),
    );

    unwrap!(spawner.spawn(ble_task(sd, server)));
    unwrap!(spawner.spawn(reader_task(reader)));
}
