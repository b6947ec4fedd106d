//! MFRC522 card front-end over SPI.
//!
//! Every poll wakes any ISO 14443-A tag in the field (WUPA, so a card
//! that was halted by the previous poll answers again), selects it, reads
//! its UID and halts it.

use ble_rfid_reader::card::{card_string_from_uid, CardScanner, CardString};
use defmt::{info, warn};
use embassy_nrf::gpio::Output;
use embassy_nrf::peripherals::SPI3;
use embassy_nrf::spim::Spim;
use embassy_time::Delay;
use embedded_hal::spi::SpiDevice;
use embedded_hal_bus::spi::ExclusiveDevice;
use mfrc522::comm::blocking::spi::SpiInterface;
use mfrc522::{Initialized, Mfrc522};

/// MFRC522 on SPI3 with a GPIO chip select.
pub type SpiDev = ExclusiveDevice<Spim<'static, SPI3>, Output<'static>, Delay>;

/// Error tag for front-end bring-up.
#[derive(Clone, Copy, defmt::Format)]
pub enum RfidInitError {
    ChipSelect,
    Init,
}

/// Wrap the SPI bus and chip select `nss` into an exclusive device.
pub fn spi_device(spi: Spim<'static, SPI3>, nss: Output<'static>) -> Result<SpiDev, RfidInitError> {
    ExclusiveDevice::new(spi, nss, Delay).map_err(|_| RfidInitError::ChipSelect)
}

/// Card scanner backed by an MFRC522.
///
/// Generic over the SPI device so any HAL's `SpiDevice` can drive it.
pub struct Mfrc522Scanner<SPI: SpiDevice> {
    reader: Mfrc522<SpiInterface<SPI>, Initialized>,
}

impl<SPI: SpiDevice> Mfrc522Scanner<SPI> {
    /// Bring up the MFRC522 behind `device`.
    pub fn new(device: SPI) -> Result<Self, RfidInitError> {
        let mut reader = Mfrc522::new(SpiInterface::new(device))
            .init()
            .map_err(|_| RfidInitError::Init)?;

        match reader.version() {
            Ok(v) => info!("MFRC522 version 0x{:02x}", v),
            Err(_) => warn!("MFRC522 version read failed"),
        }
        Ok(Self { reader })
    }
}

impl<SPI: SpiDevice> CardScanner for Mfrc522Scanner<SPI> {
    fn search(&mut self) -> Option<CardString> {
        let atqa = self.reader.wupa().ok()?;
        let uid = self.reader.select(&atqa).ok()?;
        let _ = self.reader.hlta();
        Some(card_string_from_uid(uid.as_bytes()))
    }
}
