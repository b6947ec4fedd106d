//! Protocol core of the RFID/BLE access-control reader.
//!
//! Everything the reader decides lives here, free of hardware crates, so
//! it builds for the firmware and runs under `cargo test` on the host:
//!
//! - [`transport`] - BLE link seam (events, attribute read/write)
//! - [`cipher`] / [`nonce`] - AES-128-CBC session and challenge source
//! - [`auth`] - mutual-authentication state machine
//! - [`card`] - RFID polling with new-card edges and idle timeout
//! - [`reader`] - the context that owns it all and runs one tick
//!
//! Usage: `cargo test --lib` for unit tests, `cargo test` for the
//! integration scenarios too.
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main].
//! It supplies the hardware adapters (SoftDevice GATT server, MFRC522,
//! LEDs/buzzer/UART) and drives [`reader::ReaderContext::tick`].

#![cfg_attr(not(test), no_std)]

// This must go first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod auth;
pub mod card;
pub mod cipher;
pub mod clock;
pub mod config;
pub mod error;
pub mod nonce;
pub mod presentation;
pub mod reader;
pub mod session;
pub mod transport;
pub mod wire;

pub use error::Error;
