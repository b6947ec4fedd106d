//! Build script - copies the linker script into the output directory
//! so that the linker can find it at link time, and turns the provisioned
//! shared AES key into a generated constant for the firmware.
//!
//! Host builds (`cargo test --lib`) skip both steps.

use std::env;
use std::fs;
use std::path::PathBuf;

/// Environment variable carrying the 128-bit shared key as 32 hex digits.
const SHARED_KEY_ENV: &str = "READER_SHARED_KEY";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed={SHARED_KEY_ENV}");

    if env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to OUT_DIR
    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();

    // Tell cargo to look for linker scripts in OUT_DIR
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Rebuild if the linker script changes
    println!("cargo:rerun-if-changed=memory.x");

    let raw = env::var(SHARED_KEY_ENV).unwrap_or_else(|_| {
        panic!("{SHARED_KEY_ENV} must be set (32 hex digits) for embedded builds")
    });
    let key = parse_key(raw.trim()).unwrap_or_else(|msg| panic!("{SHARED_KEY_ENV}: {msg}"));

    let generated = format!(
        "/// Shared AES-128 key provisioned at build time.\n\
         pub const SHARED_KEY: [u8; 16] = {key:?};\n"
    );
    fs::write(out_dir.join("shared_key.rs"), generated).unwrap();
}

fn parse_key(hex: &str) -> Result<[u8; 16], String> {
    if hex.len() != 32 {
        return Err(format!("expected 32 hex digits, got {}", hex.len()));
    }
    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        let pair = &hex[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex pair {pair:?}"))?;
    }
    Ok(key)
}
