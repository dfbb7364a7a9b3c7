use std::io::{Read, Write};
use std::sync::Once;

use anyhow::Result;
use bytes::Bytes;
use chrono::Local;
use flate2::read::ZlibDecoder;

static INIT_LOGGER_ONCE: Once = Once::new();

pub fn init() {
    INIT_LOGGER_ONCE.call_once(|| {
        dotenv::dotenv().ok();

        env_logger::builder()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {:<5} {}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.module_path().unwrap(),
                    record.args()
                )
            })
            .init();
    })
}

pub fn init_unit_test() {
    std::env::set_var("RUST_LOG", "info");
    init();
}

pub fn u8_val(buf: &[u8], addr: usize) -> u8 {
    buf[addr]
}

pub fn u16_val(buf: &[u8], addr: usize) -> u16 {
    u16::from_be_bytes(buf[addr..addr + 2].try_into().expect("ERR_READ_VALUE_u16"))
}

pub fn u24_val(buf: &[u8], addr: usize) -> u32 {
    ((buf[addr] as u32) << 16) | ((buf[addr + 1] as u32) << 8) | (buf[addr + 2] as u32)
}

pub fn u32_val(buf: &[u8], addr: usize) -> u32 {
    u32::from_be_bytes(buf[addr..addr + 4].try_into().expect("ERR_READ_VALUE_u32"))
}

pub fn u64_val(buf: &[u8], addr: usize) -> u64 {
    u64::from_be_bytes(buf[addr..addr + 8].try_into().expect("ERR_READ_VALUE_u64"))
}

/// 6-byte transaction id.
pub fn u48_val(buf: &[u8], addr: usize) -> u64 {
    let b = &buf[addr..addr + 6];
    let arr = [0u8, 0u8, b[0], b[1], b[2], b[3], b[4], b[5]];
    u64::from_be_bytes(arr)
}

/// 7-byte rollback pointer.
pub fn u56_val(buf: &[u8], addr: usize) -> u64 {
    let b = &buf[addr..addr + 7];
    let arr = [0u8, b[0], b[1], b[2], b[3], b[4], b[5], b[6]];
    u64::from_be_bytes(arr)
}

/// Number of bytes needed to hold `n` bits.
pub fn bits_in_bytes(n: usize) -> usize {
    (n + 7) >> 3
}

/// Inflate a zlib stream. The caller checks the inflated length against the
/// length declared on the SDI record.
pub fn zlib_uncomp(input: Bytes) -> Result<String> {
    let mut decoder = ZlibDecoder::new(input.as_ref());
    let mut output = String::new();
    decoder.read_to_string(&mut output)?;
    Ok(output)
}
