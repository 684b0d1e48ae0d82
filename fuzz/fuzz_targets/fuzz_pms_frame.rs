//! Fuzz target: PMS7003 frame decoder
//!
//! Feeds arbitrary UART bytes to `FrameDecoder`, which must never panic
//! however the start markers and length fields line up.
//!
//! cargo fuzz run fuzz_pms_frame

#![no_main]

use libfuzzer_sys::fuzz_target;
use snuffelaar::drivers::pms_frame::FrameDecoder;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    for &byte in data {
        let _ = decoder.push(byte);
    }
});
