//! Fuzz target: portal form parsing and merging
//!
//! Drives arbitrary bodies through `parse_form` and `apply_to`.  Neither
//! may panic, whatever the percent escapes or UTF-8 look like.
//!
//! cargo fuzz run fuzz_portal_form

#![no_main]

use libfuzzer_sys::fuzz_target;
use snuffelaar::adapters::portal;
use snuffelaar::config::NodeConfig;

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    let submission = portal::parse_form(&body);

    let mut config = NodeConfig::default();
    submission.apply_to(&mut config, &["DS18B20", "MH-Z19"]);
    let _ = config.validate();
});
