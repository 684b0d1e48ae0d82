//! Fuzz target: `topic::resolve` and `publisher::format_payload`
//!
//! Splits arbitrary input into a prefix, a pattern and a substitution
//! list, checks that resolution never panics, and that the payload built
//! from the resolved name always starts with that name.
//!
//! cargo fuzz run fuzz_topic_template

#![no_main]

use libfuzzer_sys::fuzz_target;
use snuffelaar::publisher::format_payload;
use snuffelaar::sensors::Reading;
use snuffelaar::topic::{resolve, Substitution};

const TOKENS: [&str; 4] = ["{index}", "{size}", "{", ""];

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let mut parts = text.split('\u{1f}');
    let prefix = parts.next().unwrap_or("");
    let pattern = parts.next().unwrap_or("");
    let subs: Vec<Substitution> = parts
        .enumerate()
        .map(|(i, v)| Substitution::new(TOKENS[i % TOKENS.len()], v))
        .collect();

    let r = resolve(prefix, pattern, &subs);

    if subs.is_empty() {
        assert_eq!(r.topic, format!("{prefix}{pattern}"));
        assert_eq!(r.name, pattern);
    }

    let reading = Reading::new(prefix, "PPM");
    let payload = format_payload(&r.name, "study", &reading, data.len() % 2 == 0);
    assert!(payload.starts_with(&format!("{},room=study value=", r.name)));
});
