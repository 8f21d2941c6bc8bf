//! Fuzz target: `SettingsRecord::decode` on arbitrary flash contents.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A record that decodes has distinct limits and re-encodes to the same
//!   leading bytes it was read from
//!
//! cargo fuzz run fuzz_settings_record

#![no_main]

use gatectl::settings::SettingsRecord;
use libfuzzer_sys::fuzz_target;

const VERSION: &str = "2025-03-05-01";

fuzz_target!(|data: &[u8]| {
    let Ok(record) = SettingsRecord::decode(data, VERSION) else {
        return;
    };
    assert_ne!(record.limits.open(), record.limits.closed());

    let encoded = record.encode(VERSION);
    let used = VERSION.len() + 1 + record.identity.len() + 1 + 8 + 4;
    assert_eq!(&encoded[..used], &data[..used]);
});
