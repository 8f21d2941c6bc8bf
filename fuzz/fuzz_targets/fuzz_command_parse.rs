//! Fuzz target: `commands::parse` on arbitrary broker traffic.
//!
//! The first byte picks where the topic ends; the rest is split into topic
//! and payload and fed through the same lossy UTF-8 path the MQTT adapter
//! uses.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - An accepted topic always ends in this gate's identity
//! - Accepted limit values print back to the payload they came from
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use gatectl::app::commands::{GateCommand, parse};
use libfuzzer_sys::fuzz_target;

const GATE_ID: &str = "11";

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let cut = usize::from(split).min(rest.len());
    let (topic, payload) = rest.split_at(cut);
    let topic = String::from_utf8_lossy(topic);
    let payload = String::from_utf8_lossy(payload);

    let Ok(cmd) = parse(&topic, &payload, "/", GATE_ID) else {
        return;
    };
    assert!(topic.ends_with(GATE_ID));
    if let GateCommand::SetLimit { value, .. } = cmd {
        assert_eq!(
            payload.trim_start_matches('0'),
            value.to_string().trim_start_matches('0')
        );
    }
});
