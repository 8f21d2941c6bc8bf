//! Shared string checks for identities, credentials, and topic segments.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
///
/// Used to validate gate identities and the build-time Wi-Fi SSID.
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Whether `s` can be used as a single broker topic level: printable,
/// no level separator, no wildcards.
pub(crate) fn is_topic_segment(s: &str) -> bool {
    is_printable_ascii(s) && !s.contains(['/', '+', '#'])
}
