//! Single-slot inbound message mailbox.
//!
//! The broker client's receive callback runs on its own task and only
//! posts here; the control loop takes at most one message per iteration.
//! A message that arrives before the previous one was taken replaces it.

use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::warn;

/// One inbound broker message, copied out of the client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<64>,
    pub payload: heapless::String<32>,
}

impl InboundMessage {
    /// `None` when the topic or payload does not fit or the payload is not
    /// UTF-8.
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        let payload = core::str::from_utf8(payload).ok()?;
        let mut msg = Self {
            topic: heapless::String::new(),
            payload: heapless::String::new(),
        };
        msg.topic.write_str(topic).ok()?;
        msg.payload.write_str(payload).ok()?;
        Some(msg)
    }
}

pub struct Mailbox {
    slot: Signal<CriticalSectionRawMutex, InboundMessage>,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            slot: Signal::new(),
        }
    }

    /// Store `msg`, replacing any message not yet taken.
    pub fn post(&self, msg: InboundMessage) {
        if self.slot.signaled() {
            warn!("dropping unprocessed message; replaced by {}", msg.topic);
        }
        self.slot.signal(msg);
    }

    /// Take the pending message, leaving the slot empty.
    pub fn take(&self) -> Option<InboundMessage> {
        self.slot.try_take()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
