//! MQTT broker session adapter.
//!
//! Implements [`ConnectivityPort`] (session up, command topics subscribed)
//! and [`EventSink`] (acks, heartbeat, and log lines published under
//! `<prefix><verb>/<gate id>`).
//!
//! Inbound messages never touch the domain from the client's task: the
//! receive callback copies them into the [`Mailbox`] and the control loop
//! takes them from there.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` (ESP-MQTT, which keeps
//!   reconnecting on its own once created).
//! - **all other targets**: an in-process loopback that records publishes
//!   and lets tests inject broker messages.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::adapters::device_id::{self, ClientId};
use crate::app::commands::{Topic, Verb, topic_for};
use crate::app::events::{AppEvent, Payload};
use crate::app::mailbox::{InboundMessage, Mailbox};
use crate::app::ports::{ConnectivityError, ConnectivityPort, EventSink};
use crate::config::GateId;
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

pub type TopicPrefix = heapless::String<8>;

/// Copy one received message into the mailbox.  Oversized or non-UTF-8
/// messages are dropped here.
fn deliver(mailbox: &Mailbox, topic: Option<&str>, data: &[u8]) {
    let Some(topic) = topic else {
        warn!("MQTT: fragmented message ignored");
        return;
    };
    match InboundMessage::new(topic, data) {
        Some(msg) => mailbox.post(msg),
        None => warn!("MQTT: dropped oversized message on {topic}"),
    }
}

pub struct MqttAdapter {
    prefix: TopicPrefix,
    gate_id: GateId,
    client_id: ClientId,
    mailbox: &'static Mailbox,
    /// Set by the client callback on connect, cleared on disconnect.
    connected: Arc<AtomicBool>,
    /// Set on every (re)connect; the next `connect()` re-subscribes.
    needs_subscribe: Arc<AtomicBool>,
    #[cfg(target_os = "espidf")]
    broker_url: &'static str,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim_failures_left: u32,
    #[cfg(not(target_os = "espidf"))]
    subscriptions: Vec<Topic>,
    #[cfg(not(target_os = "espidf"))]
    published: Vec<(Topic, Payload)>,
}

impl MqttAdapter {
    fn with_parts(prefix: &str, gate_id: &GateId, mailbox: &'static Mailbox) -> Self {
        Self {
            prefix: crate::config::bounded(prefix),
            gate_id: gate_id.clone(),
            client_id: device_id::client_id(gate_id),
            mailbox,
            connected: Arc::new(AtomicBool::new(false)),
            needs_subscribe: Arc::new(AtomicBool::new(false)),
            #[cfg(target_os = "espidf")]
            broker_url: "",
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim_failures_left: 0,
            #[cfg(not(target_os = "espidf"))]
            subscriptions: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            published: Vec::new(),
        }
    }

    /// Broker session for `gate_id`.  The client is created lazily on the
    /// first `connect()`, after WiFi is up.
    #[cfg(target_os = "espidf")]
    pub fn new(
        broker_url: &'static str,
        prefix: &str,
        gate_id: &GateId,
        mailbox: &'static Mailbox,
    ) -> Self {
        Self {
            broker_url,
            ..Self::with_parts(prefix, gate_id, mailbox)
        }
    }

    /// In-process loopback for host tests.
    #[cfg(not(target_os = "espidf"))]
    pub fn loopback(prefix: &str, gate_id: &GateId, mailbox: &'static Mailbox) -> Self {
        Self::with_parts(prefix, gate_id, mailbox)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The command topics this gate listens on.
    pub fn command_topics(&self) -> impl Iterator<Item = Topic> + '_ {
        Verb::ALL
            .into_iter()
            .map(|verb| topic_for(&self.prefix, verb.as_str(), &self.gate_id))
    }

    /// Publish `payload` on `topic` with QoS 0, not retained.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(CommsError::MqttPublishFailed);
        }
        self.platform_publish(topic, payload)
    }

    // ── Loopback controls ─────────────────────────────────────

    /// Loopback: make the next `n` connection attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn fail_next(&mut self, n: u32) {
        self.sim_failures_left = n;
    }

    /// Loopback: the broker dropped the session.
    #[cfg(not(target_os = "espidf"))]
    pub fn drop_link(&mut self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Loopback: deliver a message as the broker would.  Returns `false`
    /// when the session is down or the topic is not subscribed.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&self, topic: &str, payload: &[u8]) -> bool {
        if !self.connected.load(Ordering::Acquire)
            || !self.subscriptions.iter().any(|t| t.as_str() == topic)
        {
            return false;
        }
        deliver(self.mailbox, Some(topic), payload);
        true
    }

    /// Loopback: every message published so far, oldest first.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(Topic, Payload)] {
        &self.published
    }

    /// Loopback: forget recorded publishes.
    #[cfg(not(target_os = "espidf"))]
    pub fn clear_published(&mut self) {
        self.published.clear();
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn subscriptions(&self) -> &[Topic] {
        &self.subscriptions
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), ConnectivityError> {
        if self.client.is_some() {
            return Ok(());
        }
        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            ..Default::default()
        };
        let connected = self.connected.clone();
        let needs_subscribe = self.needs_subscribe.clone();
        let mailbox = self.mailbox;
        let client = EspMqttClient::new_cb(self.broker_url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    connected.store(true, Ordering::Release);
                    needs_subscribe.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => connected.store(false, Ordering::Release),
                EventPayload::Received { topic, data, .. } => deliver(mailbox, topic, data),
                EventPayload::Error(e) => warn!("MQTT: {e:?}"),
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client start failed ({e})");
            ConnectivityError::ConnectionFailed
        })?;
        info!("MQTT: client {} started for {}", self.client_id, self.broker_url);
        self.client = Some(client);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), ConnectivityError> {
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }
        if self.sim_failures_left > 0 {
            self.sim_failures_left -= 1;
            warn!("MQTT(sim): simulated connect failure");
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.connected.store(true, Ordering::Release);
        self.needs_subscribe.store(true, Ordering::Release);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::MqttSubscribeFailed)?;
        client.subscribe(topic, QoS::AtMostOnce).map_err(|e| {
            warn!("MQTT: subscribe {topic} failed ({e})");
            CommsError::MqttSubscribeFailed
        })?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        if !self.subscriptions.iter().any(|t| t.as_str() == topic) {
            self.subscriptions.push(crate::config::bounded(topic));
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::MqttPublishFailed)?;
        client
            .enqueue(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| {
                debug!("MQTT: publish {topic} failed ({e})");
                CommsError::MqttPublishFailed
            })?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let text = core::str::from_utf8(payload).map_err(|_| CommsError::MqttPublishFailed)?;
        self.published
            .push((crate::config::bounded(topic), crate::config::bounded(text)));
        Ok(())
    }

    fn subscribe_commands(&mut self) -> Result<(), ConnectivityError> {
        for verb in Verb::ALL {
            let topic = topic_for(&self.prefix, verb.as_str(), &self.gate_id);
            if let Err(e) = self.platform_subscribe(&topic) {
                // Retry the whole set on the next connect().
                self.needs_subscribe.store(true, Ordering::Release);
                warn!("MQTT: {e}");
                return Err(ConnectivityError::ConnectionFailed);
            }
        }
        info!("MQTT: subscribed to {} command topics", Verb::ALL.len());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for MqttAdapter {
    /// Start the client if needed and, once the session is up, subscribe
    /// to the command topics.  Fails until the broker has accepted us.
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        self.platform_start()?;
        if !self.connected.load(Ordering::Acquire) {
            return Err(ConnectivityError::NotReady);
        }
        if self.needs_subscribe.swap(false, Ordering::AcqRel) {
            self.subscribe_commands()?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.needs_subscribe.load(Ordering::Acquire)
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

// ───────────────────────────────────────────────────────────────
// EventSink
// ───────────────────────────────────────────────────────────────

impl EventSink for MqttAdapter {
    fn emit(&mut self, event: &AppEvent) {
        let Some(verb) = event.topic_verb() else {
            return;
        };
        let topic = topic_for(&self.prefix, verb, &self.gate_id);
        let payload = event.payload();
        if let Err(e) = self.publish(&topic, payload.as_bytes()) {
            debug!("{e}: {topic}");
        }
    }
}
