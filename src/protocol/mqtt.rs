//! MQTT transport for the bus
//!
//! Two threads per connection: one drives the `rumqttc` event loop and feeds
//! decoded commands into the core, the other drains the core's outbound queue
//! and publishes. Subscriptions are (re)issued on every ConnAck so a broker
//! restart does not silently drop them.

use anyhow::{anyhow, Result};
use flume::{Receiver, RecvTimeoutError, Selector, Sender};
use rumqttc::{
    Client, Connection, Event, MqttOptions, Outgoing, Packet, QoS, TlsConfiguration, Transport,
};
use std::time::Duration;

use super::messages::{decode_inbound, full_topic, BusToCore, CoreToBus, SUBSCRIBED_TOPICS};
use crate::{core::bus::Bus, core::task_manager::spawn_named_thread, utils::sleep_3s_blocking};

const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Broker coordinates parsed from a `mqtt://host:port/prefix` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Topic prefix, the equivalent of the exchange name.
    pub prefix: String,
    pub client_id: String,
    pub keep_alive: Duration,
}

impl MqttSettings {
    pub fn from_url(url: &str, client_id: &str, keep_alive: Duration) -> Result<Self> {
        let parsed = url::Url::parse(url).map_err(|e| anyhow!("Invalid MQTT URL {url}: {e}"))?;

        let use_tls = match parsed.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            other => return Err(anyhow!("Unsupported MQTT URL scheme: {other}")),
        };
        let host = parsed.host_str().unwrap_or("localhost").to_string();
        let port = parsed
            .port()
            .unwrap_or(if use_tls { 8883 } else { 1883 });
        let prefix = parsed.path().trim_matches('/').to_string();

        Ok(Self {
            host,
            port,
            use_tls,
            prefix,
            client_id: client_id.to_string(),
            keep_alive,
        })
    }
}

/// How long shutdown waits for each bus thread.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Keeps the client alive and shuts the connection down cleanly.
pub struct MqttHandle {
    client: Client,
    stop_tx: Sender<()>,
    publisher_done: Receiver<()>,
    events_done: Receiver<()>,
}

impl MqttHandle {
    /// Publish everything still queued by the core, then disconnect.
    pub fn shutdown(self) {
        if self.stop_tx.send(()).is_err() {
            log::warn!("MQTT: publisher already stopped");
        }
        wait_for(&self.publisher_done, "mqtt-publisher");

        if let Err(e) = self.client.disconnect() {
            log::warn!("MQTT: failed to request disconnect: {e}");
        }
        wait_for(&self.events_done, "mqtt-events");
    }
}

/// Each bus thread holds the sender of its `done` channel; it disconnects
/// when the thread ends.
fn wait_for(done: &Receiver<()>, name: &str) {
    match done.recv_timeout(SHUTDOWN_GRACE) {
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("MQTT: {name} still busy after {SHUTDOWN_GRACE:?}, giving up")
        }
        _ => log::debug!("MQTT: {name} finished"),
    }
}

/// Connect to the broker and return the core side of the bus.
pub fn spawn(settings: &MqttSettings) -> Result<(Bus, MqttHandle)> {
    let client_id = format!("{}_{}", settings.client_id, uuid::Uuid::new_v4().simple());
    log::info!(
        "MQTT: connecting to {}:{} as {client_id}, topic prefix '{}'",
        settings.host,
        settings.port,
        settings.prefix
    );

    let mut options = MqttOptions::new(&client_id, &settings.host, settings.port);
    options.set_keep_alive(settings.keep_alive);
    if settings.use_tls {
        options.set_transport(Transport::tls_with_config(TlsConfiguration::Native));
    }

    let (client, connection) = Client::new(options, REQUEST_CHANNEL_CAPACITY);
    let (inbound_tx, inbound_rx) = flume::unbounded();
    let (outbound_tx, outbound_rx) = flume::unbounded();
    let (stop_tx, stop_rx) = flume::bounded::<()>(1);
    let (events_done_tx, events_done) = flume::bounded::<()>(1);
    let (publisher_done_tx, publisher_done) = flume::bounded::<()>(1);

    let prefix = settings.prefix.clone();
    let subscriber = client.clone();
    spawn_named_thread("mqtt-events", move || {
        let _done = events_done_tx;
        event_loop(connection, subscriber, prefix, inbound_tx)
    })?;

    let prefix = settings.prefix.clone();
    let publisher = client.clone();
    spawn_named_thread("mqtt-publisher", move || {
        let _done = publisher_done_tx;
        publish_loop(&outbound_rx, &stop_rx, |msg| {
            publish_message(&publisher, &prefix, msg)
        });
        log::debug!("MQTT: outbound queue drained");
    })?;

    let handle = MqttHandle {
        client,
        stop_tx,
        publisher_done,
        events_done,
    };
    Ok((Bus::new(inbound_rx, outbound_tx), handle))
}

fn subscribe_all(client: &Client, prefix: &str) {
    for topic in SUBSCRIBED_TOPICS {
        let topic = full_topic(prefix, topic);
        match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
            Ok(()) => log::info!("MQTT: subscribed to topic '{topic}'"),
            Err(e) => log::error!("MQTT: failed to subscribe to '{topic}': {e}"),
        }
    }
}

fn event_loop(
    mut connection: Connection,
    client: Client,
    prefix: String,
    inbound_tx: Sender<BusToCore>,
) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                log::info!("MQTT: connected");
                subscribe_all(&client, &prefix);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                log::debug!(
                    "Received MQTT message on {}: {}",
                    publish.topic,
                    String::from_utf8_lossy(&publish.payload)
                );
                match decode_inbound(&prefix, &publish.topic, &publish.payload) {
                    Ok(Some(msg)) => {
                        if inbound_tx.send(msg).is_err() {
                            log::info!("MQTT: core stopped listening, leaving event loop");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("Dropping message on {}: {e}", publish.topic),
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                log::info!("MQTT: disconnected");
                return;
            }
            Ok(_) => {
                // Other events, ignore
            }
            Err(e) => {
                log::warn!("MQTT connection error: {e}, will retry...");
                sleep_3s_blocking();
            }
        }
    }
}

/// Publish outbound messages until a stop request, then flush what is left.
fn publish_loop<F>(outbound_rx: &Receiver<CoreToBus>, stop_rx: &Receiver<()>, mut publish: F)
where
    F: FnMut(CoreToBus),
{
    loop {
        let next = Selector::new()
            .recv(outbound_rx, |msg| msg.ok())
            .recv(stop_rx, |_| None)
            .wait();
        match next {
            Some(msg) => publish(msg),
            None => break,
        }
    }

    for msg in outbound_rx.try_iter() {
        publish(msg);
    }
}

fn publish_message(client: &Client, prefix: &str, msg: CoreToBus) {
    let topic = full_topic(prefix, msg.topic());
    let payload = match msg.to_payload() {
        Ok(payload) => payload,
        Err(e) => {
            log::error!("{e:#}");
            return;
        }
    };

    if let Err(e) = client.publish(topic.as_str(), QoS::AtLeastOnce, false, payload) {
        log::error!("MQTT: failed to publish on '{topic}': {e}");
    }
}
