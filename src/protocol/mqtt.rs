// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection driving a [`Controller`].
//!
//! The broker owns the rumqttc event loop and translates its events into the
//! controller's callbacks: a connection acknowledgement becomes
//! [`Controller::handle_connect`], an inbound publish becomes
//! [`Controller::handle_message`]. Callbacks run serially on the loop task —
//! no message dispatch ever overlaps another.
//!
//! # Examples
//!
//! ```no_run
//! use entibus::controller::{Controller, ControllerSettings};
//! use entibus::protocol::MqttBroker;
//!
//! # async fn example() -> entibus::Result<()> {
//! let broker = MqttBroker::builder()
//!     .host("192.168.1.50")
//!     .port(1883)
//!     .last_will("iotapp/app/state", "offline")
//!     .build()?;
//!
//! let mut controller = Controller::new(
//!     broker.client(),
//!     ControllerSettings::new().availability_topic("iotapp/app/state"),
//! );
//! // ... attach entities and handlers ...
//! broker.run(controller).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};

use crate::client::{Client, SharedClient};
use crate::controller::{ConnectResult, Controller};
use crate::error::ProtocolError;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Publish/subscribe handle over a rumqttc connection.
///
/// Operations enqueue onto the event loop without awaiting, which keeps the
/// dispatch path synchronous; the loop task flushes them to the broker.
#[derive(Debug, Clone)]
pub struct MqttClient {
    client: AsyncClient,
}

impl Client for MqttClient {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload)
            .map_err(ProtocolError::Mqtt)
    }

    fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(ProtocolError::Mqtt)
    }
}

/// An MQTT broker connection bound to one controller.
///
/// Built via [`MqttBroker::builder`]; the network connection is established
/// lazily by [`run`](Self::run).
pub struct MqttBroker {
    client: Arc<MqttClient>,
    event_loop: EventLoop,
    host: String,
    port: u16,
}

impl MqttBroker {
    /// Creates a new builder for configuring a broker connection.
    #[must_use]
    pub fn builder() -> MqttBrokerBuilder {
        MqttBrokerBuilder::default()
    }

    /// Returns the shared publish/subscribe handle for wiring entities.
    #[must_use]
    pub fn client(&self) -> SharedClient {
        self.client.clone()
    }

    /// Drives the event loop, feeding connection and message events into the
    /// controller until the connection is shut down.
    ///
    /// Transient connection errors are logged and polling continues, letting
    /// rumqttc reconnect; the fresh acknowledgement re-runs the controller's
    /// connect sequence (resubscription is idempotent).
    ///
    /// # Errors
    ///
    /// This function only returns when the request channel is closed; runtime
    /// failures are logged and retried, not surfaced.
    pub async fn run(mut self, mut controller: Controller) -> Result<(), ProtocolError> {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    let result = match ack.code {
                        ConnectReturnCode::Success => ConnectResult::Accepted,
                        code => ConnectResult::Refused(format!(
                            "Could not connect to {}:{} - {code:?}",
                            self.host, self.port
                        )),
                    };
                    if let Err(error) = controller.handle_connect(&result) {
                        tracing::error!(error = %error, "Connect sequence reported an error");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match std::str::from_utf8(&publish.payload) {
                        Ok(payload) => controller.handle_message(&publish.topic, payload),
                        Err(error) => {
                            tracing::warn!(
                                topic = %publish.topic,
                                error = %error,
                                "Dropping non-UTF-8 payload"
                            );
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::info!(host = %self.host, port = self.port, "Broker disconnected");
                }
                Ok(_) => {}
                Err(rumqttc::ConnectionError::RequestsDone) => {
                    tracing::info!("MQTT request channel closed, shutting down");
                    return Ok(());
                }
                Err(error) => {
                    tracing::error!(
                        host = %self.host,
                        port = self.port,
                        error = %error,
                        "MQTT event loop error"
                    );
                    // Back off before rumqttc retries the connection.
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for MqttBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBroker")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// Builder for an MQTT broker connection.
#[derive(Debug, Default)]
pub struct MqttBrokerBuilder {
    host: String,
    port: Option<u16>,
    keep_alive: Option<Duration>,
    credentials: Option<(String, String)>,
    client_id: Option<String>,
    last_will: Option<(String, String)>,
    capacity: Option<usize>,
}

impl MqttBrokerBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive = Some(duration);
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets an explicit client ID (default: generated per process).
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Installs a retained last-will message announcing the application
    /// offline. Pair with the controller's availability settings.
    #[must_use]
    pub fn last_will(mut self, topic: impl Into<String>, payload: impl Into<String>) -> Self {
        self.last_will = Some((topic.into(), payload.into()));
        self
    }

    /// Sets the request channel capacity (default: 10).
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Builds the broker connection.
    ///
    /// The network connection itself is established when
    /// [`MqttBroker::run`] polls the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAddress`] when no host is set.
    pub fn build(self) -> Result<MqttBroker, ProtocolError> {
        if self.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }
        let port = self.port.unwrap_or(1883);
        let client_id = self.client_id.unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("entibus_{}_{}", std::process::id(), counter)
        });

        let mut options = MqttOptions::new(&client_id, &self.host, port);
        options.set_keep_alive(self.keep_alive.unwrap_or(Duration::from_secs(30)));
        options.set_clean_session(true);
        if let Some((username, password)) = self.credentials {
            options.set_credentials(username, password);
        }
        if let Some((topic, payload)) = self.last_will {
            options.set_last_will(LastWill::new(topic, payload, QoS::AtLeastOnce, true));
        }

        let (client, event_loop) = AsyncClient::new(options, self.capacity.unwrap_or(10));
        tracing::debug!(host = %self.host, port = port, client_id = %client_id, "MQTT broker configured");
        Ok(MqttBroker {
            client: Arc::new(MqttClient { client }),
            event_loop,
            host: self.host,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_host() {
        let result = MqttBrokerBuilder::default().build();
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn builder_defaults() {
        let broker = MqttBrokerBuilder::default().host("localhost").build().unwrap();
        assert_eq!(broker.port, 1883);
        assert_eq!(broker.host, "localhost");
    }

    #[tokio::test]
    async fn builder_chain() {
        let broker = MqttBroker::builder()
            .host("example.com")
            .port(8883)
            .keep_alive(Duration::from_secs(10))
            .credentials("user", "pass")
            .client_id("test_client")
            .last_will("app/state", "offline")
            .build()
            .unwrap();
        assert_eq!(broker.host, "example.com");
        assert_eq!(broker.port, 8883);
    }

    #[tokio::test]
    async fn client_enqueues_without_connection() {
        let broker = MqttBroker::builder().host("localhost").build().unwrap();
        let client = broker.client();
        // Queueing succeeds even before any connection is established.
        client.publish("topic", "payload", false).unwrap();
        client.subscribe("topic").unwrap();
    }
}
