// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test doubles for the transport seam.
//!
//! [`RecordingClient`] implements [`Client`] by recording every publish and
//! subscribe instead of talking to a broker. It is public so downstream
//! applications can test their wiring the same way this crate tests its own.
//!
//! # Examples
//!
//! ```
//! use entibus::client::Client;
//! use entibus::testing::RecordingClient;
//!
//! let client = RecordingClient::new();
//! client.publish("light/command", "on", false).unwrap();
//! assert_eq!(client.published_payloads(), vec!["on"]);
//! ```

use parking_lot::Mutex;

use crate::client::Client;
use crate::error::ProtocolError;

/// A [`Client`] that records traffic instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingClient {
    published: Mutex<Vec<(String, String, bool)>>,
    subscribed: Mutex<Vec<String>>,
}

impl RecordingClient {
    /// Creates an empty recording client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every published `(topic, payload, retain)` triple in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, String, bool)> {
        self.published.lock().clone()
    }

    /// Returns just the published payloads in order.
    #[must_use]
    pub fn published_payloads(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|(_, payload, _)| payload.clone())
            .collect()
    }

    /// Returns every subscribed topic in order, duplicates included.
    #[must_use]
    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }

    /// Clears the recorded traffic.
    pub fn clear(&self) {
        self.published.lock().clear();
        self.subscribed.lock().clear();
    }
}

impl Client for RecordingClient {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError> {
        self.published
            .lock()
            .push((topic.to_string(), payload.to_string(), retain));
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.subscribed.lock().push(topic.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_publishes_in_order() {
        let client = RecordingClient::new();
        client.publish("a", "1", false).unwrap();
        client.publish("b", "2", true).unwrap();
        assert_eq!(
            client.published(),
            vec![
                ("a".to_string(), "1".to_string(), false),
                ("b".to_string(), "2".to_string(), true),
            ]
        );
    }

    #[test]
    fn records_subscriptions() {
        let client = RecordingClient::new();
        client.subscribe("topic").unwrap();
        client.subscribe("topic").unwrap();
        assert_eq!(client.subscribed(), vec!["topic", "topic"]);
    }

    #[test]
    fn clear_empties_the_record() {
        let client = RecordingClient::new();
        client.publish("a", "1", false).unwrap();
        client.clear();
        assert!(client.published().is_empty());
    }
}
