// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transport capability entities and the controller publish through.
//!
//! Entities never hold a reference to the controller, only to this publish
//! capability. That keeps every entity testable in isolation and makes the
//! transport swappable: production code wires an
//! [`MqttClient`](crate::protocol::MqttClient), tests wire a
//! [`RecordingClient`](crate::testing::RecordingClient).

use std::sync::Arc;

use crate::error::ProtocolError;

/// Publish/subscribe capability handed to entities and the controller.
///
/// Implementations must be cheap to call from the serial dispatch path; the
/// MQTT implementation enqueues without awaiting.
pub trait Client: Send + Sync {
    /// Publishes a payload on a topic.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the message cannot be enqueued.
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError>;

    /// Subscribes to a topic.
    ///
    /// Subscribing to an already-subscribed topic must be a no-op at the
    /// broker, so callers may resubscribe freely on reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the subscription cannot be enqueued.
    fn subscribe(&self, topic: &str) -> Result<(), ProtocolError>;
}

/// Shared handle to a [`Client`] implementation.
pub type SharedClient = Arc<dyn Client>;
