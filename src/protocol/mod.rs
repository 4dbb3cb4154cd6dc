// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport backing the [`Client`](crate::client::Client) seam.
//!
//! The broker connection is the only place this crate touches the network.
//! Everything above it — entities, controller, dispatch — sees only the
//! publish/subscribe capability trait, so the transport can be swapped for a
//! recording fake in tests.

mod mqtt;

pub use mqtt::{MqttBroker, MqttBrokerBuilder, MqttClient};
