// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! entibus - event-driven smart-home applications over MQTT.
//!
//! This library exposes heterogeneous smart-home devices as typed *entities*
//! (buttons, lights) with a uniform *event* model. A [`Controller`] routes
//! every inbound MQTT message to the entity that owns the topic, collects the
//! events it produces, and dispatches them to application handlers registered
//! per `(entity, event kind)` pair - with per-handler failure isolation, so
//! one misbehaving handler never takes down message processing.
//!
//! # Features
//!
//! - **Typed entities**: availability tracking, buttons with click detection,
//!   lights with on/off state, toggle, and debounced brightness telemetry
//! - **Templated payloads**: project values out of JSON documents with
//!   `{{ value.field }}` expressions, render outbound commands the same way
//! - **Config validation**: classify device/app documents into accepted and
//!   rejected sets before anything is instantiated
//! - **Live config monitoring**: debounced directory polling with a
//!   deterministic test rendezvous and cooperative stop
//!
//! # Quick Start
//!
//! Wire a button that toggles a light:
//!
//! ```no_run
//! use entibus::controller::{Controller, ControllerSettings};
//! use entibus::device::{AqaraButton, ShellyRgbw2};
//! use entibus::protocol::MqttBroker;
//!
//! #[tokio::main]
//! async fn main() -> entibus::Result<()> {
//!     let broker = MqttBroker::builder()
//!         .host("192.168.1.50")
//!         .last_will("iotapp/toggle/state", "offline")
//!         .build()?;
//!
//!     let mut controller = Controller::new(
//!         broker.client(),
//!         ControllerSettings::new().availability_topic("iotapp/toggle/state"),
//!     );
//!
//!     let buttons = AqaraButton::new("table_button").entities();
//!     let lamps = ShellyRgbw2::new("kitchen_lamp").entities();
//!     controller.add_entity("button", &buttons["table_button"])?;
//!     controller.add_entity("light", &lamps["kitchen_lamp"])?;
//!
//!     controller.on("button", "click", |entities, _event| {
//!         let state = entities.require("light")?.toggle()?;
//!         tracing::info!(state = ?state, "Toggled the light");
//!         Ok(())
//!     });
//!
//!     broker.run(controller).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing applications
//!
//! The transport sits behind the [`client::Client`] trait, so entities and
//! controllers are fully testable without a broker: build the wiring against
//! a [`testing::RecordingClient`] and feed messages with
//! [`Controller::handle_message`].

pub mod client;
pub mod config;
pub mod controller;
pub mod device;
pub mod entity;
pub mod error;
pub mod event;
pub mod protocol;
pub mod template;
pub mod testing;

pub use client::{Client, SharedClient};
pub use config::{
    ConfigManager, ConfigMonitor, ConfigSnapshot, MonitorEvent, MonitorHandle, validate_apps,
    validate_devices,
};
pub use controller::{ConnectResult, Controller, ControllerSettings, EntitySet};
pub use entity::{
    Availability, AvailabilityConfig, ButtonConfig, Entity, EntityConfig, LightConfig, SwitchState,
};
pub use error::{ConfigError, Error, ProtocolError, Result, TemplateError};
pub use event::Event;
pub use protocol::{MqttBroker, MqttClient};
pub use template::{CommandTemplate, ValueTemplate};
