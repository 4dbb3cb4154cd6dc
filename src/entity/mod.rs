// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed entities over raw topic/payload pairs.
//!
//! An [`Entity`] is a stateful representation of one observable or
//! controllable aspect of a physical device. The variant set is closed —
//! [`EntityKind`] covers a plain availability-only entity, a [`Button`], and a
//! [`Light`] — and all variants share one capability surface: declaring
//! subscription topics, turning inbound messages into [`Event`]s, and an
//! `on_connect` hook.
//!
//! Entities are built from cloneable [`EntityConfig`] values. The config is
//! the library/template side: attaching it to a controller clones it into a
//! fresh, independently-owned runtime instance with all state reset to
//! unknown, so a config reused across applications never shares state.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use entibus::entity::{ButtonConfig, EntityConfig};
//! use entibus::testing::RecordingClient;
//! use entibus::Event;
//!
//! let config = EntityConfig::button(
//!     ButtonConfig::new()
//!         .state_topic("zigbee/table_button")
//!         .template("{{ value.click }}".parse().unwrap())
//!         .click_value("single"),
//! );
//!
//! let client = Arc::new(RecordingClient::new());
//! let mut button = config.build("button", client);
//! let events = button
//!     .handle_message("zigbee/table_button", r#"{"click":"single"}"#)
//!     .unwrap();
//! assert_eq!(events, vec![Event::new("click")]);
//! ```

mod availability;
mod button;
mod light;

pub use availability::{Availability, AvailabilityChannel, AvailabilityConfig};
pub use button::{Button, ButtonConfig};
pub use light::{Light, LightConfig, SwitchState};

use crate::client::SharedClient;
use crate::error::{Error, TemplateError};
use crate::event::Event;
use crate::template::ValueTemplate;

/// A subscribed topic plus the extraction rule applied to its payloads.
#[derive(Debug, Clone)]
pub struct StateChannel {
    topic: String,
    template: ValueTemplate,
}

impl StateChannel {
    /// Creates a channel for a topic with an extraction template.
    #[must_use]
    pub fn new(topic: String, template: ValueTemplate) -> Self {
        Self { topic, template }
    }

    /// Returns the subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Extracts the logical value from a payload.
    ///
    /// # Errors
    ///
    /// Propagates [`TemplateError`] from the extraction rule.
    pub fn extract(&self, payload: &str) -> Result<String, TemplateError> {
        self.template.extract(payload)
    }

    /// Extracts the logical value and parses it as a number.
    ///
    /// # Errors
    ///
    /// Propagates [`TemplateError`] from the extraction rule.
    pub fn extract_number(&self, payload: &str) -> Result<f64, TemplateError> {
        self.template.extract_number(payload)
    }
}

/// Variant-specific configuration inside an [`EntityConfig`].
#[derive(Debug, Clone, Default)]
pub enum EntityKindConfig {
    /// Availability tracking only.
    #[default]
    Plain,
    /// A stateless push button.
    Button(ButtonConfig),
    /// A switchable light.
    Light(LightConfig),
}

/// Cloneable configuration an entity is built from.
#[derive(Debug, Clone, Default)]
pub struct EntityConfig {
    availability: Option<AvailabilityConfig>,
    kind: EntityKindConfig,
}

impl EntityConfig {
    /// Creates a configuration for an availability-only entity.
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    /// Creates a configuration for a button entity.
    #[must_use]
    pub fn button(config: ButtonConfig) -> Self {
        Self {
            availability: None,
            kind: EntityKindConfig::Button(config),
        }
    }

    /// Creates a configuration for a light entity.
    #[must_use]
    pub fn light(config: LightConfig) -> Self {
        Self {
            availability: None,
            kind: EntityKindConfig::Light(config),
        }
    }

    /// Adds an availability topic.
    #[must_use]
    pub fn availability(mut self, config: AvailabilityConfig) -> Self {
        self.availability = Some(config);
        self
    }

    /// Returns the variant-specific configuration.
    #[must_use]
    pub fn kind(&self) -> &EntityKindConfig {
        &self.kind
    }

    /// Builds a fresh runtime entity bound to a client.
    ///
    /// The returned entity owns its own state, reset to unknown; the config
    /// stays untouched and can be built again.
    #[must_use]
    pub fn build(&self, name: impl Into<String>, client: SharedClient) -> Entity {
        Entity {
            name: name.into(),
            client,
            availability: self.availability.clone().map(AvailabilityChannel::new),
            kind: match &self.kind {
                EntityKindConfig::Plain => EntityKind::Plain,
                EntityKindConfig::Button(config) => EntityKind::Button(Button::from_config(config)),
                EntityKindConfig::Light(config) => EntityKind::Light(Light::from_config(config)),
            },
        }
    }
}

/// Variant-specific runtime state inside an [`Entity`].
#[derive(Debug, Clone)]
pub enum EntityKind {
    /// Availability tracking only.
    Plain,
    /// A stateless push button.
    Button(Button),
    /// A switchable light.
    Light(Light),
}

/// A runtime entity bound to a client connection.
///
/// Entities are mutated only by [`handle_message`](Self::handle_message) on
/// inbound messages and by explicit command methods; they never reference the
/// controller that owns them.
#[derive(Clone)]
pub struct Entity {
    name: String,
    client: SharedClient,
    availability: Option<AvailabilityChannel>,
    kind: EntityKind,
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("availability", &self.availability)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Entity {
    /// Returns the entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the variant-specific state.
    #[must_use]
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Returns the current presence state.
    ///
    /// Entities without an availability topic stay `Unknown`.
    #[must_use]
    pub fn availability(&self) -> Availability {
        self.availability
            .as_ref()
            .map_or(Availability::Unknown, AvailabilityChannel::state)
    }

    /// Returns every topic this entity needs subscribed.
    #[must_use]
    pub fn subscribe_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .availability
            .iter()
            .map(|channel| channel.topic().to_string())
            .collect();
        match &self.kind {
            EntityKind::Plain => {}
            EntityKind::Button(button) => topics.extend(button.subscribe_topics()),
            EntityKind::Light(light) => topics.extend(light.subscribe_topics()),
        }
        topics
    }

    /// Turns an inbound message into zero or more events.
    ///
    /// # Errors
    ///
    /// Template extraction failures on a malformed payload propagate so the
    /// caller can log them; they are never silently swallowed.
    pub fn handle_message(&mut self, topic: &str, payload: &str) -> Result<Vec<Event>, Error> {
        tracing::debug!(entity = %self.name, topic = %topic, payload = %payload, "handle_message");
        let mut events = Vec::new();
        if let Some(channel) = &mut self.availability
            && channel.topic() == topic
            && let Some(event) = channel.observe(payload)
        {
            events.push(event);
        }
        match &mut self.kind {
            EntityKind::Plain => {}
            EntityKind::Button(button) => events.extend(button.handle_message(topic, payload)?),
            EntityKind::Light(light) => {
                events.extend(light.handle_message(&self.name, topic, payload)?);
            }
        }
        Ok(events)
    }

    /// Hook invoked after the broker connection is (re-)established.
    ///
    /// # Errors
    ///
    /// The built-in variants never fail; the controller still isolates
    /// failures per entity for forward compatibility.
    pub fn on_connect(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Resets availability and variant state back to unknown.
    pub fn reset_state(&mut self) {
        if let Some(channel) = &mut self.availability {
            channel.reset();
        }
        if let EntityKind::Light(light) = &mut self.kind {
            light.reset_state();
        }
    }

    /// Returns the light's on/off state, or `None` for non-lights.
    #[must_use]
    pub fn light_state(&self) -> Option<SwitchState> {
        match &self.kind {
            EntityKind::Light(light) => light.state(),
            _ => None,
        }
    }

    /// Returns the light's last rounded brightness, or `None` for non-lights.
    #[must_use]
    pub fn brightness(&self) -> Option<i64> {
        match &self.kind {
            EntityKind::Light(light) => light.brightness(),
            _ => None,
        }
    }

    /// Publishes the light's "on" command.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedCommand`] for non-light entities,
    /// [`Error::MissingTopic`] without a command topic, or a publish failure.
    pub fn turn_on(&self) -> Result<(), Error> {
        self.as_light("turn_on")?.turn_on(&self.name, self.client.as_ref())
    }

    /// Publishes the light's "off" command.
    ///
    /// # Errors
    ///
    /// See [`turn_on`](Self::turn_on).
    pub fn turn_off(&self) -> Result<(), Error> {
        self.as_light("turn_off")?.turn_off(&self.name, self.client.as_ref())
    }

    /// Toggles the light based on its known state.
    ///
    /// Returns the commanded state, or `None` (publishing nothing) when the
    /// current state is unknown.
    ///
    /// # Errors
    ///
    /// See [`turn_on`](Self::turn_on).
    pub fn toggle(&self) -> Result<Option<SwitchState>, Error> {
        self.as_light("toggle")?.toggle(&self.name, self.client.as_ref())
    }

    /// Sets the light's brightness and publishes the rendered command.
    ///
    /// # Errors
    ///
    /// See [`turn_on`](Self::turn_on).
    pub fn set_brightness(&mut self, value: i64) -> Result<(), Error> {
        let name = self.name.clone();
        let client = self.client.clone();
        match &mut self.kind {
            EntityKind::Light(light) => light.set_brightness(&name, client.as_ref(), value),
            _ => Err(Error::UnsupportedCommand {
                entity: name,
                command: "set_brightness",
            }),
        }
    }

    fn as_light(&self, command: &'static str) -> Result<&Light, Error> {
        match &self.kind {
            EntityKind::Light(light) => Ok(light),
            _ => Err(Error::UnsupportedCommand {
                entity: self.name.clone(),
                command,
            }),
        }
    }
}
