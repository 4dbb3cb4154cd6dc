// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switchable light entities with optional brightness telemetry.
//!
//! A light tracks an on/off state from its state topic and publishes command
//! literals to turn itself on or off. Brightness is an optional secondary
//! channel: inbound readings are rounded to the nearest integer and debounced
//! on the rounded value, and programmatic writes publish through a command
//! template.

use std::fmt;

use crate::client::Client;
use crate::entity::StateChannel;
use crate::error::Error;
use crate::event::Event;
use crate::template::{CommandTemplate, ValueTemplate};

/// On/off state of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchState {
    /// The light is on.
    On,
    /// The light is off.
    Off,
}

impl SwitchState {
    /// Returns the textual form used in events and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for a [`Light`].
///
/// # Examples
///
/// ```
/// use entibus::entity::LightConfig;
///
/// let config = LightConfig::new()
///     .state_topic("shellies/lamp/white/0")
///     .command_topic("shellies/lamp/white/0/command");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LightConfig {
    pub(crate) state_topic: Option<String>,
    pub(crate) state_template: ValueTemplate,
    pub(crate) on_value: Option<String>,
    pub(crate) off_value: Option<String>,
    pub(crate) command_topic: Option<String>,
    pub(crate) command_on: Option<String>,
    pub(crate) command_off: Option<String>,
    pub(crate) brightness_state_topic: Option<String>,
    pub(crate) brightness_state_template: ValueTemplate,
    pub(crate) brightness_command_topic: Option<String>,
    pub(crate) brightness_command_template: CommandTemplate,
}

impl LightConfig {
    /// Creates an empty configuration with the default literals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the state topic the light listens on.
    #[must_use]
    pub fn state_topic(mut self, topic: impl Into<String>) -> Self {
        self.state_topic = Some(topic.into());
        self
    }

    /// Sets the extraction template applied to state payloads.
    #[must_use]
    pub fn state_template(mut self, template: ValueTemplate) -> Self {
        self.state_template = template;
        self
    }

    /// Sets the extracted value meaning "on" (default `on`).
    #[must_use]
    pub fn on_value(mut self, value: impl Into<String>) -> Self {
        self.on_value = Some(value.into());
        self
    }

    /// Sets the extracted value meaning "off" (default `off`).
    #[must_use]
    pub fn off_value(mut self, value: impl Into<String>) -> Self {
        self.off_value = Some(value.into());
        self
    }

    /// Sets the command topic on/off literals are published to.
    #[must_use]
    pub fn command_topic(mut self, topic: impl Into<String>) -> Self {
        self.command_topic = Some(topic.into());
        self
    }

    /// Sets the published "on" command literal (default `on`).
    #[must_use]
    pub fn command_on(mut self, payload: impl Into<String>) -> Self {
        self.command_on = Some(payload.into());
        self
    }

    /// Sets the published "off" command literal (default `off`).
    #[must_use]
    pub fn command_off(mut self, payload: impl Into<String>) -> Self {
        self.command_off = Some(payload.into());
        self
    }

    /// Sets the brightness telemetry topic.
    #[must_use]
    pub fn brightness_state_topic(mut self, topic: impl Into<String>) -> Self {
        self.brightness_state_topic = Some(topic.into());
        self
    }

    /// Sets the extraction template applied to brightness payloads.
    #[must_use]
    pub fn brightness_state_template(mut self, template: ValueTemplate) -> Self {
        self.brightness_state_template = template;
        self
    }

    /// Sets the topic brightness commands are published to.
    #[must_use]
    pub fn brightness_command_topic(mut self, topic: impl Into<String>) -> Self {
        self.brightness_command_topic = Some(topic.into());
        self
    }

    /// Sets the rendering template for brightness commands.
    #[must_use]
    pub fn brightness_command_template(mut self, template: CommandTemplate) -> Self {
        self.brightness_command_template = template;
        self
    }
}

/// Runtime state of a light entity.
#[derive(Debug, Clone)]
pub struct Light {
    channel: Option<StateChannel>,
    on_value: String,
    off_value: String,
    command_topic: Option<String>,
    command_on: String,
    command_off: String,
    brightness_channel: Option<StateChannel>,
    brightness_command_topic: Option<String>,
    brightness_command_template: CommandTemplate,
    state: Option<SwitchState>,
    brightness: Option<i64>,
}

impl Light {
    /// Builds a fresh runtime light from its configuration.
    #[must_use]
    pub(crate) fn from_config(config: &LightConfig) -> Self {
        let or_default = |value: &Option<String>, default: &str| {
            value.clone().unwrap_or_else(|| default.to_string())
        };
        Self {
            channel: config
                .state_topic
                .as_ref()
                .map(|topic| StateChannel::new(topic.clone(), config.state_template.clone())),
            on_value: or_default(&config.on_value, "on"),
            off_value: or_default(&config.off_value, "off"),
            command_topic: config.command_topic.clone(),
            command_on: or_default(&config.command_on, "on"),
            command_off: or_default(&config.command_off, "off"),
            brightness_channel: config.brightness_state_topic.as_ref().map(|topic| {
                StateChannel::new(topic.clone(), config.brightness_state_template.clone())
            }),
            brightness_command_topic: config.brightness_command_topic.clone(),
            brightness_command_template: config.brightness_command_template.clone(),
            state: None,
            brightness: None,
        }
    }

    /// Returns the current on/off state, if known.
    #[must_use]
    pub fn state(&self) -> Option<SwitchState> {
        self.state
    }

    /// Returns the last observed rounded brightness, if any.
    #[must_use]
    pub fn brightness(&self) -> Option<i64> {
        self.brightness
    }

    /// Resets transient state back to unknown.
    pub(crate) fn reset_state(&mut self) {
        self.state = None;
        self.brightness = None;
    }

    /// Returns the topics this light subscribes to.
    pub(crate) fn subscribe_topics(&self) -> Vec<String> {
        self.channel
            .iter()
            .chain(self.brightness_channel.iter())
            .map(|channel| channel.topic().to_string())
            .collect()
    }

    /// Handles an inbound message on a topic this light may own.
    pub(crate) fn handle_message(
        &mut self,
        name: &str,
        topic: &str,
        payload: &str,
    ) -> Result<Vec<Event>, Error> {
        if let Some(channel) = &self.channel
            && channel.topic() == topic
        {
            let value = channel.extract(payload)?;
            if value == self.on_value {
                self.state = Some(SwitchState::On);
            } else if value == self.off_value {
                self.state = Some(SwitchState::Off);
            } else {
                // Third-party values on the state topic are tolerated.
                tracing::trace!(entity = %name, value = %value, "Unmatched state value");
            }
            return Ok(Vec::new());
        }
        if let Some(channel) = &self.brightness_channel
            && channel.topic() == topic
        {
            #[allow(clippy::cast_possible_truncation)]
            let value = channel.extract_number(payload).map_err(Error::from)?.round() as i64;
            if self.brightness != Some(value) {
                self.brightness = Some(value);
                tracing::debug!(entity = %name, brightness = value, "Brightness changed");
                return Ok(vec![Event::with_args("brightness_change", [value])]);
            }
        }
        Ok(Vec::new())
    }

    /// Publishes the "on" command literal.
    pub(crate) fn turn_on(&self, name: &str, client: &dyn Client) -> Result<(), Error> {
        let topic = self.command_topic(name)?;
        client.publish(topic, &self.command_on, false)?;
        tracing::debug!(entity = %name, "turn_on");
        Ok(())
    }

    /// Publishes the "off" command literal.
    pub(crate) fn turn_off(&self, name: &str, client: &dyn Client) -> Result<(), Error> {
        let topic = self.command_topic(name)?;
        client.publish(topic, &self.command_off, false)?;
        tracing::debug!(entity = %name, "turn_off");
        Ok(())
    }

    /// Publishes the command opposite to the current state.
    ///
    /// With unknown state nothing is published and `None` is returned; a
    /// toggle must never guess.
    pub(crate) fn toggle(
        &self,
        name: &str,
        client: &dyn Client,
    ) -> Result<Option<SwitchState>, Error> {
        tracing::debug!(entity = %name, state = ?self.state, "toggle");
        match self.state {
            Some(SwitchState::On) => {
                self.turn_off(name, client)?;
                Ok(Some(SwitchState::Off))
            }
            Some(SwitchState::Off) => {
                self.turn_on(name, client)?;
                Ok(Some(SwitchState::On))
            }
            None => {
                tracing::warn!(entity = %name, "toggle - state not available");
                Ok(None)
            }
        }
    }

    /// Updates the local brightness and publishes the rendered command.
    pub(crate) fn set_brightness(
        &mut self,
        name: &str,
        client: &dyn Client,
        value: i64,
    ) -> Result<(), Error> {
        let Some(topic) = &self.brightness_command_topic else {
            return Err(Error::MissingTopic {
                entity: name.to_string(),
                missing: "brightness command topic",
            });
        };
        let payload = self.brightness_command_template.render(value);
        client.publish(topic, &payload, false)?;
        self.brightness = Some(value);
        tracing::debug!(entity = %name, brightness = value, "set_brightness");
        Ok(())
    }

    fn command_topic(&self, name: &str) -> Result<&str, Error> {
        self.command_topic
            .as_deref()
            .ok_or_else(|| Error::MissingTopic {
                entity: name.to_string(),
                missing: "command topic",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingClient;

    fn shelly() -> Light {
        Light::from_config(
            &LightConfig::new()
                .state_topic("shellies/shelly_rgbw2/white/0")
                .command_topic("shellies/shelly_rgbw2/white/0/command"),
        )
    }

    #[test]
    fn state_starts_unknown() {
        assert_eq!(shelly().state(), None);
    }

    #[test]
    fn state_follows_payloads() {
        let mut light = shelly();
        let events = light
            .handle_message("lamp", "shellies/shelly_rgbw2/white/0", "on")
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(light.state(), Some(SwitchState::On));

        light
            .handle_message("lamp", "shellies/shelly_rgbw2/white/0", "off")
            .unwrap();
        assert_eq!(light.state(), Some(SwitchState::Off));
    }

    #[test]
    fn unmatched_state_value_tolerated() {
        let mut light = shelly();
        light
            .handle_message("lamp", "shellies/shelly_rgbw2/white/0", "on")
            .unwrap();
        light
            .handle_message("lamp", "shellies/shelly_rgbw2/white/0", "dimming")
            .unwrap();
        assert_eq!(light.state(), Some(SwitchState::On));
    }

    #[test]
    fn turn_on_publishes_command() {
        let client = RecordingClient::new();
        shelly().turn_on("lamp", &client).unwrap();
        assert_eq!(
            client.published(),
            vec![(
                "shellies/shelly_rgbw2/white/0/command".to_string(),
                "on".to_string(),
                false
            )]
        );
    }

    #[test]
    fn turn_off_publishes_command() {
        let client = RecordingClient::new();
        shelly().turn_off("lamp", &client).unwrap();
        assert_eq!(
            client.published(),
            vec![(
                "shellies/shelly_rgbw2/white/0/command".to_string(),
                "off".to_string(),
                false
            )]
        );
    }

    #[test]
    fn toggle_on_state() {
        let client = RecordingClient::new();
        let mut light = shelly();
        light
            .handle_message("lamp", "shellies/shelly_rgbw2/white/0", "on")
            .unwrap();
        let result = light.toggle("lamp", &client).unwrap();
        assert_eq!(result, Some(SwitchState::Off));
        assert_eq!(client.published_payloads(), vec!["off"]);
    }

    #[test]
    fn toggle_off_state() {
        let client = RecordingClient::new();
        let mut light = shelly();
        light
            .handle_message("lamp", "shellies/shelly_rgbw2/white/0", "off")
            .unwrap();
        let result = light.toggle("lamp", &client).unwrap();
        assert_eq!(result, Some(SwitchState::On));
        assert_eq!(client.published_payloads(), vec!["on"]);
    }

    #[test]
    fn toggle_unknown_state_never_publishes() {
        let client = RecordingClient::new();
        let result = shelly().toggle("lamp", &client).unwrap();
        assert_eq!(result, None);
        assert!(client.published().is_empty());
    }

    #[test]
    fn missing_command_topic_is_an_error() {
        let client = RecordingClient::new();
        let light = Light::from_config(&LightConfig::new().state_topic("light/state"));
        let result = light.turn_on("lamp", &client);
        assert!(matches!(result, Err(Error::MissingTopic { .. })));
    }

    #[test]
    fn brightness_rounds_and_debounces() {
        let mut light = Light::from_config(
            &LightConfig::new()
                .brightness_state_topic("lamp/brightness")
                .brightness_state_template("{{ value.brightness }}".parse().unwrap()),
        );
        let events = light
            .handle_message("lamp", "lamp/brightness", r#"{"brightness":11.2}"#)
            .unwrap();
        assert_eq!(events, vec![Event::with_args("brightness_change", [11])]);
        assert_eq!(light.brightness(), Some(11));

        // 11.4 rounds to the same integer, so nothing re-fires.
        let events = light
            .handle_message("lamp", "lamp/brightness", r#"{"brightness":11.4}"#)
            .unwrap();
        assert!(events.is_empty());

        let events = light
            .handle_message("lamp", "lamp/brightness", r#"{"brightness":12.0}"#)
            .unwrap();
        assert_eq!(events, vec![Event::with_args("brightness_change", [12])]);
    }

    #[test]
    fn set_brightness_publishes_rendered_command() {
        let client = RecordingClient::new();
        let mut light = Light::from_config(
            &LightConfig::new()
                .brightness_command_topic("lamp/set")
                .brightness_command_template(
                    r#"{"brightness": {{ value }}}"#.parse().unwrap(),
                ),
        );
        light.set_brightness("lamp", &client, 75).unwrap();
        assert_eq!(light.brightness(), Some(75));
        assert_eq!(
            client.published(),
            vec![(
                "lamp/set".to_string(),
                r#"{"brightness": 75}"#.to_string(),
                false
            )]
        );
    }

    #[test]
    fn subscribe_topics_include_brightness() {
        let light = Light::from_config(
            &LightConfig::new()
                .state_topic("lamp/state")
                .brightness_state_topic("lamp/brightness"),
        );
        assert_eq!(light.subscribe_topics(), vec!["lamp/state", "lamp/brightness"]);
    }

    #[test]
    fn reset_clears_state_and_brightness() {
        let mut light = Light::from_config(
            &LightConfig::new()
                .state_topic("lamp/state")
                .brightness_state_topic("lamp/brightness"),
        );
        light.handle_message("lamp", "lamp/state", "on").unwrap();
        light
            .handle_message("lamp", "lamp/brightness", "50")
            .unwrap();
        light.reset_state();
        assert_eq!(light.state(), None);
        assert_eq!(light.brightness(), None);
    }
}
