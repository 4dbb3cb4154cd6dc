// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stateless push-button entities.
//!
//! A button watches a single state topic and emits a `click` event whenever
//! the extracted value equals the configured click literal. Nothing is
//! persisted between messages.

use crate::entity::StateChannel;
use crate::error::Error;
use crate::event::Event;
use crate::template::ValueTemplate;

/// Configuration for a [`Button`].
///
/// # Examples
///
/// ```
/// use entibus::entity::ButtonConfig;
///
/// // An Aqara switch reports clicks inside a JSON status document.
/// let config = ButtonConfig::new()
///     .state_topic("zigbee/table_button")
///     .template("{{ value.click }}".parse().unwrap())
///     .click_value("single");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ButtonConfig {
    pub(crate) state_topic: Option<String>,
    pub(crate) template: ValueTemplate,
    pub(crate) click_value: Option<String>,
}

impl ButtonConfig {
    /// Creates an empty configuration with the default click literal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the state topic the button listens on.
    #[must_use]
    pub fn state_topic(mut self, topic: impl Into<String>) -> Self {
        self.state_topic = Some(topic.into());
        self
    }

    /// Sets the extraction template applied to state payloads.
    #[must_use]
    pub fn template(mut self, template: ValueTemplate) -> Self {
        self.template = template;
        self
    }

    /// Sets the extracted value that counts as a click (default `click`).
    #[must_use]
    pub fn click_value(mut self, value: impl Into<String>) -> Self {
        self.click_value = Some(value.into());
        self
    }
}

/// Runtime state of a button entity.
#[derive(Debug, Clone)]
pub struct Button {
    channel: Option<StateChannel>,
    click_value: String,
}

impl Button {
    /// Builds a fresh runtime button from its configuration.
    #[must_use]
    pub(crate) fn from_config(config: &ButtonConfig) -> Self {
        Self {
            channel: config
                .state_topic
                .as_ref()
                .map(|topic| StateChannel::new(topic.clone(), config.template.clone())),
            click_value: config
                .click_value
                .clone()
                .unwrap_or_else(|| "click".to_string()),
        }
    }

    /// Returns the topics this button subscribes to.
    pub(crate) fn subscribe_topics(&self) -> Vec<String> {
        self.channel
            .iter()
            .map(|channel| channel.topic().to_string())
            .collect()
    }

    /// Handles an inbound message on a topic this button may own.
    pub(crate) fn handle_message(&mut self, topic: &str, payload: &str) -> Result<Vec<Event>, Error> {
        let Some(channel) = &self.channel else {
            return Ok(Vec::new());
        };
        if channel.topic() != topic {
            return Ok(Vec::new());
        }
        let value = channel.extract(payload)?;
        if value == self.click_value {
            return Ok(vec![Event::new("click")]);
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_click() {
        let config = ButtonConfig::new()
            .state_topic("state/topic")
            .click_value("pressed");
        let mut button = Button::from_config(&config);
        assert_eq!(
            button.handle_message("state/topic", "pressed").unwrap(),
            vec![Event::new("click")]
        );
        assert_eq!(button.handle_message("state/topic", "").unwrap(), vec![]);
    }

    #[test]
    fn json_payload_click() {
        let config = ButtonConfig::new()
            .state_topic("state/topic")
            .template("{{ value.click }}".parse().unwrap())
            .click_value("single");
        let mut button = Button::from_config(&config);
        let payload = r#"{"battery":100,"voltage":3015,"linkquality":0,"click":"single"}"#;
        assert_eq!(
            button.handle_message("state/topic", payload).unwrap(),
            vec![Event::new("click")]
        );
        let payload = r#"{"battery":100,"voltage":3015,"linkquality":0,"click":""}"#;
        assert_eq!(button.handle_message("state/topic", payload).unwrap(), vec![]);
    }

    #[test]
    fn other_topic_ignored() {
        let config = ButtonConfig::new().state_topic("state/topic");
        let mut button = Button::from_config(&config);
        assert_eq!(button.handle_message("other/topic", "click").unwrap(), vec![]);
    }

    #[test]
    fn malformed_payload_propagates() {
        let config = ButtonConfig::new()
            .state_topic("state/topic")
            .template("{{ value.click }}".parse().unwrap());
        let mut button = Button::from_config(&config);
        assert!(button.handle_message("state/topic", "not json").is_err());
    }

    #[test]
    fn subscribe_topics() {
        let config = ButtonConfig::new().state_topic("state/topic");
        let button = Button::from_config(&config);
        assert_eq!(button.subscribe_topics(), vec!["state/topic"]);
        assert!(Button::from_config(&ButtonConfig::new())
            .subscribe_topics()
            .is_empty());
    }
}
