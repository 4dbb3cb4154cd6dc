// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative entity factories for known device models.
//!
//! A device factory is pure data transformation: given a physical device's
//! name it produces named [`EntityConfig`]s with the model's topic templates
//! pre-filled. No runtime state lives here.
//!
//! # Examples
//!
//! ```
//! use entibus::device::ShellyRgbw2;
//!
//! let entities = ShellyRgbw2::new("kitchen_lamp").entities();
//! assert!(entities.contains_key("kitchen_lamp"));
//! ```

use indexmap::IndexMap;

use crate::config::Document;
use crate::entity::{AvailabilityConfig, ButtonConfig, EntityConfig, LightConfig};
use crate::error::ConfigError;
use crate::template::{CommandTemplate, ValueTemplate};

/// An Aqara wireless switch reporting clicks over zigbee2mqtt.
#[derive(Debug, Clone)]
pub struct AqaraButton {
    name: String,
}

impl AqaraButton {
    /// Creates a factory for the device with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Produces the device's entities keyed by entity name.
    #[must_use]
    pub fn entities(&self) -> IndexMap<String, EntityConfig> {
        let config = EntityConfig::button(
            ButtonConfig::new()
                .state_topic(format!("zigbee/{}", self.name))
                .template(ValueTemplate::field("click"))
                .click_value("single"),
        );
        IndexMap::from([(self.name.clone(), config)])
    }
}

/// A Shelly RGBW2 controller in white mode.
#[derive(Debug, Clone)]
pub struct ShellyRgbw2 {
    name: String,
}

impl ShellyRgbw2 {
    /// Creates a factory for the device with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Produces the device's entities keyed by entity name.
    #[must_use]
    pub fn entities(&self) -> IndexMap<String, EntityConfig> {
        let name = &self.name;
        let config = EntityConfig::light(
            LightConfig::new()
                .state_topic(format!("shellies/{name}/white/0"))
                .command_topic(format!("shellies/{name}/white/0/command"))
                .brightness_state_topic(format!("shellies/{name}/white/0/status"))
                .brightness_state_template(ValueTemplate::field("brightness"))
                .brightness_command_topic(format!("shellies/{name}/white/0/set"))
                .brightness_command_template(CommandTemplate::wrapping(
                    r#"{"brightness": "#,
                    "}",
                )),
        )
        .availability(
            AvailabilityConfig::new(format!("shellies/{name}/online"))
                .online_payload("true")
                .offline_payload("false"),
        );
        IndexMap::from([(self.name.clone(), config)])
    }
}

/// Produces the entities for a device entry of a known type.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownDeviceType`] for unrecognized type strings.
pub fn entities_for(
    device_type: &str,
    name: &str,
) -> Result<IndexMap<String, EntityConfig>, ConfigError> {
    match device_type {
        "aqara-button" => Ok(AqaraButton::new(name).entities()),
        "shelly-rgbw2" => Ok(ShellyRgbw2::new(name).entities()),
        other => Err(ConfigError::UnknownDeviceType {
            device_type: other.to_string(),
            device: name.to_string(),
        }),
    }
}

/// Builds the entity library from an accepted devices document.
///
/// Returns the entity configs keyed by entity name, plus the devices that
/// could not be built (unknown type strings survive structural validation).
#[must_use]
pub fn build_library(
    devices_ok: &Document,
) -> (IndexMap<String, EntityConfig>, IndexMap<String, ConfigError>) {
    let mut library = IndexMap::new();
    let mut failures = IndexMap::new();
    for (name, value) in devices_ok {
        let device_type = value
            .as_mapping()
            .and_then(|mapping| mapping.get("type"))
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default();
        match entities_for(device_type, name) {
            Ok(entities) => library.extend(entities),
            Err(error) => {
                tracing::warn!(device = %name, error = %error, "Cannot build device");
                failures.insert(name.clone(), error);
            }
        }
    }
    (library, failures)
}
