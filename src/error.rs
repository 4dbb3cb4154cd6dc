// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the entibus library.
//!
//! This module provides the error hierarchy used across the library: template
//! extraction, protocol communication, configuration handling, and the
//! controller's attach/dispatch operations.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while extracting or rendering a templated value.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while handling configuration documents.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An entity with this name is already attached to the controller.
    #[error("entity {name:?} is already attached")]
    DuplicateEntity {
        /// The conflicting entity name.
        name: String,
    },

    /// Two entities declared the same subscription topic.
    #[error("topic {topic:?} is already owned by entity {owner:?}")]
    TopicConflict {
        /// The contested topic.
        topic: String,
        /// Name of the entity that already owns the topic.
        owner: String,
    },

    /// The named entity is not attached to the controller.
    #[error("no entity named {name:?}")]
    UnknownEntity {
        /// The requested entity name.
        name: String,
    },

    /// The entity does not support the requested command.
    #[error("entity {entity:?} does not support {command}")]
    UnsupportedCommand {
        /// Name of the entity the command was issued to.
        entity: String,
        /// The rejected command.
        command: &'static str,
    },

    /// The entity has no topic configured for the requested command.
    #[error("entity {entity:?} has no {missing} configured")]
    MissingTopic {
        /// Name of the entity the command was issued to.
        entity: String,
        /// Description of the missing topic.
        missing: &'static str,
    },

    /// An entity's `on_connect` hook failed during the connect sequence.
    #[error("entity {entity:?} failed on connect: {source}")]
    EntityConnect {
        /// Name of the failing entity.
        entity: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// An application event handler returned an error.
    #[error("handler failed: {0}")]
    Handler(String),
}

/// Errors related to templated value extraction and rendering.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Payload could not be parsed as JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The projected field does not exist in the payload.
    #[error("missing field in payload: {0}")]
    MissingField(String),

    /// The projected value is not a scalar and cannot be rendered as text.
    #[error("field {0} is not a scalar value")]
    NotScalar(String),

    /// The extracted value could not be parsed as a number.
    #[error("failed to parse {value:?} as a number")]
    NotANumber {
        /// The value that failed to parse.
        value: String,
    },

    /// The template expression itself is malformed.
    #[error("invalid template expression: {0}")]
    InvalidExpression(String),
}

/// Errors related to MQTT protocol communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT connection or communication failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to configuration documents and device factories.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the unreadable file.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid YAML.
    #[error("failed to parse {path}: {source}")]
    Yaml {
        /// Path of the malformed file.
        path: String,
        /// The underlying parse failure.
        #[source]
        source: serde_yaml::Error,
    },

    /// A device entry names a type no factory is registered for.
    #[error("unknown device type {device_type:?} for device {device:?}")]
    UnknownDeviceType {
        /// The unrecognized type string.
        device_type: String,
        /// Name of the device entry.
        device: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
