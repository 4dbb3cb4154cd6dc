// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The entity/event dispatch engine.
//!
//! The [`Controller`] owns the live set of entities, routes every inbound
//! topic/payload pair to the entity that declared the topic, and dispatches
//! the resulting [`Event`]s to application handlers registered per
//! `(entity, event kind)` pair. Handlers are registered explicitly at wiring
//! time; there is no runtime name lookup.
//!
//! # Architecture
//!
//! ```text
//! MQTT message: zigbee/table_button → {"click":"single"}
//!                     ↓
//!        routing table: topic → entity name
//!                     ↓
//!        Entity::handle_message → [Event("click")]
//!                     ↓
//!        handler table: ("button", "click") → handler
//!                     ↓
//!        handler toggles the light via EntitySet
//! ```
//!
//! Failure isolation is per layer: an unknown topic is dropped with a debug
//! log, an entity error drops that one message, a handler error drops that one
//! dispatch. Nothing on this path can take down message processing for
//! subsequent messages.

use std::collections::HashMap;

use crate::client::SharedClient;
use crate::entity::{Entity, EntityConfig};
use crate::error::Error;
use crate::event::Event;

/// Outcome of a broker connection attempt, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectResult {
    /// The broker accepted the connection.
    Accepted,
    /// The broker refused the connection for the given reason.
    Refused(String),
}

/// Settings for the application's own presence announcement.
///
/// When an availability topic is configured, the controller publishes a
/// retained online payload on every successful connect; the transport installs
/// the matching offline payload as the connection's last will.
#[derive(Debug, Clone, Default)]
pub struct ControllerSettings {
    availability_topic: Option<String>,
    online_payload: Option<String>,
    offline_payload: Option<String>,
}

impl ControllerSettings {
    /// Creates settings with no availability announcement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application's availability topic.
    #[must_use]
    pub fn availability_topic(mut self, topic: impl Into<String>) -> Self {
        self.availability_topic = Some(topic.into());
        self
    }

    /// Sets the announced online payload (default `online`).
    #[must_use]
    pub fn online_payload(mut self, payload: impl Into<String>) -> Self {
        self.online_payload = Some(payload.into());
        self
    }

    /// Sets the last-will offline payload (default `offline`).
    #[must_use]
    pub fn offline_payload(mut self, payload: impl Into<String>) -> Self {
        self.offline_payload = Some(payload.into());
        self
    }

    /// Returns the `(topic, payload)` pair for the connection's last will.
    #[must_use]
    pub fn last_will(&self) -> Option<(&str, &str)> {
        self.availability_topic
            .as_deref()
            .map(|topic| (topic, self.offline_payload.as_deref().unwrap_or("offline")))
    }

    fn online(&self) -> &str {
        self.online_payload.as_deref().unwrap_or("online")
    }
}

/// The attached entities, keyed by name.
///
/// Handlers receive a mutable reference to this set so they can issue
/// commands on other entities (e.g. a button handler toggling a light).
#[derive(Debug, Default)]
pub struct EntitySet {
    entities: HashMap<String, Entity>,
}

impl EntitySet {
    /// Returns the entity with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Returns the entity with the given name, mutably.
    #[must_use]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.get_mut(name)
    }

    /// Returns the entity with the given name or [`Error::UnknownEntity`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] when no entity has that name.
    pub fn require(&self, name: &str) -> Result<&Entity, Error> {
        self.entities.get(name).ok_or_else(|| Error::UnknownEntity {
            name: name.to_string(),
        })
    }

    /// Mutable variant of [`require`](Self::require).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] when no entity has that name.
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Entity, Error> {
        self.entities
            .get_mut(name)
            .ok_or_else(|| Error::UnknownEntity {
                name: name.to_string(),
            })
    }

    /// Returns the number of attached entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` when no entities are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    fn insert(&mut self, name: String, entity: Entity) {
        self.entities.insert(name, entity);
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Entity)> {
        self.entities.iter_mut()
    }
}

/// Routing table from subscribed topic to owning entity name.
///
/// At most one entity owns a topic; the conflict check happens at attach
/// time, so lookups never have to disambiguate.
#[derive(Debug, Default)]
struct RoutingTable {
    routes: HashMap<String, String>,
}

impl RoutingTable {
    /// Returns the entity owning a topic, if any.
    fn owner(&self, topic: &str) -> Option<&str> {
        self.routes.get(topic).map(String::as_str)
    }

    fn insert(&mut self, topic: String, entity: String) {
        self.routes.insert(topic, entity);
    }

    fn topics(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    fn len(&self) -> usize {
        self.routes.len()
    }
}

/// Application event handler bound to one `(entity, event kind)` pair.
pub type Handler = Box<dyn FnMut(&mut EntitySet, &Event) -> Result<(), Error> + Send>;

/// The topic router and event dispatcher of one running application.
pub struct Controller {
    client: SharedClient,
    settings: ControllerSettings,
    entities: EntitySet,
    routes: RoutingTable,
    handlers: HashMap<String, HashMap<String, Handler>>,
}

impl Controller {
    /// Creates a controller bound to a client connection.
    #[must_use]
    pub fn new(client: SharedClient, settings: ControllerSettings) -> Self {
        Self {
            client,
            settings,
            entities: EntitySet::default(),
            routes: RoutingTable::default(),
            handlers: HashMap::new(),
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Returns the attached entities.
    #[must_use]
    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    /// Returns the attached entities, mutably.
    #[must_use]
    pub fn entities_mut(&mut self) -> &mut EntitySet {
        &mut self.entities
    }

    /// Returns every topic in the routing table, in no particular order.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<&str> {
        self.routes.topics().collect()
    }

    /// Attaches an entity built from a config under a local name.
    ///
    /// The config is cloned into a fresh instance bound to the live client
    /// with all state reset, and its declared topics are merged into the
    /// routing table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEntity`] when the name is already attached,
    /// or [`Error::TopicConflict`] when one of the entity's topics is already
    /// owned by another entity. On error nothing is attached.
    pub fn add_entity(
        &mut self,
        name: impl Into<String>,
        config: &EntityConfig,
    ) -> Result<(), Error> {
        let name = name.into();
        if self.entities.contains(&name) {
            return Err(Error::DuplicateEntity { name });
        }
        let mut entity = config.build(name.clone(), self.client.clone());
        entity.reset_state();
        let topics = entity.subscribe_topics();
        for topic in &topics {
            if let Some(owner) = self.routes.owner(topic) {
                return Err(Error::TopicConflict {
                    topic: topic.clone(),
                    owner: owner.to_string(),
                });
            }
        }
        for topic in topics {
            self.routes.insert(topic, name.clone());
        }
        tracing::debug!(entity = %name, topics = self.routes.len(), "Entity attached");
        self.entities.insert(name, entity);
        Ok(())
    }

    /// Registers a handler for an `(entity, event kind)` pair.
    ///
    /// Re-registering the same pair replaces the previous handler.
    pub fn on<F>(&mut self, entity: impl Into<String>, kind: impl Into<String>, handler: F)
    where
        F: FnMut(&mut EntitySet, &Event) -> Result<(), Error> + Send + 'static,
    {
        let entity = entity.into();
        let kind = kind.into();
        let replaced = self
            .handlers
            .entry(entity.clone())
            .or_default()
            .insert(kind.clone(), Box::new(handler));
        if replaced.is_some() {
            tracing::debug!(entity = %entity, kind = %kind, "Handler replaced");
        }
    }

    /// Reacts to the outcome of a broker connection attempt.
    ///
    /// On success: announces the application online (retained), re-subscribes
    /// every routed topic, and runs each entity's `on_connect` hook. A failing
    /// hook is logged with the entity's name and does not stop the remaining
    /// entities; the first failure is returned afterwards. On a refused
    /// connection only the reason is logged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityConnect`] for the first failing entity hook.
    pub fn handle_connect(&mut self, result: &ConnectResult) -> Result<(), Error> {
        match result {
            ConnectResult::Refused(reason) => {
                tracing::error!(reason = %reason, "Could not connect to broker");
                Ok(())
            }
            ConnectResult::Accepted => {
                tracing::info!("Connected to broker");
                if let Some(topic) = &self.settings.availability_topic
                    && let Err(error) = self.client.publish(topic, self.settings.online(), true)
                {
                    tracing::error!(topic = %topic, error = %error, "Failed to announce online");
                }
                for topic in self.routes.topics() {
                    if let Err(error) = self.client.subscribe(topic) {
                        tracing::error!(topic = %topic, error = %error, "Failed to subscribe");
                    }
                }
                let mut first_error = None;
                for (name, entity) in self.entities.iter_mut() {
                    if let Err(error) = entity.on_connect() {
                        tracing::error!(entity = %name, error = %error, "Entity on_connect failed");
                        if first_error.is_none() {
                            first_error = Some(Error::EntityConnect {
                                entity: name.clone(),
                                source: Box::new(error),
                            });
                        }
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
        }
    }

    /// Routes one inbound message and dispatches the resulting events.
    ///
    /// A topic with no owner is dropped with a debug log; an entity error
    /// (e.g. a malformed templated payload) drops this message only.
    pub fn handle_message(&mut self, topic: &str, payload: &str) {
        tracing::debug!(topic = %topic, payload = %payload, "on_message");
        let Some(name) = self.routes.owner(topic).map(str::to_string) else {
            tracing::debug!(topic = %topic, "No entity for topic");
            return;
        };
        let Some(entity) = self.entities.get_mut(&name) else {
            tracing::error!(entity = %name, topic = %topic, "Routing table names a detached entity");
            return;
        };
        let events = match entity.handle_message(topic, payload) {
            Ok(events) => events,
            Err(error) => {
                tracing::error!(
                    entity = %name,
                    topic = %topic,
                    payload = %payload,
                    error = %error,
                    "Failed to handle message"
                );
                return;
            }
        };
        for event in events {
            self.process_event(&name, &event);
        }
    }

    /// Dispatches one event to its registered handler.
    ///
    /// A missing handler is a debug-level no-op; a failing handler is logged
    /// with the handler key and the event and never propagates.
    pub fn process_event(&mut self, entity_name: &str, event: &Event) {
        tracing::debug!(entity = %entity_name, event = %event, "process_event");
        let handler = self
            .handlers
            .get_mut(entity_name)
            .and_then(|kinds| kinds.get_mut(event.kind()));
        let Some(handler) = handler else {
            tracing::debug!(entity = %entity_name, kind = %event.kind(), "No handler for event");
            return;
        };
        if let Err(error) = handler(&mut self.entities, event) {
            tracing::error!(
                entity = %entity_name,
                event = %event,
                error = %error,
                "Event handler failed"
            );
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("entities", &self.entities.len())
            .field("topics", &self.routes.len())
            .finish_non_exhaustive()
    }
}
