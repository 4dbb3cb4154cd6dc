// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Availability tracking for entities.
//!
//! Devices announce their presence on a dedicated topic, usually via a
//! retained last-will message. The [`AvailabilityChannel`] turns those
//! announcements into edge-triggered events: only an actual transition emits,
//! re-announcing the current state is a no-op.

use std::fmt;

use crate::event::Event;

/// Presence state of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Availability {
    /// No announcement observed yet.
    #[default]
    Unknown,
    /// The device announced itself online.
    Online,
    /// The device announced itself offline.
    Offline,
}

impl Availability {
    /// Returns the event argument for this state.
    ///
    /// Only meaningful for the announced states; `Unknown` has no wire form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for an availability topic.
///
/// # Examples
///
/// ```
/// use entibus::entity::AvailabilityConfig;
///
/// // Shelly devices announce with "true"/"false" instead of the defaults.
/// let config = AvailabilityConfig::new("shellies/lamp/online")
///     .online_payload("true")
///     .offline_payload("false");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityConfig {
    topic: String,
    online_payload: String,
    offline_payload: String,
}

impl AvailabilityConfig {
    /// Creates a configuration with the default `online`/`offline` payloads.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            online_payload: "online".to_string(),
            offline_payload: "offline".to_string(),
        }
    }

    /// Sets the payload that announces the device online.
    #[must_use]
    pub fn online_payload(mut self, payload: impl Into<String>) -> Self {
        self.online_payload = payload.into();
        self
    }

    /// Sets the payload that announces the device offline.
    #[must_use]
    pub fn offline_payload(mut self, payload: impl Into<String>) -> Self {
        self.offline_payload = payload.into();
        self
    }

    /// Returns the availability topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Runtime availability state bound to one entity.
#[derive(Debug, Clone)]
pub struct AvailabilityChannel {
    config: AvailabilityConfig,
    state: Availability,
}

impl AvailabilityChannel {
    /// Creates a channel in the `Unknown` state.
    #[must_use]
    pub fn new(config: AvailabilityConfig) -> Self {
        Self {
            config,
            state: Availability::Unknown,
        }
    }

    /// Returns the subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        self.config.topic()
    }

    /// Returns the current presence state.
    #[must_use]
    pub fn state(&self) -> Availability {
        self.state
    }

    /// Resets the presence state to `Unknown`.
    pub fn reset(&mut self) {
        self.state = Availability::Unknown;
    }

    /// Observes an announcement payload.
    ///
    /// Emits an `availability` event only on an actual transition. Payloads
    /// matching neither configured literal are ignored.
    pub fn observe(&mut self, payload: &str) -> Option<Event> {
        let announced = if payload == self.config.online_payload {
            Availability::Online
        } else if payload == self.config.offline_payload {
            Availability::Offline
        } else {
            tracing::trace!(
                topic = %self.config.topic,
                payload = %payload,
                "Ignoring unrecognized availability payload"
            );
            return None;
        };
        if announced == self.state {
            return None;
        }
        self.state = announced;
        match announced {
            Availability::Online => tracing::info!(topic = %self.config.topic, "Status online"),
            Availability::Offline => {
                tracing::warn!(topic = %self.config.topic, "Status offline");
            }
            Availability::Unknown => unreachable!("announcements are online or offline"),
        }
        Some(Event::with_args("availability", [announced.as_str()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> AvailabilityChannel {
        AvailabilityChannel::new(AvailabilityConfig::new("status"))
    }

    #[test]
    fn starts_unknown() {
        assert_eq!(channel().state(), Availability::Unknown);
    }

    #[test]
    fn unknown_to_online_emits() {
        let mut channel = channel();
        let event = channel.observe("online");
        assert_eq!(event, Some(Event::with_args("availability", ["online"])));
        assert_eq!(channel.state(), Availability::Online);
    }

    #[test]
    fn unknown_to_offline_emits() {
        let mut channel = channel();
        let event = channel.observe("offline");
        assert_eq!(event, Some(Event::with_args("availability", ["offline"])));
        assert_eq!(channel.state(), Availability::Offline);
    }

    #[test]
    fn repeated_online_is_idempotent() {
        let mut channel = channel();
        assert!(channel.observe("online").is_some());
        assert_eq!(channel.observe("online"), None);
        assert_eq!(channel.observe("online"), None);
        assert_eq!(channel.state(), Availability::Online);
    }

    #[test]
    fn offline_to_online_transition() {
        let mut channel = channel();
        channel.observe("offline");
        let event = channel.observe("online");
        assert_eq!(event, Some(Event::with_args("availability", ["online"])));
    }

    #[test]
    fn unrecognized_payload_ignored() {
        let mut channel = channel();
        channel.observe("online");
        assert_eq!(channel.observe("rebooting"), None);
        assert_eq!(channel.state(), Availability::Online);
    }

    #[test]
    fn custom_payloads() {
        let config = AvailabilityConfig::new("shellies/lamp/online")
            .online_payload("true")
            .offline_payload("false");
        let mut channel = AvailabilityChannel::new(config);
        assert!(channel.observe("true").is_some());
        assert_eq!(channel.state(), Availability::Online);
        assert!(channel.observe("false").is_some());
        assert_eq!(channel.state(), Availability::Offline);
    }

    #[test]
    fn reset_returns_to_unknown() {
        let mut channel = channel();
        channel.observe("online");
        channel.reset();
        assert_eq!(channel.state(), Availability::Unknown);
        // A fresh announcement emits again after the reset.
        assert!(channel.observe("online").is_some());
    }
}
