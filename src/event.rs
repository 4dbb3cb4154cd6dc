// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed events produced by entities.
//!
//! An [`Event`] is an immutable description of something that happened on an
//! entity: a kind tag plus positional and keyed arguments. Events are produced
//! by entities from inbound messages and consumed by the controller's dispatch
//! step; they have no lifecycle beyond a single message.
//!
//! # Examples
//!
//! ```
//! use entibus::Event;
//!
//! let click = Event::new("click");
//! let online = Event::with_args("availability", ["online"]);
//!
//! assert_eq!(online.kind(), "availability");
//! assert_eq!(online.arg(0), Some(&serde_json::json!("online")));
//! assert_eq!(Event::new("click"), click);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// An immutable event emitted by an entity.
///
/// Equality is structural: two events are equal when their kind, positional
/// arguments, and keyed arguments all match.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    kwargs: BTreeMap<String, Value>,
}

impl Event {
    /// Creates an event with no arguments.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Creates an event with positional arguments.
    #[must_use]
    pub fn with_args<I, V>(kind: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            kind: kind.into(),
            args: args.into_iter().map(Into::into).collect(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Adds a keyed argument, consuming and returning the event.
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Returns the event kind tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns the positional argument at `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Returns the keyed arguments.
    #[must_use]
    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    /// Returns the keyed argument named `key`, if present.
    #[must_use]
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        for (key, value) in &self.kwargs {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal() {
        assert_eq!(
            Event::with_args("availability", ["online"]),
            Event::with_args("availability", ["online"])
        );
    }

    #[test]
    fn not_equal() {
        assert_ne!(
            Event::with_args("availability", ["online"]),
            Event::with_args("availability", ["offline"])
        );
        assert_ne!(Event::new("click"), Event::new("double_click"));
    }

    #[test]
    fn kwargs_affect_equality() {
        let plain = Event::new("click");
        let keyed = Event::new("click").with_kwarg("count", 2);
        assert_ne!(plain, keyed);
    }

    #[test]
    fn accessors() {
        let event = Event::with_args("brightness_change", [42]).with_kwarg("source", "poll");
        assert_eq!(event.kind(), "brightness_change");
        assert_eq!(event.arg(0), Some(&serde_json::json!(42)));
        assert_eq!(event.arg(1), None);
        assert_eq!(event.kwarg("source"), Some(&serde_json::json!("poll")));
    }

    #[test]
    fn display() {
        let event = Event::with_args("availability", ["online"]);
        assert_eq!(event.to_string(), "availability \"online\"");
    }

    #[test]
    fn serializes_compactly() {
        let event = Event::with_args("brightness_change", [42]);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"kind":"brightness_change","args":[42]}"#);
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
