// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure validation of device and app configuration documents.
//!
//! Documents arrive as order-preserving mappings (YAML loading happens at the
//! boundary, see [`load_document`](crate::config::load_document)). Validation
//! never fails: every entry lands either in the accepted `ok` set or in the
//! `ko` set together with its error message, and the caller decides what to
//! instantiate. Document order matters — when two devices declare the same
//! entity name, the first-seen device keeps it.

use indexmap::IndexMap;
use serde_yaml::Value;

/// An order-preserving configuration document, keyed by entry name.
pub type Document = IndexMap<String, Value>;

/// A rejected entry: the offending value plus the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// The entry's raw value.
    pub value: Value,
    /// Human-readable error message.
    pub error: String,
}

/// Outcome of validating one document: accepted and rejected entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    /// Entries that passed every check.
    pub ok: Document,
    /// Entries that failed, with their errors.
    pub ko: IndexMap<String, Rejection>,
}

/// Validates a devices document.
///
/// Phase one checks each entry structurally: a missing `type` field yields
/// `Missing type.`, a non-string `type` yields `Wrong type.`. Phase two walks
/// the accepted entries in document order and claims every declared entity
/// name; a device re-declaring an already-claimed name is demoted with
/// `Duplicated entity.` and removed from the accepted set.
#[must_use]
pub fn validate_devices(devices: &Document) -> Validation {
    let mut ok = Document::new();
    let mut ko = IndexMap::new();
    for (name, value) in devices {
        match validate_device(value) {
            Some(error) => {
                ko.insert(
                    name.clone(),
                    Rejection {
                        value: value.clone(),
                        error: error.to_string(),
                    },
                );
            }
            None => {
                ok.insert(name.clone(), value.clone());
            }
        }
    }

    let mut claimed: IndexMap<String, String> = IndexMap::new();
    let mut demoted: Vec<String> = Vec::new();
    for (device, value) in &ok {
        for entity in entity_names(value) {
            if claimed.contains_key(&entity) {
                if !demoted.contains(device) {
                    demoted.push(device.clone());
                    ko.insert(
                        device.clone(),
                        Rejection {
                            value: value.clone(),
                            error: "Duplicated entity.".to_string(),
                        },
                    );
                }
            } else {
                claimed.insert(entity, device.clone());
            }
        }
    }
    for device in &demoted {
        ok.shift_remove(device);
    }
    Validation { ok, ko }
}

/// Structural check for a single device entry.
///
/// Returns the error message, or `None` when the entry is well-formed.
fn validate_device(value: &Value) -> Option<&'static str> {
    let Some(mapping) = value.as_mapping() else {
        return Some("Missing type.");
    };
    match mapping.get("type") {
        None => Some("Missing type."),
        Some(device_type) if !device_type.is_string() => Some("Wrong type."),
        Some(_) => None,
    }
}

/// Validates an apps document against the accepted devices.
///
/// Each app must carry `module` and `class`; a missing `entities` field is
/// defaulted to an empty list (the only mutation, applied to the stored
/// copy). Every referenced entity must exist in the accepted devices' entity
/// set — checked in list order, the first failure determines the message.
#[must_use]
pub fn validate_apps(devices_ok: &Document, apps: &Document) -> Validation {
    let entities = device_entities(devices_ok);
    let mut ok = Document::new();
    let mut ko = IndexMap::new();
    for (name, value) in apps {
        let mut value = value.clone();
        if let Value::Mapping(mapping) = &mut value
            && !mapping.contains_key("entities")
        {
            mapping.insert(Value::from("entities"), Value::Sequence(Vec::new()));
        }
        match validate_app(&value, &entities) {
            Some(error) => {
                ko.insert(name.clone(), Rejection { value, error });
            }
            None => {
                ok.insert(name.clone(), value);
            }
        }
    }
    Validation { ok, ko }
}

/// Structural check for a single app entry.
fn validate_app(value: &Value, entities: &IndexMap<String, String>) -> Option<String> {
    let Some(mapping) = value.as_mapping() else {
        return Some("Missing module.".to_string());
    };
    if !mapping.contains_key("module") {
        return Some("Missing module.".to_string());
    }
    if !mapping.contains_key("class") {
        return Some("Missing class.".to_string());
    }
    for entity in referenced_entities(mapping.get("entities")) {
        if !entities.contains_key(&entity) {
            return Some(format!("Entity \"{entity}\" not available."));
        }
    }
    None
}

/// Collects the entity set declared by a devices document.
///
/// Returns entity name → owning device, in declaration order; on repeats the
/// first declaration wins.
#[must_use]
pub fn device_entities(devices: &Document) -> IndexMap<String, String> {
    let mut entities = IndexMap::new();
    for (device, value) in devices {
        for entity in entity_names(value) {
            entities.entry(entity).or_insert_with(|| device.clone());
        }
    }
    entities
}

/// Entity names declared under a device entry's `entities` mapping.
fn entity_names(value: &Value) -> Vec<String> {
    value
        .as_mapping()
        .and_then(|mapping| mapping.get("entities"))
        .and_then(Value::as_mapping)
        .map(|entities| {
            entities
                .keys()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Entity names referenced by an app's `entities` field.
///
/// Accepts either a sequence of names or a mapping keyed by name.
fn referenced_entities(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| item.as_str().unwrap_or_default().to_string())
            .collect(),
        Some(Value::Mapping(mapping)) => mapping
            .keys()
            .map(|key| key.as_str().unwrap_or_default().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn document(text: &str) -> Document {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn accepts_well_formed_devices() {
        let devices = document(
            "button:\n  type: aqara-button\n  entities:\n    table_button: {}\nlamp:\n  type: shelly-rgbw2\n  entities:\n    kitchen_lamp: {}\n",
        );
        let result = validate_devices(&devices);
        assert_eq!(result.ok.len(), 2);
        assert!(result.ko.is_empty());
    }

    #[test]
    fn missing_type_rejected() {
        let devices = document("button:\n  entities:\n    table_button: {}\n");
        let result = validate_devices(&devices);
        assert!(result.ok.is_empty());
        assert_eq!(result.ko["button"].error, "Missing type.");
    }

    #[test]
    fn non_string_type_rejected() {
        let devices = document("button:\n  type: 7\n");
        let result = validate_devices(&devices);
        assert!(result.ok.is_empty());
        assert_eq!(result.ko["button"].error, "Wrong type.");
    }

    #[test]
    fn duplicated_entity_demotes_later_device() {
        let devices = document(
            "first:\n  type: aqara-button\n  entities:\n    shared: {}\nsecond:\n  type: shelly-rgbw2\n  entities:\n    shared: {}\n",
        );
        let result = validate_devices(&devices);
        // First-seen wins; the later device is fully demoted.
        assert_eq!(result.ok.keys().collect::<Vec<_>>(), vec!["first"]);
        assert_eq!(result.ko["second"].error, "Duplicated entity.");
    }

    #[test]
    fn demoted_value_is_preserved_in_ko() {
        let devices = document("broken:\n  entities: {}\n");
        let result = validate_devices(&devices);
        assert_eq!(
            result.ko["broken"].value,
            yaml("entities: {}")
        );
    }

    #[test]
    fn device_entities_index() {
        let devices = document(
            "button:\n  type: aqara-button\n  entities:\n    table_button: {}\nlamp:\n  type: shelly-rgbw2\n  entities:\n    kitchen_lamp: {}\n",
        );
        let entities = device_entities(&devices);
        assert_eq!(entities["table_button"], "button");
        assert_eq!(entities["kitchen_lamp"], "lamp");
    }

    #[test]
    fn accepts_well_formed_app() {
        let devices = document("button:\n  type: aqara-button\n  entities:\n    table_button: {}\n");
        let apps = document(
            "toggle:\n  module: toggle\n  class: Toggle\n  entities:\n    - table_button\n",
        );
        let result = validate_apps(&devices, &apps);
        assert_eq!(result.ok.len(), 1);
        assert!(result.ko.is_empty());
    }

    #[test]
    fn app_missing_module_rejected() {
        let apps = document("toggle:\n  class: Toggle\n");
        let result = validate_apps(&Document::new(), &apps);
        assert_eq!(result.ko["toggle"].error, "Missing module.");
    }

    #[test]
    fn app_missing_class_rejected() {
        let apps = document("toggle:\n  module: toggle\n");
        let result = validate_apps(&Document::new(), &apps);
        assert_eq!(result.ko["toggle"].error, "Missing class.");
    }

    #[test]
    fn app_unknown_entity_rejected() {
        let devices = document("button:\n  type: aqara-button\n  entities:\n    table_button: {}\n");
        let apps = document(
            "toggle:\n  module: toggle\n  class: Toggle\n  entities:\n    - table_button\n    - missing_lamp\n",
        );
        let result = validate_apps(&devices, &apps);
        assert!(result.ok.is_empty());
        assert_eq!(
            result.ko["toggle"].error,
            "Entity \"missing_lamp\" not available."
        );
    }

    #[test]
    fn first_failing_entity_determines_message() {
        let apps = document(
            "toggle:\n  module: toggle\n  class: Toggle\n  entities:\n    - nope_one\n    - nope_two\n",
        );
        let result = validate_apps(&Document::new(), &apps);
        assert_eq!(
            result.ko["toggle"].error,
            "Entity \"nope_one\" not available."
        );
    }

    #[test]
    fn missing_entities_defaulted_to_empty_list() {
        let apps = document("toggle:\n  module: toggle\n  class: Toggle\n");
        let result = validate_apps(&Document::new(), &apps);
        let stored = result.ok["toggle"].as_mapping().unwrap();
        assert_eq!(
            stored.get("entities"),
            Some(&Value::Sequence(Vec::new()))
        );
    }

    #[test]
    fn app_entities_as_mapping_accepted() {
        let devices = document("button:\n  type: aqara-button\n  entities:\n    table_button: {}\n");
        let apps = document(
            "toggle:\n  module: toggle\n  class: Toggle\n  entities:\n    table_button:\n      log_level: debug\n",
        );
        let result = validate_apps(&devices, &apps);
        assert_eq!(result.ok.len(), 1);
    }

    #[test]
    fn validation_does_not_mutate_input() {
        let apps = document("toggle:\n  module: toggle\n  class: Toggle\n");
        let before = apps.clone();
        let _ = validate_apps(&Document::new(), &apps);
        assert_eq!(apps, before);
    }
}
