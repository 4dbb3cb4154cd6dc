// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end dispatch tests: a button click toggles a light.
//!
//! The wiring runs against the recording transport, so every outbound
//! command is observable without a broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use entibus::controller::{ConnectResult, Controller, ControllerSettings};
use entibus::entity::{ButtonConfig, EntityConfig, LightConfig, SwitchState};
use entibus::testing::RecordingClient;

/// Builds the toggle app: a text button and a light with a command topic.
fn toggle_app() -> (Controller, Arc<RecordingClient>, Arc<Mutex<Vec<Option<SwitchState>>>>) {
    let client = Arc::new(RecordingClient::new());
    let mut controller = Controller::new(client.clone(), ControllerSettings::new());

    let button = EntityConfig::button(ButtonConfig::new().state_topic("button/state"));
    let light = EntityConfig::light(
        LightConfig::new()
            .state_topic("light/state")
            .command_topic("light/command"),
    );
    controller.add_entity("button", &button).unwrap();
    controller.add_entity("light", &light).unwrap();

    let toggled: Arc<Mutex<Vec<Option<SwitchState>>>> = Arc::new(Mutex::new(Vec::new()));
    let record = toggled.clone();
    controller.on("button", "click", move |entities, _event| {
        let state = entities.require("light")?.toggle()?;
        record.lock().push(state);
        Ok(())
    });

    (controller, client, toggled)
}

#[test]
fn connect_subscribes_all_entity_topics() {
    let (mut controller, client, _) = toggle_app();
    controller.handle_connect(&ConnectResult::Accepted).unwrap();
    let mut subscribed = client.subscribed();
    subscribed.sort_unstable();
    assert_eq!(subscribed, vec!["button/state", "light/state"]);
}

#[test]
fn click_with_light_on_publishes_off() {
    let (mut controller, client, toggled) = toggle_app();

    controller.handle_message("light/state", "on");
    controller.handle_message("button/state", "click");

    assert_eq!(
        client.published(),
        vec![("light/command".to_string(), "off".to_string(), false)]
    );
    assert_eq!(*toggled.lock(), vec![Some(SwitchState::Off)]);
}

#[test]
fn click_with_light_off_publishes_on() {
    let (mut controller, client, toggled) = toggle_app();

    controller.handle_message("light/state", "off");
    controller.handle_message("button/state", "click");

    assert_eq!(
        client.published(),
        vec![("light/command".to_string(), "on".to_string(), false)]
    );
    assert_eq!(*toggled.lock(), vec![Some(SwitchState::On)]);
}

#[test]
fn click_with_unknown_light_state_publishes_nothing() {
    let (mut controller, client, toggled) = toggle_app();

    controller.handle_message("button/state", "click");

    assert!(client.published().is_empty());
    assert_eq!(*toggled.lock(), vec![None]);
}

#[test]
fn one_click_invokes_the_handler_exactly_once() {
    let (mut controller, client, toggled) = toggle_app();

    controller.handle_message("light/state", "on");
    controller.handle_message("button/state", "click");

    assert_eq!(toggled.lock().len(), 1);
    assert_eq!(client.published().len(), 1);
}

#[test]
fn json_button_emits_click_only_on_the_configured_value() {
    let client = Arc::new(RecordingClient::new());
    let mut controller = Controller::new(client, ControllerSettings::new());
    let button = EntityConfig::button(
        ButtonConfig::new()
            .state_topic("zigbee/table_button")
            .template("{{ value.click }}".parse().unwrap())
            .click_value("single"),
    );
    controller.add_entity("button", &button).unwrap();

    let clicks = Arc::new(AtomicU32::new(0));
    let seen = clicks.clone();
    controller.on("button", "click", move |_entities, _event| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    controller.handle_message(
        "zigbee/table_button",
        r#"{"battery":100,"voltage":3015,"linkquality":0,"click":"single"}"#,
    );
    assert_eq!(clicks.load(Ordering::SeqCst), 1);

    // An empty click value is not a click.
    controller.handle_message(
        "zigbee/table_button",
        r#"{"battery":100,"voltage":3015,"linkquality":0,"click":""}"#,
    );
    assert_eq!(clicks.load(Ordering::SeqCst), 1);
}

#[test]
fn app_availability_announced_retained_on_connect() {
    let client = Arc::new(RecordingClient::new());
    let mut controller = Controller::new(
        client.clone(),
        ControllerSettings::new().availability_topic("iotapp/toggle/state"),
    );
    controller.handle_connect(&ConnectResult::Accepted).unwrap();
    assert_eq!(
        client.published(),
        vec![("iotapp/toggle/state".to_string(), "online".to_string(), true)]
    );
}

#[test]
fn brightness_events_debounce_on_the_rounded_value() {
    let client = Arc::new(RecordingClient::new());
    let mut controller = Controller::new(client, ControllerSettings::new());
    let light = EntityConfig::light(
        LightConfig::new()
            .brightness_state_topic("light/status")
            .brightness_state_template("{{ value.brightness }}".parse().unwrap()),
    );
    controller.add_entity("light", &light).unwrap();

    let observed: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let record = observed.clone();
    controller.on("light", "brightness_change", move |_entities, event| {
        record
            .lock()
            .push(event.arg(0).and_then(serde_json::Value::as_i64).unwrap());
        Ok(())
    });

    // 11.2 and 11.4 both round to 11; only the first fires.
    controller.handle_message("light/status", r#"{"brightness":11.2}"#);
    controller.handle_message("light/status", r#"{"brightness":11.4}"#);
    controller.handle_message("light/status", r#"{"brightness":12.2}"#);
    assert_eq!(*observed.lock(), vec![11, 12]);
}
