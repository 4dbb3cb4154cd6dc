// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration handling: validation, change monitoring, and reloads.
//!
//! Three layers, lowest first:
//!
//! - [`validate_devices`]/[`validate_apps`] are pure functions splitting a
//!   document into accepted and rejected entries — validation never fails,
//!   it classifies.
//! - [`ConfigMonitor`] polls the watched directories and coalesces file-set
//!   changes into single notifications.
//! - [`ConfigManager`] ties the two together: on every notification it
//!   reloads the documents, re-validates, and emits a [`ConfigSnapshot`].

mod manager;
mod monitor;
mod validate;

pub use manager::{ConfigManager, ConfigSnapshot, load_document};
pub use monitor::{ConfigMonitor, MonitorEvent, MonitorHandle};
pub use validate::{
    Document, Rejection, Validation, device_entities, validate_apps, validate_devices,
};
