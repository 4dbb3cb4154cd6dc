// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reload orchestration over the monitor and the validators.
//!
//! The [`ConfigManager`] owns a [`ConfigMonitor`] watching the configuration
//! and apps directories. On every change notification it reloads
//! `devices.yml` and `apps.yml`, runs both validators, and emits a
//! [`ConfigSnapshot`] on its output channel. A load failure is logged and the
//! previous snapshot stands.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::config::monitor::{ConfigMonitor, MonitorEvent, MonitorHandle};
use crate::config::validate::{Document, Validation, validate_apps, validate_devices};
use crate::error::ConfigError;

/// Validated view of both configuration documents at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    /// Validation outcome for the devices document.
    pub devices: Validation,
    /// Validation outcome for the apps document.
    pub apps: Validation,
}

/// Loads a YAML configuration document from disk.
///
/// An empty file yields an empty document.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for unreadable files and [`ConfigError::Yaml`]
/// for malformed content.
pub fn load_document(path: &Path) -> Result<Document, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if text.trim().is_empty() {
        return Ok(Document::new());
    }
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
        path: path.display().to_string(),
        source,
    })
}

/// Watches the configuration directories and re-validates on change.
pub struct ConfigManager {
    devices_file: PathBuf,
    apps_file: PathBuf,
    monitor: ConfigMonitor,
    monitor_handle: MonitorHandle,
    monitor_events: mpsc::UnboundedReceiver<MonitorEvent>,
    snapshots: mpsc::UnboundedSender<ConfigSnapshot>,
}

impl ConfigManager {
    /// Creates a manager over a configuration directory and an apps
    /// directory.
    ///
    /// `devices.yml` and `apps.yml` are expected inside the configuration
    /// directory; both directories are watched for changes.
    #[must_use]
    pub fn new(
        config_dir: impl Into<PathBuf>,
        apps_dir: impl Into<PathBuf>,
        snapshots: mpsc::UnboundedSender<ConfigSnapshot>,
    ) -> Self {
        let config_dir = config_dir.into();
        let apps_dir = apps_dir.into();
        let (monitor_tx, monitor_events) = mpsc::unbounded_channel();
        let (monitor, monitor_handle) =
            ConfigMonitor::new(config_dir.clone(), apps_dir, monitor_tx);
        Self {
            devices_file: config_dir.join("devices.yml"),
            apps_file: config_dir.join("apps.yml"),
            monitor,
            monitor_handle,
            monitor_events,
            snapshots,
        }
    }

    /// Replaces the monitor's scan settings before running.
    #[must_use]
    pub fn configure_monitor(
        mut self,
        configure: impl FnOnce(ConfigMonitor) -> ConfigMonitor,
    ) -> Self {
        self.monitor = configure(self.monitor);
        self
    }

    /// Returns the handle that stops the underlying monitor.
    ///
    /// Stopping the monitor also ends [`run`](Self::run): once the monitor's
    /// change channel closes, the manager loop drains and returns.
    #[must_use]
    pub fn monitor_handle(&self) -> MonitorHandle {
        self.monitor_handle.clone()
    }

    /// Runs the reload loop until the monitor stops.
    ///
    /// The documents are loaded and validated once at startup, then again on
    /// every change notification.
    pub async fn run(self) {
        let Self {
            devices_file,
            apps_file,
            monitor,
            monitor_handle,
            mut monitor_events,
            snapshots,
        } = self;
        tracing::debug!(
            devices = %devices_file.display(),
            apps = %apps_file.display(),
            "Config manager started"
        );
        let monitor_task = tokio::spawn(monitor.run());

        reload(&devices_file, &apps_file, &snapshots);
        while let Some(MonitorEvent::Changed) = monitor_events.recv().await {
            reload(&devices_file, &apps_file, &snapshots);
        }

        // Held until the loop ends so the monitor is not stopped by its own
        // manager dropping the last handle.
        drop(monitor_handle);
        if let Err(error) = monitor_task.await {
            tracing::error!(error = %error, "Config monitor task failed");
        }
        tracing::debug!("Config manager stopped");
    }
}

/// Loads and validates both documents, emitting a snapshot on success.
fn reload(
    devices_file: &Path,
    apps_file: &Path,
    snapshots: &mpsc::UnboundedSender<ConfigSnapshot>,
) {
    let devices = match load_document(devices_file) {
        Ok(devices) => devices,
        Err(error) => {
            tracing::error!(error = %error, "Skipping reload");
            return;
        }
    };
    let apps = match load_document(apps_file) {
        Ok(apps) => apps,
        Err(error) => {
            tracing::error!(error = %error, "Skipping reload");
            return;
        }
    };
    let devices = validate_devices(&devices);
    let apps = validate_apps(&devices.ok, &apps);
    for (name, rejection) in devices.ko.iter().chain(apps.ko.iter()) {
        tracing::warn!(entry = %name, error = %rejection.error, "Configuration entry rejected");
    }
    if snapshots.send(ConfigSnapshot { devices, apps }).is_err() {
        tracing::warn!("Snapshot channel closed");
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("devices_file", &self.devices_file)
            .field("apps_file", &self.apps_file)
            .finish_non_exhaustive()
    }
}
