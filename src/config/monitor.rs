// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polling monitor for configuration directory changes.
//!
//! The monitor snapshots two watched directories every debounce window and
//! pushes a single [`MonitorEvent::Changed`] notification when the file set
//! differs from the previous cycle — added, removed, or touched files all
//! count, and any number of changes within one window coalesce into one
//! notification.
//!
//! All coordination is message-passing: the change channel carries
//! notifications, a command channel carries stop requests and "wait for next
//! scan" rendezvous registrations. Stops are acknowledged synchronously and
//! observed within one sleep increment, not one full debounce window.
//!
//! # Examples
//!
//! ```no_run
//! use entibus::config::{ConfigMonitor, MonitorEvent};
//! use tokio::sync::mpsc;
//!
//! # async fn example() {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let (monitor, handle) = ConfigMonitor::new("config", "apps", tx);
//! tokio::spawn(monitor.run());
//!
//! // ... later ...
//! assert_eq!(rx.recv().await, Some(MonitorEvent::Changed));
//! handle.stop().await.unwrap();
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::error::{Error, ProtocolError};

/// Notification emitted on the change channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The watched file set changed since the previous scan.
    Changed,
}

/// Requests sent from handles to the polling loop.
enum Command {
    /// Stop the loop; the sender is acknowledged before the loop exits.
    Stop(oneshot::Sender<()>),
    /// Fulfill the sender after the next scan that starts from now on.
    WaitScan(oneshot::Sender<()>),
}

/// Snapshot of one directory: file name → last modification time.
type DirSnapshot = BTreeMap<String, SystemTime>;

/// Cloneable handle for controlling a running [`ConfigMonitor`].
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl MonitorHandle {
    /// Requests the monitor to stop and waits for the acknowledgement.
    ///
    /// Returns as soon as the loop has observed the request — within one
    /// sleep increment. Stopping an already-stopped monitor succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ChannelClosed`] when the loop dropped the
    /// acknowledgement without sending it.
    pub async fn stop(&self) -> Result<(), Error> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Stop(ack_tx)).is_err() {
            // Loop already gone; there is nothing left to stop.
            return Ok(());
        }
        ack_rx.await.map_err(|_| {
            Error::Protocol(ProtocolError::ChannelClosed(
                "monitor stopped without acknowledging".to_string(),
            ))
        })
    }

    /// Waits until the next scan completes.
    ///
    /// The fulfilled scan is guaranteed to have *started* after this call, so
    /// filesystem changes made beforehand are visible to it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ChannelClosed`] when the monitor stops before
    /// the next scan completes.
    pub async fn wait_next_scan(&self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::WaitScan(tx)).map_err(|_| {
            Error::Protocol(ProtocolError::ChannelClosed(
                "monitor is not running".to_string(),
            ))
        })?;
        rx.await.map_err(|_| {
            Error::Protocol(ProtocolError::ChannelClosed(
                "monitor stopped before the next scan".to_string(),
            ))
        })
    }
}

/// Asynchronous polling monitor over two configuration directories.
pub struct ConfigMonitor {
    config_dir: PathBuf,
    apps_dir: PathBuf,
    scan_interval: Duration,
    scan_wait: u32,
    changes: mpsc::UnboundedSender<MonitorEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl ConfigMonitor {
    /// Creates a monitor with the default half-second interval and a
    /// four-increment debounce window.
    ///
    /// Returns the monitor together with the handle used to stop it; the
    /// monitor holds no handle itself, so dropping every handle closes the
    /// command channel and stops the loop.
    #[must_use]
    pub fn new(
        config_dir: impl Into<PathBuf>,
        apps_dir: impl Into<PathBuf>,
        changes: mpsc::UnboundedSender<MonitorEvent>,
    ) -> (Self, MonitorHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let monitor = Self {
            config_dir: config_dir.into(),
            apps_dir: apps_dir.into(),
            scan_interval: Duration::from_millis(500),
            scan_wait: 4,
            changes,
            commands: command_rx,
        };
        (
            monitor,
            MonitorHandle {
                commands: command_tx,
            },
        )
    }

    /// Sets the sleep increment between stop checks.
    #[must_use]
    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Sets the number of sleep increments per debounce window.
    #[must_use]
    pub fn scan_wait(mut self, increments: u32) -> Self {
        self.scan_wait = increments;
        self
    }

    /// Runs the polling loop until stopped.
    ///
    /// An unexpected fault (a failed scan task) is logged and treated as a
    /// stop signal rather than left to hang the loop.
    pub async fn run(mut self) {
        tracing::debug!(
            config_dir = %self.config_dir.display(),
            apps_dir = %self.apps_dir.display(),
            "Config monitor started"
        );
        let mut previous: Option<Vec<DirSnapshot>> = None;
        let mut waiters: Vec<oneshot::Sender<()>> = Vec::new();

        'cycle: loop {
            // Rendezvous requests registered before this point observe the
            // scan below; requests arriving later wait for the next cycle.
            if self.drain_commands(&mut waiters) {
                break 'cycle;
            }

            let snapshot = match self.scan().await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    tracing::error!(error = %error, "Config scan failed, stopping monitor");
                    break 'cycle;
                }
            };
            if previous.as_ref().is_some_and(|prev| *prev != snapshot) {
                tracing::info!("Configuration change detected");
                if self.changes.send(MonitorEvent::Changed).is_err() {
                    tracing::warn!("Change channel closed, stopping monitor");
                    break 'cycle;
                }
            }
            previous = Some(snapshot);

            for waiter in waiters.drain(..) {
                let _ = waiter.send(());
            }

            for _ in 0..self.scan_wait {
                match timeout(self.scan_interval, self.commands.recv()).await {
                    Ok(Some(Command::Stop(ack))) => {
                        let _ = ack.send(());
                        break 'cycle;
                    }
                    Ok(Some(Command::WaitScan(tx))) => waiters.push(tx),
                    Ok(None) => {
                        tracing::debug!("All monitor handles dropped, stopping");
                        break 'cycle;
                    }
                    Err(_elapsed) => {}
                }
            }
        }

        // Acknowledge any stop requests still queued; pending rendezvous
        // senders are dropped, failing their waiters.
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Stop(ack) = command {
                let _ = ack.send(());
            }
        }
        tracing::debug!("Config monitor stopped");
    }

    /// Drains queued commands without blocking.
    ///
    /// Returns `true` when a stop request was received (and acknowledged).
    fn drain_commands(&mut self, waiters: &mut Vec<oneshot::Sender<()>>) -> bool {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Stop(ack) => {
                    let _ = ack.send(());
                    return true;
                }
                Command::WaitScan(tx) => waiters.push(tx),
            }
        }
        false
    }

    /// Snapshots both watched directories off the async thread.
    async fn scan(&self) -> Result<Vec<DirSnapshot>, tokio::task::JoinError> {
        let dirs = [self.config_dir.clone(), self.apps_dir.clone()];
        tokio::task::spawn_blocking(move || dirs.iter().map(|dir| snapshot_dir(dir)).collect())
            .await
    }
}

impl std::fmt::Debug for ConfigMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMonitor")
            .field("config_dir", &self.config_dir)
            .field("apps_dir", &self.apps_dir)
            .field("scan_interval", &self.scan_interval)
            .field("scan_wait", &self.scan_wait)
            .finish_non_exhaustive()
    }
}

/// Snapshots the regular files of one directory.
///
/// An unreadable directory yields an empty snapshot; per-file metadata
/// failures skip that file.
fn snapshot_dir(dir: &Path) -> DirSnapshot {
    let mut snapshot = DirSnapshot::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::trace!(dir = %dir.display(), error = %error, "Cannot read watched directory");
            return snapshot;
        }
    };
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        snapshot.insert(entry.file_name().to_string_lossy().into_owned(), modified);
    }
    snapshot
}
