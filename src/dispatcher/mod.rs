// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Set and toggle commands with optimistic update and read-back.
//!
//! A successful command is applied in two phases:
//!
//! 1. the intended state is written to the store right away, so feedbacks
//!    follow the click without waiting for the next poll;
//! 2. the channel is read back from the device in the background and the
//!    answer overwrites the optimistic value. The read-back always wins.
//!
//! Commands on the same channel are serialized: the next one is not sent
//! before the previous one has been read back. A failed command leaves the
//! store untouched and degrades the connection status for the cool-down
//! window.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::command::CommandRequest;
use crate::directory::IoDirectory;
use crate::error::Error;
use crate::event::{EventBus, IoEvent};
use crate::protocol::Transport;
use crate::session::HealthMonitor;
use crate::state::StateStore;
use crate::types::{IoId, IoKind, PowerState};

type IoLocks = HashMap<IoId, Arc<AsyncMutex<()>>>;

/// Executes host commands against the device.
#[derive(Debug)]
pub struct CommandDispatcher<T> {
    directory: IoDirectory<T>,
    store: StateStore,
    health: HealthMonitor,
    events: EventBus,
    locks: Arc<Mutex<IoLocks>>,
    last_command: Arc<RwLock<Option<CommandRequest>>>,
    reconfirm: bool,
}

impl<T> Clone for CommandDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            store: self.store.clone(),
            health: self.health.clone(),
            events: self.events.clone(),
            locks: Arc::clone(&self.locks),
            last_command: Arc::clone(&self.last_command),
            reconfirm: self.reconfirm,
        }
    }
}

impl<T: Transport> CommandDispatcher<T> {
    /// Creates a dispatcher writing into `store`.
    #[must_use]
    pub fn new(
        directory: IoDirectory<T>,
        store: StateStore,
        health: HealthMonitor,
        events: EventBus,
    ) -> Self {
        Self {
            directory,
            store,
            health,
            events,
            locks: Arc::new(Mutex::new(HashMap::new())),
            last_command: Arc::new(RwLock::new(None)),
            reconfirm: true,
        }
    }

    /// Enables or disables the read-back after each command.
    #[must_use]
    pub fn with_reconfirm(mut self, reconfirm: bool) -> Self {
        self.reconfirm = reconfirm;
        self
    }

    /// Switches a relay on or off.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn set_state(&self, id: IoId, on: bool) -> Result<(), Error> {
        self.execute(CommandRequest::set(id, on)).await
    }

    /// Flips a relay.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn toggle(&self, id: IoId) -> Result<(), Error> {
        self.execute(CommandRequest::toggle(id)).await
    }

    /// Sends a command and applies its intended state.
    ///
    /// Returns once the device acknowledged the command. The read-back runs
    /// in the background; [`settle`](Self::settle) waits for it.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownIo` if the channel is not part of the last snapshot
    /// - `Error::ReadOnlyIo` if the last snapshot lists it as a digital input
    /// - `Error::Value` if the active protocol cannot address the channel
    /// - `Error::Unreachable`, `Error::Http` or `Error::MalformedResponse`
    ///   if the device did not accept the command
    pub async fn execute(&self, request: CommandRequest) -> Result<(), Error> {
        let id = request.target();
        if self.store.is_loaded() {
            match self.store.point(id) {
                None => return Err(Error::UnknownIo(id)),
                Some(point) if point.kind() != IoKind::Relay => {
                    return Err(Error::ReadOnlyIo(id));
                }
                Some(_) => {}
            }
        }
        let wire = self.directory.api().command(&request)?;

        let guard = self.lock(id).lock_owned().await;

        if let Err(e) = wire.send(self.directory.transport()).await {
            tracing::warn!(command = %request, error = %e, "Command failed");
            self.health.record_command_failure(e.to_string());
            return Err(e.into());
        }
        tracing::info!(command = %request, "Command sent");

        if let Some(state) = request.intended_state(self.store.get(id)) {
            self.write(id, state);
        }
        *self.last_command.write() = Some(request);

        if self.reconfirm {
            self.spawn_reconfirm(id, guard);
        }
        Ok(())
    }

    /// Waits until every command on `id` issued so far has been read back.
    pub async fn settle(&self, id: IoId) {
        drop(self.lock(id).lock().await);
    }

    /// Waits until every command issued so far has been read back.
    pub async fn settle_all(&self) {
        let locks: Vec<_> = self.locks.lock().values().cloned().collect();
        for lock in locks {
            drop(lock.lock().await);
        }
    }

    /// Returns the last command the device accepted.
    #[must_use]
    pub fn last_command(&self) -> Option<CommandRequest> {
        *self.last_command.read()
    }

    fn lock(&self, id: IoId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.locks.lock().entry(id).or_default())
    }

    fn write(&self, id: IoId, state: PowerState) {
        if let Some(change) = self.store.update(id, state) {
            self.events.publish(IoEvent::from(change));
        }
    }

    fn spawn_reconfirm(&self, id: IoId, guard: OwnedMutexGuard<()>) {
        let this = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match this.directory.read(id).await {
                Ok(Some(state)) => {
                    tracing::debug!(io_id = %id, state = %state, "Command read back");
                    this.write(id, state);
                }
                Ok(None) => tracing::debug!(io_id = %id, "Channel missing from read-back"),
                Err(e) => tracing::debug!(io_id = %id, error = %e, "Read-back failed"),
            }
        });
    }
}
