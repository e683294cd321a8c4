// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared last-known state of every channel.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;

use super::{PollSnapshot, StateChange};
use crate::types::{IoId, IoKind, IoPoint, PowerState};

#[derive(Debug, Default)]
struct IoTable {
    /// Channel metadata from the last successful snapshot, in device order.
    directory: Vec<IoPoint>,
    /// Last known state per channel.
    states: HashMap<IoId, PowerState>,
    /// When the last successful snapshot was taken.
    last_snapshot_at: Option<DateTime<Utc>>,
}

/// In-memory map from channel id to its last known state.
///
/// The store is the single shared mutable entity of a session. Clones share
/// the same table. Writers only go through [`replace_all`](Self::replace_all)
/// and [`update`](Self::update); each call is atomic with respect to readers.
/// No lock is held across an `.await`, so reads never wait for a request in
/// flight.
///
/// Before the first successful snapshot every channel reads as `None`
/// (unknown), which is distinct from [`PowerState::Off`].
///
/// # Examples
///
/// ```
/// use ipx800_lib::state::{PollSnapshot, StateStore};
/// use ipx800_lib::types::{IoId, IoKind, IoPoint, PowerState};
///
/// let store = StateStore::new();
/// let id = IoId::new(65536);
/// assert_eq!(store.get(id), None);
///
/// let point = IoPoint::new(id, IoKind::Relay, 1, "Relay Cmd 1", PowerState::Off);
/// store.replace_all(&PollSnapshot::success(vec![point]));
/// assert_eq!(store.get(id), Some(PowerState::Off));
///
/// store.update(id, PowerState::On);
/// assert_eq!(store.get(id), Some(PowerState::On));
/// ```
#[derive(Debug, Clone)]
pub struct StateStore {
    table: Arc<RwLock<IoTable>>,
    revision: Arc<watch::Sender<u64>>,
}

impl StateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            table: Arc::new(RwLock::new(IoTable::default())),
            revision: Arc::new(revision),
        }
    }

    /// Returns the last known state of a channel, or `None` if unknown.
    #[must_use]
    pub fn get(&self, id: IoId) -> Option<PowerState> {
        self.table.read().states.get(&id).copied()
    }

    /// Replaces the whole table with a snapshot.
    ///
    /// Failed snapshots leave the store untouched. On success, channels
    /// missing from the snapshot are dropped and every state is taken from the
    /// snapshot, including states written by [`update`](Self::update) since
    /// the previous snapshot.
    ///
    /// Returns the per-channel differences, in snapshot order followed by the
    /// removed channels.
    pub fn replace_all(&self, snapshot: &PollSnapshot) -> Vec<StateChange> {
        if !snapshot.succeeded() {
            return Vec::new();
        }

        let states: HashMap<IoId, PowerState> = snapshot
            .points()
            .iter()
            .map(|p| (p.id(), p.state()))
            .collect();

        let mut table = self.table.write();

        let mut changes: Vec<StateChange> = snapshot
            .points()
            .iter()
            .filter_map(|p| {
                let previous = table.states.get(&p.id()).copied();
                (previous != Some(p.state()))
                    .then(|| StateChange::new(p.id(), previous, Some(p.state())))
            })
            .collect();

        let removed: BTreeSet<IoId> = table
            .states
            .keys()
            .filter(|id| !states.contains_key(id))
            .copied()
            .collect();
        changes.extend(
            removed
                .into_iter()
                .map(|id| StateChange::new(id, table.states.get(&id).copied(), None)),
        );

        let first_load = table.last_snapshot_at.is_none();
        let directory_changed = table.directory.len() != snapshot.points().len()
            || table
                .directory
                .iter()
                .zip(snapshot.points())
                .any(|(a, b)| a.id() != b.id() || a.label() != b.label());

        table.directory = snapshot.points().to_vec();
        table.states = states;
        table.last_snapshot_at = Some(snapshot.taken_at());

        if first_load || directory_changed || !changes.is_empty() {
            self.bump();
        }
        changes
    }

    /// Writes the state of one channel.
    ///
    /// The channel does not need to be part of the last snapshot; its state
    /// is then known until the next snapshot drops it.
    ///
    /// Returns the change, or `None` if the state was already `state`.
    pub fn update(&self, id: IoId, state: PowerState) -> Option<StateChange> {
        let mut table = self.table.write();
        let previous = table.states.insert(id, state);
        if previous == Some(state) {
            return None;
        }
        self.bump();
        Some(StateChange::new(id, previous, Some(state)))
    }

    /// Forgets every channel and returns to the not-loaded state.
    ///
    /// Every state reads as unknown until the next snapshot. Returns one
    /// change to unknown per channel that had a known state.
    pub fn clear(&self) -> Vec<StateChange> {
        let mut table = self.table.write();
        let was_loaded = table.last_snapshot_at.is_some();

        let removed: BTreeSet<IoId> = table.states.keys().copied().collect();
        let changes: Vec<StateChange> = removed
            .into_iter()
            .map(|id| StateChange::new(id, table.states.get(&id).copied(), None))
            .collect();

        *table = IoTable::default();

        if was_loaded || !changes.is_empty() {
            self.bump();
        }
        changes
    }

    /// Returns `true` once a snapshot has been applied.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.table.read().last_snapshot_at.is_some()
    }

    /// Returns when the last successful snapshot was taken.
    #[must_use]
    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        self.table.read().last_snapshot_at
    }

    /// Returns every known channel with its current state, in device order.
    #[must_use]
    pub fn points(&self) -> Vec<IoPoint> {
        let table = self.table.read();
        table
            .directory
            .iter()
            .map(|p| match table.states.get(&p.id()) {
                Some(&state) if state != p.state() => p.with_state(state),
                _ => p.clone(),
            })
            .collect()
    }

    /// Returns one channel with its current state.
    #[must_use]
    pub fn point(&self, id: IoId) -> Option<IoPoint> {
        self.points().into_iter().find(|p| p.id() == id)
    }

    /// Returns the known relays.
    #[must_use]
    pub fn relays(&self) -> Vec<IoPoint> {
        self.points_of(IoKind::Relay)
    }

    /// Returns the known digital inputs.
    #[must_use]
    pub fn inputs(&self) -> Vec<IoPoint> {
        self.points_of(IoKind::DigitalInput)
    }

    fn points_of(&self, kind: IoKind) -> Vec<IoPoint> {
        let mut points = self.points();
        points.retain(|p| p.kind() == kind);
        points
    }

    /// Returns a receiver of the revision counter, bumped on every visible
    /// change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Returns the current revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
