// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use crate::command::CommandRequest;
use crate::session::ConnectionStatus;
use crate::state::StateStore;
use crate::types::{IoKind, IoPoint};

/// Variable holding the rendered connection status.
pub const CONNECTION_STATUS: &str = "connection_status";
/// Variable holding the last accepted command.
pub const LAST_COMMAND: &str = "last_command";
/// Variable holding the configured host.
pub const HOST: &str = "host";

/// Relay variables always defined, whether discovered or not.
pub const MIN_RELAY_VARIABLES: u16 = 32;
/// Value of a channel variable before the first snapshot.
pub const LOADING: &str = "Loading";
/// Value of [`HOST`] without a configured host.
pub const NOT_CONFIGURED: &str = "Not configured";

/// A variable the host should declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    /// Identifier, e.g. `relay_1_state`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

impl VariableDefinition {
    fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Session data shown next to the channel variables.
#[derive(Debug, Clone, Copy)]
pub struct SessionInfo<'a> {
    /// Current connection status.
    pub status: &'a ConnectionStatus,
    /// Configured host, possibly empty.
    pub host: &'a str,
    /// Last command the device accepted.
    pub last_command: Option<&'a CommandRequest>,
}

fn variable_id(kind: IoKind, index: u16) -> String {
    format!("{}_{index}_state", kind.variable_prefix())
}

fn relay_variable_count(store: &StateStore) -> u16 {
    store
        .relays()
        .iter()
        .map(IoPoint::index)
        .max()
        .unwrap_or(0)
        .max(MIN_RELAY_VARIABLES)
}

/// Lists the variables to declare.
///
/// Relay variables 1 to 32 are always present, followed by any higher
/// discovered relay, one variable per discovered input and the session
/// variables.
///
/// # Examples
///
/// ```
/// use ipx800_lib::projection::definitions;
/// use ipx800_lib::state::StateStore;
///
/// let defs = definitions(&StateStore::new());
/// assert_eq!(defs.len(), 35);
/// assert_eq!(defs[0].id, "relay_1_state");
/// assert_eq!(defs[34].id, "host");
/// ```
#[must_use]
pub fn definitions(store: &StateStore) -> Vec<VariableDefinition> {
    let relays = (1..=relay_variable_count(store)).map(|index| {
        VariableDefinition::new(
            variable_id(IoKind::Relay, index),
            format!("Relay {index} State"),
        )
    });
    let inputs = store.inputs().into_iter().map(|point| {
        VariableDefinition::new(
            point.variable_id(),
            format!("Input {} State", point.index()),
        )
    });

    relays
        .chain(inputs)
        .chain([
            VariableDefinition::new(CONNECTION_STATUS, "Connection Status"),
            VariableDefinition::new(LAST_COMMAND, "Last Command Sent"),
            VariableDefinition::new(HOST, "IPX800 Host"),
        ])
        .collect()
}

/// Renders the current value of every declared variable.
///
/// Channel variables read `ON` or `OFF`, or [`LOADING`] before the first
/// snapshot. Relay variables without a matching relay read empty.
#[must_use]
pub fn values(store: &StateStore, info: SessionInfo<'_>) -> BTreeMap<String, String> {
    let loaded = store.is_loaded();
    let points = store.points();
    let mut values = BTreeMap::new();

    for index in 1..=relay_variable_count(store) {
        let value = if loaded {
            points
                .iter()
                .find(|p| p.kind() == IoKind::Relay && p.index() == index)
                .map_or_else(String::new, |p| p.state().to_string())
        } else {
            LOADING.to_string()
        };
        values.insert(variable_id(IoKind::Relay, index), value);
    }

    for point in points.iter().filter(|p| p.kind() == IoKind::DigitalInput) {
        values.insert(point.variable_id(), point.state().to_string());
    }

    let host = info.host.trim();
    values.insert(CONNECTION_STATUS.to_string(), info.status.to_string());
    values.insert(
        LAST_COMMAND.to_string(),
        info.last_command.map(ToString::to_string).unwrap_or_default(),
    );
    values.insert(
        HOST.to_string(),
        if host.is_empty() { NOT_CONFIGURED } else { host }.to_string(),
    );
    values
}
