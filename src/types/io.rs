// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! I/O channel identity and readings.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PowerState;

/// Device-assigned identifier of an I/O channel.
///
/// Modern firmware reports large identifiers (`65536` for the first command
/// relay); legacy firmware uses the 1-based relay or input number. Ids are
/// stable across polls but not across firmware resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IoId(u32);

impl IoId {
    /// Creates an identifier from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for IoId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for IoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a channel is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoKind {
    /// A command relay that can be switched.
    Relay,
    /// A read-only digital input.
    DigitalInput,
}

impl IoKind {
    /// Prefix used in host variable names (`relay_1_state`, `input_1_state`).
    #[must_use]
    pub const fn variable_prefix(&self) -> &'static str {
        match self {
            Self::Relay => "relay",
            Self::DigitalInput => "input",
        }
    }

    /// Fallback display name when the device reports none.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Relay => "Relay",
            Self::DigitalInput => "Input",
        }
    }
}

/// One classified reading of a relay or digital input.
///
/// Points are immutable values: a newer reading replaces the older one keyed
/// by [`IoId`].
///
/// # Examples
///
/// ```
/// use ipx800_lib::types::{IoId, IoKind, IoPoint, PowerState};
///
/// let point = IoPoint::new(IoId::new(65536), IoKind::Relay, 1, "Relay Cmd 1", PowerState::On);
/// assert_eq!(point.label(), "Relay Cmd 1 (ID: 65536)");
/// assert_eq!(point.variable_id(), "relay_1_state");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoPoint {
    id: IoId,
    kind: IoKind,
    index: u16,
    label: String,
    state: PowerState,
}

impl IoPoint {
    /// Creates a point.
    ///
    /// `index` is the 1-based position of the channel among channels of the
    /// same kind. The label is derived from the device name, falling back to
    /// the kind and index when the device reports an empty name.
    #[must_use]
    pub fn new(id: IoId, kind: IoKind, index: u16, name: &str, state: PowerState) -> Self {
        let name = name.trim();
        let label = if name.is_empty() {
            format!("{} {index} (ID: {id})", kind.display_name())
        } else {
            format!("{name} (ID: {id})")
        };
        Self {
            id,
            kind,
            index,
            label,
            state,
        }
    }

    /// Returns the device identifier.
    #[must_use]
    pub fn id(&self) -> IoId {
        self.id
    }

    /// Returns the channel kind.
    #[must_use]
    pub fn kind(&self) -> IoKind {
        self.kind
    }

    /// Returns the 1-based position among channels of the same kind.
    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the state at the time of the reading.
    #[must_use]
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Returns a copy of this point carrying a different state.
    #[must_use]
    pub fn with_state(&self, state: PowerState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Returns the host variable name for this point.
    #[must_use]
    pub fn variable_id(&self) -> String {
        format!("{}_{}_state", self.kind.variable_prefix(), self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_kind_and_index() {
        let point = IoPoint::new(IoId::new(7), IoKind::DigitalInput, 2, "  ", PowerState::Off);
        assert_eq!(point.label(), "Input 2 (ID: 7)");
        assert_eq!(point.variable_id(), "input_2_state");
    }

    #[test]
    fn with_state_keeps_identity() {
        let point = IoPoint::new(IoId::new(1), IoKind::Relay, 1, "Pump", PowerState::Off);
        let on = point.with_state(PowerState::On);
        assert_eq!(on.id(), point.id());
        assert_eq!(on.label(), "Pump (ID: 1)");
        assert_eq!(on.state(), PowerState::On);
        assert_eq!(point.state(), PowerState::Off);
    }

    #[test]
    fn io_id_serializes_transparently() {
        let json = serde_json::to_string(&IoId::new(65536)).unwrap();
        assert_eq!(json, "65536");
    }
}
