// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-issued command definitions.
//!
//! A [`CommandRequest`] names the target channel and the [`Operation`] to
//! perform. Requests are built when the host invokes an action, consumed by
//! the [`CommandDispatcher`](crate::dispatcher::CommandDispatcher) and never
//! stored.
//!
//! | Operation | Legacy query | Modern body |
//! |-----------|--------------|-------------|
//! | [`Operation::SetOn`] | `SetR{n}=1` | `{"on": true}` |
//! | [`Operation::SetOff`] | `SetR{n}=0` | `{"on": false}` |
//! | [`Operation::Toggle`] | `ToggleR{n}=1` | `{"toggle": true}` |
//!
//! # Examples
//!
//! ```
//! use ipx800_lib::command::{CommandRequest, Operation};
//! use ipx800_lib::types::{IoId, PowerState};
//!
//! let request = CommandRequest::set(IoId::new(65536), true);
//! assert_eq!(request.operation(), Operation::SetOn);
//! assert_eq!(request.to_string(), "io 65536 ON");
//!
//! // The state a command is expected to produce
//! assert_eq!(request.intended_state(None), Some(PowerState::On));
//! let toggle = CommandRequest::toggle(IoId::new(65536));
//! assert_eq!(toggle.intended_state(Some(PowerState::On)), Some(PowerState::Off));
//! assert_eq!(toggle.intended_state(None), None);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{IoId, PowerState};

/// What a command does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Switch the relay on.
    SetOn,
    /// Switch the relay off.
    SetOff,
    /// Flip the relay.
    Toggle,
}

impl Operation {
    /// Returns the operation that sets the given state.
    #[must_use]
    pub const fn set(state: PowerState) -> Self {
        match state {
            PowerState::On => Self::SetOn,
            PowerState::Off => Self::SetOff,
        }
    }

    /// Returns the short name used in logs and the `last_command` variable.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SetOn => "ON",
            Self::SetOff => "OFF",
            Self::Toggle => "TOGGLE",
        }
    }
}

/// A single instruction for one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    target: IoId,
    operation: Operation,
}

impl CommandRequest {
    /// Creates a request.
    #[must_use]
    pub const fn new(target: IoId, operation: Operation) -> Self {
        Self { target, operation }
    }

    /// Creates a request that switches the relay on or off.
    #[must_use]
    pub const fn set(target: IoId, on: bool) -> Self {
        let operation = if on {
            Operation::SetOn
        } else {
            Operation::SetOff
        };
        Self { target, operation }
    }

    /// Creates a request that flips the relay.
    #[must_use]
    pub const fn toggle(target: IoId) -> Self {
        Self {
            target,
            operation: Operation::Toggle,
        }
    }

    /// Returns the target channel.
    #[must_use]
    pub const fn target(&self) -> IoId {
        self.target
    }

    /// Returns the operation.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the state the relay should have once the command succeeded.
    ///
    /// A toggle can only be predicted when the current state is known.
    #[must_use]
    pub fn intended_state(&self, current: Option<PowerState>) -> Option<PowerState> {
        match self.operation {
            Operation::SetOn => Some(PowerState::On),
            Operation::SetOff => Some(PowerState::Off),
            Operation::Toggle => current.map(|state| state.toggled()),
        }
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io {} {}", self.target, self.operation.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_builds_matching_operation() {
        assert_eq!(
            CommandRequest::set(IoId::new(1), false).operation(),
            Operation::SetOff
        );
        assert_eq!(Operation::set(PowerState::On), Operation::SetOn);
    }

    #[test]
    fn toggle_display() {
        assert_eq!(
            CommandRequest::toggle(IoId::new(65537)).to_string(),
            "io 65537 TOGGLE"
        );
    }

    #[test]
    fn set_ignores_current_state() {
        let request = CommandRequest::set(IoId::new(1), false);
        assert_eq!(
            request.intended_state(Some(PowerState::Off)),
            Some(PowerState::Off)
        );
    }
}
