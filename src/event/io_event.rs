// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session event types.

use crate::session::ConnectionStatus;
use crate::state::StateChange;
use crate::types::{IoId, PowerState};

/// Events emitted by a device session.
///
/// Hosts use them as the trigger to re-evaluate feedbacks and refresh
/// variables.
///
/// # Examples
///
/// ```
/// use ipx800_lib::event::IoEvent;
/// use ipx800_lib::state::StateChange;
/// use ipx800_lib::types::{IoId, PowerState};
///
/// let change = StateChange::new(IoId::new(1), None, Some(PowerState::On));
/// let event = IoEvent::from(change);
/// assert!(event.is_state_change());
/// assert_eq!(event.io_id(), Some(IoId::new(1)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum IoEvent {
    /// The known state of a channel changed.
    StateChanged {
        /// The channel.
        id: IoId,
        /// State before the change, `None` if unknown.
        previous: Option<PowerState>,
        /// State after the change, `None` if the channel is gone.
        current: Option<PowerState>,
    },

    /// The connection health shown to the host changed.
    ConnectionChanged {
        /// The new status.
        status: ConnectionStatus,
    },
}

impl IoEvent {
    /// Returns the channel this event is about, if any.
    #[must_use]
    pub fn io_id(&self) -> Option<IoId> {
        match self {
            Self::StateChanged { id, .. } => Some(*id),
            Self::ConnectionChanged { .. } => None,
        }
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Returns `true` if this is a connection event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionChanged { .. })
    }

    /// Creates a connection event.
    #[must_use]
    pub fn connection(status: ConnectionStatus) -> Self {
        Self::ConnectionChanged { status }
    }
}

impl From<StateChange> for IoEvent {
    fn from(change: StateChange) -> Self {
        Self::StateChanged {
            id: change.id,
            previous: change.previous,
            current: change.current,
        }
    }
}
