// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! A [`StateChange`] records how the known state of one channel moved when a
//! snapshot or a single write was applied to the
//! [`StateStore`](super::StateStore). `None` stands for "unknown": a channel
//! that appears for the first time has no previous state, and a channel that
//! disappeared from the device table has no current state.

use serde::{Deserialize, Serialize};

use crate::types::{IoId, PowerState};

/// How the known state of one channel changed.
///
/// # Examples
///
/// ```
/// use ipx800_lib::state::StateChange;
/// use ipx800_lib::types::{IoId, PowerState};
///
/// let change = StateChange::new(IoId::new(1), Some(PowerState::Off), Some(PowerState::On));
/// assert!(change.is_switch());
/// assert!(!StateChange::new(IoId::new(1), None, Some(PowerState::On)).is_switch());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// The channel.
    pub id: IoId,
    /// State before the change, `None` if it was unknown.
    pub previous: Option<PowerState>,
    /// State after the change, `None` if the channel is gone.
    pub current: Option<PowerState>,
}

impl StateChange {
    /// Creates a change record.
    #[must_use]
    pub const fn new(id: IoId, previous: Option<PowerState>, current: Option<PowerState>) -> Self {
        Self {
            id,
            previous,
            current,
        }
    }

    /// Returns `true` if a known state flipped to the other known state.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        matches!((self.previous, self.current), (Some(a), Some(b)) if a != b)
    }

    /// Returns `true` if the channel left the device table.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.previous.is_some() && self.current.is_none()
    }
}
