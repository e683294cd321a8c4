// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Result of one poll cycle.

use chrono::{DateTime, Utc};

use crate::types::IoPoint;

/// The readings retrieved by one poll tick.
///
/// A snapshot is folded into the [`StateStore`](super::StateStore) right after
/// it is taken and then dropped. Failed snapshots carry no readings and are
/// ignored by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    points: Vec<IoPoint>,
    taken_at: DateTime<Utc>,
    succeeded: bool,
}

impl PollSnapshot {
    /// Creates a successful snapshot taken now.
    #[must_use]
    pub fn success(points: Vec<IoPoint>) -> Self {
        Self {
            points,
            taken_at: Utc::now(),
            succeeded: true,
        }
    }

    /// Creates a failed snapshot taken now.
    #[must_use]
    pub fn failure() -> Self {
        Self {
            points: Vec::new(),
            taken_at: Utc::now(),
            succeeded: false,
        }
    }

    /// Returns the readings in device order.
    #[must_use]
    pub fn points(&self) -> &[IoPoint] {
        &self.points
    }

    /// Returns when the poll completed.
    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Returns whether the poll succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }
}
