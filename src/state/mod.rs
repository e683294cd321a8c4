// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Channel state management.
//!
//! The [`StateStore`] holds the last known state of every relay and digital
//! input. Poll cycles produce a [`PollSnapshot`] that replaces the table as a
//! whole; commands write single channels. Both report what moved as
//! [`StateChange`] values.
//!
//! # Examples
//!
//! ```
//! use ipx800_lib::state::{PollSnapshot, StateStore};
//! use ipx800_lib::types::{IoId, IoKind, IoPoint, PowerState};
//!
//! let store = StateStore::new();
//! let point = IoPoint::new(IoId::new(1), IoKind::Relay, 1, "Relay Cmd 1", PowerState::On);
//!
//! let changes = store.replace_all(&PollSnapshot::success(vec![point]));
//! assert_eq!(changes.len(), 1);
//!
//! // A failed poll never touches known state
//! assert!(store.replace_all(&PollSnapshot::failure()).is_empty());
//! assert_eq!(store.get(IoId::new(1)), Some(PowerState::On));
//! ```

mod snapshot;
mod state_change;
mod store;

pub use snapshot::PollSnapshot;
pub use state_change::StateChange;
pub use store::StateStore;
