// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for channel state and connection changes.
//!
//! The [`EventBus`] uses tokio's broadcast channel so that several host
//! components can follow the same session.
//!
//! # Examples
//!
//! ```
//! use ipx800_lib::event::{EventBus, IoEvent};
//! use ipx800_lib::state::StateChange;
//! use ipx800_lib::types::{IoId, PowerState};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(IoEvent::from(StateChange::new(IoId::new(1), None, Some(PowerState::On))));
//! ```

mod event_bus;
mod io_event;

pub use event_bus::EventBus;
pub use io_event::IoEvent;
