// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for IPX800 control.
//!
//! # Types
//!
//! - [`PowerState`] - On/Off state of a channel
//! - [`RelayNumber`] - Legacy relay number (1-32)
//! - [`IoId`] - Device-assigned channel identifier
//! - [`IoKind`] - Relay or digital input
//! - [`IoPoint`] - One classified reading of a channel

mod io;
mod power;

pub use io::{IoId, IoKind, IoPoint};
pub use power::{PowerState, RelayNumber};
