// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-visible projection of the state store.
//!
//! Variables are named text values (`relay_1_state` = `"ON"`); feedbacks are
//! tri-state booleans evaluated per button. Both read the store without
//! waiting on any request in flight, and both render a channel whose state
//! is not known yet as loading rather than off.

mod feedback;
mod variables;

pub use feedback::{FeedbackState, RelayChoice, relay_choices, relay_state_matches, relay_status};
pub use variables::{
    CONNECTION_STATUS, HOST, LAST_COMMAND, LOADING, MIN_RELAY_VARIABLES, NOT_CONFIGURED,
    SessionInfo, VariableDefinition, definitions, values,
};
