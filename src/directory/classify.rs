// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay / digital-input classification of the modern I/O table.
//!
//! Firmware revisions disagree on how command relays can be told apart from
//! the other channels, so the rule is chosen per deployment:
//!
//! - [`ClassificationStrategy::Name`] looks at the device-reported name.
//! - [`ClassificationStrategy::Positional`] relies on the fixed ordering of
//!   the table: command relays in the first slots, digital inputs in a later
//!   block.
//!
//! Exactly one rule is applied to a payload; results are never merged.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::RawIo;
use crate::error::ParseError;
use crate::types::{IoKind, IoPoint};

/// Rule deciding which channels of the modern I/O table are relays and which
/// are digital inputs.
///
/// There is deliberately no default: the deployment must pick one.
///
/// # Examples
///
/// ```
/// use ipx800_lib::directory::ClassificationStrategy;
///
/// let by_name: ClassificationStrategy =
///     serde_json::from_str(r#"{"mode":"name"}"#).unwrap();
/// assert_eq!(by_name, ClassificationStrategy::Name);
///
/// let by_slot: ClassificationStrategy = serde_json::from_str(
///     r#"{"mode":"positional","relayCount":8,"inputOffset":16,"inputCount":8}"#,
/// ).unwrap();
/// assert!(matches!(by_slot, ClassificationStrategy::Positional { relay_count: 8, .. }));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ClassificationStrategy {
    /// Case-insensitive name matching.
    ///
    /// Relays: the name contains `relay cmd` or `relay command`, or contains
    /// `relay` but neither `state` nor `input`. Digital inputs: any other
    /// name containing `input`.
    Name,
    /// Fixed slot layout of the response.
    Positional {
        /// Number of leading slots holding command relays.
        #[serde(rename = "relayCount")]
        relay_count: u16,
        /// Slot where the digital-input block starts.
        #[serde(rename = "inputOffset")]
        input_offset: u16,
        /// Number of slots in the digital-input block.
        #[serde(rename = "inputCount")]
        input_count: u16,
    },
}

impl ClassificationStrategy {
    /// Returns the kind of the record at `position`, or `None` if the record
    /// is neither a relay nor a digital input.
    #[must_use]
    pub fn kind_of(&self, position: usize, record: &RawIo) -> Option<IoKind> {
        match *self {
            Self::Name => kind_by_name(record.name()),
            Self::Positional {
                relay_count,
                input_offset,
                input_count,
            } => {
                let relay_end = usize::from(relay_count);
                let input_start = usize::from(input_offset);
                let input_end = input_start + usize::from(input_count);
                if position < relay_end {
                    Some(IoKind::Relay)
                } else if (input_start..input_end).contains(&position) {
                    Some(IoKind::DigitalInput)
                } else {
                    None
                }
            }
        }
    }

    /// Checks that the two positional blocks do not overlap.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the layout is inconsistent.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Self::Name => Ok(()),
            Self::Positional {
                relay_count,
                input_offset,
                input_count,
            } => {
                if input_count > 0 && input_offset < relay_count {
                    Err(format!(
                        "input block at slot {input_offset} overlaps the {relay_count} relay slots"
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Classifies a full payload into relay and digital-input points, in
    /// payload order.
    ///
    /// The 1-based index of a point counts channels of its own kind.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::DuplicateId` if an id appears twice and
    /// `ParseError::MissingState` if a classified channel has no on/off
    /// value.
    pub fn classify(&self, records: &[RawIo]) -> Result<Vec<IoPoint>, ParseError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id()) {
                return Err(ParseError::DuplicateId(record.id()));
            }
        }

        let mut relay_index: u16 = 0;
        let mut input_index: u16 = 0;
        let mut points = Vec::new();

        for (position, record) in records.iter().enumerate() {
            let Some(kind) = self.kind_of(position, record) else {
                continue;
            };
            let state = record
                .state()
                .ok_or(ParseError::MissingState(record.id()))?;
            let counter = match kind {
                IoKind::Relay => &mut relay_index,
                IoKind::DigitalInput => &mut input_index,
            };
            *counter = counter.saturating_add(1);
            points.push(IoPoint::new(record.id(), kind, *counter, record.name(), state));
        }

        Ok(points)
    }
}

fn kind_by_name(name: &str) -> Option<IoKind> {
    let name = name.to_lowercase();
    let is_relay = name.contains("relay cmd")
        || name.contains("relay command")
        || (name.contains("relay") && !name.contains("state") && !name.contains("input"));
    if is_relay {
        Some(IoKind::Relay)
    } else if name.contains("input") {
        Some(IoKind::DigitalInput)
    } else {
        None
    }
}
