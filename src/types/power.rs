// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-related types for IPX800 channels.
//!
//! This module provides the on/off state of a channel and the small relay
//! numbers used by the legacy `xdevices.json` API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Represents the on/off state of a relay or digital input.
///
/// # Examples
///
/// ```
/// use ipx800_lib::types::PowerState;
///
/// assert_eq!(PowerState::On.as_str(), "ON");
/// assert_eq!(PowerState::Off.as_str(), "OFF");
/// assert_eq!(PowerState::On.toggled(), PowerState::Off);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    /// Channel is off.
    Off,
    /// Channel is on.
    On,
}

impl PowerState {
    /// Returns the display string used for host variables.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    /// Returns the numeric value used by the legacy API.
    #[must_use]
    pub const fn as_num(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    /// Returns `true` if the channel is on.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Returns the opposite state.
    #[must_use]
    pub const fn toggled(&self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OFF" | "0" | "FALSE" => Ok(Self::Off),
            "ON" | "1" | "TRUE" => Ok(Self::On),
            _ => Err(ValueError::InvalidPowerState(s.to_string())),
        }
    }
}

impl From<bool> for PowerState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

/// Relay number addressed by the legacy `xdevices.json` API.
///
/// Legacy firmware addresses relays with a 1-based small integer
/// (`SetR3=1`, `ToggleR3=1`).
///
/// # Examples
///
/// ```
/// use ipx800_lib::types::RelayNumber;
///
/// let relay = RelayNumber::new(3).unwrap();
/// assert_eq!(relay.value(), 3);
///
/// assert!(RelayNumber::new(0).is_err());
/// assert!(RelayNumber::new(33).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelayNumber(u8);

impl RelayNumber {
    /// Lowest relay number.
    pub const MIN: u8 = 1;
    /// Highest relay number.
    pub const MAX: u8 = 32;

    /// Creates a new relay number.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if the number is outside 1-32.
    pub fn new(number: u32) -> Result<Self, ValueError> {
        match u8::try_from(number) {
            Ok(n) if (Self::MIN..=Self::MAX).contains(&n) => Ok(Self(n)),
            _ => Err(ValueError::OutOfRange {
                min: u32::from(Self::MIN),
                max: u32::from(Self::MAX),
                actual: number,
            }),
        }
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RelayNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_state_from_str() {
        assert_eq!("ON".parse::<PowerState>().unwrap(), PowerState::On);
        assert_eq!("off".parse::<PowerState>().unwrap(), PowerState::Off);
        assert_eq!("1".parse::<PowerState>().unwrap(), PowerState::On);
        assert_eq!("false".parse::<PowerState>().unwrap(), PowerState::Off);
    }

    #[test]
    fn power_state_from_str_invalid() {
        let result = "toggle".parse::<PowerState>();
        assert!(matches!(
            result.unwrap_err(),
            ValueError::InvalidPowerState(_)
        ));
    }

    #[test]
    fn power_state_toggled() {
        assert_eq!(PowerState::On.toggled(), PowerState::Off);
        assert_eq!(PowerState::Off.toggled(), PowerState::On);
    }

    #[test]
    fn power_state_numeric() {
        assert_eq!(PowerState::On.as_num(), 1);
        assert_eq!(PowerState::Off.as_num(), 0);
        assert_eq!(PowerState::from(true), PowerState::On);
    }

    #[test]
    fn relay_number_bounds() {
        assert!(RelayNumber::new(1).is_ok());
        assert!(RelayNumber::new(32).is_ok());
        assert_eq!(
            RelayNumber::new(65536).unwrap_err(),
            ValueError::OutOfRange {
                min: 1,
                max: 32,
                actual: 65536
            }
        );
    }
}
