// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsers for raw device I/O payloads.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::ParseError;
use crate::types::{IoId, IoKind, IoPoint, PowerState};

/// One entry of the modern `GET /api/core/io` array.
///
/// Only `_id`, `name` and `on` are read; other fields are ignored.
///
/// # Examples
///
/// ```
/// use ipx800_lib::directory::RawIo;
///
/// let json = r#"[{"_id":65536,"name":"Relay Cmd 1","on":true,"type":"io"}]"#;
/// let records: Vec<RawIo> = serde_json::from_str(json).unwrap();
/// assert_eq!(records[0].id().value(), 65536);
/// assert_eq!(records[0].name(), "Relay Cmd 1");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawIo {
    #[serde(rename = "_id")]
    id: IoId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    on: Option<serde_json::Value>,
}

impl RawIo {
    /// Creates a record, mainly for tests and alternative sources.
    #[must_use]
    pub fn new(id: IoId, name: impl Into<String>, on: Option<bool>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            on: on.map(serde_json::Value::Bool),
        }
    }

    /// Returns the device identifier.
    #[must_use]
    pub fn id(&self) -> IoId {
        self.id
    }

    /// Returns the device-reported name, empty if none.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Returns the reported state, if it is a usable on/off value.
    #[must_use]
    pub fn state(&self) -> Option<PowerState> {
        self.on.as_ref().and_then(state_of)
    }
}

/// Reads an on/off value reported as a boolean or as `0`/`1`.
pub(crate) fn state_of(value: &serde_json::Value) -> Option<PowerState> {
    match value {
        serde_json::Value::Bool(on) => Some(PowerState::from(*on)),
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(0) => Some(PowerState::Off),
            Some(1) => Some(PowerState::On),
            _ => None,
        },
        _ => None,
    }
}

/// Parses the full modern I/O table.
pub(crate) fn parse_modern_list(body: &str) -> Result<Vec<RawIo>, ParseError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if !value.is_array() {
        return Err(ParseError::UnexpectedFormat(
            "expected an array of I/O channels".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(Into::into)
}

/// Parses the single-channel modern response `{"on": bool, ...}`.
pub(crate) fn parse_modern_single(id: IoId, body: &str) -> Result<PowerState, ParseError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    value
        .get("on")
        .and_then(state_of)
        .ok_or(ParseError::MissingState(id))
}

/// Identifier offset of legacy digital inputs, keeping them apart from relays
/// which use their bare number.
pub const LEGACY_INPUT_ID_BASE: u32 = 1000;

/// Parses the legacy `xdevices.json?Get=all` object.
///
/// `R{n}` keys are relays and `D{n}` keys are digital inputs; the key prefix
/// is authoritative so no classification strategy is involved. Relay `n` gets
/// id `n`, input `n` gets id `LEGACY_INPUT_ID_BASE + n`. Numbers must be
/// written without leading zeros and stay below `LEGACY_INPUT_ID_BASE`, so
/// every id names one channel. Other keys (product, analog values, counters)
/// are ignored.
pub(crate) fn parse_legacy_list(body: &str) -> Result<Vec<IoPoint>, ParseError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let serde_json::Value::Object(map) = value else {
        return Err(ParseError::UnexpectedFormat(
            "expected a JSON object".to_string(),
        ));
    };

    let mut seen = HashSet::new();
    let mut relays = Vec::new();
    let mut inputs = Vec::new();
    for (key, value) in &map {
        let Some((kind, number)) = legacy_key(key) else {
            continue;
        };
        let id = match kind {
            IoKind::Relay => IoId::new(u32::from(number)),
            IoKind::DigitalInput => IoId::new(LEGACY_INPUT_ID_BASE + u32::from(number)),
        };
        if !seen.insert(id) {
            return Err(ParseError::DuplicateId(id));
        }
        let state = state_of(value).ok_or(ParseError::MissingState(id))?;
        let point = IoPoint::new(id, kind, number, "", state);
        match kind {
            IoKind::Relay => relays.push(point),
            IoKind::DigitalInput => inputs.push(point),
        }
    }

    relays.sort_by_key(IoPoint::index);
    inputs.sort_by_key(IoPoint::index);
    relays.extend(inputs);
    Ok(relays)
}

fn legacy_key(key: &str) -> Option<(IoKind, u16)> {
    let (kind, digits) = match key.split_at_checked(1)? {
        ("R", digits) => (IoKind::Relay, digits),
        ("D", digits) => (IoKind::DigitalInput, digits),
        _ => return None,
    };
    if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<u16>() {
        Ok(n) if n > 0 && u32::from(n) < LEGACY_INPUT_ID_BASE => Some((kind, n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modern_list_parses_numeric_and_bool_states() {
        let records = parse_modern_list(
            r#"[{"_id":1,"name":"Relay Cmd 1","on":true},{"_id":2,"name":"Input 1","on":0},{"_id":3}]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].state(), Some(PowerState::On));
        assert_eq!(records[1].state(), Some(PowerState::Off));
        assert_eq!(records[2].state(), None);
        assert_eq!(records[2].name(), "");
    }

    #[test]
    fn modern_list_rejects_object() {
        let err = parse_modern_list(r#"{"_id":1}"#).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedFormat(_)));
    }

    #[test]
    fn modern_list_rejects_missing_id() {
        let err = parse_modern_list(r#"[{"name":"Relay Cmd 1","on":true}]"#).unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn modern_single_reads_on() {
        let state = parse_modern_single(IoId::new(65536), r#"{"on":false,"name":"x"}"#).unwrap();
        assert_eq!(state, PowerState::Off);
    }

    #[test]
    fn modern_single_without_on_is_missing_state() {
        let err = parse_modern_single(IoId::new(65536), r#"{"value":3}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingState(id) if id.value() == 65536));
    }

    #[test]
    fn legacy_list_sorts_numerically() {
        let points = parse_legacy_list(
            r#"{"product":"IPX800_V4","R10":1,"R2":0,"R1":1,"D1":0,"A1":512,"Rx":1}"#,
        )
        .unwrap();
        let ids: Vec<u32> = points.iter().map(|p| p.id().value()).collect();
        assert_eq!(ids, [1, 2, 10, 1001]);
        assert_eq!(points[2].kind(), IoKind::Relay);
        assert_eq!(points[2].index(), 10);
        assert_eq!(points[3].kind(), IoKind::DigitalInput);
        assert_eq!(points[0].label(), "Relay 1 (ID: 1)");
        assert_eq!(points[3].label(), "Input 1 (ID: 1001)");
    }

    #[test]
    fn legacy_list_rejects_non_binary_relay() {
        let err = parse_legacy_list(r#"{"R1":7}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingState(_)));
    }

    #[test]
    fn legacy_numbers_never_share_an_id() {
        let points = parse_legacy_list(r#"{"R1001":1,"D1":0}"#).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id().value(), 1001);
        assert_eq!(points[0].kind(), IoKind::DigitalInput);

        let points = parse_legacy_list(r#"{"R1":1,"R01":0}"#).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].state(), PowerState::On);
    }

    #[test]
    fn legacy_key_bounds() {
        assert_eq!(legacy_key("R999"), Some((IoKind::Relay, 999)));
        assert_eq!(legacy_key("D1000"), None);
        assert_eq!(legacy_key("R0"), None);
        assert_eq!(legacy_key("R007"), None);
        assert_eq!(legacy_key("R"), None);
    }
}
