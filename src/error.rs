// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the IPX800 library.
//!
//! The hierarchy follows the failure classes a host application has to react
//! to differently: an incomplete configuration, an unreachable device, a
//! device that rejected a request, and a response that could not be
//! understood. Transport failures are normalized into [`ProtocolError`]
//! before they reach any other component.

use thiserror::Error;

use crate::types::IoId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection settings are missing or invalid. No request was made.
    #[error("configuration incomplete: {0}")]
    Config(#[from] ConfigError),

    /// The device could not be reached (connection refused or timed out).
    #[error("device unreachable: {0}")]
    Unreachable(ProtocolError),

    /// The device answered but rejected the request.
    #[error("device rejected the request with HTTP {0}")]
    Http(u16),

    /// The device answered with a body that could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] ParseError),

    /// A value could not be used for the active wire protocol.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The I/O point is not known to the device directory.
    #[error("unknown I/O point {0}")]
    UnknownIo(IoId),

    /// The I/O point is a digital input, which cannot be commanded.
    #[error("I/O point {0} is a read-only input")]
    ReadOnlyIo(IoId),

    /// The session was shut down.
    #[error("device session is closed")]
    Closed,
}

impl Error {
    /// Returns `true` if the failure is expected to clear on its own
    /// (the next scheduled poll retries it).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::ConnectionRefused(_) | ProtocolError::Timeout(_) => {
                Self::Unreachable(err)
            }
            ProtocolError::HttpStatus(code) => Self::Http(code),
            ProtocolError::MalformedBody(message) => {
                Self::MalformedResponse(ParseError::UnexpectedFormat(message))
            }
        }
    }
}

/// Normalized transport failures.
///
/// This is a closed set: every HTTP client failure is classified into one of
/// these variants so that upstream components can apply one fallback policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The connection could not be established or was dropped.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The device answered with a non-success status code.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The response body could not be read.
    #[error("malformed body: {0}")]
    MalformedBody(String),
}

/// Errors related to the connection settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No host address was configured.
    #[error("IP address is required")]
    MissingHost,

    /// No API key was configured.
    #[error("API key is required")]
    MissingApiKey,

    /// The host is neither an IP address nor a valid hostname.
    #[error("invalid host: {0}")]
    InvalidHost(String),

    /// A tuning setting is out of its allowed range.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Errors related to parsing device responses.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected response format.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),

    /// A classified channel carries no usable `on` value.
    #[error("channel {0} has no on/off value")]
    MissingState(IoId),

    /// The same identifier appears twice in one payload.
    #[error("duplicate I/O id {0} in payload")]
    DuplicateId(IoId),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u32,
        /// Maximum allowed value.
        max: u32,
        /// The actual value that was provided.
        actual: u32,
    },

    /// An invalid power state string was provided.
    #[error("invalid power state: {0}")]
    InvalidPowerState(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            min: 1,
            max: 32,
            actual: 40,
        };
        assert_eq!(err.to_string(), "value 40 is out of range [1, 32]");
    }

    #[test]
    fn timeout_maps_to_unreachable() {
        let err: Error = ProtocolError::Timeout(2000).into();
        assert!(matches!(err, Error::Unreachable(ProtocolError::Timeout(2000))));
        assert!(err.is_transient());
    }

    #[test]
    fn refused_maps_to_unreachable() {
        let err: Error = ProtocolError::ConnectionRefused("reset".to_string()).into();
        assert!(err.is_transient());
    }

    #[test]
    fn http_status_maps_to_http() {
        let err: Error = ProtocolError::HttpStatus(401).into();
        assert!(matches!(err, Error::Http(401)));
        assert!(!err.is_transient());
    }

    #[test]
    fn malformed_body_maps_to_malformed_response() {
        let err: Error = ProtocolError::MalformedBody("truncated".to_string()).into();
        assert!(matches!(
            err,
            Error::MalformedResponse(ParseError::UnexpectedFormat(_))
        ));
    }

    #[test]
    fn config_error_display() {
        let err: Error = ConfigError::MissingApiKey.into();
        assert_eq!(err.to_string(), "configuration incomplete: API key is required");
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::DuplicateId(IoId::new(65536));
        assert_eq!(err.to_string(), "duplicate I/O id 65536 in payload");
    }
}
