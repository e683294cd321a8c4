// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session configuration as entered in the host configuration form.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directory::ClassificationStrategy;
use crate::error::{ConfigError, Error};
use crate::protocol::ApiGeneration;

/// Configuration of a device session.
///
/// Keys are camelCase to match the host form. Only `host`, `apiKey` and
/// `classification` have to be provided; the classification rule has no
/// default and must be chosen per deployment.
///
/// # Examples
///
/// ```
/// use ipx800_lib::session::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::from_json(
///     r#"{"host":"192.168.1.50","apiKey":"secret","classification":{"mode":"name"}}"#,
/// ).unwrap();
/// assert_eq!(config.poll_interval(), Duration::from_millis(500));
///
/// let connection = config.validate().unwrap();
/// assert_eq!(connection.host(), "192.168.1.50");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// IP address or hostname, with optional port and scheme.
    #[serde(default)]
    pub host: String,
    /// Opaque API key.
    #[serde(default)]
    pub api_key: String,
    /// Wire protocol generation of the firmware.
    #[serde(default)]
    pub protocol: ApiGeneration,
    /// Relay / digital-input classification rule for the modern I/O table.
    #[serde(default)]
    pub classification: Option<ClassificationStrategy>,
    /// Poll period in milliseconds.
    #[serde(default = "SessionConfig::default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Per-request timeout in milliseconds.
    #[serde(default = "SessionConfig::default_request_timeout")]
    pub request_timeout_ms: u64,
    /// How long a failed command keeps the status degraded, in milliseconds.
    #[serde(default = "SessionConfig::default_failure_cooldown")]
    pub failure_cooldown_ms: u64,
    /// Re-read the channel after each successful command.
    #[serde(default = "SessionConfig::default_reconfirm")]
    pub reconfirm: bool,
}

impl SessionConfig {
    /// Longest accepted per-request timeout, in milliseconds.
    pub const MAX_REQUEST_TIMEOUT_MS: u64 = 5000;

    const fn default_poll_interval() -> u64 {
        500
    }

    const fn default_request_timeout() -> u64 {
        2000
    }

    const fn default_failure_cooldown() -> u64 {
        5000
    }

    const fn default_reconfirm() -> bool {
        true
    }

    /// Creates a configuration with default tuning.
    #[must_use]
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            protocol: ApiGeneration::default(),
            classification: None,
            poll_interval_ms: Self::default_poll_interval(),
            request_timeout_ms: Self::default_request_timeout(),
            failure_cooldown_ms: Self::default_failure_cooldown(),
            reconfirm: Self::default_reconfirm(),
        }
    }

    /// Parses a configuration from the host form's JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSetting` if the JSON does not match.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidSetting(e.to_string()))
    }

    /// Sets the wire protocol generation.
    #[must_use]
    pub fn with_protocol(mut self, protocol: ApiGeneration) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the classification rule.
    #[must_use]
    pub fn with_classification(mut self, strategy: ClassificationStrategy) -> Self {
        self.classification = Some(strategy);
        self
    }

    /// Sets the poll period.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the command-failure cool-down.
    #[must_use]
    pub fn with_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.failure_cooldown_ms = duration_ms(cooldown);
        self
    }

    /// Enables or disables the read-back after commands.
    #[must_use]
    pub fn with_reconfirm(mut self, reconfirm: bool) -> Self {
        self.reconfirm = reconfirm;
        self
    }

    /// Returns the poll period.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the command-failure cool-down.
    #[must_use]
    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }

    /// Checks that the session can talk to a device.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingHost` or `ConfigError::MissingApiKey` for
    /// empty fields, `ConfigError::InvalidHost` for an unusable address and
    /// `ConfigError::InvalidSetting` for a missing classification rule, a
    /// zero period or a request timeout outside 1 to
    /// [`MAX_REQUEST_TIMEOUT_MS`](Self::MAX_REQUEST_TIMEOUT_MS).
    pub fn validate(&self) -> Result<DeviceConnection, ConfigError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        let api_key = self.api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        validate_host(host)?;

        let classification = match (self.protocol, self.classification) {
            (_, Some(strategy)) => {
                strategy.validate().map_err(ConfigError::InvalidSetting)?;
                strategy
            }
            // The legacy listing is classified by its key prefixes.
            (ApiGeneration::Legacy, None) => ClassificationStrategy::Name,
            (ApiGeneration::Modern, None) => {
                return Err(ConfigError::InvalidSetting(
                    "a classification rule (name or positional) is required".to_string(),
                ));
            }
        };

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if !(1..=Self::MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::InvalidSetting(format!(
                "request timeout must be between 1 and {} ms",
                Self::MAX_REQUEST_TIMEOUT_MS
            )));
        }

        Ok(DeviceConnection {
            host: host.to_string(),
            api_key: api_key.to_string(),
            protocol: self.protocol,
            classification,
        })
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("api_key", &"***")
            .field("protocol", &self.protocol)
            .field("classification", &self.classification)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("failure_cooldown_ms", &self.failure_cooldown_ms)
            .field("reconfirm", &self.reconfirm)
            .finish()
    }
}

impl TryFrom<&SessionConfig> for DeviceConnection {
    type Error = Error;

    fn try_from(config: &SessionConfig) -> Result<Self, Self::Error> {
        Ok(config.validate()?)
    }
}

/// Validated connection settings.
///
/// Both the host and the API key are non-empty; nothing is sent to a device
/// without one of these.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceConnection {
    host: String,
    api_key: String,
    protocol: ApiGeneration,
    classification: ClassificationStrategy,
}

impl DeviceConnection {
    /// Returns the host as configured (trimmed).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the wire protocol generation.
    #[must_use]
    pub fn protocol(&self) -> ApiGeneration {
        self.protocol
    }

    /// Returns the classification rule.
    #[must_use]
    pub fn classification(&self) -> ClassificationStrategy {
        self.classification
    }
}

impl std::fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("host", &self.host)
            .field("api_key", &"***")
            .field("protocol", &self.protocol)
            .field("classification", &self.classification)
            .finish()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Accepts `[scheme://]address[:port][/]` where the address is an IP literal
/// or an RFC 1123 hostname.
fn validate_host(raw: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidHost(raw.to_string());

    let rest = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))
        .unwrap_or(raw)
        .trim_end_matches('/');

    if rest.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let (address, port) = if let Some(bracketed) = rest.strip_prefix('[') {
        let (v6, after) = bracketed.split_once(']').ok_or_else(invalid)?;
        v6.parse::<std::net::Ipv6Addr>().map_err(|_| invalid())?;
        let port = match after {
            "" => None,
            _ => Some(after.strip_prefix(':').ok_or_else(invalid)?),
        };
        (None, port)
    } else {
        match rest.rsplit_once(':') {
            Some((address, port)) => (Some(address), Some(port)),
            None => (Some(rest), None),
        }
    };

    if let Some(port) = port {
        port.parse::<u16>().map_err(|_| invalid())?;
    }

    match address {
        Some(address) if address.parse::<IpAddr>().is_ok() || is_hostname(address) => Ok(()),
        Some(_) => Err(invalid()),
        None => Ok(()),
    }
}

fn is_hostname(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    !name.is_empty()
        && name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
