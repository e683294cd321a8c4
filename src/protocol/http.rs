// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for IPX800 devices.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use crate::error::{ConfigError, ProtocolError};
use crate::protocol::{Endpoint, RawPayload, Transport};

// ============================================================================
// HttpConfig - Connection parameters of the HTTP transport
// ============================================================================

/// Configuration for the HTTP transport.
///
/// HTTP is stateless: each poll or command is an independent request. The
/// timeout bounds every request, so it must stay shorter than the poll
/// period.
///
/// # Examples
///
/// ```
/// use ipx800_lib::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("192.168.1.100").with_timeout(Duration::from_secs(2));
/// assert_eq!(config.base_url(), "http://192.168.1.100");
///
/// let config = HttpConfig::new("https://ipx.local:8443");
/// assert_eq!(config.base_url(), "https://ipx.local:8443");
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    host: String,
    timeout: Duration,
}

impl HttpConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Creates a new HTTP configuration for the specified host.
    ///
    /// The host may carry a port and an `http://` or `https://` prefix.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the base URL from this configuration.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        }
    }

    /// Creates an `HttpClient` from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be created.
    pub fn into_client(self) -> Result<HttpClient, ConfigError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ConfigError::InvalidSetting(format!("HTTP client: {e}")))?;

        Ok(HttpClient {
            base_url: self.base_url(),
            client,
            timeout: self.timeout,
        })
    }
}

// ============================================================================
// HttpClient - reqwest-backed transport
// ============================================================================

/// HTTP client for communicating with an IPX800.
///
/// # Examples
///
/// ```no_run
/// use ipx800_lib::protocol::{Endpoint, HttpConfig, Transport};
///
/// # async fn example() -> ipx800_lib::Result<()> {
/// let client = HttpConfig::new("192.168.1.100").into_client()?;
/// let payload = client
///     .get(&Endpoint::new("/api/core/io").with_secret("ApiKey", "key"))
///     .await?;
/// println!("{}", payload.body());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Creates a new HTTP client for the specified host with the default
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(host: impl Into<String>) -> Result<Self, ConfigError> {
        HttpConfig::new(host).into_client()
    }

    /// Returns the base URL of the device.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the full URL for an endpoint.
    fn build_url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path_and_query())
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        endpoint: &Endpoint,
    ) -> Result<RawPayload, ProtocolError> {
        let response = request.send().await.map_err(|e| self.classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(
                endpoint = %endpoint,
                status = status.as_u16(),
                "Device rejected HTTP request"
            );
            return Err(ProtocolError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(&e))?;

        tracing::debug!(endpoint = %endpoint, body = %body, "Received HTTP response");

        Ok(RawPayload::new(body))
    }

    /// Normalizes a transport failure into the closed error set.
    fn classify(&self, err: &reqwest::Error) -> ProtocolError {
        if err.is_timeout() {
            ProtocolError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else if err.is_decode() || err.is_body() {
            ProtocolError::MalformedBody(err.to_string())
        } else {
            ProtocolError::ConnectionRefused(err.to_string())
        }
    }
}

impl Transport for HttpClient {
    async fn get(&self, endpoint: &Endpoint) -> Result<RawPayload, ProtocolError> {
        tracing::debug!(endpoint = %endpoint, "Sending HTTP GET");
        let request = self.client.get(self.build_url(endpoint));
        self.execute(request, endpoint).await
    }

    async fn put(
        &self,
        endpoint: &Endpoint,
        body: &serde_json::Value,
    ) -> Result<RawPayload, ProtocolError> {
        tracing::debug!(endpoint = %endpoint, body = %body, "Sending HTTP PUT");
        let request = self.client.put(self.build_url(endpoint)).json(body);
        self.execute(request, endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_with_query() {
        let client = HttpClient::new("192.168.1.100").unwrap();
        let endpoint = Endpoint::new("/api/core/io/65536").with_secret("ApiKey", "abc");
        assert_eq!(
            client.build_url(&endpoint),
            "http://192.168.1.100/api/core/io/65536?ApiKey=abc"
        );
    }

    #[test]
    fn build_url_keeps_https() {
        let client = HttpClient::new("https://192.168.1.100").unwrap();
        assert_eq!(client.base_url(), "https://192.168.1.100");
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let config = HttpConfig::new("http://ipx.local:8080/");
        assert_eq!(config.base_url(), "http://ipx.local:8080");
    }

    #[test]
    fn http_config_default_timeout() {
        let config = HttpConfig::new("192.168.1.100");
        assert_eq!(config.host(), "192.168.1.100");
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn http_config_with_timeout() {
        let config = HttpConfig::new("192.168.1.100").with_timeout(Duration::from_millis(400));
        assert_eq!(config.timeout(), Duration::from_millis(400));
        let client = config.into_client().unwrap();
        assert_eq!(client.timeout, Duration::from_millis(400));
    }
}
