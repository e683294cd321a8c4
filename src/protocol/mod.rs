// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol layer for talking to an IPX800 over HTTP.
//!
//! - [`Transport`]: single bounded GET/PUT requests with normalized errors
//! - [`HttpClient`]: the `reqwest`-backed transport
//! - [`DeviceApi`]: builds endpoints and bodies for the active
//!   [`ApiGeneration`]

mod api;
#[cfg(feature = "http")]
mod http;

pub use api::{ApiGeneration, DeviceApi, WireCommand};
#[cfg(feature = "http")]
pub use http::{HttpClient, HttpConfig};

use std::fmt;
use std::future::Future;

use crate::error::{ParseError, ProtocolError};

/// Placeholder written instead of secret query values in logs.
const REDACTED: &str = "***";

/// Raw body returned by the device.
#[derive(Debug, Clone)]
pub struct RawPayload {
    body: String,
}

impl RawPayload {
    /// Creates a payload with the given body.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parses the body as a specific type.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON cannot be parsed into the target type.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, ParseError> {
        serde_json::from_str(&self.body).map_err(Into::into)
    }
}

/// One query parameter of an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryParam {
    name: String,
    value: String,
    secret: bool,
}

/// Path and query string of a device request, relative to the device root.
///
/// Secret parameters (the API key) are never printed by the [`Display`]
/// implementation, so endpoints can be logged as-is.
///
/// # Examples
///
/// ```
/// use ipx800_lib::protocol::Endpoint;
///
/// let endpoint = Endpoint::new("/api/core/io")
///     .with_secret("ApiKey", "s3cret");
/// assert_eq!(endpoint.to_string(), "/api/core/io?ApiKey=***");
/// assert_eq!(endpoint.path_and_query(), "/api/core/io?ApiKey=s3cret");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    query: Vec<QueryParam>,
}

impl Endpoint {
    /// Creates an endpoint for the given path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(QueryParam {
            name: name.into(),
            value: value.into(),
            secret: false,
        });
        self
    }

    /// Appends a query parameter whose value must not be logged.
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(QueryParam {
            name: name.into(),
            value: value.into(),
            secret: true,
        });
        self
    }

    /// Returns the path without query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the value of a query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Returns the encoded path and query string, secrets included.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        self.render(false)
    }

    fn render(&self, redact: bool) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|p| {
                let value = if redact && p.secret {
                    REDACTED.into()
                } else {
                    urlencoding::encode(&p.value)
                };
                format!("{}={value}", urlencoding::encode(&p.name))
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

/// A transport able to issue single requests against the device.
///
/// Every call must be bounded by a timeout shorter than the poll period and
/// must fail with one of the [`ProtocolError`] variants, never with a raw
/// transport error.
pub trait Transport: Send + Sync + 'static {
    /// Reads a resource.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or times out.
    fn get(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<RawPayload, ProtocolError>> + Send;

    /// Writes a JSON body to a resource.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or times out.
    fn put(
        &self,
        endpoint: &Endpoint,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<RawPayload, ProtocolError>> + Send;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory transport for unit tests.

    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::{Endpoint, RawPayload, Transport};
    use crate::error::ProtocolError;

    type Reply = (Option<Duration>, Result<String, ProtocolError>);

    /// Replies to requests by path, in the order they were scripted.
    ///
    /// The last scripted reply for a path is repeated once the queue for that
    /// path has a single entry left.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTransport {
        replies: Mutex<HashMap<String, VecDeque<Reply>>>,
        requests: Mutex<Vec<(String, Option<serde_json::Value>)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(&self, path: &str, result: Result<&str, ProtocolError>) {
            self.push(path, None, result);
        }

        pub(crate) fn reply_after(
            &self,
            path: &str,
            delay: Duration,
            result: Result<&str, ProtocolError>,
        ) {
            self.push(path, Some(delay), result);
        }

        fn push(&self, path: &str, delay: Option<Duration>, result: Result<&str, ProtocolError>) {
            self.replies
                .lock()
                .entry(path.to_string())
                .or_default()
                .push_back((delay, result.map(str::to_string)));
        }

        pub(crate) fn requests(&self) -> Vec<(String, Option<serde_json::Value>)> {
            self.requests.lock().clone()
        }

        pub(crate) fn request_count(&self, path: &str) -> usize {
            self.requests
                .lock()
                .iter()
                .filter(|(p, _)| p.starts_with(path))
                .count()
        }

        async fn answer(
            &self,
            endpoint: &Endpoint,
            body: Option<serde_json::Value>,
        ) -> Result<RawPayload, ProtocolError> {
            self.requests.lock().push((endpoint.path_and_query(), body));
            let reply = {
                let mut replies = self.replies.lock();
                match replies.get_mut(endpoint.path()) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };
            let Some((delay, result)) = reply else {
                return Err(ProtocolError::HttpStatus(404));
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result.map(RawPayload::new)
        }
    }

    impl Transport for ScriptedTransport {
        async fn get(&self, endpoint: &Endpoint) -> Result<RawPayload, ProtocolError> {
            self.answer(endpoint, None).await
        }

        async fn put(
            &self,
            endpoint: &Endpoint,
            body: &serde_json::Value,
        ) -> Result<RawPayload, ProtocolError> {
            self.answer(endpoint, Some(body.clone())).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_without_query() {
        let endpoint = Endpoint::new("/api/core/info");
        assert_eq!(endpoint.path_and_query(), "/api/core/info");
    }

    #[test]
    fn endpoint_encodes_values() {
        let endpoint = Endpoint::new("/api/core/io").with_secret("ApiKey", "a b&c");
        assert_eq!(endpoint.path_and_query(), "/api/core/io?ApiKey=a%20b%26c");
    }

    #[test]
    fn endpoint_display_redacts_secrets() {
        let endpoint = Endpoint::new("/api/xdevices.json")
            .with_secret("key", "abc")
            .with_param("SetR3", "1");
        assert_eq!(endpoint.to_string(), "/api/xdevices.json?key=***&SetR3=1");
        assert_eq!(endpoint.param("SetR3"), Some("1"));
    }

    #[test]
    fn raw_payload_parse() {
        let payload = RawPayload::new(r#"{"on":true}"#);
        let value: serde_json::Value = payload.parse().unwrap();
        assert_eq!(value["on"], serde_json::json!(true));
    }
}
