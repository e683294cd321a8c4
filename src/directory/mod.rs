// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! I/O directory: fetches and classifies the device's channel table.
//!
//! The whole table is fetched in one request per call, never channel by
//! channel, to bound the request volume under polling.

mod classify;
mod record;

pub use classify::ClassificationStrategy;
pub use record::{LEGACY_INPUT_ID_BASE, RawIo};

use std::sync::Arc;

use crate::error::Error;
use crate::protocol::{ApiGeneration, DeviceApi, Transport};
use crate::types::{IoId, IoKind, IoPoint, PowerState};

/// Reads the device's relays and digital inputs.
#[derive(Debug)]
pub struct IoDirectory<T> {
    transport: Arc<T>,
    api: DeviceApi,
    strategy: ClassificationStrategy,
}

impl<T> Clone for IoDirectory<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            api: self.api.clone(),
            strategy: self.strategy,
        }
    }
}

impl<T: Transport> IoDirectory<T> {
    /// Creates a directory reading through `transport`.
    #[must_use]
    pub fn new(transport: Arc<T>, api: DeviceApi, strategy: ClassificationStrategy) -> Self {
        Self {
            transport,
            api,
            strategy,
        }
    }

    /// Returns the classification strategy in use.
    #[must_use]
    pub fn strategy(&self) -> ClassificationStrategy {
        self.strategy
    }

    /// Returns the transport requests are sent through.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the API builder in use.
    #[must_use]
    pub fn api(&self) -> &DeviceApi {
        &self.api
    }

    /// Fetches and classifies every relay and digital input.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unreachable` if the device cannot be reached,
    /// `Error::Http` if it rejects the request and
    /// `Error::MalformedResponse` if the table cannot be understood.
    pub async fn list_all(&self) -> Result<Vec<IoPoint>, Error> {
        let payload = self.transport.get(&self.api.list_endpoint()).await?;
        let points = match self.api.generation() {
            ApiGeneration::Legacy => record::parse_legacy_list(payload.body())?,
            ApiGeneration::Modern => {
                let records = record::parse_modern_list(payload.body())?;
                self.strategy.classify(&records)?
            }
        };
        tracing::trace!(count = points.len(), "Classified I/O table");
        Ok(points)
    }

    /// Fetches the relays only.
    ///
    /// # Errors
    ///
    /// Same as [`list_all`](Self::list_all).
    pub async fn relays(&self) -> Result<Vec<IoPoint>, Error> {
        let mut points = self.list_all().await?;
        points.retain(|p| p.kind() == IoKind::Relay);
        Ok(points)
    }

    /// Reads the current state of one channel.
    ///
    /// Modern firmware answers from the single-channel endpoint; legacy
    /// firmware has none, so the full table is read and searched. Returns
    /// `None` if the channel is not part of the legacy table.
    ///
    /// # Errors
    ///
    /// Same as [`list_all`](Self::list_all).
    pub async fn read(&self, id: IoId) -> Result<Option<PowerState>, Error> {
        match self.api.read_endpoint(id) {
            Some(endpoint) => {
                let payload = self.transport.get(&endpoint).await?;
                Ok(Some(record::parse_modern_single(id, payload.body())?))
            }
            None => {
                let points = self.list_all().await?;
                Ok(points.iter().find(|p| p.id() == id).map(IoPoint::state))
            }
        }
    }
}
