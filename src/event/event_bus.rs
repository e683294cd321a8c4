// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan-out of [`IoEvent`]s to every listener of a session.

use tokio::sync::broadcast;

use super::IoEvent;

/// Events a lagging listener can fall behind before it sees `Lagged`.
const BACKLOG: usize = 256;

/// Broadcast channel shared by the poller, the dispatcher and the health
/// monitor of one session.
///
/// Clones publish into the same channel. A listener only receives events
/// published after it subscribed; state it missed is read from the
/// [`StateStore`](crate::state::StateStore).
///
/// # Examples
///
/// ```
/// use ipx800_lib::event::{EventBus, IoEvent};
/// use ipx800_lib::session::ConnectionStatus;
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
/// bus.publish(IoEvent::connection(ConnectionStatus::Ok));
/// assert!(rx.try_recv().unwrap().is_connection());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IoEvent>,
}

impl EventBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BACKLOG);
        Self { sender }
    }

    /// Returns a receiver of the events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IoEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. It is dropped when nobody listens.
    pub fn publish(&self, event: IoEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
