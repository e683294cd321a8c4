// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic refresh of the state store.
//!
//! Each tick lists the full I/O table and folds it into the
//! [`StateStore`] as one snapshot. A failed tick leaves the store untouched,
//! degrades the connection status and is retried by the next tick; it never
//! stops the loop.
//!
//! Polls never overlap: the poll runs inside the loop and ticks that come
//! due while it is in flight are skipped. Clones of a [`StatePoller`] share
//! one gate, so an on-demand [`poll_once`](StatePoller::poll_once) waits for
//! the scheduled one instead of racing it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::directory::IoDirectory;
use crate::error::Error;
use crate::event::{EventBus, IoEvent};
use crate::protocol::Transport;
use crate::session::HealthMonitor;
use crate::state::{PollSnapshot, StateStore};

/// Refreshes a [`StateStore`] from an [`IoDirectory`].
#[derive(Debug)]
pub struct StatePoller<T> {
    directory: IoDirectory<T>,
    store: StateStore,
    health: HealthMonitor,
    events: EventBus,
    gate: Arc<Mutex<()>>,
}

impl<T> Clone for StatePoller<T> {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            store: self.store.clone(),
            health: self.health.clone(),
            events: self.events.clone(),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<T: Transport> StatePoller<T> {
    /// Creates a poller writing into `store`.
    #[must_use]
    pub fn new(
        directory: IoDirectory<T>,
        store: StateStore,
        health: HealthMonitor,
        events: EventBus,
    ) -> Self {
        Self {
            directory,
            store,
            health,
            events,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Runs one poll tick.
    ///
    /// Waits for a poll already in flight on this poller or one of its
    /// clones. Returns the number of channels whose state changed.
    ///
    /// # Errors
    ///
    /// Returns the listing error. The store is not modified in that case.
    pub async fn poll_once(&self) -> Result<usize, Error> {
        let _turn = self.gate.lock().await;
        let snapshot = match self.directory.list_all().await {
            Ok(points) => PollSnapshot::success(points),
            Err(e) => {
                tracing::debug!(error = %e, "Poll failed");
                self.store.replace_all(&PollSnapshot::failure());
                self.health.record_poll_failure(e.to_string());
                return Err(e);
            }
        };

        let changes = self.store.replace_all(&snapshot);
        self.health.record_poll_success();

        tracing::trace!(
            channels = snapshot.points().len(),
            changed = changes.len(),
            "Poll succeeded"
        );

        let count = changes.len();
        for change in changes {
            self.events.publish(IoEvent::from(change));
        }
        Ok(count)
    }

    /// Starts polling every `period` on the current tokio runtime.
    ///
    /// The first tick fires immediately.
    #[must_use]
    pub fn spawn(self, period: Duration) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            tracing::debug!(?period, "Starting poller");

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        // Failures are already recorded; the next tick retries.
                        let _ = self.poll_once().await;
                    }
                }
            }

            tracing::debug!("Poller stopped");
        });

        PollerHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Owns a running poll loop.
///
/// Dropping the handle aborts the loop; [`stop`](Self::stop) lets an
/// in-flight poll finish first.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stops the loop and waits for it to finish.
    ///
    /// A poll in flight completes (bounded by the request timeout) before
    /// this returns; no tick starts afterwards.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "Poller task ended abnormally");
        }
    }

    /// Returns true if the loop has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::ClassificationStrategy;
    use crate::error::ProtocolError;
    use crate::protocol::testing::ScriptedTransport;
    use crate::protocol::{ApiGeneration, DeviceApi};
    use crate::types::{IoId, PowerState};

    const LIST: &str = "/api/core/io";

    struct Fixture {
        transport: Arc<ScriptedTransport>,
        store: StateStore,
        health: HealthMonitor,
        events: EventBus,
    }

    impl Fixture {
        fn new() -> Self {
            let events = EventBus::new();
            Self {
                transport: Arc::new(ScriptedTransport::new()),
                store: StateStore::new(),
                health: HealthMonitor::new(Duration::from_secs(5), events.clone()),
                events,
            }
        }

        fn poller(&self) -> StatePoller<ScriptedTransport> {
            let directory = IoDirectory::new(
                Arc::clone(&self.transport),
                DeviceApi::new(ApiGeneration::Modern, "key"),
                ClassificationStrategy::Name,
            );
            StatePoller::new(
                directory,
                self.store.clone(),
                self.health.clone(),
                self.events.clone(),
            )
        }
    }

    #[tokio::test]
    async fn successful_poll_fills_store_and_publishes() {
        let fixture = Fixture::new();
        let mut rx = fixture.events.subscribe();
        fixture.transport.reply(
            LIST,
            Ok(r#"[{"_id":65536,"name":"Relay Cmd 1","on":false}]"#),
        );

        let changed = fixture.poller().poll_once().await.unwrap();

        assert_eq!(changed, 1);
        assert_eq!(fixture.store.get(IoId::new(65536)), Some(PowerState::Off));
        assert!(fixture.health.status().is_ok());

        let mut saw_state = false;
        while let Ok(event) = rx.try_recv() {
            saw_state |= event.io_id() == Some(IoId::new(65536));
        }
        assert!(saw_state);
    }

    #[tokio::test]
    async fn failed_polls_keep_previous_state() {
        let fixture = Fixture::new();
        fixture.transport.reply(
            LIST,
            Ok(r#"[{"_id":65536,"name":"Relay Cmd 1","on":true}]"#),
        );
        let poller = fixture.poller();
        poller.poll_once().await.unwrap();

        fixture
            .transport
            .reply(LIST, Err(ProtocolError::ConnectionRefused("refused".into())));
        for _ in 0..3 {
            assert!(poller.poll_once().await.is_err());
            assert_eq!(fixture.store.get(IoId::new(65536)), Some(PowerState::On));
            assert!(fixture.health.status().is_failure());
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_failed_poll() {
        let fixture = Fixture::new();
        fixture.transport.reply(LIST, Ok(r#"{"error":"bad key"}"#));
        let err = fixture.poller().poll_once().await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert!(!fixture.store.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_polls_until_stopped() {
        let fixture = Fixture::new();
        fixture.transport.reply(LIST, Ok("[]"));
        let handle = fixture.poller().spawn(Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(1_250)).await;
        assert_eq!(fixture.transport.request_count(LIST), 3);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fixture.transport.request_count(LIST), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_polls_do_not_overlap() {
        let fixture = Fixture::new();
        fixture
            .transport
            .reply_after(LIST, Duration::from_millis(1_200), Ok("[]"));
        let handle = fixture.poller().spawn(Duration::from_millis(500));

        // Polls start at 0, 1200 and 2400 ms; the ticks due meanwhile are skipped.
        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert_eq!(fixture.transport.request_count(LIST), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_in_flight_poll() {
        let fixture = Fixture::new();
        fixture.transport.reply_after(
            LIST,
            Duration::from_millis(300),
            Ok(r#"[{"_id":1,"name":"Relay Cmd 1","on":true}]"#),
        );
        let handle = fixture.poller().spawn(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(10)).await;

        handle.stop().await;

        assert_eq!(fixture.store.get(IoId::new(1)), Some(PowerState::On));
    }

    #[tokio::test(start_paused = true)]
    async fn on_demand_poll_waits_for_scheduled_one() {
        let fixture = Fixture::new();
        fixture
            .transport
            .reply_after(LIST, Duration::from_millis(1_200), Ok("[]"));
        let poller = fixture.poller();
        let handle = poller.clone().spawn(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let started = tokio::time::Instant::now();
        poller.poll_once().await.unwrap();

        // The scheduled poll finishes at 1200 ms, then the on-demand one runs.
        assert!(started.elapsed() >= Duration::from_millis(2_390));
        assert_eq!(fixture.transport.request_count(LIST), 2);
        handle.stop().await;
    }
}
