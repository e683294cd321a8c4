// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection health shown to the host.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::event::{EventBus, IoEvent};

/// Connection status of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Nothing has succeeded yet.
    Connecting,
    /// The device answers.
    Ok,
    /// The configuration is incomplete or invalid. Nothing is retried.
    BadConfig(String),
    /// The device failed recently.
    ConnectionFailure(String),
    /// The session was shut down.
    Disconnected,
}

impl ConnectionStatus {
    /// Returns true if the device answers.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns true if the status is degraded.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_))
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("Connecting"),
            Self::Ok => f.write_str("Connected"),
            Self::BadConfig(reason) => write!(f, "Bad configuration: {reason}"),
            Self::ConnectionFailure(reason) => write!(f, "Connection failed: {reason}"),
            Self::Disconnected => f.write_str("Disconnected"),
        }
    }
}

#[derive(Debug)]
struct HealthInner {
    config_issue: Option<String>,
    shut_down: bool,
    reached: bool,
    poll_failure: Option<String>,
    command_failure: Option<(Instant, String)>,
    cooldown: Duration,
    reported: ConnectionStatus,
}

impl HealthInner {
    fn resolve(&self, now: Instant) -> ConnectionStatus {
        if self.shut_down {
            return ConnectionStatus::Disconnected;
        }
        if let Some(issue) = &self.config_issue {
            return ConnectionStatus::BadConfig(issue.clone());
        }
        if let Some((until, reason)) = &self.command_failure
            && now < *until
        {
            return ConnectionStatus::ConnectionFailure(reason.clone());
        }
        if let Some(reason) = &self.poll_failure {
            return ConnectionStatus::ConnectionFailure(reason.clone());
        }
        if self.reached {
            ConnectionStatus::Ok
        } else {
            ConnectionStatus::Connecting
        }
    }
}

/// Tracks poll and command outcomes and resolves the visible status.
///
/// A failed command degrades the status for the whole cool-down window,
/// even if polls succeed in the meantime. A failed poll degrades it until
/// a poll succeeds again. Each change of the visible status is published as
/// [`IoEvent::ConnectionChanged`].
///
/// # Examples
///
/// ```
/// use ipx800_lib::event::EventBus;
/// use ipx800_lib::session::{ConnectionStatus, HealthMonitor};
/// use std::time::Duration;
///
/// let health = HealthMonitor::new(Duration::from_secs(5), EventBus::new());
/// assert_eq!(health.status(), ConnectionStatus::Connecting);
///
/// health.record_poll_success();
/// assert_eq!(health.status().to_string(), "Connected");
/// ```
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    inner: Arc<Mutex<HealthInner>>,
    events: EventBus,
}

impl HealthMonitor {
    /// Creates a monitor in the `Connecting` state.
    #[must_use]
    pub fn new(cooldown: Duration, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HealthInner {
                config_issue: None,
                shut_down: false,
                reached: false,
                poll_failure: None,
                command_failure: None,
                cooldown,
                reported: ConnectionStatus::Connecting,
            })),
            events,
        }
    }

    /// Returns the current status.
    ///
    /// Expired cool-downs are taken into account here, so the status clears
    /// even if nothing else happens.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.update(|_| {})
    }

    /// Records a successful poll.
    pub fn record_poll_success(&self) {
        self.update(|inner| {
            inner.reached = true;
            inner.poll_failure = None;
        });
    }

    /// Records a failed poll.
    pub fn record_poll_failure(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.update(|inner| inner.poll_failure = Some(reason));
    }

    /// Records a failed command, starting the cool-down window.
    pub fn record_command_failure(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.update(|inner| {
            inner.command_failure = Some((Instant::now() + inner.cooldown, reason));
        });
    }

    /// Changes the cool-down applied to later command failures.
    pub fn set_cooldown(&self, cooldown: Duration) {
        self.inner.lock().cooldown = cooldown;
    }

    /// Records a device that answered the connection probe.
    pub fn record_probe_success(&self) {
        self.update(|inner| inner.reached = true);
    }

    /// Sets or clears a configuration issue.
    pub fn set_config_issue(&self, issue: Option<String>) {
        self.update(|inner| inner.config_issue = issue);
    }

    /// Forgets every poll and command outcome, keeping the shutdown flag.
    pub fn reset(&self) {
        self.update(|inner| {
            inner.reached = false;
            inner.poll_failure = None;
            inner.command_failure = None;
        });
    }

    /// Marks the session as shut down. This is final.
    pub fn mark_shutdown(&self) {
        self.update(|inner| inner.shut_down = true);
    }

    fn update(&self, apply: impl FnOnce(&mut HealthInner)) -> ConnectionStatus {
        let (status, changed) = {
            let mut inner = self.inner.lock();
            apply(&mut inner);
            let status = inner.resolve(Instant::now());
            let changed = status != inner.reported;
            if changed {
                inner.reported = status.clone();
            }
            (status, changed)
        };

        if changed {
            match &status {
                ConnectionStatus::ConnectionFailure(reason) => {
                    tracing::warn!(reason = %reason, "Connection degraded");
                }
                ConnectionStatus::BadConfig(reason) => {
                    tracing::warn!(reason = %reason, "Configuration incomplete");
                }
                _ => tracing::info!(status = %status, "Connection status changed"),
            }
            self.events.publish(IoEvent::connection(status.clone()));
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(Duration::from_secs(5), EventBus::new())
    }

    #[test]
    fn rendering() {
        assert_eq!(ConnectionStatus::Ok.to_string(), "Connected");
        assert_eq!(
            ConnectionStatus::BadConfig("IP address is required".into()).to_string(),
            "Bad configuration: IP address is required"
        );
        assert_eq!(
            ConnectionStatus::ConnectionFailure("timeout".into()).to_string(),
            "Connection failed: timeout"
        );
    }

    #[tokio::test]
    async fn poll_failure_lasts_until_a_poll_succeeds() {
        let health = monitor();
        health.record_poll_success();
        for _ in 0..3 {
            health.record_poll_failure("timeout");
            assert!(health.status().is_failure());
        }
        health.record_poll_success();
        assert!(health.status().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn command_failure_outlasts_successful_polls() {
        let health = monitor();
        health.record_poll_success();
        health.record_command_failure("HTTP 500");

        tokio::time::advance(Duration::from_secs(2)).await;
        health.record_poll_success();
        assert_eq!(
            health.status(),
            ConnectionStatus::ConnectionFailure("HTTP 500".into())
        );

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(health.status().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_clears_without_confirmation() {
        let health = monitor();
        health.record_command_failure("refused");
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(health.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn config_issue_and_shutdown_take_precedence() {
        let health = monitor();
        health.record_poll_failure("timeout");
        health.set_config_issue(Some("API key is required".into()));
        assert!(matches!(health.status(), ConnectionStatus::BadConfig(_)));

        health.mark_shutdown();
        assert_eq!(health.status(), ConnectionStatus::Disconnected);
        health.set_config_issue(None);
        assert_eq!(health.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn changes_are_published_once() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let health = HealthMonitor::new(Duration::from_secs(5), events);

        health.record_poll_success();
        health.record_poll_success();
        health.record_poll_failure("timeout");

        assert_eq!(rx.recv().await.unwrap(), IoEvent::connection(ConnectionStatus::Ok));
        assert!(matches!(
            rx.recv().await.unwrap(),
            IoEvent::ConnectionChanged {
                status: ConnectionStatus::ConnectionFailure(_)
            }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reset_returns_to_connecting() {
        let health = monitor();
        health.record_probe_success();
        assert!(health.status().is_ok());
        health.reset();
        assert_eq!(health.status(), ConnectionStatus::Connecting);
    }
}
