// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device session: the lifecycle of one configured IPX800.
//!
//! A [`DeviceSession`] owns everything a host instance needs: the state
//! store, the connection health, the event bus, the command dispatcher and
//! the poll loop. It is the surface the host plugin layer calls into.
//!
//! An incomplete configuration never makes a session fail to start: the
//! session reports `BadConfig`, sends nothing and waits for
//! [`reconfigure`](DeviceSession::reconfigure).
//!
//! # Examples
//!
//! ```no_run
//! use ipx800_lib::directory::ClassificationStrategy;
//! use ipx800_lib::session::{DeviceSession, SessionConfig};
//! use ipx800_lib::types::IoId;
//!
//! # async fn example() -> ipx800_lib::Result<()> {
//! let config = SessionConfig::new("192.168.1.50", "my-api-key")
//!     .with_classification(ClassificationStrategy::Name);
//! let mut session = DeviceSession::connect(config).await;
//!
//! session.toggle(IoId::new(65536)).await?;
//! println!("{}", session.status());
//! for (id, value) in session.variables() {
//!     println!("{id} = {value}");
//! }
//!
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod health;

pub use config::{DeviceConnection, SessionConfig};
pub use health::{ConnectionStatus, HealthMonitor};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::command::CommandRequest;
use crate::directory::IoDirectory;
use crate::dispatcher::CommandDispatcher;
use crate::error::{ConfigError, Error};
use crate::event::{EventBus, IoEvent};
use crate::poller::{PollerHandle, StatePoller};
use crate::projection::{self, FeedbackState, RelayChoice, SessionInfo, VariableDefinition};
use crate::protocol::{DeviceApi, Transport};
use crate::state::StateStore;
use crate::types::{IoId, PowerState};

#[cfg(feature = "http")]
use crate::protocol::{HttpClient, HttpConfig};

type TransportFactory<T> =
    Box<dyn Fn(&DeviceConnection, &SessionConfig) -> Result<Arc<T>, ConfigError> + Send + Sync>;

/// Parts that only exist while the configuration is valid.
struct Active<T> {
    poller: StatePoller<T>,
    dispatcher: CommandDispatcher<T>,
    poll_loop: PollerHandle,
}

/// A running connection to one IPX800.
pub struct DeviceSession<T: Transport> {
    config: SessionConfig,
    factory: TransportFactory<T>,
    store: StateStore,
    health: HealthMonitor,
    events: EventBus,
    active: Option<Active<T>>,
    config_error: Option<ConfigError>,
    last_command: Option<CommandRequest>,
    closed: bool,
}

#[cfg(feature = "http")]
impl DeviceSession<HttpClient> {
    /// Starts a session talking HTTP to the configured host.
    pub async fn connect(config: SessionConfig) -> Self {
        let factory: TransportFactory<HttpClient> = Box::new(|connection, config| {
            HttpConfig::new(connection.host())
                .with_timeout(config.request_timeout())
                .into_client()
                .map(Arc::new)
        });
        Self::start(config, factory).await
    }
}

impl<T: Transport> DeviceSession<T> {
    /// Starts a session over the given transport.
    ///
    /// The transport is kept across [`reconfigure`](Self::reconfigure); only
    /// the API generation, key and tuning are taken from the configuration.
    pub async fn with_transport(config: SessionConfig, transport: Arc<T>) -> Self {
        let factory: TransportFactory<T> = Box::new(move |_, _| Ok(Arc::clone(&transport)));
        Self::start(config, factory).await
    }

    async fn start(config: SessionConfig, factory: TransportFactory<T>) -> Self {
        let events = EventBus::new();
        let health = HealthMonitor::new(config.failure_cooldown(), events.clone());
        let mut session = Self {
            config,
            factory,
            store: StateStore::new(),
            health,
            events,
            active: None,
            config_error: None,
            last_command: None,
            closed: false,
        };
        session.activate().await;
        session
    }

    /// Starts from a blank store: states of a previous configuration never
    /// show as current.
    async fn activate(&mut self) {
        self.health.reset();
        for change in self.store.clear() {
            self.events.publish(IoEvent::from(change));
        }

        let prepared = self.config.validate().and_then(|connection| {
            let transport = (self.factory)(&connection, &self.config)?;
            Ok((connection, transport))
        });
        let (connection, transport) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.health.set_config_issue(Some(e.to_string()));
                self.config_error = Some(e);
                return;
            }
        };
        self.health.set_config_issue(None);
        self.config_error = None;

        let api = DeviceApi::new(connection.protocol(), connection.api_key());
        let directory = IoDirectory::new(transport, api, connection.classification());

        self.probe(&directory).await;

        let poller = StatePoller::new(
            directory.clone(),
            self.store.clone(),
            self.health.clone(),
            self.events.clone(),
        );
        let poll_loop = poller.clone().spawn(self.config.poll_interval());
        let dispatcher = CommandDispatcher::new(
            directory,
            self.store.clone(),
            self.health.clone(),
            self.events.clone(),
        )
        .with_reconfirm(self.config.reconfirm);

        tracing::info!(
            host = %connection.host(),
            protocol = ?connection.protocol(),
            "Device session started"
        );

        self.active = Some(Active {
            poller,
            dispatcher,
            poll_loop,
        });
    }

    /// Tries the probe endpoints in order until one answers with success.
    async fn probe(&self, directory: &IoDirectory<T>) -> bool {
        for endpoint in directory.api().probe_endpoints() {
            match directory.transport().get(&endpoint).await {
                Ok(_) => {
                    tracing::info!(endpoint = %endpoint, "Device answered connection probe");
                    self.health.record_probe_success();
                    return true;
                }
                Err(e) => tracing::debug!(endpoint = %endpoint, error = %e, "Probe failed"),
            }
        }
        tracing::warn!("No probe endpoint answered, polling anyway");
        false
    }

    async fn deactivate(&mut self) {
        if let Some(active) = self.active.take() {
            if let Some(command) = active.dispatcher.last_command() {
                self.last_command = Some(command);
            }
            active.poll_loop.stop().await;
            active.dispatcher.settle_all().await;
        }
    }

    /// Applies a new configuration.
    ///
    /// The poll loop is stopped, then restarted with the new settings. Every
    /// channel reads as unknown until the first snapshot of the new
    /// configuration; only the last command is carried over.
    pub async fn reconfigure(&mut self, config: SessionConfig) {
        if self.closed {
            return;
        }
        tracing::info!("Configuration updated");
        self.deactivate().await;
        self.config = config;
        self.health.set_cooldown(self.config.failure_cooldown());
        self.activate().await;
    }

    /// Stops polling and marks the session disconnected.
    ///
    /// A poll in flight is allowed to finish. Commands fail with
    /// `Error::Closed` afterwards.
    pub async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.deactivate().await;
        self.closed = true;
        self.health.mark_shutdown();
        tracing::info!("Device session shut down");
    }

    fn active(&self) -> Result<&Active<T>, Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        match (&self.active, &self.config_error) {
            (Some(active), _) => Ok(active),
            (None, Some(e)) => Err(Error::Config(e.clone())),
            (None, None) => Err(Error::Closed),
        }
    }

    fn dispatcher(&self) -> Result<&CommandDispatcher<T>, Error> {
        self.active().map(|active| &active.dispatcher)
    }

    /// Switches a relay on or off.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` with an incomplete configuration,
    /// `Error::Closed` after shutdown, or the dispatcher's error.
    pub async fn set_state(&self, id: IoId, on: bool) -> Result<(), Error> {
        self.dispatcher()?.set_state(id, on).await
    }

    /// Flips a relay.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state).
    pub async fn toggle(&self, id: IoId) -> Result<(), Error> {
        self.dispatcher()?.toggle(id).await
    }

    /// Executes a command request.
    ///
    /// # Errors
    ///
    /// Same as [`set_state`](Self::set_state).
    pub async fn execute(&self, request: CommandRequest) -> Result<(), Error> {
        self.dispatcher()?.execute(request).await
    }

    /// Waits until commands on `id` have been read back.
    pub async fn settle(&self, id: IoId) {
        if let Ok(dispatcher) = self.dispatcher() {
            dispatcher.settle(id).await;
        }
    }

    /// Runs one poll immediately, outside the schedule.
    ///
    /// A scheduled poll in flight is awaited first; the two never overlap.
    ///
    /// # Errors
    ///
    /// Returns the listing error, or `Error::Config`/`Error::Closed` when
    /// the session is not active.
    pub async fn refresh(&self) -> Result<usize, Error> {
        self.active()?.poller.poll_once().await
    }

    /// Returns the last known state of a channel.
    #[must_use]
    pub fn state(&self, id: IoId) -> Option<PowerState> {
        self.store.get(id)
    }

    /// Returns the state store.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.health.status()
    }

    /// Subscribes to state and connection events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IoEvent> {
        self.events.subscribe()
    }

    /// Returns the last command the device accepted.
    #[must_use]
    pub fn last_command(&self) -> Option<CommandRequest> {
        self.active
            .as_ref()
            .and_then(|active| active.dispatcher.last_command())
            .or(self.last_command)
    }

    /// Lists the variables the host should declare.
    #[must_use]
    pub fn variable_definitions(&self) -> Vec<VariableDefinition> {
        projection::definitions(&self.store)
    }

    /// Renders every variable value.
    #[must_use]
    pub fn variables(&self) -> BTreeMap<String, String> {
        let status = self.status();
        let last_command = self.last_command();
        projection::values(
            &self.store,
            SessionInfo {
                status: &status,
                host: &self.config.host,
                last_command: last_command.as_ref(),
            },
        )
    }

    /// Evaluates the "relay is on" feedback.
    #[must_use]
    pub fn relay_status(&self, id: IoId) -> FeedbackState {
        projection::relay_status(&self.store, id)
    }

    /// Evaluates the "relay is in state" feedback.
    #[must_use]
    pub fn relay_state_matches(&self, id: IoId, expected: PowerState) -> FeedbackState {
        projection::relay_state_matches(&self.store, id, expected)
    }

    /// Lists the discovered relays for host dropdowns.
    #[must_use]
    pub fn relay_choices(&self) -> Vec<RelayChoice> {
        projection::relay_choices(&self.store)
    }
}

impl<T: Transport> fmt::Debug for DeviceSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("host", &self.config.host)
            .field("protocol", &self.config.protocol)
            .field("status", &self.health.status())
            .field("active", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::directory::ClassificationStrategy;
    use crate::protocol::ApiGeneration;
    use crate::protocol::testing::ScriptedTransport;

    const LIST: &str = "/api/core/io";
    const ONE_RELAY: &str = r#"[{"_id":65536,"name":"Relay Cmd 1","on":false}]"#;

    fn config() -> SessionConfig {
        SessionConfig::new("192.168.1.50", "key")
            .with_classification(ClassificationStrategy::Name)
            .with_poll_interval(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn incomplete_config_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let session =
            DeviceSession::with_transport(SessionConfig::new("", "key"), Arc::clone(&transport))
                .await;

        assert_eq!(
            session.status(),
            ConnectionStatus::BadConfig("IP address is required".to_string())
        );
        let err = session.toggle(IoId::new(65536)).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingHost)));
        assert!(transport.requests().is_empty());
        assert_eq!(session.variables()[projection::HOST], "Not configured");
    }

    #[tokio::test(start_paused = true)]
    async fn probe_then_poll() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply("/api/core/info", Err(crate::error::ProtocolError::HttpStatus(404)));
        transport.reply(LIST, Ok(ONE_RELAY));

        let session = DeviceSession::with_transport(config(), Arc::clone(&transport)).await;
        assert!(session.status().is_ok());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.state(IoId::new(65536)), Some(PowerState::Off));
        assert_eq!(session.variables()["relay_1_state"], "OFF");
        assert_eq!(session.relay_choices().len(), 1);

        let paths: Vec<_> = transport.requests().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths[0], "/api/core/info?ApiKey=key");
        assert_eq!(paths[1], "/api/core/io?ApiKey=key");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_polling_and_closes() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(LIST, Ok(ONE_RELAY));
        let mut session = DeviceSession::with_transport(config(), Arc::clone(&transport)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.shutdown().await;
        let polls = transport.request_count(LIST);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(transport.request_count(LIST), polls);
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(session.variables()[projection::CONNECTION_STATUS], "Disconnected");
        assert!(matches!(
            session.set_state(IoId::new(65536), true).await,
            Err(Error::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_recovers_from_bad_config() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(LIST, Ok(ONE_RELAY));
        let mut session =
            DeviceSession::with_transport(SessionConfig::new("ipx", ""), Arc::clone(&transport))
                .await;
        assert!(matches!(session.status(), ConnectionStatus::BadConfig(_)));

        session.reconfigure(config()).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(session.status().is_ok());
        assert_eq!(session.state(IoId::new(65536)), Some(PowerState::Off));
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn last_command_survives_reconfigure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(LIST, Ok(ONE_RELAY));
        transport.reply("/api/core/io/65536", Ok("{}"));
        let mut session = DeviceSession::with_transport(
            config().with_reconfirm(false),
            Arc::clone(&transport),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.set_state(IoId::new(65536), true).await.unwrap();
        session.reconfigure(config().with_protocol(ApiGeneration::Modern)).await;

        assert_eq!(session.variables()[projection::LAST_COMMAND], "io 65536 ON");
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_forgets_the_previous_device() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply("/api/core/info", Ok("{}"));
        transport.reply(LIST, Ok(ONE_RELAY));
        transport.reply_after(
            LIST,
            Duration::from_secs(5),
            Ok(r#"[{"_id":70000,"name":"Relay Cmd 1","on":true}]"#),
        );
        transport.reply("/api/core/io/70000", Ok("{}"));
        let mut session = DeviceSession::with_transport(
            config().with_reconfirm(false),
            Arc::clone(&transport),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.state(IoId::new(65536)), Some(PowerState::Off));
        let mut rx = session.subscribe();

        // The first poll of the new host is still in flight.
        session
            .reconfigure(SessionConfig::new("10.0.0.2", "key").with_classification(
                ClassificationStrategy::Name,
            ))
            .await;

        assert_eq!(session.state(IoId::new(65536)), None);
        assert_eq!(session.variables()["relay_1_state"], projection::LOADING);
        assert_eq!(session.relay_status(IoId::new(65536)), FeedbackState::Loading);
        let mut forgotten = false;
        while let Ok(event) = rx.try_recv() {
            forgotten |= event == IoEvent::StateChanged {
                id: IoId::new(65536),
                previous: Some(PowerState::Off),
                current: None,
            };
        }
        assert!(forgotten);

        session.toggle(IoId::new(70000)).await.unwrap();
        assert_eq!(transport.request_count("/api/core/io/70000"), 1);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(session.state(IoId::new(70000)), Some(PowerState::On));
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn bad_config_hides_previous_states() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(LIST, Ok(ONE_RELAY));
        let mut session = DeviceSession::with_transport(config(), Arc::clone(&transport)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.variables()["relay_1_state"], "OFF");

        session.reconfigure(SessionConfig::new("", "key")).await;

        assert!(matches!(session.status(), ConnectionStatus::BadConfig(_)));
        assert!(!session.store().is_loaded());
        assert_eq!(session.variables()["relay_1_state"], projection::LOADING);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_waits_for_the_scheduled_poll() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply("/api/core/info", Ok("{}"));
        transport.reply_after(LIST, Duration::from_millis(1_500), Ok(ONE_RELAY));
        let session = DeviceSession::with_transport(
            config().with_poll_interval(Duration::from_secs(10)),
            Arc::clone(&transport),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let started = tokio::time::Instant::now();
        session.refresh().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(2_990));
        assert_eq!(transport.request_count(LIST), 2);
    }
}
