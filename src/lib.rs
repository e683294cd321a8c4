// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ipx800_lib` - A Rust library to control and mirror GCE IPX800 relays.
//!
//! This library keeps a live, typed view of an IPX800's relays and digital
//! inputs and exposes set/toggle commands for a host control surface.
//!
//! # Supported Features
//!
//! - **Polling**: the full I/O table is read on a fixed period and folded
//!   into a shared [`StateStore`](state::StateStore) as one snapshot
//! - **Commands**: set and toggle with optimistic update and read-back,
//!   serialized per relay
//! - **Health**: connection status with a cool-down after failed commands
//! - **Projection**: `relay_N_state` / `input_N_state` variables and
//!   tri-state feedbacks
//!
//! # Supported Firmware APIs
//!
//! - Legacy `xdevices.json` query-string API (relays 1-32)
//! - Modern REST API under `/api/core/io`
//!
//! # Quick Start
//!
//! ```no_run
//! use ipx800_lib::directory::ClassificationStrategy;
//! use ipx800_lib::session::{DeviceSession, SessionConfig};
//! use ipx800_lib::types::IoId;
//!
//! #[tokio::main]
//! async fn main() -> ipx800_lib::Result<()> {
//!     let config = SessionConfig::new("192.168.1.50", "my-api-key")
//!         .with_classification(ClassificationStrategy::Name);
//!     let mut session = DeviceSession::connect(config).await;
//!
//!     session.set_state(IoId::new(65536), true).await?;
//!     println!("relay 1: {}", session.variables()["relay_1_state"]);
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Reacting to Changes
//!
//! ```no_run
//! use ipx800_lib::event::IoEvent;
//! use ipx800_lib::session::DeviceSession;
//!
//! # async fn example(session: DeviceSession<ipx800_lib::protocol::HttpClient>) {
//! let mut events = session.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         IoEvent::StateChanged { id, current, .. } => println!("{id} -> {current:?}"),
//!         IoEvent::ConnectionChanged { status } => println!("{status}"),
//!     }
//! }
//! # }
//! ```

pub mod command;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod poller;
pub mod projection;
pub mod protocol;
pub mod session;
pub mod state;
pub mod types;

pub use command::{CommandRequest, Operation};
pub use directory::{ClassificationStrategy, IoDirectory};
pub use dispatcher::CommandDispatcher;
pub use error::{ConfigError, Error, ParseError, ProtocolError, Result, ValueError};
pub use event::{EventBus, IoEvent};
pub use poller::{PollerHandle, StatePoller};
pub use projection::FeedbackState;
#[cfg(feature = "http")]
pub use protocol::{HttpClient, HttpConfig};
pub use protocol::{ApiGeneration, DeviceApi, Transport};
pub use session::{ConnectionStatus, DeviceSession, SessionConfig};
pub use state::{PollSnapshot, StateChange, StateStore};
pub use types::{IoId, IoKind, IoPoint, PowerState, RelayNumber};
