// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Client core for live flight tracking feeds.
//!
//! A single WebSocket connection streams typed events (flight roster, plane
//! position ticks, takeoff/landing/crash notices, chat). This library turns
//! that stream into a continuously updated picture of which flights exist,
//! where every plane is, and what is happening to it right now.
//!
//! - **Protocol layer**: JSON frame codec ([`protocol`])
//! - **State layer**: roster, live planes with transient-state expiry,
//!   antimeridian-aware trajectories and chat ([`LiveState`])
//! - **Session layer**: join handshake, denial handling, reconnect policy and
//!   a local single-session lock ([`session`])
//! - **Connection layer**: async WebSocket driver wiring it all together
//!
//! # Quick Start
//!
//! ```no_run
//! use flight_stream::{Client, ClientConfig, Notice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), flight_stream::ClientError> {
//!     let mut client = Client::spawn(ClientConfig::new("19625758", "pilot"))?;
//!     let mut notices = client.subscribe();
//!
//!     while let Ok(notice) = notices.recv().await {
//!         if let Notice::Crash(site) = notice {
//!             println!("{} crashed at {:?}", site.flight_id, site.position);
//!         }
//!         println!("{} planes in the air", client.planes().len());
//!     }
//!
//!     client.disconnect();
//!     client.closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Using the State Layer Only
//!
//! The reducer runs without a socket, which is how it is tested:
//!
//! ```
//! use std::time::Instant;
//! use chrono::Local;
//! use flight_stream::{EventRouter, LiveState};
//!
//! let mut state = LiveState::default();
//! let mut router = EventRouter::new();
//! let frame = r#"{"type":"plane","plane":{"flight_id":"LA100","position":{"lat":-33.4,"long":-70.6}}}"#;
//! router.route_frame(&mut state, frame, Instant::now(), Local::now());
//!
//! assert_eq!(state.planes().len(), 1);
//! ```

pub mod chat;
pub mod connection;
pub mod error;
pub mod live;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod session;
pub mod tracker;
pub mod trajectory;

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use log::warn;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use chat::{ChatEntry, ChatLog};
pub use connection::{ConnectionConfig, Notice, DEFAULT_SERVER_URL};
pub use error::ClientError;
pub use live::LiveState;
pub use protocol::{ClientRequest, Flight, Position, ServerEvent};
pub use registry::FlightRegistry;
pub use router::{EventRouter, Routed, RouterStats};
pub use session::{ConnectionState, ReconnectPolicy, Session, SessionGuard};
pub use tracker::{CrashSite, Plane, PlaneStatus, PlaneTracker, TrackerConfig};
pub use trajectory::{Trajectory, TrajectoryBuilder};

use connection::{Driver, Shared};

/// Configuration for the full-stack client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection configuration.
    pub connection: ConnectionConfig,
    /// Transient display windows.
    pub tracker: TrackerConfig,
    /// User id sent in the join request.
    pub user_id: String,
    /// Display name sent in the join request.
    pub username: String,
    /// Directory for the single-session lock. `None` disables the lock.
    pub lock_dir: Option<PathBuf>,
    /// Replace an existing lock instead of declining to connect.
    pub force_lock: bool,
    /// Broadcast channel capacity for notices.
    pub notice_capacity: usize,
}

impl ClientConfig {
    #[must_use]
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            connection: ConnectionConfig::default(),
            tracker: TrackerConfig::default(),
            user_id: user_id.into(),
            username: username.into(),
            lock_dir: None,
            force_lock: false,
            notice_capacity: 64,
        }
    }
}

/// Handle to a running session.
///
/// The session runs in a background task. Presentation code reads snapshots
/// of the derived state through this handle and may only send chat messages
/// or end the session.
pub struct Client {
    shared: Shared,
    chat_tx: mpsc::Sender<String>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connection_state", &self.connection_state())
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Spawn a session task with the given configuration.
    ///
    /// Fails with [`ClientError::SessionActive`] when the single-session lock
    /// is enabled and another local instance already holds it.
    pub fn spawn(config: ClientConfig) -> Result<Self, ClientError> {
        let guard = match &config.lock_dir {
            Some(dir) if config.force_lock => Some(SessionGuard::force_acquire(dir, &config.user_id)?),
            Some(dir) => Some(SessionGuard::acquire(dir, &config.user_id)?.ok_or_else(|| {
                ClientError::SessionActive {
                    user_id: config.user_id.clone(),
                    path: SessionGuard::lock_path(dir, &config.user_id),
                }
            })?),
            None => None,
        };

        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        let shared = Shared {
            state: Arc::new(RwLock::new(LiveState::new(config.tracker))),
            connection_state: Arc::new(RwLock::new(ConnectionState::Idle)),
            stats: Arc::new(RwLock::new(RouterStats::default())),
            notices,
        };
        let (chat_tx, chat_rx) = mpsc::channel(config.connection.chat_buffer.max(1));
        let cancel_token = CancellationToken::new();

        let driver = Driver::new(
            config.connection,
            Session::new(config.user_id, config.username),
            shared.clone(),
            chat_rx,
            cancel_token.clone(),
            guard,
        );
        let task = tokio::spawn(driver.run());

        Ok(Self {
            shared,
            chat_tx,
            cancel_token,
            task: Some(task),
        })
    }

    /// Queue a chat message.
    ///
    /// Fire-and-forget: returns `true` once the message is queued for the
    /// open socket, after which the caller may clear its input. Blank
    /// messages and messages sent while the socket is closed are dropped.
    pub fn send_chat(&self, content: &str) -> bool {
        let content = content.trim();
        if content.is_empty() {
            return false;
        }
        if !self.connection_state().is_open() {
            warn!("Connection is not open; chat message not sent");
            return false;
        }
        match self.chat_tx.try_send(content.to_string()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Chat message not sent: {e}");
                false
            }
        }
    }

    /// End the session: notify the server if connected, close the socket and
    /// release the session lock.
    pub fn disconnect(&self) {
        self.cancel_token.cancel();
    }

    /// Wait for the session task to finish.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Session task failed: {e}");
            }
        }
    }

    /// Subscribe to user-visible notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.shared.notices.subscribe()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared
            .connection_state
            .read()
            .map(|state| *state)
            .unwrap_or(ConnectionState::Idle)
    }

    /// Frame counters of the event router.
    #[must_use]
    pub fn router_stats(&self) -> RouterStats {
        self.shared
            .stats
            .read()
            .map(|stats| *stats)
            .unwrap_or_default()
    }

    /// Run `f` against a read-only view of the live state.
    pub fn with_state<R>(&self, f: impl FnOnce(&LiveState) -> R) -> Option<R> {
        self.shared.state.read().ok().map(|state| f(&state))
    }

    /// Roster ordered by departure, then destination airport name.
    #[must_use]
    pub fn flights(&self) -> Vec<Flight> {
        self.with_state(|state| state.flights().sorted().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All live planes.
    #[must_use]
    pub fn planes(&self) -> Vec<Plane> {
        self.with_state(|state| state.planes().planes().cloned().collect())
            .unwrap_or_default()
    }

    /// A live plane by flight id.
    #[must_use]
    pub fn plane(&self, flight_id: &str) -> Option<Plane> {
        self.with_state(|state| state.planes().get(flight_id).cloned())
            .flatten()
    }

    /// Icon rotation for a live plane in degrees.
    #[must_use]
    pub fn heading(&self, flight_id: &str) -> Option<f64> {
        self.with_state(|state| state.heading(flight_id)).flatten()
    }

    /// Path of a live plane.
    #[must_use]
    pub fn trajectory(&self, flight_id: &str) -> Option<Trajectory> {
        self.with_state(|state| state.trajectories().get(flight_id).cloned())
            .flatten()
    }

    /// Crash markers still on display.
    #[must_use]
    pub fn crash_sites(&self) -> Vec<CrashSite> {
        self.with_state(|state| state.planes().crash_sites().to_vec())
            .unwrap_or_default()
    }

    /// Chat entries from `index` onwards.
    #[must_use]
    pub fn chat_since(&self, index: usize) -> Vec<ChatEntry> {
        self.with_state(|state| state.chat().since(index).to_vec())
            .unwrap_or_default()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
