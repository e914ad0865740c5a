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

//! Async WebSocket driver.
//!
//! Owns the socket and the [`Session`] state machine and is the only writer
//! of the shared [`LiveState`]. A single task selects over inbound frames,
//! the next transient-state deadline, outbound chat requests and the
//! shutdown token, so every mutation happens in arrival order on one loop.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Local;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::live::LiveState;
use crate::protocol::{self, ClientRequest};
use crate::router::{EventRouter, Routed, RouterStats, SessionSignal};
use crate::session::{CloseDecision, ConnectionState, ReconnectPolicy, Session, SessionGuard};
use crate::tracker::{CrashSite, Expired};

/// Feed endpoint used when none is configured.
pub const DEFAULT_SERVER_URL: &str = "wss://tarea-2.2024-2.tallerdeintegracion.cl/connect";

/// Time allowed for the TCP connect and WebSocket upgrade.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on how long the loop sleeps when no expiry is pending.
const IDLE_WAKEUP: Duration = Duration::from_secs(60);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Configuration for the WebSocket connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server URL (`ws://` or `wss://`).
    pub url: String,
    /// Delay and retry budget after an unexpected close.
    pub reconnect: ReconnectPolicy,
    /// A connect attempt that has not completed the upgrade by then counts
    /// as a failed connection.
    pub connect_timeout: Duration,
    /// Capacity of the outbound chat queue.
    pub chat_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            chat_buffer: 64,
        }
    }
}

/// User-visible notices raised by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The server refused the session. No reconnect will be attempted.
    Denied { reason: Option<String> },
    /// The server dropped the session.
    Disconnected { message: Option<String> },
    /// A plane crashed.
    Crash(CrashSite),
}

/// State shared between the driver and the client handle.
#[derive(Debug, Clone)]
pub(crate) struct Shared {
    pub(crate) state: Arc<RwLock<LiveState>>,
    pub(crate) connection_state: Arc<RwLock<ConnectionState>>,
    pub(crate) stats: Arc<RwLock<RouterStats>>,
    pub(crate) notices: broadcast::Sender<Notice>,
}

enum Ended {
    /// The socket closed, with the close reason if one was given.
    Closed(Option<String>),
    /// The server denied the session.
    Denied,
    /// Explicit teardown.
    TornDown,
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub(crate) struct Driver {
    url: String,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    session: Session,
    router: EventRouter,
    shared: Shared,
    chat_rx: mpsc::Receiver<String>,
    cancel_token: CancellationToken,
    // Held for the lifetime of the session; dropping it releases the lock.
    _guard: Option<SessionGuard>,
}

impl Driver {
    pub(crate) fn new(
        config: ConnectionConfig,
        session: Session,
        shared: Shared,
        chat_rx: mpsc::Receiver<String>,
        cancel_token: CancellationToken,
        guard: Option<SessionGuard>,
    ) -> Self {
        Self {
            url: config.url,
            policy: config.reconnect,
            connect_timeout: config.connect_timeout,
            session,
            router: EventRouter::new(),
            shared,
            chat_rx,
            cancel_token,
            _guard: guard,
        }
    }

    /// Run the session until it is torn down, denied, or out of reconnect
    /// attempts.
    pub(crate) async fn run(mut self) {
        loop {
            if self.cancel_token.is_cancelled() {
                info!("Connection cancelled");
                self.session.teardown();
                break;
            }

            let join = match self.session.begin_connect() {
                Ok(join) => join,
                Err(e) => {
                    warn!("Not connecting: {e}");
                    break;
                }
            };
            info!("Connecting to {}...", self.url);

            let ended = match self.connect_and_process(join).await {
                Ok(ended) => ended,
                Err(e) => {
                    error!("Connection error: {e}");
                    Ended::Closed(None)
                }
            };

            let reason = match ended {
                Ended::Closed(reason) => reason,
                Ended::Denied | Ended::TornDown => break,
            };

            let decision = self.session.on_close(reason.as_deref(), &self.policy);
            self.publish_state();

            match decision {
                CloseDecision::Reconnect(delay) => {
                    warn!("Reconnecting in {delay:?}...");
                    if !self.wait_for_reconnect(delay).await {
                        break;
                    }
                }
                CloseDecision::Stop if self.session.state() == ConnectionState::Denied => {
                    error!("Session denied by server close; not reconnecting");
                    self.notify(Notice::Denied { reason });
                    break;
                }
                CloseDecision::Stop => {
                    warn!("Reconnect attempts exhausted; giving up");
                    break;
                }
            }
        }

        self.publish_state();
        info!("Session ended in state {:?}", self.session.state());
    }

    async fn connect_and_process(&mut self, join: ClientRequest) -> Result<Ended, ClientError> {
        let connect = timeout(self.connect_timeout, connect_async(self.url.clone()));
        tokio::pin!(connect);

        let ws = 'connect: loop {
            let expiry_at = self.next_expiry();

            tokio::select! {
                result = &mut connect => match result {
                    Ok(result) => break 'connect result?.0,
                    Err(_) => {
                        warn!("Timed out after {:?} connecting to {}", self.connect_timeout, self.url);
                        return Ok(Ended::Closed(None));
                    }
                },

                () = sleep_until(expiry_at) => self.expire(),

                Some(_) = self.chat_rx.recv() => {
                    warn!("Connection is not open; chat message dropped");
                }

                () = self.cancel_token.cancelled() => {
                    info!("Connection cancelled while connecting");
                    self.session.teardown();
                    return Ok(Ended::TornDown);
                }
            }
        };
        let (mut sink, mut stream) = ws.split();

        sink.send(Message::text(protocol::encode(&join)?)).await?;
        self.publish_state();
        info!(
            "Connected to {}, join sent as '{}'",
            self.url,
            self.session.display_name()
        );

        loop {
            let expiry_at = self.next_expiry();

            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if self.handle_frame(text.as_str()) == Flow::Stop {
                            if let Err(e) = sink.close().await {
                                debug!("Error closing socket after denial: {e}");
                            }
                            return Ok(Ended::Denied);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.as_str().to_owned());
                        info!(
                            "Connection closed by server ({})",
                            reason.as_deref().unwrap_or("no reason")
                        );
                        return Ok(Ended::Closed(reason));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("Connection closed by server");
                        return Ok(Ended::Closed(None));
                    }
                },

                () = sleep_until(expiry_at) => self.expire(),

                Some(content) = self.chat_rx.recv() => {
                    let frame = protocol::encode(&ClientRequest::Chat { content })?;
                    sink.send(Message::text(frame)).await?;
                }

                () = self.cancel_token.cancelled() => {
                    self.teardown(&mut sink).await;
                    return Ok(Ended::TornDown);
                }
            }
        }
    }

    /// Sit out the reconnect delay while still firing expiries. Returns
    /// `false` if the session was torn down meanwhile.
    async fn wait_for_reconnect(&mut self, delay: Duration) -> bool {
        let resume_at = Instant::now() + delay;

        loop {
            let expiry_at = self.next_expiry();

            tokio::select! {
                () = sleep_until(resume_at) => return true,

                () = sleep_until(expiry_at) => self.expire(),

                Some(_) = self.chat_rx.recv() => {
                    warn!("Connection is not open; chat message dropped");
                }

                () = self.cancel_token.cancelled() => {
                    info!("Connection cancelled during reconnect delay");
                    self.session.teardown();
                    return false;
                }
            }
        }
    }

    async fn teardown(&mut self, sink: &mut WsSink) {
        if let Some(request) = self.session.teardown() {
            match protocol::encode(&request) {
                Ok(frame) => {
                    if let Err(e) = sink.send(Message::text(frame)).await {
                        warn!("Failed to send disconnect notice: {e}");
                    }
                }
                Err(e) => warn!("Failed to encode disconnect notice: {e}"),
            }
        }
        if let Err(e) = sink.close().await {
            debug!("Error closing socket: {e}");
        }
        info!("WebSocket connection closed");
        self.publish_state();
    }

    fn handle_frame(&mut self, frame: &str) -> Flow {
        let routed = {
            let Ok(mut state) = self.shared.state.write() else {
                error!("Live state lock poisoned; dropping frame");
                return Flow::Continue;
            };
            self.router
                .route_frame(&mut state, frame, std::time::Instant::now(), Local::now())
        };

        if let Ok(mut stats) = self.shared.stats.write() {
            *stats = self.router.stats();
        }

        match routed {
            Routed::Session(SessionSignal::Accepted) => {
                if self.session.on_accepted() {
                    info!("Joined as '{}'", self.session.display_name());
                    self.publish_state();
                }
            }
            Routed::Session(SessionSignal::Denied { reason }) => {
                self.session.on_denied();
                error!(
                    "Session denied by server: {}",
                    reason.as_deref().unwrap_or("no reason given")
                );
                self.publish_state();
                self.notify(Notice::Denied { reason });
                return Flow::Stop;
            }
            Routed::Session(SessionSignal::Disconnected { message }) => {
                warn!(
                    "Disconnected by server: {}",
                    message.as_deref().unwrap_or("no message")
                );
                self.notify(Notice::Disconnected { message });
            }
            Routed::Crashed(site) => self.notify(Notice::Crash(site)),
            Routed::Applied | Routed::Dropped => {}
        }

        Flow::Continue
    }

    fn expire(&mut self) {
        let Ok(mut state) = self.shared.state.write() else {
            return;
        };
        for item in state.expire(std::time::Instant::now()) {
            match item {
                Expired::Plane(plane) => {
                    info!("Removed {} after {} window", plane.flight_id, plane.status);
                }
                Expired::CrashSite(site) => info!("Crash marker for {} expired", site.flight_id),
            }
        }
    }

    fn next_expiry(&self) -> Instant {
        self.shared
            .state
            .read()
            .ok()
            .and_then(|state| state.next_deadline())
            .map_or_else(|| Instant::now() + IDLE_WAKEUP, Instant::from_std)
    }

    fn publish_state(&self) {
        if let Ok(mut state) = self.shared.connection_state.write() {
            *state = self.session.state();
        }
    }

    fn notify(&self, notice: Notice) {
        let _ = self.shared.notices.send(notice);
    }
}
