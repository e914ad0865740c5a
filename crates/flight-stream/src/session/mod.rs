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

//! Session lifecycle for the tracking feed.
//!
//! [`Session`] is the connection state machine:
//!
//! ```text
//! Idle -> Connecting -> Joined | Denied
//! Joined -> Closed -> Connecting      (unexpected close, after the reconnect delay)
//! Denied                              (terminal, never reconnects)
//! any -> Idle                         (explicit teardown)
//! ```
//!
//! It performs no I/O; the connection driver feeds it socket and protocol
//! events and acts on the decisions it returns.

mod guard;

pub use guard::SessionGuard;

use std::time::Duration;

use thiserror::Error;

use crate::protocol::ClientRequest;

/// Close reason that marks the session as refused by the server.
pub const DENIED_CLOSE_REASON: &str = "denied";

/// Errors raised by the session state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session was denied by the server and cannot reconnect")]
    Denied,
}

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected and not trying to.
    #[default]
    Idle,
    /// A join attempt is in progress. The connection driver publishes this
    /// state only once the socket is open and the join request is sent.
    Connecting,
    /// The server accepted the join request.
    Joined,
    /// The server refused the session. Terminal.
    Denied,
    /// The socket closed unexpectedly; a reconnect may follow.
    Closed,
}

impl ConnectionState {
    /// Whether the socket is open and can carry outbound requests.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Connecting | Self::Joined)
    }
}

/// Reconnect timing after an unexpected close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Constant delay before each reconnect attempt.
    pub delay: Duration,
    /// Give up after this many consecutive failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based), or `None`
    /// once the attempt budget is spent.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt > max => None,
            _ => Some(self.delay),
        }
    }
}

/// What to do after the socket closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Reconnect(Duration),
    Stop,
}

/// One user's session with the tracking server.
#[derive(Debug, Clone)]
pub struct Session {
    user_id: String,
    display_name: String,
    state: ConnectionState,
    failed_attempts: u32,
}

impl Session {
    #[must_use]
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            state: ConnectionState::Idle,
            failed_attempts: 0,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Start a connection attempt and return the join request to send once
    /// the socket is open.
    pub fn begin_connect(&mut self) -> Result<ClientRequest, SessionError> {
        if self.state == ConnectionState::Denied {
            return Err(SessionError::Denied);
        }
        self.state = ConnectionState::Connecting;
        Ok(ClientRequest::Join {
            id: self.user_id.clone(),
            username: self.display_name.clone(),
        })
    }

    /// The server accepted the join. Returns `false` if no join was pending.
    pub fn on_accepted(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Joined;
        self.failed_attempts = 0;
        true
    }

    /// The server refused the session.
    pub fn on_denied(&mut self) {
        self.state = ConnectionState::Denied;
    }

    /// The socket closed, with an optional close reason.
    ///
    /// A close reason of [`DENIED_CLOSE_REASON`] is terminal just like an
    /// explicit `denied` event. Any other close schedules a reconnect.
    pub fn on_close(&mut self, reason: Option<&str>, policy: &ReconnectPolicy) -> CloseDecision {
        if self.state == ConnectionState::Denied || reason == Some(DENIED_CLOSE_REASON) {
            self.state = ConnectionState::Denied;
            return CloseDecision::Stop;
        }
        if self.state == ConnectionState::Idle {
            return CloseDecision::Stop;
        }

        self.state = ConnectionState::Closed;
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        policy
            .delay_for(self.failed_attempts)
            .map_or(CloseDecision::Stop, CloseDecision::Reconnect)
    }

    /// Explicit teardown. Returns the disconnect notice to send if the socket
    /// is still open.
    pub fn teardown(&mut self) -> Option<ClientRequest> {
        let was_open = self.state.is_open();
        self.state = ConnectionState::Idle;
        was_open.then(|| ClientRequest::Disconnect {
            id: self.user_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined_session() -> Session {
        let mut session = Session::new("19625758", "pilot");
        session.begin_connect().unwrap();
        assert!(session.on_accepted());
        session
    }

    #[test]
    fn test_connect_sends_join_and_enters_connecting() {
        let mut session = Session::new("19625758", "pilot");
        assert_eq!(session.state(), ConnectionState::Idle);

        let join = session.begin_connect().unwrap();

        assert_eq!(
            join,
            ClientRequest::Join {
                id: "19625758".to_string(),
                username: "pilot".to_string(),
            }
        );
        assert_eq!(session.state(), ConnectionState::Connecting);
        assert!(session.state().is_open());
    }

    #[test]
    fn test_accepted_transitions_to_joined() {
        let session = joined_session();
        assert_eq!(session.state(), ConnectionState::Joined);
    }

    #[test]
    fn test_accepted_without_pending_join_is_ignored() {
        let mut session = Session::new("u", "n");
        assert!(!session.on_accepted());
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_denied_never_reconnects() {
        let mut session = Session::new("u", "n");
        session.begin_connect().unwrap();
        session.on_denied();

        let decision = session.on_close(Some("going away"), &ReconnectPolicy::default());

        assert_eq!(decision, CloseDecision::Stop);
        assert_eq!(session.state(), ConnectionState::Denied);
        assert_eq!(session.begin_connect(), Err(SessionError::Denied));
    }

    #[test]
    fn test_denied_close_reason_is_terminal() {
        let mut session = joined_session();
        let decision = session.on_close(Some(DENIED_CLOSE_REASON), &ReconnectPolicy::default());
        assert_eq!(decision, CloseDecision::Stop);
        assert_eq!(session.state(), ConnectionState::Denied);
    }

    #[test]
    fn test_unexpected_close_schedules_reconnect_after_fixed_delay() {
        let mut session = joined_session();

        let decision = session.on_close(Some("network-error"), &ReconnectPolicy::default());

        assert_eq!(decision, CloseDecision::Reconnect(Duration::from_secs(5)));
        assert_eq!(session.state(), ConnectionState::Closed);
        assert!(session.begin_connect().is_ok());
        assert_eq!(session.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_attempt_budget_resets_after_accept() {
        let policy = ReconnectPolicy {
            delay: Duration::from_millis(100),
            max_attempts: Some(2),
        };
        let mut session = Session::new("u", "n");

        session.begin_connect().unwrap();
        assert!(matches!(session.on_close(None, &policy), CloseDecision::Reconnect(_)));
        session.begin_connect().unwrap();
        assert!(matches!(session.on_close(None, &policy), CloseDecision::Reconnect(_)));
        session.begin_connect().unwrap();
        assert_eq!(session.on_close(None, &policy), CloseDecision::Stop);

        let mut session = Session::new("u", "n");
        session.begin_connect().unwrap();
        session.on_close(None, &policy);
        session.begin_connect().unwrap();
        session.on_accepted();
        session.on_close(None, &policy);
        session.begin_connect().unwrap();
        assert!(matches!(session.on_close(None, &policy), CloseDecision::Reconnect(_)));
    }

    #[test]
    fn test_teardown_sends_disconnect_only_when_open() {
        let mut session = joined_session();
        assert_eq!(
            session.teardown(),
            Some(ClientRequest::Disconnect {
                id: "19625758".to_string()
            })
        );
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(session.teardown(), None);
        assert_eq!(session.on_close(None, &ReconnectPolicy::default()), CloseDecision::Stop);
    }
}
