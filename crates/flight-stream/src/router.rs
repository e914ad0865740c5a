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

//! Maps decoded server events onto state mutations.
//!
//! Routing is a synchronous reducer over [`LiveState`]: each event either
//! fully applies its mutation or leaves the state untouched. Session-level
//! events are not applied here; they are handed back to the caller as a
//! [`SessionSignal`] for the connection state machine.

use std::time::Instant;

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::live::LiveState;
use crate::protocol::{self, Inbound, ServerEvent};
use crate::tracker::{CrashSite, Upsert};

/// Session-level events for the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    Accepted,
    Denied { reason: Option<String> },
    Disconnected { message: Option<String> },
}

/// Outcome of routing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// The event was applied to the live state.
    Applied,
    /// A plane crashed and a marker was placed.
    Crashed(CrashSite),
    /// The event concerns the session, not the live state.
    Session(SessionSignal),
    /// The frame was malformed, unknown or inconsistent and was dropped.
    Dropped,
}

/// Frame counters, for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    pub routed: u64,
    pub unknown: u64,
    pub malformed: u64,
    pub inconsistent: u64,
}

/// Decodes inbound frames and dispatches them to the matching handler.
#[derive(Debug, Default)]
pub struct EventRouter {
    stats: RouterStats,
}

impl EventRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Decode and dispatch one raw text frame.
    pub fn route_frame(
        &mut self,
        state: &mut LiveState,
        frame: &str,
        now: Instant,
        received_at: DateTime<Local>,
    ) -> Routed {
        match protocol::decode(frame) {
            Ok(Inbound::Event(event)) => self.dispatch(state, event, now, received_at),
            Ok(Inbound::Unknown(kind)) => {
                self.stats.unknown += 1;
                warn!("Ignoring unrecognized event type '{kind}'");
                Routed::Dropped
            }
            Err(e) => {
                self.stats.malformed += 1;
                warn!("Dropping malformed frame: {e}");
                Routed::Dropped
            }
        }
    }

    /// Apply one decoded event.
    pub fn dispatch(
        &mut self,
        state: &mut LiveState,
        event: ServerEvent,
        now: Instant,
        received_at: DateTime<Local>,
    ) -> Routed {
        self.stats.routed += 1;
        debug!("Dispatching '{}' event", event.kind());

        match event {
            ServerEvent::Accepted => Routed::Session(SessionSignal::Accepted),
            ServerEvent::Denied { reason } => Routed::Session(SessionSignal::Denied { reason }),
            ServerEvent::Disconnected { message } => {
                Routed::Session(SessionSignal::Disconnected { message })
            }
            ServerEvent::Flights { flights } => {
                let count = state.flights.replace(flights);
                info!("Roster updated: {count} flights");
                Routed::Applied
            }
            ServerEvent::Plane { plane } => {
                let flight_id = plane.flight_id.clone();
                let position = plane.position;
                if state.planes.upsert_report(plane) == Upsert::Created {
                    debug!("Tracking new plane {flight_id}");
                }
                if state.trajectories.append(&flight_id, position) {
                    debug!("New path segment for {flight_id}");
                }
                Routed::Applied
            }
            ServerEvent::TakeOff { flight_id } => {
                info!("Takeoff: {flight_id}");
                self.transition(state.planes.mark_takeoff(&flight_id, now), "take-off", &flight_id)
            }
            ServerEvent::Landing { flight_id } => {
                info!("Landing: {flight_id}");
                self.transition(state.planes.mark_arrived(&flight_id, now), "landing", &flight_id)
            }
            ServerEvent::Crashed { flight_id } => {
                info!("Crash: {flight_id}");
                if let Some(site) = state.planes.mark_crashed(&flight_id, now) {
                    state.trajectories.discard(&flight_id);
                    Routed::Crashed(site)
                } else {
                    self.transition(false, "crashed", &flight_id)
                }
            }
            ServerEvent::Message { message } => {
                debug!("Chat from {}: {}", message.name, message.content);
                state.chat.append(message, received_at);
                Routed::Applied
            }
        }
    }

    fn transition(&mut self, applied: bool, kind: &str, flight_id: &str) -> Routed {
        if applied {
            Routed::Applied
        } else {
            self.stats.inconsistent += 1;
            warn!("Ignoring '{kind}' for {flight_id}: no live plane with that flight id");
            Routed::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::protocol::{ChatLevel, ChatMessage, PlaneReport, Position};
    use crate::registry::tests::flight;
    use crate::tracker::PlaneStatus;

    fn plane_event(flight_id: &str, lat: f64, long: f64) -> ServerEvent {
        ServerEvent::Plane {
            plane: PlaneReport {
                flight_id: flight_id.to_string(),
                position: Position::new(lat, long),
                heading: None,
                airline: None,
                captain: None,
                status: None,
                eta: None,
            },
        }
    }

    fn apply(router: &mut EventRouter, state: &mut LiveState, event: ServerEvent) -> Routed {
        router.dispatch(state, event, Instant::now(), Local::now())
    }

    #[test]
    fn test_plane_ticks_feed_tracker_and_trajectory() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();

        apply(&mut router, &mut state, plane_event("F1", 0.0, 179.5));
        apply(&mut router, &mut state, plane_event("F1", 0.0, -179.5));

        assert_eq!(state.planes().get("F1").unwrap().position, Position::new(0.0, -179.5));
        let path = state.trajectories().get("F1").unwrap();
        assert_eq!(path.segments().len(), 2);
        assert_eq!(path.active_segment().unwrap(), &[Position::new(0.0, -179.5)]);
    }

    #[test]
    fn test_roster_snapshots_replace_each_other() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();
        let first: HashMap<_, _> = [flight("A", "SCL", "LIM"), flight("B", "LIM", "BOG")]
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();
        let second: HashMap<_, _> = [flight("C", "EZE", "GRU")]
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();

        apply(&mut router, &mut state, ServerEvent::Flights { flights: first });
        apply(&mut router, &mut state, ServerEvent::Flights { flights: second });

        let ids: Vec<&str> = state.flights().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["C"]);
    }

    #[test]
    fn test_crash_produces_marker_and_drops_path() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();
        apply(&mut router, &mut state, plane_event("F1", 10.0, 20.0));

        let routed = apply(
            &mut router,
            &mut state,
            ServerEvent::Crashed {
                flight_id: "F1".to_string(),
            },
        );

        let Routed::Crashed(site) = routed else {
            panic!("expected crash outcome, got {routed:?}");
        };
        assert_eq!(site.position, Position::new(10.0, 20.0));
        assert_eq!(state.planes().crash_sites().len(), 1);
        assert!(state.planes().get("F1").is_none());
        assert!(state.trajectories().get("F1").is_none());
    }

    #[test]
    fn test_inconsistent_events_are_dropped_without_changes() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();

        for event in [
            ServerEvent::TakeOff {
                flight_id: "ghost".to_string(),
            },
            ServerEvent::Landing {
                flight_id: "ghost".to_string(),
            },
            ServerEvent::Crashed {
                flight_id: "ghost".to_string(),
            },
        ] {
            assert_eq!(apply(&mut router, &mut state, event), Routed::Dropped);
        }

        assert!(state.planes().is_empty());
        assert!(state.planes().crash_sites().is_empty());
        assert_eq!(router.stats().inconsistent, 3);
    }

    #[test]
    fn test_landing_expires_plane_and_path() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();
        let start = Instant::now();
        apply(&mut router, &mut state, plane_event("F1", 1.0, 1.0));

        router.dispatch(
            &mut state,
            ServerEvent::Landing {
                flight_id: "F1".to_string(),
            },
            start,
            Local::now(),
        );
        assert_eq!(state.planes().get("F1").unwrap().status, PlaneStatus::Arrived);

        state.expire(start + Duration::from_secs(10));
        assert!(state.planes().get("F1").is_none());
        assert!(state.trajectories().get("F1").is_none());
    }

    #[test]
    fn test_session_events_are_handed_back() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();

        assert_eq!(
            apply(&mut router, &mut state, ServerEvent::Accepted),
            Routed::Session(SessionSignal::Accepted)
        );
        assert_eq!(
            apply(
                &mut router,
                &mut state,
                ServerEvent::Denied {
                    reason: Some("duplicate".to_string())
                }
            ),
            Routed::Session(SessionSignal::Denied {
                reason: Some("duplicate".to_string())
            })
        );
    }

    #[test]
    fn test_chat_is_logged() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();
        apply(
            &mut router,
            &mut state,
            ServerEvent::Message {
                message: ChatMessage {
                    name: "ops".to_string(),
                    content: "hello".to_string(),
                    level: ChatLevel::Info,
                },
            },
        );
        assert_eq!(state.chat().len(), 1);
        assert_eq!(state.chat().entries()[0].sender_name, "ops");
    }

    #[test]
    fn test_unknown_and_malformed_frames_are_counted() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();
        let now = Instant::now();

        let unknown = router.route_frame(&mut state, r#"{"type":"weather"}"#, now, Local::now());
        let malformed = router.route_frame(&mut state, "{oops", now, Local::now());
        let routed = router.route_frame(
            &mut state,
            r#"{"type":"plane","plane":{"flight_id":"F1","position":{"lat":1.0,"long":2.0}}}"#,
            now,
            Local::now(),
        );

        assert_eq!(unknown, Routed::Dropped);
        assert_eq!(malformed, Routed::Dropped);
        assert_eq!(routed, Routed::Applied);
        assert_eq!(
            router.stats(),
            RouterStats {
                routed: 1,
                unknown: 1,
                malformed: 1,
                inconsistent: 0,
            }
        );
    }

    #[test]
    fn test_heading_prefers_roster_destination() {
        let mut router = EventRouter::new();
        let mut state = LiveState::default();
        apply(&mut router, &mut state, plane_event("F1", 40.0, -84.0));
        assert_eq!(state.heading("F1"), Some(0.0));

        // Destination of the test flight is (40, -74): due east.
        let roster: HashMap<_, _> = [flight("F1", "SCL", "JFK")]
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();
        apply(&mut router, &mut state, ServerEvent::Flights { flights: roster });
        assert!(state.heading("F1").unwrap().abs() < 1e-9);
        assert_eq!(state.heading("missing"), None);
    }
}
