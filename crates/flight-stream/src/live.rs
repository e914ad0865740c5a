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

//! Derived picture of the feed: roster, live planes, paths and chat.

use std::time::Instant;

use crate::chat::ChatLog;
use crate::registry::FlightRegistry;
use crate::tracker::{heading_angle, Expired, PlaneStatus, PlaneTracker, TrackerConfig};
use crate::trajectory::TrajectoryBuilder;

/// All state derived from the event stream.
///
/// Only the event router and the expiry timer mutate it; presentation code
/// reads it through the client's shared handle.
#[derive(Debug, Default)]
pub struct LiveState {
    pub(crate) flights: FlightRegistry,
    pub(crate) planes: PlaneTracker,
    pub(crate) trajectories: TrajectoryBuilder,
    pub(crate) chat: ChatLog,
}

impl LiveState {
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            flights: FlightRegistry::new(),
            planes: PlaneTracker::new(config),
            trajectories: TrajectoryBuilder::new(),
            chat: ChatLog::new(),
        }
    }

    #[must_use]
    pub fn flights(&self) -> &FlightRegistry {
        &self.flights
    }

    #[must_use]
    pub fn planes(&self) -> &PlaneTracker {
        &self.planes
    }

    #[must_use]
    pub fn trajectories(&self) -> &TrajectoryBuilder {
        &self.trajectories
    }

    #[must_use]
    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// Icon rotation for a live plane in degrees.
    ///
    /// Points at the destination airport from the roster, falling back to the
    /// heading point reported with the plane, and to 0 when neither is known.
    #[must_use]
    pub fn heading(&self, flight_id: &str) -> Option<f64> {
        let plane = self.planes.get(flight_id)?;
        let target = self
            .flights
            .destination_of(flight_id)
            .or(plane.meta.heading);
        Some(target.map_or(0.0, |to| heading_angle(plane.position, to)))
    }

    /// Fire due expiries and drop the paths of planes that left the live set.
    pub fn expire(&mut self, now: Instant) -> Vec<Expired> {
        let expired = self.planes.expire(now);
        for item in &expired {
            if let Expired::Plane(plane) = item {
                self.trajectories.discard(&plane.flight_id);
            }
        }
        expired
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.planes.next_deadline()
    }

    /// Number of planes currently shown as flying.
    #[must_use]
    pub fn flying_count(&self) -> usize {
        self.planes
            .planes()
            .filter(|plane| plane.status == PlaneStatus::Flying)
            .count()
    }
}
