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

//! Per-plane flight paths.
//!
//! A path is stored as a list of segments. Whenever two consecutive ticks are
//! more than 180 degrees of longitude apart the plane has wrapped across the
//! antimeridian, and the new point opens a fresh segment instead of being
//! joined to the previous one. Renderers draw each segment as its own
//! polyline, so a plane crossing the map edge never produces a line spanning
//! the whole map.

use std::collections::HashMap;

use crate::protocol::Position;

/// Longitude jump beyond which two consecutive points are considered wrapped.
pub const WRAPAROUND_THRESHOLD_DEGREES: f64 = 180.0;

/// Whether moving from `prev` to `next` crosses the map edge.
#[must_use]
pub fn crosses_antimeridian(prev: Position, next: Position) -> bool {
    (prev.long - next.long).abs() > WRAPAROUND_THRESHOLD_DEGREES
}

/// Recorded path of one plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    segments: Vec<Vec<Position>>,
}

impl Trajectory {
    /// All segments, oldest first. The last one is the active segment.
    #[must_use]
    pub fn segments(&self) -> &[Vec<Position>] {
        &self.segments
    }

    #[must_use]
    pub fn active_segment(&self) -> Option<&[Position]> {
        self.segments.last().map(Vec::as_slice)
    }

    #[must_use]
    pub fn last_point(&self) -> Option<Position> {
        self.segments.last().and_then(|segment| segment.last().copied())
    }

    #[must_use]
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Append a point, returning `true` if it started a new segment.
    fn push(&mut self, point: Position) -> bool {
        match self.segments.last_mut() {
            Some(active) if active.last().is_some_and(|&last| !crosses_antimeridian(last, point)) => {
                active.push(point);
                false
            }
            _ => {
                self.segments.push(vec![point]);
                true
            }
        }
    }
}

/// Builds and owns the trajectories of all live planes.
#[derive(Debug, Default)]
pub struct TrajectoryBuilder {
    paths: HashMap<String, Trajectory>,
}

impl TrajectoryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new position for a flight.
    ///
    /// Returns `true` when the point opened a new segment, either because it
    /// is the first point for the flight or because of antimeridian wrap.
    pub fn append(&mut self, flight_id: &str, position: Position) -> bool {
        self.paths
            .entry(flight_id.to_string())
            .or_default()
            .push(position)
    }

    #[must_use]
    pub fn get(&self, flight_id: &str) -> Option<&Trajectory> {
        self.paths.get(flight_id)
    }

    /// Drop the path of a flight that left the live set.
    pub fn discard(&mut self, flight_id: &str) -> Option<Trajectory> {
        self.paths.remove(flight_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Trajectory)> {
        self.paths.iter().map(|(id, path)| (id.as_str(), path))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
