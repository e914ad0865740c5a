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

//! Live plane tracking and transient state expiry.
//!
//! This module keeps one record per airborne flight, upserted from position
//! ticks. Takeoff and arrival are shown for a fixed window and then the plane
//! is removed; a crash removes the plane at once and leaves a crash marker
//! behind for a longer window.
//!
//! Every transient transition stamps the plane with a fresh generation and
//! schedules a removal for that generation. A later transition bumps the
//! generation again, so the earlier removal finds a mismatch when it fires and
//! does nothing.

mod expiry;

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::debug;

use crate::protocol::{PlaneReport, Position};
use expiry::{ExpiryQueue, ExpiryTarget};

/// Heading in degrees from `from` towards `to`, measured counter-clockwise
/// from east in the flat lat/long plane.
#[must_use]
pub fn heading_angle(from: Position, to: Position) -> f64 {
    let delta_lat = to.lat - from.lat;
    let delta_long = to.long - from.long;
    delta_lat.atan2(delta_long).to_degrees()
}

/// Display status of a tracked plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneStatus {
    Flying,
    Takeoff,
    Arrived,
    Crashed,
}

impl PlaneStatus {
    /// Transient statuses are shown for a bounded window and are never
    /// overwritten by a plain position tick.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        !matches!(self, Self::Flying)
    }
}

impl fmt::Display for PlaneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Flying => "flying",
            Self::Takeoff => "takeoff",
            Self::Arrived => "arrived",
            Self::Crashed => "crashed",
        };
        f.pad(label)
    }
}

/// Display metadata carried by position ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaneMeta {
    pub heading: Option<Position>,
    pub airline: Option<String>,
    pub captain: Option<String>,
    /// Status label as reported by the server.
    pub reported_status: Option<String>,
    pub eta: Option<f64>,
}

impl From<PlaneReport> for PlaneMeta {
    fn from(report: PlaneReport) -> Self {
        Self {
            heading: report.heading,
            airline: report.airline.map(|airline| airline.name),
            captain: report.captain,
            reported_status: report.status,
            eta: report.eta,
        }
    }
}

/// A plane in the live set.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub flight_id: String,
    pub position: Position,
    pub meta: PlaneMeta,
    pub status: PlaneStatus,
    pub last_update: DateTime<Utc>,
    generation: u64,
}

/// Last known position of a crashed plane, shown until its window elapses.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashSite {
    pub id: u64,
    pub flight_id: String,
    pub position: Position,
    pub crashed_at: DateTime<Utc>,
}

/// Whether a position tick created or refreshed a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// Something removed by [`PlaneTracker::expire`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expired {
    Plane(Plane),
    CrashSite(CrashSite),
}

/// Configuration for transient display windows.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How long takeoff and arrival states stay visible.
    pub transient_window: Duration,
    /// How long a crash marker stays visible.
    pub crash_marker_window: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            transient_window: Duration::from_secs(10),
            crash_marker_window: Duration::from_secs(60),
        }
    }
}

/// Tracks live planes and crash markers.
pub struct PlaneTracker {
    planes: HashMap<String, Plane>,
    crash_sites: Vec<CrashSite>,
    expiries: ExpiryQueue,
    config: TrackerConfig,
    next_generation: u64,
    next_crash_id: u64,
}

impl fmt::Debug for PlaneTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaneTracker")
            .field("plane_count", &self.planes.len())
            .field("crash_sites", &self.crash_sites.len())
            .field("pending_expiries", &self.expiries.len())
            .finish_non_exhaustive()
    }
}

impl Default for PlaneTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl PlaneTracker {
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            planes: HashMap::new(),
            crash_sites: Vec::new(),
            expiries: ExpiryQueue::default(),
            config,
            next_generation: 0,
            next_crash_id: 0,
        }
    }

    /// Apply a position tick.
    ///
    /// Unknown flights are created as [`PlaneStatus::Flying`]. Known flights
    /// get their position and metadata replaced but keep their status, so a
    /// tick never cancels a takeoff or arrival display.
    pub fn upsert_position(&mut self, flight_id: &str, position: Position, meta: PlaneMeta) -> Upsert {
        let now = Utc::now();
        if let Some(plane) = self.planes.get_mut(flight_id) {
            plane.position = position;
            plane.meta = meta;
            plane.last_update = now;
            return Upsert::Updated;
        }

        self.planes.insert(
            flight_id.to_string(),
            Plane {
                flight_id: flight_id.to_string(),
                position,
                meta,
                status: PlaneStatus::Flying,
                last_update: now,
                generation: 0,
            },
        );
        Upsert::Created
    }

    /// Apply a full position report from the server.
    pub fn upsert_report(&mut self, report: PlaneReport) -> Upsert {
        let flight_id = report.flight_id.clone();
        let position = report.position;
        self.upsert_position(&flight_id, position, report.into())
    }

    /// Show the plane as taking off and schedule its removal.
    ///
    /// Returns `false` if the flight has no live record.
    pub fn mark_takeoff(&mut self, flight_id: &str, now: Instant) -> bool {
        self.mark_transient(flight_id, PlaneStatus::Takeoff, now)
    }

    /// Show the plane as arrived and schedule its removal.
    ///
    /// Returns `false` if the flight has no live record.
    pub fn mark_arrived(&mut self, flight_id: &str, now: Instant) -> bool {
        self.mark_transient(flight_id, PlaneStatus::Arrived, now)
    }

    fn mark_transient(&mut self, flight_id: &str, status: PlaneStatus, now: Instant) -> bool {
        let Some(plane) = self.planes.get_mut(flight_id) else {
            return false;
        };

        self.next_generation += 1;
        plane.status = status;
        plane.generation = self.next_generation;
        self.expiries.schedule(
            now + self.config.transient_window,
            ExpiryTarget::Plane {
                flight_id: flight_id.to_string(),
                generation: self.next_generation,
            },
        );
        true
    }

    /// Remove a crashed plane and leave a crash marker at its last position.
    ///
    /// Returns `None` when there is no live record to take a position from;
    /// no marker is created in that case.
    pub fn mark_crashed(&mut self, flight_id: &str, now: Instant) -> Option<CrashSite> {
        let plane = self.planes.remove(flight_id)?;

        self.next_crash_id += 1;
        let site = CrashSite {
            id: self.next_crash_id,
            flight_id: plane.flight_id,
            position: plane.position,
            crashed_at: Utc::now(),
        };
        self.crash_sites.push(site.clone());
        self.expiries.schedule(
            now + self.config.crash_marker_window,
            ExpiryTarget::CrashSite { id: site.id },
        );
        Some(site)
    }

    /// Fire every deadline that is due at `now`.
    ///
    /// Deadlines whose plane is gone or has moved on to a newer transition are
    /// skipped.
    pub fn expire(&mut self, now: Instant) -> Vec<Expired> {
        let mut expired = Vec::new();

        while let Some(target) = self.expiries.pop_due(now) {
            match target {
                ExpiryTarget::Plane { flight_id, generation } => {
                    let current = self.planes.get(&flight_id).map(|plane| plane.generation);
                    if current == Some(generation) {
                        if let Some(plane) = self.planes.remove(&flight_id) {
                            expired.push(Expired::Plane(plane));
                        }
                    } else {
                        debug!("Skipping stale expiry for {flight_id} (generation {generation})");
                    }
                }
                ExpiryTarget::CrashSite { id } => {
                    if let Some(index) = self.crash_sites.iter().position(|site| site.id == id) {
                        expired.push(Expired::CrashSite(self.crash_sites.remove(index)));
                    }
                }
            }
        }

        expired
    }

    /// Earliest pending deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.expiries.next_deadline()
    }

    #[must_use]
    pub fn get(&self, flight_id: &str) -> Option<&Plane> {
        self.planes.get(flight_id)
    }

    #[must_use]
    pub fn contains(&self, flight_id: &str) -> bool {
        self.planes.contains_key(flight_id)
    }

    pub fn planes(&self) -> impl Iterator<Item = &Plane> {
        self.planes.values()
    }

    #[must_use]
    pub fn crash_sites(&self) -> &[CrashSite] {
        &self.crash_sites
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    fn tracker() -> PlaneTracker {
        PlaneTracker::new(TrackerConfig::default())
    }

    fn tick(tracker: &mut PlaneTracker, flight_id: &str, lat: f64, long: f64) -> Upsert {
        tracker.upsert_position(flight_id, Position::new(lat, long), PlaneMeta::default())
    }

    #[test]
    fn test_heading_angle() {
        let origin = Position::new(0.0, 0.0);
        assert!((heading_angle(origin, Position::new(0.0, 10.0)) - 0.0).abs() < 1e-9);
        assert!((heading_angle(origin, Position::new(10.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!((heading_angle(origin, Position::new(10.0, 10.0)) - 45.0).abs() < 1e-9);
        assert!((heading_angle(origin, Position::new(0.0, -10.0)) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_upsert_unknown_flight_creates_flying_plane() {
        let mut tracker = tracker();
        assert_eq!(tick(&mut tracker, "F1", 10.0, 20.0), Upsert::Created);

        let plane = tracker.get("F1").unwrap();
        assert_eq!(plane.status, PlaneStatus::Flying);
        assert_eq!(plane.position, Position::new(10.0, 20.0));

        assert_eq!(tick(&mut tracker, "F1", 11.0, 21.0), Upsert::Updated);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get("F1").unwrap().position, Position::new(11.0, 21.0));
    }

    #[test]
    fn test_upsert_replaces_metadata() {
        let mut tracker = tracker();
        let meta = PlaneMeta {
            captain: Some("Ana".to_string()),
            eta: Some(12.0),
            ..PlaneMeta::default()
        };
        tracker.upsert_position("F1", Position::new(0.0, 0.0), meta);
        tick(&mut tracker, "F1", 1.0, 1.0);

        assert_eq!(tracker.get("F1").unwrap().meta, PlaneMeta::default());
    }

    #[test]
    fn test_tick_does_not_revert_takeoff() {
        let mut tracker = tracker();
        let now = Instant::now();
        tick(&mut tracker, "F1", 0.0, 0.0);
        assert!(tracker.mark_takeoff("F1", now));

        tick(&mut tracker, "F1", 1.0, 1.0);

        let plane = tracker.get("F1").unwrap();
        assert_eq!(plane.status, PlaneStatus::Takeoff);
        assert_eq!(plane.position, Position::new(1.0, 1.0));
    }

    #[test]
    fn test_takeoff_then_arrived_later_transition_wins() {
        let mut tracker = tracker();
        let now = Instant::now();
        tick(&mut tracker, "F1", 0.0, 0.0);

        tracker.mark_takeoff("F1", now);
        tracker.mark_arrived("F1", now);

        assert_eq!(tracker.get("F1").unwrap().status, PlaneStatus::Arrived);
    }

    #[test]
    fn test_transient_plane_removed_after_window() {
        let mut tracker = tracker();
        let start = Instant::now();
        tick(&mut tracker, "F1", 0.0, 0.0);
        tracker.mark_arrived("F1", start);

        assert!(tracker.expire(start + WINDOW - Duration::from_millis(1)).is_empty());
        assert!(tracker.contains("F1"));

        let expired = tracker.expire(start + WINDOW);
        assert_eq!(expired.len(), 1);
        assert!(matches!(&expired[0], Expired::Plane(plane) if plane.status == PlaneStatus::Arrived));
        assert!(!tracker.contains("F1"));
        assert!(tracker.next_deadline().is_none());
    }

    #[test]
    fn test_stale_expiry_does_not_cut_later_transition_short() {
        let mut tracker = tracker();
        let start = Instant::now();
        tick(&mut tracker, "F1", 0.0, 0.0);

        tracker.mark_takeoff("F1", start);
        tracker.mark_arrived("F1", start + Duration::from_secs(5));

        // The takeoff deadline fires but the plane has moved on to Arrived.
        assert!(tracker.expire(start + WINDOW).is_empty());
        assert_eq!(tracker.get("F1").unwrap().status, PlaneStatus::Arrived);

        let expired = tracker.expire(start + Duration::from_secs(15));
        assert_eq!(expired.len(), 1);
        assert!(!tracker.contains("F1"));
    }

    #[test]
    fn test_expiry_after_plane_recreated_is_noop() {
        let mut tracker = tracker();
        let start = Instant::now();
        tick(&mut tracker, "F1", 0.0, 0.0);
        tracker.mark_takeoff("F1", start);
        tracker.mark_crashed("F1", start);
        tick(&mut tracker, "F1", 5.0, 5.0);

        assert!(tracker.expire(start + WINDOW).is_empty());
        assert_eq!(tracker.get("F1").unwrap().status, PlaneStatus::Flying);
    }

    #[test]
    fn test_crash_records_last_position_and_removes_plane() {
        let mut tracker = tracker();
        let now = Instant::now();
        tick(&mut tracker, "F1", 10.0, 20.0);

        let site = tracker.mark_crashed("F1", now).unwrap();

        assert_eq!(site.position, Position::new(10.0, 20.0));
        assert_eq!(site.flight_id, "F1");
        assert_eq!(tracker.crash_sites().len(), 1);
        assert!(!tracker.contains("F1"));
    }

    #[test]
    fn test_crash_for_unknown_plane_creates_no_marker() {
        let mut tracker = tracker();
        assert!(tracker.mark_crashed("ghost", Instant::now()).is_none());
        assert!(tracker.crash_sites().is_empty());
        assert!(tracker.next_deadline().is_none());
    }

    #[test]
    fn test_crash_marker_removed_after_its_own_window() {
        let mut tracker = tracker();
        let start = Instant::now();
        tick(&mut tracker, "F1", 10.0, 20.0);
        tracker.mark_crashed("F1", start);

        assert!(tracker.expire(start + Duration::from_secs(59)).is_empty());
        assert_eq!(tracker.crash_sites().len(), 1);

        let expired = tracker.expire(start + Duration::from_secs(60));
        assert!(matches!(&expired[..], [Expired::CrashSite(site)] if site.flight_id == "F1"));
        assert!(tracker.crash_sites().is_empty());
    }

    #[test]
    fn test_transitions_for_unknown_flight_are_rejected() {
        let mut tracker = tracker();
        let now = Instant::now();
        assert!(!tracker.mark_takeoff("ghost", now));
        assert!(!tracker.mark_arrived("ghost", now));
        assert!(tracker.is_empty());
        assert!(tracker.next_deadline().is_none());
    }
}
