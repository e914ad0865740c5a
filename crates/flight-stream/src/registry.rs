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

//! Scheduled flight roster.

use std::collections::HashMap;

use crate::protocol::{Flight, Position};

/// The authoritative set of scheduled flights.
///
/// The roster is only ever replaced as a whole; there are no incremental
/// updates.
#[derive(Debug, Default, Clone)]
pub struct FlightRegistry {
    flights: HashMap<String, Flight>,
}

impl FlightRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new roster snapshot and return the number of flights it holds.
    ///
    /// The snapshot is re-keyed by each flight's own id before the swap, so
    /// readers see either the old roster or the new one, never a mix.
    pub fn replace(&mut self, snapshot: HashMap<String, Flight>) -> usize {
        let flights: HashMap<String, Flight> = snapshot
            .into_values()
            .map(|flight| (flight.id.clone(), flight))
            .collect();
        self.flights = flights;
        self.flights.len()
    }

    #[must_use]
    pub fn get(&self, flight_id: &str) -> Option<&Flight> {
        self.flights.get(flight_id)
    }

    /// Destination airport location for a flight, if it is on the roster.
    #[must_use]
    pub fn destination_of(&self, flight_id: &str) -> Option<Position> {
        self.flights.get(flight_id).map(|f| f.destination.location)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    /// Flights ordered by departure airport name, then destination airport name.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Flight> {
        let mut flights: Vec<&Flight> = self.flights.values().collect();
        flights.sort_by(|a, b| {
            a.departure
                .name
                .cmp(&b.departure.name)
                .then_with(|| a.destination.name.cmp(&b.destination.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        flights
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}
