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

//! Payload shapes carried inside server events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub long: f64,
}

impl Position {
    #[must_use]
    pub const fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub country: Country,
}

/// Route endpoint of a scheduled flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub name: String,
    pub city: City,
    pub location: Position,
}

impl Airport {
    #[must_use]
    pub fn city_name(&self) -> &str {
        &self.city.name
    }

    #[must_use]
    pub fn country_name(&self) -> &str {
        &self.city.country.name
    }
}

/// A scheduled flight from the roster snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub departure: Airport,
    pub destination: Airport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    pub name: String,
}

/// Position tick for one airborne plane, as sent by the server.
///
/// Only `flight_id` and `position` are required; everything else is display
/// metadata that older or newer servers may omit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneReport {
    pub flight_id: String,
    pub position: Position,
    /// Point the plane is flying towards.
    #[serde(default)]
    pub heading: Option<Position>,
    #[serde(default)]
    pub airline: Option<Airline>,
    #[serde(default)]
    pub captain: Option<String>,
    /// Server-side status label, kept verbatim for display.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "ETA")]
    pub eta: Option<f64>,
}

/// Severity attached to a chat message.
///
/// Levels other than `info` and `warn` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatLevel {
    #[default]
    Info,
    Warn,
    Other(String),
}

impl ChatLevel {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Other(level) => level,
        }
    }
}

impl From<String> for ChatLevel {
    fn from(level: String) -> Self {
        match level.as_str() {
            "info" => Self::Info,
            "warn" => Self::Warn,
            _ => Self::Other(level),
        }
    }
}

impl From<ChatLevel> for String {
    fn from(level: ChatLevel) -> Self {
        match level {
            ChatLevel::Other(level) => level,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ChatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Chat message body of a `message` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub level: ChatLevel,
}
