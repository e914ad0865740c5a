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

//! Wire protocol for the live tracking feed.
//!
//! Every frame is a JSON object with a `type` discriminator. Inbound frames
//! decode into [`ServerEvent`]; outbound requests are built from
//! [`ClientRequest`]. Frames whose `type` this client does not know decode to
//! [`Inbound::Unknown`] instead of failing, so newer servers can add event
//! kinds without breaking older clients.

mod types;

pub use types::{Airline, Airport, ChatLevel, ChatMessage, City, Country, Flight, PlaneReport, Position};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event kinds understood by this client.
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    "accepted",
    "denied",
    "disconnected",
    "flights",
    "plane",
    "take-off",
    "landing",
    "crashed",
    "message",
];

/// Errors that can occur while decoding or encoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("invalid payload for '{kind}' event: {source}")]
    InvalidPayload {
        kind: String,
        source: serde_json::Error,
    },
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// The join request was accepted.
    Accepted,
    /// The join request was refused; the session must not retry.
    Denied {
        #[serde(default)]
        reason: Option<String>,
    },
    /// The server is dropping this client.
    Disconnected {
        #[serde(default)]
        message: Option<String>,
    },
    /// Full roster snapshot keyed by flight id.
    Flights { flights: HashMap<String, Flight> },
    /// Position tick for one plane.
    Plane { plane: PlaneReport },
    TakeOff { flight_id: String },
    Landing { flight_id: String },
    Crashed { flight_id: String },
    /// Chat message broadcast by the server.
    Message { message: ChatMessage },
}

impl ServerEvent {
    /// The `type` tag this event travels under.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Denied { .. } => "denied",
            Self::Disconnected { .. } => "disconnected",
            Self::Flights { .. } => "flights",
            Self::Plane { .. } => "plane",
            Self::TakeOff { .. } => "take-off",
            Self::Landing { .. } => "landing",
            Self::Crashed { .. } => "crashed",
            Self::Message { .. } => "message",
        }
    }
}

/// Requests sent by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientRequest {
    Join { id: String, username: String },
    Chat { content: String },
    Disconnect { id: String },
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(ServerEvent),
    /// Well-formed envelope with a `type` this client does not handle.
    Unknown(String),
}

/// Decode one inbound text frame.
pub fn decode(frame: &str) -> Result<Inbound, ProtocolError> {
    let value: Value = serde_json::from_str(frame)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    if !KNOWN_EVENT_TYPES.contains(&kind.as_str()) {
        return Ok(Inbound::Unknown(kind));
    }

    serde_json::from_value(value)
        .map(Inbound::Event)
        .map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

/// Encode an outbound request as a text frame.
pub fn encode(request: &ClientRequest) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(request)?)
}
