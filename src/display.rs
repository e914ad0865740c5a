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

//! Plain-text rendering of the live picture for the terminal.

use std::fmt::Write;

use flight_stream::{ChatEntry, CrashSite, Flight, Notice, Plane};

/// Flight roster as a fixed-width table.
pub fn flight_table(flights: &[Flight]) -> String {
    let mut out = format!(
        "{:<10} {:<28} {:<16} {:<28} {:<16}\n",
        "FLIGHT", "DEPARTURE", "COUNTRY", "DESTINATION", "COUNTRY"
    );
    for flight in flights {
        let _ = writeln!(
            out,
            "{:<10} {:<28} {:<16} {:<28} {:<16}",
            flight.id,
            flight.departure.name,
            flight.departure.country_name(),
            flight.destination.name,
            flight.destination.country_name()
        );
    }
    out
}

/// One line per live plane, ordered by flight id. Each row carries the icon
/// heading and the number of recorded path points.
pub fn plane_lines(planes: &[(Plane, Option<f64>, usize)]) -> String {
    let mut sorted: Vec<_> = planes.iter().collect();
    sorted.sort_by(|a, b| a.0.flight_id.cmp(&b.0.flight_id));

    let mut out = String::new();
    for (plane, heading, points) in sorted {
        let _ = write!(
            out,
            "{:<10} {:>8.3} {:>9.3}  {:<8}",
            plane.flight_id, plane.position.lat, plane.position.long, plane.status
        );
        if let Some(heading) = heading {
            let _ = write!(out, " hdg {heading:>6.1}");
        }
        if let Some(airline) = &plane.meta.airline {
            let _ = write!(out, "  {airline}");
        }
        if let Some(captain) = &plane.meta.captain {
            let _ = write!(out, " / {captain}");
        }
        if let Some(eta) = plane.meta.eta {
            let _ = write!(out, "  ETA {eta:.1}");
        }
        let _ = writeln!(out, "  [{points} pts]");
    }
    out
}

pub fn crash_line(site: &CrashSite) -> String {
    format!(
        "CRASH {} at ({:.3}, {:.3}) {}",
        site.flight_id,
        site.position.lat,
        site.position.long,
        site.crashed_at.format("%H:%M:%S UTC")
    )
}

/// Chat line as shown in the log, with the level as sent. Warnings are flagged.
pub fn chat_line(entry: &ChatEntry) -> String {
    let marker = if entry.is_warning() { "!" } else { " " };
    format!(
        "{marker}[{}] {} ({}): {}",
        entry.formatted_time(),
        entry.sender_name,
        entry.level,
        entry.content
    )
}

pub fn notice_line(notice: &Notice) -> String {
    match notice {
        Notice::Denied { reason } => format!(
            "Session denied by server: {}",
            reason.as_deref().unwrap_or("no reason given")
        ),
        Notice::Disconnected { message } => format!(
            "Disconnected by server: {}",
            message.as_deref().unwrap_or("no message")
        ),
        Notice::Crash(site) => crash_line(site),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone, Utc};
    use flight_stream::protocol::{Airport, ChatLevel, City, Country};
    use flight_stream::{PlaneStatus, Position};

    fn airport(name: &str, country: &str) -> Airport {
        Airport {
            name: name.to_string(),
            city: City {
                name: name.to_string(),
                country: Country {
                    name: country.to_string(),
                },
            },
            location: Position::new(0.0, 0.0),
        }
    }

    fn plane(id: &str, status: PlaneStatus) -> Plane {
        let mut tracker = flight_stream::PlaneTracker::default();
        tracker.upsert_position(id, Position::new(-33.45, -70.66), flight_stream::tracker::PlaneMeta::default());
        let mut plane = tracker.get(id).cloned().unwrap();
        plane.status = status;
        plane
    }

    #[test]
    fn test_flight_table_lists_every_flight() {
        let flights = vec![Flight {
            id: "LA100".to_string(),
            departure: airport("Arturo Merino Benitez", "Chile"),
            destination: airport("John F. Kennedy", "United States"),
        }];

        let table = flight_table(&flights);

        assert_eq!(table.lines().count(), 2);
        assert!(table.contains("LA100"));
        assert!(table.contains("United States"));
    }

    #[test]
    fn test_plane_lines_are_sorted_and_show_heading() {
        let planes = vec![
            (plane("ZZ9", PlaneStatus::Flying), None, 3),
            (plane("AA1", PlaneStatus::Takeoff), Some(45.0), 1),
        ];

        let out = plane_lines(&planes);
        let lines: Vec<_> = out.lines().collect();

        assert!(lines[0].starts_with("AA1"));
        assert!(lines[0].contains("takeoff"));
        assert!(lines[0].contains("hdg   45.0"));
        assert!(lines[0].ends_with("[1 pts]"));
        assert!(!lines[1].contains("hdg"));
    }

    #[test]
    fn test_chat_line_flags_warnings() {
        let entry = ChatEntry {
            sender_name: "tower".to_string(),
            content: "storm ahead".to_string(),
            level: ChatLevel::Warn,
            received_at: Local::now(),
        };
        let line = chat_line(&entry);
        assert!(line.starts_with('!'));
        assert!(line.ends_with("tower (warn): storm ahead"));
    }

    #[test]
    fn test_chat_line_keeps_unrecognized_level() {
        let entry = ChatEntry {
            sender_name: "ops".to_string(),
            content: "all clear".to_string(),
            level: ChatLevel::Other("debug".to_string()),
            received_at: Local::now(),
        };
        let line = chat_line(&entry);
        assert!(line.starts_with(' '));
        assert!(line.ends_with("ops (debug): all clear"));
    }

    #[test]
    fn test_crash_notice_line() {
        let site = CrashSite {
            id: 1,
            flight_id: "LA100".to_string(),
            position: Position::new(1.5, 2.25),
            crashed_at: Utc.with_ymd_and_hms(2024, 10, 1, 12, 30, 0).unwrap(),
        };
        assert_eq!(
            notice_line(&Notice::Crash(site)),
            "CRASH LA100 at (1.500, 2.250) 12:30:00 UTC"
        );
    }
}
