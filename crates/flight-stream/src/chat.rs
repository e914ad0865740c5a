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

//! Append-only log of chat messages received from the server.

use chrono::{DateTime, Local};

use crate::protocol::{ChatLevel, ChatMessage};

/// A chat message stamped with the local time it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub sender_name: String,
    pub content: String,
    pub level: ChatLevel,
    /// Local receipt time, not the server's timestamp.
    pub received_at: DateTime<Local>,
}

impl ChatEntry {
    /// Receipt date and time in the local locale format.
    #[must_use]
    pub fn formatted_time(&self) -> String {
        self.received_at.format("%x %X").to_string()
    }

    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.level == ChatLevel::Warn
    }
}

/// Chat history in arrival order. Entries are never removed.
#[derive(Debug, Default, Clone)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and append a message, returning its index in the log.
    pub fn append(&mut self, message: ChatMessage, received_at: DateTime<Local>) -> usize {
        self.entries.push(ChatEntry {
            sender_name: message.name,
            content: message.content,
            level: message.level,
            received_at,
        });
        self.entries.len() - 1
    }

    #[must_use]
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Entries appended at or after `index`, for incremental readers.
    #[must_use]
    pub fn since(&self, index: usize) -> &[ChatEntry] {
        self.entries.get(index..).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(name: &str, content: &str, level: ChatLevel) -> ChatMessage {
        ChatMessage {
            name: name.to_string(),
            content: content.to_string(),
            level,
        }
    }

    #[test]
    fn test_append_keeps_arrival_order_and_stamps() {
        let mut log = ChatLog::new();
        let first = Local.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();
        let second = Local.with_ymd_and_hms(2024, 10, 1, 12, 0, 5).unwrap();

        assert_eq!(log.append(message("tower", "cleared", ChatLevel::Info), first), 0);
        assert_eq!(log.append(message("ops", "storm ahead", ChatLevel::Warn), second), 1);

        let entries = log.entries();
        assert_eq!(entries[0].sender_name, "tower");
        assert_eq!(entries[0].received_at, first);
        assert_eq!(entries[1].content, "storm ahead");
        assert!(entries[1].is_warning());
        assert!(!entries[0].is_warning());
    }

    #[test]
    fn test_since_returns_tail() {
        let mut log = ChatLog::new();
        let now = Local::now();
        log.append(message("a", "1", ChatLevel::Info), now);
        log.append(message("b", "2", ChatLevel::Info), now);
        log.append(message("c", "3", ChatLevel::Info), now);

        assert_eq!(log.since(1).len(), 2);
        assert_eq!(log.since(1)[0].sender_name, "b");
        assert!(log.since(3).is_empty());
        assert!(log.since(10).is_empty());
    }
}
