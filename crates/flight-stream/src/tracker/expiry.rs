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

//! Deadline queue for transient display states.

use std::collections::VecDeque;
use std::time::Instant;

/// What a fired deadline refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExpiryTarget {
    /// Remove the plane if it is still at this generation.
    Plane { flight_id: String, generation: u64 },
    /// Remove the crash marker with this id.
    CrashSite { id: u64 },
}

#[derive(Debug, Clone)]
struct Expiry {
    due: Instant,
    target: ExpiryTarget,
}

/// Deadlines ordered by due time. Ties fire in scheduling order.
///
/// Entries are never cancelled; whoever pops a target must check it against
/// current state before acting.
#[derive(Debug, Default)]
pub(crate) struct ExpiryQueue {
    entries: VecDeque<Expiry>,
}

impl ExpiryQueue {
    pub(crate) fn schedule(&mut self, due: Instant, target: ExpiryTarget) {
        let index = self.entries.partition_point(|entry| entry.due <= due);
        self.entries.insert(index, Expiry { due, target });
    }

    /// Pop the earliest target whose deadline is at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<ExpiryTarget> {
        if self.entries.front()?.due <= now {
            self.entries.pop_front().map(|entry| entry.target)
        } else {
            None
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.front().map(|entry| entry.due)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
