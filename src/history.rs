// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Assignment audit history.
//!
//! Two structures live here:
//!
//! - [`History`]: the per-card, append-only list of designation and return
//!   events, oldest first. Entries are written only as a side effect of
//!   state-machine transitions; callers can never mutate it directly.
//! - [`AuditTrail`]: an engine-wide, lock-free feed of audit events across
//!   all groups, drained by export consumers (e.g. the CLI timeline).

use crate::base::{CardId, UserId};
use chrono::{DateTime, Utc};
use crossbeam::queue::SegQueue;
use serde::Serialize;

/// One designation or return event on a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub user_id: UserId,
    pub date: DateTime<Utc>,
}

/// Append-only assignment history of a single card, oldest first.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Invoked only by card state transitions.
    pub(crate) fn record(&mut self, user_id: UserId, date: DateTime<Utc>) {
        self.entries.push(HistoryEntry { user_id, date });
    }

    /// All events, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The most recent event, used for "last held by" displays.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What happened to a card, as seen by the engine-wide audit feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Designated,
    Returned,
}

/// One entry in the engine-wide audit feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub card_id: CardId,
    pub user_id: UserId,
    pub action: AuditAction,
    pub at: DateTime<Utc>,
}

/// Lock-free feed of audit events across all groups.
///
/// Uses a [`SegQueue`] so producers never block each other; events appear in
/// push order. Draining is destructive and intended for a single export
/// consumer.
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: SegQueue<AuditEvent>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(
        &self,
        card_id: CardId,
        user_id: UserId,
        action: AuditAction,
        at: DateTime<Utc>,
    ) {
        self.events.push(AuditEvent {
            card_id,
            user_id,
            action,
            at,
        });
    }

    /// Removes and returns all queued events, oldest first.
    pub fn drain(&self) -> Vec<AuditEvent> {
        let mut drained = Vec::with_capacity(self.events.len());
        while let Some(event) = self.events.pop() {
            drained.push(event);
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
