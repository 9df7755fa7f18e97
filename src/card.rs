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

//! Card entity and assignment state machine.
//!
//! A card batches addresses routed together to a single field agent. Its
//! lifecycle per cycle:
//!
//  Unassigned ──designate──► Assigned ──hand_back──► Returned (eligible again)
//!
//! Returned is a display-level sub-state of unassigned: a returned card is
//! immediately eligible for a new designation. Membership can be edited only
//! while the card is not assigned.

use crate::base::{AddressId, CardId, GroupId, UserId};
use crate::error::CardError;
use crate::history::{History, HistoryEntry};
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Current holder of a card, present only while the card is assigned.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Assignment {
    pub user_id: UserId,
    pub assigned_at: DateTime<Utc>,
}

/// Where a card sits in its assignment cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    /// Never designated since creation.
    Unassigned,
    /// Currently held by a field agent.
    Assigned,
    /// Handed back after a cycle; eligible for reassignment.
    Returned,
}

/// One batch of addresses routed together.
///
/// # Invariants
///
/// - `addresses` is never empty and contains no duplicates.
/// - `current_assignment` is present iff `start_date` is set and `end_date`
///   is not (the assigned state).
/// - `history` only grows; one entry per designation and one per return.
#[derive(Debug, Clone)]
pub struct Card {
    id: CardId,
    number: u32,
    addresses: Vec<AddressId>,
    current_assignment: Option<Assignment>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    history: History,
    group: GroupId,
}

impl Card {
    /// Builds a card in the unassigned state.
    ///
    /// The façade validates membership (non-empty, deduplicated, free of
    /// foreign claims) before calling this.
    pub(crate) fn new(id: CardId, number: u32, addresses: Vec<AddressId>, group: GroupId) -> Self {
        let card = Self {
            id,
            number,
            addresses,
            current_assignment: None,
            start_date: None,
            end_date: None,
            history: History::new(),
            group,
        };
        card.assert_invariants();
        card
    }

    pub fn id(&self) -> &CardId {
        &self.id
    }

    /// Sequential human-facing label within the group.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn addresses(&self) -> &[AddressId] {
        &self.addresses
    }

    pub fn current_assignment(&self) -> Option<&Assignment> {
        self.current_assignment.as_ref()
    }

    /// Timestamp of the most recent designation.
    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// Timestamp of the most recent return.
    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn is_assigned(&self) -> bool {
        self.current_assignment.is_some()
    }

    pub fn status(&self) -> CardStatus {
        if self.current_assignment.is_some() {
            CardStatus::Assigned
        } else if self.end_date.is_some() {
            CardStatus::Returned
        } else {
            CardStatus::Unassigned
        }
    }

    /// Whether the user currently holds this card.
    pub fn held_by(&self, user_id: &UserId) -> bool {
        self.current_assignment
            .as_ref()
            .is_some_and(|assignment| &assignment.user_id == user_id)
    }

    fn assert_invariants(&self) {
        debug_assert!(
            !self.addresses.is_empty(),
            "Invariant violated: card {} has empty membership",
            self.id
        );
        debug_assert!(
            {
                let mut seen = std::collections::HashSet::new();
                self.addresses.iter().all(|a| seen.insert(a))
            },
            "Invariant violated: card {} holds a duplicate address",
            self.id
        );
        debug_assert_eq!(
            self.current_assignment.is_some(),
            self.start_date.is_some() && self.end_date.is_none(),
            "Invariant violated: assignment pointer disagrees with start/end dates on card {}",
            self.id
        );
    }

    /// Starts an assignment cycle.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::IllegalTransition`] if the card is already
    /// assigned. A second designation is always rejected, never merged.
    pub(crate) fn designate(
        &mut self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), CardError> {
        if self.is_assigned() {
            return Err(CardError::IllegalTransition);
        }
        self.current_assignment = Some(Assignment {
            user_id: user_id.clone(),
            assigned_at: at,
        });
        self.start_date = Some(at);
        self.end_date = None;
        self.history.record(user_id, at);
        self.assert_invariants();
        Ok(())
    }

    /// Ends the current assignment cycle. Named `hand_back` because `return`
    /// is a keyword.
    ///
    /// `start_date` is kept as the historical assignment time for display.
    ///
    /// # Errors
    ///
    /// - [`CardError::IllegalTransition`] if the card is not assigned.
    /// - [`CardError::AssignmentMismatch`] if `user_id` is not the holder.
    pub(crate) fn hand_back(
        &mut self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), CardError> {
        if !self.is_assigned() {
            return Err(CardError::IllegalTransition);
        }
        if !self.held_by(&user_id) {
            return Err(CardError::AssignmentMismatch);
        }
        self.current_assignment = None;
        self.end_date = Some(at);
        self.history.record(user_id, at);
        self.assert_invariants();
        Ok(())
    }

    /// Swaps the membership set.
    ///
    /// Exclusivity and non-emptiness are validated by the façade before this
    /// is invoked; only the state check lives here.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::IllegalTransition`] if the card is assigned.
    pub(crate) fn replace_membership(
        &mut self,
        new_addresses: Vec<AddressId>,
    ) -> Result<(), CardError> {
        if self.is_assigned() {
            return Err(CardError::IllegalTransition);
        }
        self.addresses = new_addresses;
        self.assert_invariants();
        Ok(())
    }
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Card", 9)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("number", &self.number)?;
        state.serialize_field("group", &self.group)?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("addresses", &self.addresses)?;
        state.serialize_field("current_assignment", &self.current_assignment)?;
        state.serialize_field("start_date", &self.start_date)?;
        state.serialize_field("end_date", &self.end_date)?;
        state.serialize_field("history", &self.history)?;
        state.end()
    }
}
