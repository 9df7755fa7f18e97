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

//! Card operations façade.
//!
//! The [`Engine`] is the only entry point callers use: create a card, edit
//! its membership, designate one or many cards to a field agent, take a card
//! back, delete a card, and query free addresses and assignment history.
//! Every mutation validates all its inputs before touching any state, so a
//! returned error always means nothing changed.
//!
//! # Concurrency
//!
//! Cards live in per-group ledgers. Each ledger is guarded by a
//! [`parking_lot::Mutex`] so mutations within one group serialize, while a
//! [`DashMap`] lets different groups proceed in parallel. Mutating calls
//! acquire the lock with a timeout; hitting the timeout surfaces as
//! [`CardError::ConcurrencyConflict`] and the caller may retry. Batch
//! designation spanning several groups locks them in sorted key order.

use crate::base::{AddressId, CardId, GroupId, UserId};
use crate::card::Card;
use crate::error::CardError;
use crate::history::{AuditAction, AuditEvent, AuditTrail, HistoryEntry};
use crate::registry::{AddressRegistry, AddressSummary, UserDirectory};
use crate::resolver::ClaimIndex;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// How long a mutating call waits for a group lock before giving up with
/// [`CardError::ConcurrencyConflict`].
const LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// All cards of one group plus the group's exclusivity index.
#[derive(Debug, Default)]
struct GroupState {
    cards: HashMap<CardId, Card>,
    claims: ClaimIndex,
    /// Next human-facing card number; numbers are sequential per group.
    next_number: u32,
}

#[derive(Debug, Default)]
struct GroupLedger {
    inner: Mutex<GroupState>,
}

impl GroupLedger {
    /// Lock for a mutation; times out into `ConcurrencyConflict`.
    fn lock_for_write(&self) -> Result<MutexGuard<'_, GroupState>, CardError> {
        self.inner
            .try_lock_for(LOCK_TIMEOUT)
            .ok_or(CardError::ConcurrencyConflict)
    }

    /// Lock for a read-only snapshot. Readers tolerate waiting.
    fn lock_for_read(&self) -> MutexGuard<'_, GroupState> {
        self.inner.lock()
    }
}

/// Card assignment engine.
///
/// # Invariants
///
/// - An address belongs to at most one live card per group at any instant.
/// - A card's assignment pointer, start/end dates, and history always agree
///   (see [`Card`]).
/// - Batch designation is all-or-nothing: if any card in the batch cannot be
///   designated, no card in the batch is.
pub struct Engine {
    /// Group ledgers indexed by group key.
    groups: DashMap<GroupId, Arc<GroupLedger>>,
    /// Which group each live card belongs to.
    directory: DashMap<CardId, GroupId>,
    /// Engine-wide audit feed, fed by designations and returns.
    audit: AuditTrail,
    addresses: Arc<dyn AddressRegistry>,
    users: Arc<dyn UserDirectory>,
}

impl Engine {
    /// Creates an engine backed by the given external registries.
    pub fn new(addresses: Arc<dyn AddressRegistry>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            groups: DashMap::new(),
            directory: DashMap::new(),
            audit: AuditTrail::new(),
            addresses,
            users,
        }
    }

    /// Creates a card from a non-empty set of free addresses.
    ///
    /// Duplicate ids in the input are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// - [`CardError::InvalidMembership`] - empty input, or an address is
    ///   already claimed by another card in the group.
    /// - [`CardError::NotFound`] - an address id is unknown to the registry.
    /// - [`CardError::ConcurrencyConflict`] - the group lock timed out.
    pub fn create_card(
        &self,
        address_ids: Vec<AddressId>,
        group: GroupId,
    ) -> Result<Card, CardError> {
        let members = dedupe(address_ids);
        if members.is_empty() {
            return Err(CardError::empty_membership());
        }
        self.check_addresses(&members, &group)?;

        let ledger = self.ledger_for(&group);
        let mut guard = ledger.lock_for_write()?;
        let state = &mut *guard;

        state.claims.validate_claim(&members, None)?;

        let id = CardId::generate();
        state.next_number += 1;
        let number = state.next_number;
        state.claims.claim_all(&members, &id);
        let card = Card::new(id.clone(), number, members, group.clone());
        state.cards.insert(id.clone(), card.clone());
        drop(guard);

        self.directory.insert(id.clone(), group.clone());
        tracing::info!(card = %id, number, %group, "card created");
        Ok(card)
    }

    /// Replaces a card's membership set.
    ///
    /// Permitted only while the card is not assigned. Addresses dropped from
    /// the set are released back to the free pool; the swap is atomic.
    ///
    /// # Errors
    ///
    /// - [`CardError::NotFound`] - unknown card or address id.
    /// - [`CardError::IllegalTransition`] - the card is currently assigned.
    /// - [`CardError::InvalidMembership`] - empty input, or a newly-added
    ///   address is claimed by a different card.
    /// - [`CardError::ConcurrencyConflict`] - the group lock timed out.
    pub fn update_card_membership(
        &self,
        card_id: &CardId,
        address_ids: Vec<AddressId>,
    ) -> Result<Card, CardError> {
        let group = self.group_of(card_id)?;
        let members = dedupe(address_ids);
        self.check_addresses(&members, &group)?;

        let ledger = self.ledger_of(&group)?;
        let mut guard = ledger.lock_for_write()?;
        let state = &mut *guard;

        let card = state.cards.get_mut(card_id).ok_or(CardError::NotFound)?;
        if card.is_assigned() {
            return Err(CardError::IllegalTransition);
        }
        if members.is_empty() {
            return Err(CardError::empty_membership());
        }
        state.claims.validate_claim(&members, Some(card_id))?;

        let released: Vec<AddressId> = card
            .addresses()
            .iter()
            .filter(|address| !members.contains(address))
            .cloned()
            .collect();
        state.claims.release_all(&released);
        state.claims.claim_all(&members, card_id);
        card.replace_membership(members)?;

        tracing::info!(card = %card_id, released = released.len(), "card membership updated");
        Ok(card.clone())
    }

    /// Designates one or many cards to a user, all-or-nothing.
    ///
    /// If any card in the batch is not designatable the whole call fails
    /// before anything is mutated. Cards may span groups; the involved group
    /// locks are acquired in sorted key order. Returned cards are snapshots
    /// in input order.
    ///
    /// # Errors
    ///
    /// - [`CardError::NotFound`] - unknown user or card id.
    /// - [`CardError::IllegalTransition`] - a card in the batch is already
    ///   assigned, or the same card id appears twice in the batch.
    /// - [`CardError::ConcurrencyConflict`] - a group lock timed out.
    pub fn designate_cards(
        &self,
        card_ids: &[CardId],
        user_id: &UserId,
    ) -> Result<Vec<Card>, CardError> {
        if !self.users.user_exists(user_id) {
            return Err(CardError::NotFound);
        }
        if card_ids.is_empty() {
            return Ok(Vec::new());
        }
        // A duplicate id in one batch would designate an already-assigned
        // card mid-batch; reject it up front.
        let mut seen = HashSet::new();
        if !card_ids.iter().all(|id| seen.insert(id)) {
            return Err(CardError::IllegalTransition);
        }

        let mut group_keys: Vec<GroupId> = Vec::new();
        for card_id in card_ids {
            let group = self.group_of(card_id)?;
            if !group_keys.contains(&group) {
                group_keys.push(group);
            }
        }
        // Sorted acquisition order prevents lock cycles between overlapping
        // batches.
        group_keys.sort();
        let ledgers: Vec<Arc<GroupLedger>> = group_keys
            .iter()
            .map(|group| self.ledger_of(group))
            .collect::<Result<_, _>>()?;

        let mut guards: Vec<MutexGuard<'_, GroupState>> = Vec::with_capacity(ledgers.len());
        for ledger in &ledgers {
            guards.push(ledger.lock_for_write()?);
        }

        let guard_of = |card_group: &GroupId| {
            group_keys
                .binary_search(card_group)
                .expect("every card group was collected above")
        };

        // Validation pass: every card must exist and be designatable.
        let mut placements: Vec<usize> = Vec::with_capacity(card_ids.len());
        for card_id in card_ids {
            let group = self.group_of(card_id)?;
            let slot = guard_of(&group);
            let card = guards[slot].cards.get(card_id).ok_or(CardError::NotFound)?;
            if card.is_assigned() {
                tracing::debug!(card = %card_id, "batch designation rejected, card already assigned");
                return Err(CardError::IllegalTransition);
            }
            placements.push(slot);
        }

        // Mutation pass: cannot fail after validation.
        let now = Utc::now();
        let mut designated = Vec::with_capacity(card_ids.len());
        for (card_id, slot) in card_ids.iter().zip(&placements) {
            let card = guards[*slot]
                .cards
                .get_mut(card_id)
                .ok_or(CardError::NotFound)?;
            card.designate(user_id.clone(), now)?;
            self.audit
                .record(card_id.clone(), user_id.clone(), AuditAction::Designated, now);
            designated.push(card.clone());
        }

        tracing::info!(user = %user_id, cards = card_ids.len(), "cards designated");
        Ok(designated)
    }

    /// Takes a card back from its current holder, ending the active cycle.
    ///
    /// # Errors
    ///
    /// - [`CardError::NotFound`] - unknown user or card id.
    /// - [`CardError::IllegalTransition`] - the card is not assigned.
    /// - [`CardError::AssignmentMismatch`] - `user_id` does not hold the
    ///   card.
    /// - [`CardError::ConcurrencyConflict`] - the group lock timed out.
    pub fn return_card(&self, card_id: &CardId, user_id: &UserId) -> Result<Card, CardError> {
        if !self.users.user_exists(user_id) {
            return Err(CardError::NotFound);
        }
        let group = self.group_of(card_id)?;
        let ledger = self.ledger_of(&group)?;
        let mut guard = ledger.lock_for_write()?;

        let card = guard.cards.get_mut(card_id).ok_or(CardError::NotFound)?;
        let now = Utc::now();
        card.hand_back(user_id.clone(), now)?;
        let snapshot = card.clone();
        drop(guard);

        self.audit
            .record(card_id.clone(), user_id.clone(), AuditAction::Returned, now);
        tracing::info!(card = %card_id, user = %user_id, "card returned");
        Ok(snapshot)
    }

    /// Deletes a card in any status, releasing all its addresses.
    ///
    /// History is not queryable afterwards; the audit feed keeps any events
    /// not yet drained.
    ///
    /// # Errors
    ///
    /// - [`CardError::NotFound`] - unknown card id.
    /// - [`CardError::ConcurrencyConflict`] - the group lock timed out.
    pub fn delete_card(&self, card_id: &CardId) -> Result<(), CardError> {
        let group = self.group_of(card_id)?;
        let ledger = self.ledger_of(&group)?;
        let mut guard = ledger.lock_for_write()?;
        let state = &mut *guard;

        let card = state.cards.remove(card_id).ok_or(CardError::NotFound)?;
        state.claims.release_all(card.addresses());
        drop(guard);

        self.directory.remove(card_id);
        tracing::info!(card = %card_id, %group, "card deleted");
        Ok(())
    }

    /// Addresses registered in `group` that belong to no live card.
    pub fn list_free_addresses(&self, group: &GroupId) -> Vec<AddressId> {
        let universe = self.addresses.ids_in_group(group);
        match self.groups.get(group).map(|entry| Arc::clone(entry.value())) {
            Some(ledger) => {
                let guard = ledger.lock_for_read();
                guard.claims.free_of(&universe)
            }
            None => universe,
        }
    }

    /// Cards currently assigned to `user_id`, across all groups.
    pub fn cards_for_user(&self, user_id: &UserId) -> Vec<Card> {
        let ledgers: Vec<Arc<GroupLedger>> = self
            .groups
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut held = Vec::new();
        for ledger in ledgers {
            let guard = ledger.lock_for_read();
            held.extend(
                guard
                    .cards
                    .values()
                    .filter(|card| card.held_by(user_id))
                    .cloned(),
            );
        }
        held.sort_by_key(|card| card.number());
        held
    }

    /// All cards of a group, ordered by card number.
    pub fn cards_in_group(&self, group: &GroupId) -> Vec<Card> {
        let Some(ledger) = self.groups.get(group).map(|e| Arc::clone(e.value())) else {
            return Vec::new();
        };
        let guard = ledger.lock_for_read();
        let mut cards: Vec<Card> = guard.cards.values().cloned().collect();
        cards.sort_by_key(|card| card.number());
        cards
    }

    /// Snapshot of a single card.
    pub fn get_card(&self, card_id: &CardId) -> Option<Card> {
        let group = self.directory.get(card_id)?.value().clone();
        let ledger = self.groups.get(&group).map(|e| Arc::clone(e.value()))?;
        let guard = ledger.lock_for_read();
        guard.cards.get(card_id).cloned()
    }

    /// Assignment history of a card, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown card id.
    pub fn history_of(&self, card_id: &CardId) -> Result<Vec<HistoryEntry>, CardError> {
        self.get_card(card_id)
            .map(|card| card.history().to_vec())
            .ok_or(CardError::NotFound)
    }

    /// Address summaries for a card's members, for display.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown card id.
    pub fn addresses_of(&self, card_id: &CardId) -> Result<Vec<AddressSummary>, CardError> {
        let card = self.get_card(card_id).ok_or(CardError::NotFound)?;
        Ok(self.addresses.addresses_by_ids(card.addresses()))
    }

    /// Removes and returns all audit events queued since the last drain.
    pub fn drain_audit_trail(&self) -> Vec<AuditEvent> {
        self.audit.drain()
    }

    fn ledger_for(&self, group: &GroupId) -> Arc<GroupLedger> {
        let entry = self
            .groups
            .entry(group.clone())
            .or_insert_with(|| Arc::new(GroupLedger::default()));
        Arc::clone(entry.value())
    }

    fn ledger_of(&self, group: &GroupId) -> Result<Arc<GroupLedger>, CardError> {
        self.groups
            .get(group)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(CardError::NotFound)
    }

    fn group_of(&self, card_id: &CardId) -> Result<GroupId, CardError> {
        self.directory
            .get(card_id)
            .map(|entry| entry.value().clone())
            .ok_or(CardError::NotFound)
    }

    /// Every membership candidate must be known to the registry and
    /// registered under the card's own group; an address from another group
    /// is invisible here.
    fn check_addresses(&self, address_ids: &[AddressId], group: &GroupId) -> Result<(), CardError> {
        for address in address_ids {
            if !self.addresses.address_exists(address) {
                tracing::debug!(%address, "membership references unknown address");
                return Err(CardError::NotFound);
            }
        }
        for summary in self.addresses.addresses_by_ids(address_ids) {
            if &summary.group != group {
                tracing::debug!(address = %summary.id, "membership references address outside group");
                return Err(CardError::NotFound);
            }
        }
        Ok(())
    }
}

/// Drops duplicate ids, keeping the first occurrence in order.
fn dedupe(address_ids: Vec<AddressId>) -> Vec<AddressId> {
    let mut seen = HashSet::new();
    address_ids
        .into_iter()
        .filter(|address| seen.insert(address.clone()))
        .collect()
}
