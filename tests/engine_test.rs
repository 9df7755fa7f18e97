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

//! Engine public API integration tests.

use fieldcards_rs::{
    AddressId, AuditAction, CardError, CardStatus, Engine, GroupId, InMemoryAddressBook,
    InMemoryUserDirectory, UserId,
};
use std::sync::Arc;

/// Engine seeded with addresses A1..A5 in group "north", B1..B2 in group
/// "south", and users U1/U2.
fn seeded_engine() -> Engine {
    let addresses = Arc::new(InMemoryAddressBook::new());
    for id in ["A1", "A2", "A3", "A4", "A5"] {
        addresses.insert_id(id, "north");
    }
    for id in ["B1", "B2"] {
        addresses.insert_id(id, "south");
    }
    let users = Arc::new(InMemoryUserDirectory::new());
    users.insert("U1", "Ana");
    users.insert("U2", "Bruno");

    Engine::new(addresses, users)
}

fn ids(raw: &[&str]) -> Vec<AddressId> {
    raw.iter().map(|s| AddressId::from(*s)).collect()
}

fn north() -> GroupId {
    GroupId::from("north")
}

fn south() -> GroupId {
    GroupId::from("south")
}

// === Creation ===

#[test]
fn create_card_claims_addresses() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1", "A2"]), north()).unwrap();

    assert_eq!(card.status(), CardStatus::Unassigned);
    assert_eq!(card.number(), 1);
    assert_eq!(card.addresses(), &ids(&["A1", "A2"])[..]);
    assert!(card.history().is_empty());

    let free = engine.list_free_addresses(&north());
    assert_eq!(free, ids(&["A3", "A4", "A5"]));
}

#[test]
fn create_card_with_empty_membership_fails() {
    let engine = seeded_engine();
    let result = engine.create_card(vec![], north());
    assert_eq!(result.unwrap_err(), CardError::empty_membership());
}

#[test]
fn create_card_with_unknown_address_fails() {
    let engine = seeded_engine();
    let result = engine.create_card(ids(&["A1", "nope"]), north());
    assert_eq!(result.unwrap_err(), CardError::NotFound);
    // Nothing was claimed.
    assert_eq!(engine.list_free_addresses(&north()).len(), 5);
}

#[test]
fn duplicate_input_ids_are_collapsed() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1", "A2", "A1"]), north()).unwrap();
    assert_eq!(card.addresses(), &ids(&["A1", "A2"])[..]);
}

#[test]
fn card_numbers_are_sequential_per_group() {
    let engine = seeded_engine();
    let first = engine.create_card(ids(&["A1"]), north()).unwrap();
    let second = engine.create_card(ids(&["A2"]), north()).unwrap();
    let other_group = engine.create_card(ids(&["B1"]), south()).unwrap();

    assert_eq!(first.number(), 1);
    assert_eq!(second.number(), 2);
    assert_eq!(other_group.number(), 1);
}

#[test]
fn groups_do_not_share_claims() {
    let engine = seeded_engine();
    engine.create_card(ids(&["A1", "A2"]), north()).unwrap();

    // South group is unaffected by north claims.
    assert_eq!(engine.list_free_addresses(&south()), ids(&["B1", "B2"]));
}

// === Exclusivity (end-to-end scenario 1) ===

#[test]
fn second_card_cannot_claim_a_held_address() {
    let engine = seeded_engine();
    engine.create_card(ids(&["A1", "A2"]), north()).unwrap();

    let free = engine.list_free_addresses(&north());
    assert!(!free.contains(&AddressId::from("A1")));
    assert!(!free.contains(&AddressId::from("A2")));

    let result = engine.create_card(ids(&["A2", "A3"]), north());
    assert_eq!(
        result.unwrap_err(),
        CardError::claimed(AddressId::from("A2"))
    );
    // A3 was not claimed by the failed call.
    assert!(engine.list_free_addresses(&north()).contains(&AddressId::from("A3")));
}

// === Designation and return (end-to-end scenario 2) ===

#[test]
fn designate_and_return_cycle() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    let u1 = UserId::from("U1");

    let designated = engine.designate_cards(&[card.id().clone()], &u1).unwrap();
    assert_eq!(designated.len(), 1);
    let assigned = &designated[0];
    assert_eq!(assigned.status(), CardStatus::Assigned);
    assert_eq!(assigned.current_assignment().unwrap().user_id, u1);
    assert!(assigned.start_date().is_some());
    assert!(assigned.end_date().is_none());
    assert_eq!(assigned.history().len(), 1);
    let t1 = assigned.history()[0].date;

    let returned = engine.return_card(card.id(), &u1).unwrap();
    assert_eq!(returned.status(), CardStatus::Returned);
    assert!(returned.current_assignment().is_none());
    assert_eq!(returned.history().len(), 2);
    let t2 = returned.history()[1].date;
    assert_eq!(returned.end_date(), Some(t2));
    assert!(t1 <= t2);
    // Start date survives the return for display.
    assert!(returned.start_date().is_some());
}

#[test]
fn returned_card_is_eligible_for_redesignation() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    engine.designate_cards(&[card.id().clone()], &UserId::from("U1")).unwrap();
    engine.return_card(card.id(), &UserId::from("U1")).unwrap();

    let redesignated = engine
        .designate_cards(&[card.id().clone()], &UserId::from("U2"))
        .unwrap();
    assert_eq!(redesignated[0].status(), CardStatus::Assigned);
    assert_eq!(
        redesignated[0].current_assignment().unwrap().user_id,
        UserId::from("U2")
    );
    assert_eq!(redesignated[0].history().len(), 3);
    assert_eq!(redesignated[0].end_date(), None);
}

// === Idempotent rejection ===

#[test]
fn second_designation_is_rejected_and_first_holder_kept() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    engine.designate_cards(&[card.id().clone()], &UserId::from("U1")).unwrap();

    let result = engine.designate_cards(&[card.id().clone()], &UserId::from("U2"));
    assert_eq!(result.unwrap_err(), CardError::IllegalTransition);

    let snapshot = engine.get_card(card.id()).unwrap();
    assert_eq!(
        snapshot.current_assignment().unwrap().user_id,
        UserId::from("U1")
    );
    assert_eq!(snapshot.history().len(), 1);
}

// === Wrong-user return (end-to-end scenario 3) ===

#[test]
fn return_by_wrong_user_changes_nothing() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    engine.designate_cards(&[card.id().clone()], &UserId::from("U1")).unwrap();

    let result = engine.return_card(card.id(), &UserId::from("U2"));
    assert_eq!(result.unwrap_err(), CardError::AssignmentMismatch);

    let snapshot = engine.get_card(card.id()).unwrap();
    assert_eq!(snapshot.status(), CardStatus::Assigned);
    assert_eq!(
        snapshot.current_assignment().unwrap().user_id,
        UserId::from("U1")
    );
    assert_eq!(snapshot.history().len(), 1);
    assert!(snapshot.end_date().is_none());
}

#[test]
fn return_of_unassigned_card_is_illegal() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();

    let result = engine.return_card(card.id(), &UserId::from("U1"));
    assert_eq!(result.unwrap_err(), CardError::IllegalTransition);
}

#[test]
fn unknown_user_is_rejected_before_any_state_check() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();

    let result = engine.designate_cards(&[card.id().clone()], &UserId::from("ghost"));
    assert_eq!(result.unwrap_err(), CardError::NotFound);
    assert_eq!(engine.get_card(card.id()).unwrap().status(), CardStatus::Unassigned);
}

// === Batch designation ===

#[test]
fn batch_designation_assigns_all_cards() {
    let engine = seeded_engine();
    let c1 = engine.create_card(ids(&["A1"]), north()).unwrap();
    let c2 = engine.create_card(ids(&["A2"]), north()).unwrap();
    let c3 = engine.create_card(ids(&["B1"]), south()).unwrap();

    let u1 = UserId::from("U1");
    let designated = engine
        .designate_cards(&[c1.id().clone(), c2.id().clone(), c3.id().clone()], &u1)
        .unwrap();

    assert_eq!(designated.len(), 3);
    assert!(designated.iter().all(|card| card.held_by(&u1)));

    let held = engine.cards_for_user(&u1);
    assert_eq!(held.len(), 3);
}

#[test]
fn batch_designation_is_all_or_nothing() {
    let engine = seeded_engine();
    let c1 = engine.create_card(ids(&["A1"]), north()).unwrap();
    let c2 = engine.create_card(ids(&["A2"]), north()).unwrap();
    engine.designate_cards(&[c2.id().clone()], &UserId::from("U2")).unwrap();

    // C2 is already assigned, so the whole batch must fail.
    let result = engine.designate_cards(&[c1.id().clone(), c2.id().clone()], &UserId::from("U1"));
    assert_eq!(result.unwrap_err(), CardError::IllegalTransition);

    // C1 was not assigned by the failed batch.
    assert_eq!(engine.get_card(c1.id()).unwrap().status(), CardStatus::Unassigned);
    assert!(engine.cards_for_user(&UserId::from("U1")).is_empty());
}

#[test]
fn duplicate_card_id_in_batch_is_rejected() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();

    let result = engine.designate_cards(
        &[card.id().clone(), card.id().clone()],
        &UserId::from("U1"),
    );
    assert_eq!(result.unwrap_err(), CardError::IllegalTransition);
    assert_eq!(engine.get_card(card.id()).unwrap().status(), CardStatus::Unassigned);
}

#[test]
fn empty_batch_designates_nothing() {
    let engine = seeded_engine();
    let designated = engine.designate_cards(&[], &UserId::from("U1")).unwrap();
    assert!(designated.is_empty());
}

// === Membership edits ===

#[test]
fn membership_update_swaps_and_releases() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1", "A2"]), north()).unwrap();

    let updated = engine
        .update_card_membership(card.id(), ids(&["A2", "A3"]))
        .unwrap();
    assert_eq!(updated.addresses(), &ids(&["A2", "A3"])[..]);

    // A1 went back to the free pool; A3 is now claimed.
    let free = engine.list_free_addresses(&north());
    assert!(free.contains(&AddressId::from("A1")));
    assert!(!free.contains(&AddressId::from("A3")));
}

#[test]
fn membership_update_on_assigned_card_fails() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    engine.designate_cards(&[card.id().clone()], &UserId::from("U1")).unwrap();

    let result = engine.update_card_membership(card.id(), ids(&["A2"]));
    assert_eq!(result.unwrap_err(), CardError::IllegalTransition);
    assert_eq!(engine.get_card(card.id()).unwrap().addresses(), &ids(&["A1"])[..]);
}

#[test]
fn failed_membership_update_leaves_set_untouched() {
    let engine = seeded_engine();
    let c1 = engine.create_card(ids(&["A1", "A2"]), north()).unwrap();
    engine.create_card(ids(&["A3"]), north()).unwrap();

    // A3 belongs to the other card.
    let result = engine.update_card_membership(c1.id(), ids(&["A1", "A3"]));
    assert_eq!(
        result.unwrap_err(),
        CardError::claimed(AddressId::from("A3"))
    );

    let snapshot = engine.get_card(c1.id()).unwrap();
    assert_eq!(snapshot.addresses(), &ids(&["A1", "A2"])[..]);
    // A2 is still claimed by C1.
    assert!(!engine.list_free_addresses(&north()).contains(&AddressId::from("A2")));
}

#[test]
fn membership_update_to_empty_set_fails() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();

    let result = engine.update_card_membership(card.id(), vec![]);
    assert_eq!(result.unwrap_err(), CardError::empty_membership());
    assert_eq!(engine.get_card(card.id()).unwrap().addresses().len(), 1);
}

#[test]
fn card_may_reclaim_its_own_addresses_during_edit() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1", "A2"]), north()).unwrap();

    // Keeping A1 must not conflict with the card's own claim.
    let updated = engine
        .update_card_membership(card.id(), ids(&["A1", "A4"]))
        .unwrap();
    assert_eq!(updated.addresses(), &ids(&["A1", "A4"])[..]);
}

// === Deletion ===

#[test]
fn delete_releases_all_addresses() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1", "A2"]), north()).unwrap();
    engine.delete_card(card.id()).unwrap();

    assert_eq!(engine.list_free_addresses(&north()).len(), 5);
    assert!(engine.get_card(card.id()).is_none());
    assert_eq!(engine.history_of(card.id()).unwrap_err(), CardError::NotFound);
}

#[test]
fn delete_is_permitted_while_assigned() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    engine.designate_cards(&[card.id().clone()], &UserId::from("U1")).unwrap();

    engine.delete_card(card.id()).unwrap();
    assert!(engine.cards_for_user(&UserId::from("U1")).is_empty());
    assert!(engine.list_free_addresses(&north()).contains(&AddressId::from("A1")));
}

#[test]
fn delete_unknown_card_fails() {
    let engine = seeded_engine();
    let result = engine.delete_card(&fieldcards_rs::CardId::from("ghost"));
    assert_eq!(result.unwrap_err(), CardError::NotFound);
}

#[test]
fn released_addresses_can_be_reclaimed_by_a_new_card() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1", "A2"]), north()).unwrap();
    engine.delete_card(card.id()).unwrap();

    let fresh = engine.create_card(ids(&["A1", "A2"]), north()).unwrap();
    assert_eq!(fresh.addresses().len(), 2);
    // Numbers keep counting up; deletion does not recycle labels.
    assert_eq!(fresh.number(), 2);
}

// === Queries ===

#[test]
fn history_of_reports_oldest_first() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    engine.designate_cards(&[card.id().clone()], &UserId::from("U1")).unwrap();
    engine.return_card(card.id(), &UserId::from("U1")).unwrap();
    engine.designate_cards(&[card.id().clone()], &UserId::from("U2")).unwrap();

    let history = engine.history_of(card.id()).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].user_id, UserId::from("U1"));
    assert_eq!(history[2].user_id, UserId::from("U2"));
    assert!(history[0].date <= history[1].date && history[1].date <= history[2].date);
}

#[test]
fn cards_for_user_only_lists_current_holdings() {
    let engine = seeded_engine();
    let c1 = engine.create_card(ids(&["A1"]), north()).unwrap();
    let c2 = engine.create_card(ids(&["A2"]), north()).unwrap();
    engine.designate_cards(&[c1.id().clone()], &UserId::from("U1")).unwrap();
    engine.designate_cards(&[c2.id().clone()], &UserId::from("U2")).unwrap();
    engine.return_card(c1.id(), &UserId::from("U1")).unwrap();

    assert!(engine.cards_for_user(&UserId::from("U1")).is_empty());
    let held = engine.cards_for_user(&UserId::from("U2"));
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].id(), c2.id());
}

#[test]
fn addresses_of_returns_summaries_in_membership_order() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A2", "A1"]), north()).unwrap();

    let summaries = engine.addresses_of(card.id()).unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].id, AddressId::from("A2"));
    assert_eq!(summaries[1].id, AddressId::from("A1"));
}

#[test]
fn free_addresses_of_unknown_group_is_empty() {
    let engine = seeded_engine();
    assert!(engine.list_free_addresses(&GroupId::from("ghost")).is_empty());
}

// === Audit trail ===

#[test]
fn audit_trail_records_designations_and_returns() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    engine.designate_cards(&[card.id().clone()], &UserId::from("U1")).unwrap();
    engine.return_card(card.id(), &UserId::from("U1")).unwrap();

    let events = engine.drain_audit_trail();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, AuditAction::Designated);
    assert_eq!(events[0].card_id, *card.id());
    assert_eq!(events[1].action, AuditAction::Returned);

    // Draining empties the feed.
    assert!(engine.drain_audit_trail().is_empty());
}

#[test]
fn failed_operations_leave_no_audit_events() {
    let engine = seeded_engine();
    let card = engine.create_card(ids(&["A1"]), north()).unwrap();
    let _ = engine.return_card(card.id(), &UserId::from("U1"));

    assert!(engine.drain_audit_trail().is_empty());
}
