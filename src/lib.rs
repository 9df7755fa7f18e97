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

//! # Field Cards
//!
//! This library provides the card-address assignment engine behind a field
//! operations application: addresses are grouped into cards (visit batches),
//! cards are designated to field agents, taken back, and re-designated, and
//! every hand-over is recorded in an append-only history.
//!
//! ## Core Components
//!
//! - [`Engine`]: Batch operations façade managing per-group card ledgers
//! - [`Card`]: Card entity with its assignment state machine
//! - [`ClaimIndex`]: Exclusivity resolver (one live card per address)
//! - [`CardError`]: Error kinds for rejected operations
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use fieldcards_rs::{Engine, InMemoryAddressBook, InMemoryUserDirectory};
//! use fieldcards_rs::{AddressId, CardStatus, GroupId, UserId};
//!
//! let addresses = Arc::new(InMemoryAddressBook::new());
//! addresses.insert_id("A1", "north");
//! addresses.insert_id("A2", "north");
//! let users = Arc::new(InMemoryUserDirectory::new());
//! users.insert("U1", "Ana");
//!
//! let engine = Engine::new(addresses, users);
//!
//! let card = engine
//!     .create_card(vec![AddressId::from("A1"), AddressId::from("A2")], GroupId::from("north"))
//!     .unwrap();
//! assert_eq!(card.status(), CardStatus::Unassigned);
//!
//! let designated = engine
//!     .designate_cards(&[card.id().clone()], &UserId::from("U1"))
//!     .unwrap();
//! assert_eq!(designated[0].status(), CardStatus::Assigned);
//!
//! // Both addresses are now committed to the card.
//! assert!(engine.list_free_addresses(&GroupId::from("north")).is_empty());
//! ```
//!
//! ## Thread Safety
//!
//! Mutations serialize per group behind a timed lock; different groups
//! proceed in parallel. A lock timeout surfaces as
//! [`CardError::ConcurrencyConflict`] with no partial side effects.

mod base;
pub mod card;
mod engine;
pub mod error;
pub mod history;
pub mod registry;
mod resolver;

pub use base::{AddressId, CardId, GroupId, UserId};
pub use card::{Assignment, Card, CardStatus};
pub use engine::Engine;
pub use error::CardError;
pub use history::{AuditAction, AuditEvent, AuditTrail, History, HistoryEntry};
pub use registry::{
    AddressRegistry, AddressSummary, InMemoryAddressBook, InMemoryUserDirectory, UserDirectory,
};
pub use resolver::ClaimIndex;
