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

//! External collaborator interfaces.
//!
//! The engine never creates, edits, or validates addresses and users; it
//! consults an [`AddressRegistry`] and a [`UserDirectory`] owned by the
//! surrounding application. The in-memory implementations here back the
//! tests, the CLI, and the demo server.

use crate::base::{AddressId, GroupId, UserId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Descriptive address fields the engine passes through for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSummary {
    pub id: AddressId,
    pub group: GroupId,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    /// Whether a field agent has confirmed the address on site.
    pub confirmed: bool,
    /// Inactive addresses stay registered but are excluded from routing.
    pub active: bool,
}

/// Read-only view of the external address store.
pub trait AddressRegistry: Send + Sync {
    fn address_exists(&self, id: &AddressId) -> bool;

    /// Summaries for the given ids, in input order; unknown ids are skipped.
    fn addresses_by_ids(&self, ids: &[AddressId]) -> Vec<AddressSummary>;

    /// Every address id registered under `group`.
    ///
    /// Backs the free-address listing: the engine subtracts claimed
    /// addresses from this universe.
    fn ids_in_group(&self, group: &GroupId) -> Vec<AddressId>;
}

/// Read-only view of the external user store.
pub trait UserDirectory: Send + Sync {
    fn user_exists(&self, id: &UserId) -> bool;
}

/// In-memory address registry.
#[derive(Debug, Default)]
pub struct InMemoryAddressBook {
    addresses: DashMap<AddressId, AddressSummary>,
}

impl InMemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, summary: AddressSummary) {
        self.addresses.insert(summary.id.clone(), summary);
    }

    /// Registers a bare address id with placeholder descriptive fields.
    pub fn insert_id(&self, id: impl Into<AddressId>, group: impl Into<GroupId>) {
        let id = id.into();
        self.insert(AddressSummary {
            id: id.clone(),
            group: group.into(),
            street: String::new(),
            number: String::new(),
            neighborhood: String::new(),
            city: String::new(),
            confirmed: false,
            active: true,
        });
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl AddressRegistry for InMemoryAddressBook {
    fn address_exists(&self, id: &AddressId) -> bool {
        self.addresses.contains_key(id)
    }

    fn addresses_by_ids(&self, ids: &[AddressId]) -> Vec<AddressSummary> {
        ids.iter()
            .filter_map(|id| self.addresses.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    fn ids_in_group(&self, group: &GroupId) -> Vec<AddressId> {
        let mut ids: Vec<AddressId> = self
            .addresses
            .iter()
            .filter(|entry| &entry.value().group == group)
            .map(|entry| entry.key().clone())
            .collect();
        // DashMap iteration order is arbitrary; sort for stable listings.
        ids.sort();
        ids
    }
}

/// In-memory user directory.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<UserId, String>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<UserId>, name: impl Into<String>) {
        self.users.insert(id.into(), name.into());
    }

    pub fn name_of(&self, id: &UserId) -> Option<String> {
        self.users.get(id).map(|entry| entry.value().clone())
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn user_exists(&self, id: &UserId) -> bool {
        self.users.contains_key(id)
    }
}
