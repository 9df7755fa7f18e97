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

//! Address exclusivity resolver.
//!
//! Each group keeps one [`ClaimIndex`] mapping every claimed address to the
//! card that holds it. All exclusivity questions are answered here and
//! nowhere else, so the one-live-card-per-address invariant is enforced at a
//! single point instead of being replicated per caller.

use crate::base::{AddressId, CardId};
use crate::error::CardError;
use std::collections::HashMap;

/// Per-group index of claimed addresses.
///
/// Mutations happen only while the owning group's lock is held, so the index
/// itself needs no synchronization.
#[derive(Debug, Default)]
pub struct ClaimIndex {
    owners: HashMap<AddressId, CardId>,
}

impl ClaimIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The card currently holding `address`, if any.
    pub fn owner_of(&self, address: &AddressId) -> Option<&CardId> {
        self.owners.get(address)
    }

    /// Filters `candidates` down to the addresses claimed by no live card,
    /// preserving input order.
    pub fn free_of<'a, I>(&self, candidates: I) -> Vec<AddressId>
    where
        I: IntoIterator<Item = &'a AddressId>,
    {
        candidates
            .into_iter()
            .filter(|address| !self.owners.contains_key(*address))
            .cloned()
            .collect()
    }

    /// Checks that every address in `addresses` may be claimed.
    ///
    /// `excluding` lets a card re-claim its own current members during a
    /// membership edit without tripping the check against itself.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::InvalidMembership`] carrying the first address
    /// already held by a different card.
    pub fn validate_claim(
        &self,
        addresses: &[AddressId],
        excluding: Option<&CardId>,
    ) -> Result<(), CardError> {
        for address in addresses {
            if let Some(owner) = self.owners.get(address) {
                if excluding != Some(owner) {
                    return Err(CardError::claimed(address.clone()));
                }
            }
        }
        Ok(())
    }

    /// Records `card` as the owner of every address in `addresses`.
    ///
    /// Callers must have run [`validate_claim`](Self::validate_claim) first;
    /// overwriting a different live owner here would corrupt the invariant.
    pub(crate) fn claim_all(&mut self, addresses: &[AddressId], card: &CardId) {
        for address in addresses {
            let previous = self.owners.insert(address.clone(), card.clone());
            debug_assert!(
                previous.is_none() || previous.as_ref() == Some(card),
                "Invariant violated: address {address} was claimed by {previous:?} while being given to {card}",
            );
        }
    }

    /// Releases every address in `addresses` back to the free pool.
    pub(crate) fn release_all(&mut self, addresses: &[AddressId]) {
        for address in addresses {
            self.owners.remove(address);
        }
    }

    /// Number of claimed addresses in the group.
    pub fn claimed_count(&self) -> usize {
        self.owners.len()
    }
}
