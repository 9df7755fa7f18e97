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

//! Error types for card operations.

use crate::base::AddressId;
use thiserror::Error;

/// Card operation errors.
///
/// Every failure is detected before any mutation is applied, so a returned
/// error means the engine state is exactly what it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CardError {
    /// Empty membership set, or an address already claimed by another card.
    ///
    /// `conflict` carries the first conflicting address id, or `None` when
    /// the rejection is for an empty set.
    #[error("invalid card membership")]
    InvalidMembership { conflict: Option<AddressId> },

    /// The card's current state does not permit the requested transition:
    /// designating an already-assigned card, returning an unassigned card,
    /// or editing membership while assigned.
    #[error("illegal card state transition")]
    IllegalTransition,

    /// Return attempted by a user who does not hold the current assignment.
    #[error("card is held by a different user")]
    AssignmentMismatch,

    /// Unknown card, address, or user id.
    #[error("unknown card, address, or user")]
    NotFound,

    /// An overlapping in-flight mutation held the group lock past the
    /// acquisition timeout. The caller may retry.
    #[error("conflicting concurrent mutation, retry")]
    ConcurrencyConflict,
}

impl CardError {
    /// Shorthand for a conflict on a specific address.
    pub fn claimed(address: AddressId) -> Self {
        Self::InvalidMembership {
            conflict: Some(address),
        }
    }

    /// Shorthand for an empty membership rejection.
    pub fn empty_membership() -> Self {
        Self::InvalidMembership { conflict: None }
    }
}
