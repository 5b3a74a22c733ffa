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

//! Core vocabulary types shared by the ledger and the confirmation flow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a confirmation flow moves the balance.
///
/// Spend and reload flows share one state machine shape; this enum is the
/// only parameter that distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Decrement: the child pays for a store item.
    Spend,
    /// Increment: a parent adds funds to the card.
    Reload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Spend => write!(f, "spend"),
            Direction::Reload => write!(f, "reload"),
        }
    }
}
