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

//! Catalog and amount entry.
//!
//! Supplies the `{direction, amount}` pairs the confirmation flow starts
//! from: fixed-price store items for spends, preset or free-text amounts for
//! reloads. Free-text entry is parsed and validated here, before it can
//! reach a flow.

use crate::base::Direction;
use crate::error::FlowError;
use crate::ledger;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// An amount proposal handed to [`ConfirmationFlow::start`].
///
/// [`ConfirmationFlow::start`]: crate::ConfirmationFlow::start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmountRequest {
    pub direction: Direction,
    pub amount: Decimal,
}

/// A fixed-price store entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub title: String,
    pub subtitle: String,
    pub price: Decimal,
}

impl CatalogItem {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, price: Decimal) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            price,
        }
    }

    /// The spend proposal for this item.
    pub fn request(&self) -> AmountRequest {
        AmountRequest {
            direction: Direction::Spend,
            amount: self.price,
        }
    }
}

/// The game-shop catalog shown on the store tab.
pub fn game_shop() -> Vec<CatalogItem> {
    vec![CatalogItem::new("Valorant", "RIOT GAMES", dec!(10.00))]
}

/// Preset amounts offered on the parent reload tile.
pub fn reload_presets() -> [Decimal; 4] {
    [dec!(5.00), dec!(10.00), dec!(15.00), dec!(25.00)]
}

/// Parses a free-text amount entry.
///
/// Accepts an optional leading `$` and surrounding whitespace. Anything
/// unparseable, non-positive or carrying sub-cent precision is rejected, so
/// entries like `"abc"` or `"-5"` never reach a flow.
///
/// # Errors
///
/// Returns [`FlowError::InvalidAmount`] for any input that does not denote a
/// positive whole-cent amount.
pub fn parse_amount(input: &str) -> Result<Decimal, FlowError> {
    let text = input.trim();
    let text = text.strip_prefix('$').unwrap_or(text);
    let amount = Decimal::from_str_exact(text).map_err(|_| FlowError::InvalidAmount)?;
    ledger::validate_amount(amount)?;
    Ok(amount)
}
