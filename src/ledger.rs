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

//! Balance ledger.
//!
//! Holds the card's single balance and exposes guarded mutation. The ledger
//! is the only shared mutable resource in the system: `apply` calls from
//! unrelated flow instances are serialized behind one mutex, each seeing the
//! post-state of the previous one. The gate check in the confirmation flow
//! and the re-validation inside [`Ledger::apply`] are a belt-and-suspenders
//! pair.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use spendy_card_rs::{Direction, Ledger};
//!
//! let ledger = Ledger::new(dec!(24.00)).unwrap();
//! let new_balance = ledger.apply(Direction::Spend, dec!(10.00)).unwrap();
//! assert_eq!(new_balance, dec!(14.00));
//! ```

use crate::base::Direction;
use crate::error::FlowError;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Checks that an amount is positive and exactly representable in minor
/// units (cents).
///
/// `Decimal` is always finite, so the checks left are sign and scale:
/// anything that does not survive rounding to two decimal places carries
/// sub-cent precision and is rejected.
pub fn validate_amount(amount: Decimal) -> Result<(), FlowError> {
    if amount <= Decimal::ZERO || amount != amount.round_dp(Ledger::DECIMAL_PRECISION) {
        return Err(FlowError::InvalidAmount);
    }
    Ok(())
}

/// The card balance.
///
/// # Invariants
///
/// - `balance >= 0` after every operation.
/// - Mutations never interleave: `apply` performs its check and its write
///   under a single lock acquisition.
///
/// Process-memory only; created at session start, gone at process exit.
#[derive(Debug)]
pub struct Ledger {
    balance: Mutex<Decimal>,
}

impl Ledger {
    /// Balances and amounts are whole cents.
    const DECIMAL_PRECISION: u32 = 2;

    /// Creates a ledger with an initial balance.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidAmount`] if the initial balance is
    /// negative or carries sub-cent precision. Zero is allowed.
    pub fn new(initial: Decimal) -> Result<Self, FlowError> {
        if initial < Decimal::ZERO || initial != initial.round_dp(Self::DECIMAL_PRECISION) {
            return Err(FlowError::InvalidAmount);
        }
        Ok(Self {
            balance: Mutex::new(initial),
        })
    }

    /// Returns the current balance. No side effects.
    pub fn read(&self) -> Decimal {
        *self.balance.lock()
    }

    /// Applies a mutation and returns the new balance.
    ///
    /// For [`Direction::Spend`] the amount must not exceed the current
    /// balance; the check and the subtraction happen under the same lock, so
    /// a spend that races past a stale gate check still cannot drive the
    /// balance negative. [`Direction::Reload`] always succeeds for a valid
    /// amount.
    ///
    /// # Errors
    ///
    /// - [`FlowError::InvalidAmount`] - amount is non-positive or not whole cents.
    /// - [`FlowError::InsufficientFunds`] - spend exceeds the balance; the
    ///   balance is left unchanged.
    pub fn apply(&self, direction: Direction, amount: Decimal) -> Result<Decimal, FlowError> {
        validate_amount(amount)?;

        let mut balance = self.balance.lock();
        match direction {
            Direction::Spend => {
                if amount > *balance {
                    return Err(FlowError::InsufficientFunds);
                }
                *balance -= amount;
            }
            Direction::Reload => {
                *balance += amount;
            }
        }

        debug_assert!(
            *balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            *balance
        );
        Ok(*balance)
    }
}

impl Serialize for Ledger {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let balance = self.balance.lock();
        let mut state = serializer.serialize_struct("Ledger", 1)?;
        state.serialize_field("balance", &balance.round_dp(Ledger::DECIMAL_PRECISION))?;
        state.end()
    }
}
