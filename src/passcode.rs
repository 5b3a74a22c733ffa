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

//! Parent-area passcode gate.
//!
//! The reload flow sits behind a 4-digit passcode keypad. This is a UI gate,
//! not an authentication scheme: the code lives in memory and a wrong entry
//! simply clears. The shell renders the dots and keypad; this type holds the
//! entry state.

/// Outcome of a keypad press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasscodeStatus {
    /// Entry incomplete; keep typing.
    Pending,
    /// Full entry matched; the parent area is unlocked.
    Unlocked,
    /// Full entry did not match; the entry was cleared.
    Rejected,
}

/// Keypad entry state for the parent area.
#[derive(Debug, Clone)]
pub struct PasscodeGate {
    code: String,
    entered: String,
    unlocked: bool,
}

impl PasscodeGate {
    /// Creates a gate for a specific digit code.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            entered: String::new(),
            unlocked: false,
        }
    }

    /// Feeds one keypad digit. Non-digit input and presses after unlock are
    /// ignored (reported as `Pending`/`Unlocked` respectively).
    pub fn press(&mut self, digit: char) -> PasscodeStatus {
        if self.unlocked {
            return PasscodeStatus::Unlocked;
        }
        if !digit.is_ascii_digit() || self.entered.len() >= self.code.len() {
            return PasscodeStatus::Pending;
        }

        self.entered.push(digit);
        if self.entered.len() < self.code.len() {
            return PasscodeStatus::Pending;
        }

        if self.entered == self.code {
            self.unlocked = true;
            PasscodeStatus::Unlocked
        } else {
            self.entered.clear();
            PasscodeStatus::Rejected
        }
    }

    /// Backspace: removes the last entered digit.
    pub fn delete(&mut self) {
        self.entered.pop();
    }

    /// Clears the entry and relocks the gate.
    pub fn reset(&mut self) {
        self.entered.clear();
        self.unlocked = false;
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Digits entered so far, for rendering the dots.
    pub fn entered_len(&self) -> usize {
        self.entered.len()
    }
}

impl Default for PasscodeGate {
    /// The demo app's code.
    fn default() -> Self {
        Self::new("1234")
    }
}
