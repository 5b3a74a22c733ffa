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

//! Error types for the confirmation flow and ledger.
//!
//! Every error resolves locally into a terminal flow state with a reason;
//! nothing propagates to the presentation shell as a panic. The shell maps
//! reasons to user-facing messages (e.g. redirect-to-reload on
//! [`FlowError::InsufficientFunds`]).

use thiserror::Error;

/// Confirmation flow and ledger errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Amount is non-positive, unparseable, or not representable in cents
    #[error("invalid amount (must be positive, at most 2 decimal places)")]
    InvalidAmount,

    /// Spend amount exceeds the available balance
    #[error("insufficient funds on card")]
    InsufficientFunds,

    /// Tap signal source rejected for a reason other than user cancel
    #[error("tap failed: {0}")]
    TapFailed(String),

    /// User cancelled while the flow was waiting on a tap
    #[error("cancelled before tap")]
    Cancelled,

    /// Ledger rejected the mutation at commit time
    ///
    /// Should be impossible given the ledger's serialized `apply`; treated as
    /// a logic-invariant violation and logged loudly rather than retried.
    #[error("ledger rejected commit")]
    CommitFailed,

    /// A flow instance was started a second time; flows are single-use
    #[error("flow already started; create a new flow to retry")]
    AlreadyStarted,
}
