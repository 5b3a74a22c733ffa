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

//! # Spendy Card
//!
//! Core of a children's prepaid spending card app: a guarded balance ledger
//! and the tap-to-confirm flow that mutates it. A child spends the balance on
//! store items and confirms by tapping the NFC card; the parent area reloads
//! funds through the same flow shape behind a passcode.
//!
//! ## Core Components
//!
//! - [`Ledger`]: the single card balance with serialized, guarded mutation
//! - [`ConfirmationFlow`]: per-transaction state machine sequencing amount
//!   gating, the tap wait, and the exactly-once commit
//! - [`TapSource`] / [`ChannelTap`]: the seam to platform NFC tag detection
//! - [`FlowError`]: reason codes the presentation shell maps to messages
//!
//! ## Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use spendy_card_rs::{ChannelTap, ConfirmationFlow, Direction, FlowState, Ledger};
//! use std::sync::Arc;
//!
//! let ledger = Arc::new(Ledger::new(dec!(24.00)).unwrap());
//! let tap = ChannelTap::new();
//! let flow = ConfirmationFlow::new(Arc::clone(&ledger), tap.clone());
//!
//! flow.start(Direction::Spend, dec!(10.00)).unwrap();
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let (state, _) = rt.block_on(async {
//!     // The second future plays the card side and resolves the wait.
//!     tokio::join!(flow.confirm_tap(), async { tap.complete() })
//! });
//!
//! assert_eq!(state, FlowState::Completed { new_balance: dec!(14.00) });
//! assert_eq!(ledger.read(), dec!(14.00));
//! ```
//!
//! ## Concurrency
//!
//! The ledger serializes every `apply`; the flow's state check keeps a
//! double-press from registering a second tap wait. Flows can be shared as
//! `Arc<ConfirmationFlow<_>>` so a shell may read state or cancel while the
//! tap wait is suspended.

pub mod base;
pub mod catalog;
pub mod error;
mod flow;
mod ledger;
pub mod passcode;
pub mod tap;

pub use base::Direction;
pub use catalog::{AmountRequest, CatalogItem, parse_amount};
pub use error::FlowError;
pub use flow::{ConfirmationFlow, FlowState};
pub use ledger::{Ledger, validate_amount};
pub use passcode::{PasscodeGate, PasscodeStatus};
pub use tap::{ChannelTap, TapError, TapEvent, TapSource};
