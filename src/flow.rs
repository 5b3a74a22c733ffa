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

//! Confirmation flow controller.
//!
//! One [`ConfirmationFlow`] drives one pending transaction through
//! amount gating, the tap wait, and the exactly-once balance commit:
//!
//! ```text
//! AwaitingAmount ──start──► Gated ──confirm_tap──► AwaitingTap ──tap ok──► Committing
//!                             │                        │    │                 │
//!                             │ amount > balance       │    │ tap error       ├─► Completed
//!                             ▼                        │    ▼                 │
//!                           Failed(InsufficientFunds)  │  Failed(TapFailed)   └─► Failed(CommitFailed)
//!                                                      │ cancel / timeout
//!                                                      ▼
//!                                                   Cancelled
//! ```
//!
//! Completed, Cancelled and Failed are terminal. A flow instance is
//! single-use: retrying after any terminal state means constructing a new
//! flow, which is what keeps the commit exactly-once by construction.
//!
//! # Re-entrancy
//!
//! Only `Gated` may initiate a tap wait. A second `confirm_tap` while the
//! flow is in `AwaitingTap` or `Committing` (a double-press) is an idempotent
//! no-op returning the current state; the state check is the guard, not a
//! separate flag.

use crate::base::Direction;
use crate::error::FlowError;
use crate::ledger::{self, Ledger};
use crate::tap::{TapError, TapSource};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The controller's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// No amount selected yet; no pending transaction exists.
    AwaitingAmount,
    /// Amount accepted and gated against the balance; ready for the tap step.
    Gated,
    /// Suspended on the tap signal source.
    AwaitingTap,
    /// Tap succeeded; the ledger mutation is in progress.
    Committing,
    /// Terminal: committed, carrying the post-commit balance for display.
    Completed { new_balance: Decimal },
    /// Terminal: cancelled before a tap; the ledger was never touched.
    Cancelled,
    /// Terminal: failed with a reason; the ledger was never touched.
    Failed { reason: FlowError },
}

impl FlowState {
    /// True for Completed, Cancelled and Failed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Completed { .. } | FlowState::Cancelled | FlowState::Failed { .. }
        )
    }
}

/// One in-flight confirmation attempt. Owned exclusively by its flow; the
/// amount is frozen at creation.
#[derive(Debug)]
struct PendingTransaction {
    direction: Direction,
    amount: Decimal,
    state: FlowState,
    created_at: Instant,
}

/// Drives one pending transaction from amount selection to a terminal state.
///
/// The flow shares the [`Ledger`] with the rest of the app but exclusively
/// owns its pending transaction. Internal state sits behind a mutex so a
/// presentation shell can read [`state`](Self::state) or call
/// [`cancel`](Self::cancel) from another task while
/// [`confirm_tap`](Self::confirm_tap) is suspended.
///
/// # Invariants
///
/// - `Committing` is reachable only from `AwaitingTap`'s success edge and is
///   left exactly once, so [`Ledger::apply`] runs at most once per flow.
/// - A cancel that wins the race against a resolving tap suppresses the
///   commit; the balance is untouched.
pub struct ConfirmationFlow<T: TapSource> {
    ledger: Arc<Ledger>,
    tap: T,
    tap_timeout: Option<Duration>,
    pending: Mutex<Option<PendingTransaction>>,
}

impl<T: TapSource> ConfirmationFlow<T> {
    /// Creates a flow in `AwaitingAmount` over a shared ledger.
    pub fn new(ledger: Arc<Ledger>, tap: T) -> Self {
        Self {
            ledger,
            tap,
            tap_timeout: None,
            pending: Mutex::new(None),
        }
    }

    /// Bounds the tap wait. An elapsed timeout behaves exactly like a user
    /// cancel: the technology request is released and the flow ends
    /// `Cancelled`. Without this the user may wait indefinitely.
    pub fn with_tap_timeout(mut self, timeout: Duration) -> Self {
        self.tap_timeout = Some(timeout);
        self
    }

    /// Supplies the amount and gates it against the balance.
    ///
    /// An invalid amount is rejected before any pending transaction is
    /// created: the flow stays in `AwaitingAmount` and can be started again.
    /// A spend exceeding the balance creates the pending transaction and
    /// ends it immediately in `Failed(InsufficientFunds)` without ever
    /// entering `AwaitingTap`. Reloads are not gated.
    ///
    /// # Errors
    ///
    /// - [`FlowError::InvalidAmount`] - non-positive or sub-cent amount.
    /// - [`FlowError::AlreadyStarted`] - the flow already holds a pending
    ///   transaction (flows are single-use; construct a new one to retry).
    /// - [`FlowError::InsufficientFunds`] - spend gate failed; also recorded
    ///   as the terminal state so shells can key the redirect-to-reload
    ///   affordance off either.
    pub fn start(&self, direction: Direction, amount: Decimal) -> Result<(), FlowError> {
        ledger::validate_amount(amount)?;

        let mut pending = self.pending.lock();
        if pending.is_some() {
            return Err(FlowError::AlreadyStarted);
        }

        let mut transaction = PendingTransaction {
            direction,
            amount,
            state: FlowState::Gated,
            created_at: Instant::now(),
        };
        tracing::debug!(%direction, %amount, "flow gated");

        if direction == Direction::Spend && amount > self.ledger.read() {
            transaction.state = FlowState::Failed {
                reason: FlowError::InsufficientFunds,
            };
            *pending = Some(transaction);
            return Err(FlowError::InsufficientFunds);
        }

        *pending = Some(transaction);
        Ok(())
    }

    /// Waits for one tap and commits the balance mutation on success.
    ///
    /// Only a `Gated` flow initiates a wait. In every other state this is an
    /// idempotent no-op returning the current state, which is what defuses a
    /// double-press: the second call observes `AwaitingTap` (or a terminal
    /// state) and never registers a second technology request.
    ///
    /// Returns the state the flow ended up in.
    pub async fn confirm_tap(&self) -> FlowState {
        let wait = {
            let mut pending = self.pending.lock();
            match pending.as_mut() {
                Some(tx) if tx.state == FlowState::Gated => {
                    tx.state = FlowState::AwaitingTap;
                    tracing::debug!(direction = %tx.direction, "awaiting tap");
                    self.tap.begin()
                }
                _ => return Self::state_of(&pending),
            }
        };

        let outcome = match self.tap_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::debug!(?limit, "tap wait timed out");
                    self.tap.cancel();
                    Err(TapError::Cancelled)
                }
            },
            None => wait.await,
        };

        let mut pending = self.pending.lock();
        let Some(tx) = pending.as_mut() else {
            return FlowState::AwaitingAmount;
        };
        if tx.state != FlowState::AwaitingTap {
            // A concurrent cancel won the race; the tap no longer counts.
            return tx.state.clone();
        }

        match outcome {
            Ok(_) => {
                tx.state = FlowState::Committing;
                match self.ledger.apply(tx.direction, tx.amount) {
                    Ok(new_balance) => {
                        tracing::debug!(direction = %tx.direction, %new_balance, "commit applied");
                        tx.state = FlowState::Completed { new_balance };
                    }
                    Err(cause) => {
                        // The gate and the serialized ledger should make this
                        // unreachable; surface it loudly.
                        tracing::error!(%cause, "ledger rejected commit after successful tap");
                        tx.state = FlowState::Failed {
                            reason: FlowError::CommitFailed,
                        };
                    }
                }
            }
            Err(TapError::Cancelled) => {
                tx.state = FlowState::Cancelled;
            }
            Err(TapError::Failed(message)) => {
                tx.state = FlowState::Failed {
                    reason: FlowError::TapFailed(message),
                };
            }
        }

        tx.state.clone()
    }

    /// Cancels the pending transaction. Cooperative and idempotent.
    ///
    /// While `AwaitingTap` the flow transitions to `Cancelled` immediately;
    /// releasing the technology request is best-effort cleanup that never
    /// blocks the transition. A no-op before an amount exists, during
    /// `Committing` (too late) and in terminal states.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock();
        let Some(tx) = pending.as_mut() else {
            return;
        };
        match tx.state {
            FlowState::Gated => {
                tx.state = FlowState::Cancelled;
            }
            FlowState::AwaitingTap => {
                tx.state = FlowState::Cancelled;
                tracing::debug!("cancelled while awaiting tap; releasing technology request");
                self.tap.cancel();
            }
            _ => {}
        }
    }

    /// Current state.
    pub fn state(&self) -> FlowState {
        Self::state_of(&self.pending.lock())
    }

    /// Direction of the pending transaction, once one exists.
    pub fn direction(&self) -> Option<Direction> {
        self.pending.lock().as_ref().map(|tx| tx.direction)
    }

    /// Frozen amount of the pending transaction, once one exists.
    pub fn amount(&self) -> Option<Decimal> {
        self.pending.lock().as_ref().map(|tx| tx.amount)
    }

    /// Post-commit balance, once `Completed`.
    pub fn new_balance(&self) -> Option<Decimal> {
        match self.state() {
            FlowState::Completed { new_balance } => Some(new_balance),
            _ => None,
        }
    }

    /// Terminal failure reason, once `Failed`.
    pub fn failure(&self) -> Option<FlowError> {
        match self.state() {
            FlowState::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Time since the pending transaction was created. Diagnostic only.
    pub fn age(&self) -> Option<Duration> {
        self.pending.lock().as_ref().map(|tx| tx.created_at.elapsed())
    }

    fn state_of(pending: &Option<PendingTransaction>) -> FlowState {
        pending
            .as_ref()
            .map(|tx| tx.state.clone())
            .unwrap_or(FlowState::AwaitingAmount)
    }
}
