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

//! Tap signal source.
//!
//! Abstraction over platform NFC tag detection. The confirmation flow treats
//! a resolved tap purely as a boolean success signal; tag contents are never
//! inspected and nothing about the tag is authenticated.
//!
//! [`ChannelTap`] is the bridge implementation: the platform side (an NFC
//! event callback, or a test) holds a clone and resolves the pending wait
//! with [`ChannelTap::complete`] or [`ChannelTap::fail`].

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;

/// A detected tap. Opaque: a successful wait is the whole signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapEvent;

/// Why a tap wait did not resolve with a tap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TapError {
    /// The pending technology request was cancelled or abandoned
    #[error("tap request cancelled")]
    Cancelled,

    /// The platform reported an error other than cancel
    #[error("tap technology error: {0}")]
    Failed(String),
}

/// Source of tap signals.
///
/// `begin` registers one technology request and returns the future that
/// resolves on detection; `cancel` abandons a pending request. `cancel` is
/// best-effort: it must not panic and is idempotent.
pub trait TapSource {
    /// The in-flight wait for one tap.
    type Wait: Future<Output = Result<TapEvent, TapError>> + Send;

    /// Starts listening for the next tap and returns the wait.
    ///
    /// At most one request is live at a time; beginning a new one abandons
    /// any stale previous request.
    fn begin(&self) -> Self::Wait;

    /// Releases the pending technology request, resolving the wait as
    /// cancelled. No-op when nothing is pending.
    fn cancel(&self);
}

type TapSender = oneshot::Sender<Result<TapEvent, TapError>>;

/// Channel-backed tap source.
///
/// Clones share one pending request slot: the flow side calls
/// [`TapSource::begin`]/[`TapSource::cancel`], the platform side resolves via
/// [`ChannelTap::complete`], [`ChannelTap::fail`] or [`ChannelTap::abandon`].
#[derive(Debug, Clone, Default)]
pub struct ChannelTap {
    pending: Arc<Mutex<Option<TapSender>>>,
}

impl ChannelTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a wait is registered and unresolved.
    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Resolves the pending wait as a successful tap.
    ///
    /// A tap with no listener is dropped silently, matching platform NFC
    /// behavior for tags discovered outside a session.
    pub fn complete(&self) {
        self.resolve(Ok(TapEvent));
    }

    /// Resolves the pending wait with a technology error.
    pub fn fail(&self, message: impl Into<String>) {
        self.resolve(Err(TapError::Failed(message.into())));
    }

    /// Drops the pending request without resolving it explicitly; the wait
    /// side observes this as a cancel.
    pub fn abandon(&self) {
        let dropped = self.pending.lock().take();
        if dropped.is_some() {
            tracing::debug!("tap request abandoned");
        }
    }

    fn resolve(&self, outcome: Result<TapEvent, TapError>) {
        if let Some(sender) = self.pending.lock().take() {
            // The receiver may already be gone; nothing left to signal then.
            let _ = sender.send(outcome);
        }
    }
}

impl TapSource for ChannelTap {
    type Wait = TapWait;

    fn begin(&self) -> TapWait {
        let (tx, rx) = oneshot::channel();
        // Replacing a stale sender drops it, which resolves any forgotten
        // previous wait as cancelled.
        let stale = self.pending.lock().replace(tx);
        if stale.is_some() {
            tracing::debug!("stale tap request replaced");
        }
        TapWait { rx }
    }

    fn cancel(&self) {
        if let Some(sender) = self.pending.lock().take() {
            tracing::debug!("tap request cancelled");
            let _ = sender.send(Err(TapError::Cancelled));
        }
    }
}

/// The wait for one tap. A dropped sender reads as cancelled.
#[derive(Debug)]
pub struct TapWait {
    rx: oneshot::Receiver<Result<TapEvent, TapError>>,
}

impl Future for TapWait {
    type Output = Result<TapEvent, TapError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TapError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
