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

//! Serialization and race tests.
//!
//! The ledger mutex is the belt, the flow's state-check guard the
//! suspenders: these tests overlap tap windows, race cancels against taps,
//! and hammer `apply` from many threads to check that mutations behave as if
//! strictly sequential. Lock cycles are watched by parking_lot's deadlock
//! detector.

use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use spendy_card_rs::{ChannelTap, ConfirmationFlow, Direction, FlowState, Ledger};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

fn spawn_confirm(
    flow: &Arc<ConfirmationFlow<ChannelTap>>,
) -> tokio::task::JoinHandle<FlowState> {
    tokio::spawn({
        let flow = Arc::clone(flow);
        async move { flow.confirm_tap().await }
    })
}

async fn yield_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

/// Spend $5 and Reload $3 with overlapping tap windows, resolved
/// spend-first: the final balance is $8 and the intermediate read matches
/// strictly sequential application.
#[tokio::test]
async fn overlapping_flows_apply_in_resolution_order() {
    let ledger = Arc::new(Ledger::new(dec!(10.00)).unwrap());
    let tap_a = ChannelTap::new();
    let tap_b = ChannelTap::new();
    let flow_a = Arc::new(ConfirmationFlow::new(Arc::clone(&ledger), tap_a.clone()));
    let flow_b = Arc::new(ConfirmationFlow::new(Arc::clone(&ledger), tap_b.clone()));

    flow_a.start(Direction::Spend, dec!(5.00)).unwrap();
    flow_b.start(Direction::Reload, dec!(3.00)).unwrap();

    let handle_a = spawn_confirm(&flow_a);
    let handle_b = spawn_confirm(&flow_b);
    yield_until(|| {
        flow_a.state() == FlowState::AwaitingTap && flow_b.state() == FlowState::AwaitingTap
    })
    .await;

    // Both windows are open; nothing has committed yet.
    assert_eq!(ledger.read(), dec!(10.00));

    tap_a.complete();
    yield_until(|| flow_a.state().is_terminal()).await;
    assert_eq!(ledger.read(), dec!(5.00));

    tap_b.complete();
    assert_eq!(
        handle_a.await.unwrap(),
        FlowState::Completed {
            new_balance: dec!(5.00)
        }
    );
    assert_eq!(
        handle_b.await.unwrap(),
        FlowState::Completed {
            new_balance: dec!(8.00)
        }
    );
    assert_eq!(ledger.read(), dec!(8.00));
}

/// A cancel racing a resolving tap ends in exactly one of the two outcomes,
/// with the balance consistent with the terminal state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_vs_tap_race_is_consistent() {
    for _ in 0..50 {
        let ledger = Arc::new(Ledger::new(dec!(24.00)).unwrap());
        let tap = ChannelTap::new();
        let flow = Arc::new(ConfirmationFlow::new(Arc::clone(&ledger), tap.clone()));
        flow.start(Direction::Spend, dec!(10.00)).unwrap();

        let handle = spawn_confirm(&flow);
        yield_until(|| flow.state() == FlowState::AwaitingTap).await;

        let canceller = tokio::spawn({
            let flow = Arc::clone(&flow);
            async move { flow.cancel() }
        });
        tap.complete();

        let state = handle.await.unwrap();
        canceller.await.unwrap();

        match state {
            FlowState::Completed { new_balance } => {
                assert_eq!(new_balance, dec!(14.00));
                assert_eq!(ledger.read(), dec!(14.00));
            }
            FlowState::Cancelled => {
                assert_eq!(ledger.read(), dec!(24.00));
            }
            other => panic!("unexpected terminal state: {other:?}"),
        }
    }
}

/// Many threads hammering `apply`: the final balance equals the initial
/// balance plus the net of the applies that reported success.
#[test]
fn contended_apply_nets_out_exactly() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(Ledger::new(dec!(1000.00)).unwrap());

    const NUM_THREADS: usize = 50;
    const OPS_PER_THREAD: usize = 200;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let ledger = Arc::clone(&ledger);

        let handle = thread::spawn(move || {
            let mut net = Decimal::ZERO;
            for i in 0..OPS_PER_THREAD {
                match (thread_id + i) % 3 {
                    0 => {
                        if ledger.apply(Direction::Reload, dec!(0.75)).is_ok() {
                            net += dec!(0.75);
                        }
                    }
                    1 => {
                        // May fail with InsufficientFunds under contention.
                        if ledger.apply(Direction::Spend, dec!(1.25)).is_ok() {
                            net -= dec!(1.25);
                        }
                    }
                    _ => {
                        let balance = ledger.read();
                        assert!(balance >= Decimal::ZERO);
                    }
                }
            }
            net
        });

        handles.push(handle);
    }

    let mut expected = dec!(1000.00);
    for handle in handles {
        expected += handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(ledger.read(), expected);
    assert!(ledger.read() >= Decimal::ZERO);
}

/// Whole flows (not just applies) racing from many tasks: every completed
/// flow's delta is reflected exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_overlapping_flows_commit_exactly_once_each() {
    let ledger = Arc::new(Ledger::new(dec!(100.00)).unwrap());

    const FLOWS: usize = 40;

    let mut flows = Vec::with_capacity(FLOWS);
    let mut handles = Vec::with_capacity(FLOWS);

    for i in 0..FLOWS {
        let tap = ChannelTap::new();
        let flow = Arc::new(ConfirmationFlow::new(Arc::clone(&ledger), tap.clone()));
        let direction = if i % 2 == 0 {
            Direction::Reload
        } else {
            Direction::Spend
        };
        flow.start(direction, dec!(1.00)).unwrap();
        handles.push(spawn_confirm(&flow));
        flows.push((flow, tap));
    }

    yield_until(|| flows.iter().all(|(flow, _)| flow.state() == FlowState::AwaitingTap)).await;

    // Resolve every other flow; cancel the rest.
    for (i, (flow, tap)) in flows.iter().enumerate() {
        if i % 4 < 2 {
            tap.complete();
        } else {
            flow.cancel();
        }
    }

    let mut net = Decimal::ZERO;
    for (handle, (flow, _)) in handles.into_iter().zip(&flows) {
        let state = handle.await.unwrap();
        if let FlowState::Completed { .. } = state {
            match flow.direction().unwrap() {
                Direction::Reload => net += dec!(1.00),
                Direction::Spend => net -= dec!(1.00),
            }
        }
    }

    assert_eq!(ledger.read(), dec!(100.00) + net);
}
