// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Deadline timer behind [`delay`] and timed [`Expiration`]s.
//!
//! One dedicated thread sleeps until the earliest registered deadline and
//! fires entries as they come due. Tearing the manager down rejects every
//! pending delay task - consumers that must keep running across shutdown
//! (the concurrent game-system loop) treat that rejection as a wake-up, not
//! a failure.
//!
//! [`Expiration`]: super::Expiration

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, RwLock, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::EngineError;
use crate::tasks::expiration::ExpirationState;
use crate::tasks::task::{Task, TaskSource};

static TIMER_MANAGER: RwLock<Option<Arc<TimerManager>>> = RwLock::new(None);

/// Installs the process-wide timer manager. Pass `None` during shutdown
/// (this stops the timer thread and rejects pending delays).
pub fn set_timer_manager(manager: Option<Arc<TimerManager>>) {
    let previous = {
        let mut slot = TIMER_MANAGER
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::replace(&mut *slot, manager)
    };
    if let Some(previous) = previous {
        previous.stop();
    }
}

#[must_use]
pub fn timer_manager() -> Option<Arc<TimerManager>> {
    TIMER_MANAGER
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}

/// Task that resolves after `duration`. Without an installed timer manager
/// the task is rejected immediately.
#[must_use]
pub fn delay(duration: Duration) -> Task<()> {
    match timer_manager() {
        Some(manager) => manager.delay(duration),
        None => {
            tracing::warn!(target: "task", "delay requested without a timer manager");
            Task::rejected(EngineError::cancelled("no timer manager installed"))
        }
    }
}

pub struct TimerManager {
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

struct TimerShared {
    state: Mutex<TimerState>,
    cv: Condvar,
}

struct TimerState {
    entries: BinaryHeap<TimerEntry>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    kind: TimerEntryKind,
}

enum TimerEntryKind {
    Delay(TaskSource<()>),
    Trip(Weak<ExpirationState>),
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    // Reversed: BinaryHeap is a max-heap, the earliest deadline must win.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl TimerManager {
    #[must_use]
    pub fn start() -> Arc<Self> {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                entries: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            cv: Condvar::new(),
        });

        let worker_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("pulse-timer".into())
            .spawn(move || timer_loop(&worker_shared))
            .ok();

        Arc::new(Self {
            shared,
            thread: Mutex::new(thread),
        })
    }

    #[must_use]
    pub fn delay(&self, duration: Duration) -> Task<()> {
        let source = TaskSource::new();
        let task = source.task();
        self.push(Instant::now() + duration, TimerEntryKind::Delay(source));
        task
    }

    pub(crate) fn register_trip(
        &self,
        deadline: Instant,
        state: &Arc<ExpirationState>,
    ) {
        self.push(deadline, TimerEntryKind::Trip(Arc::downgrade(state)));
    }

    fn push(&self, deadline: Instant, kind: TimerEntryKind) {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.shutdown {
            drop(state);
            fire(TimerEntry { deadline, seq: 0, kind }, true);
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.push(TimerEntry { deadline, seq, kind });
        drop(state);
        self.shared.cv.notify_all();
    }

    /// Stops the timer thread and rejects all pending delays.
    pub fn stop(&self) {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state.shutdown = true;
            drop(state);
            self.shared.cv.notify_all();
        }
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.thread().id() != std::thread::current().id() {
                let _join_result = thread.join();
            }
        }
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) { self.stop(); }
}

impl std::fmt::Debug for TimerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TimerManager")
    }
}

fn timer_loop(shared: &TimerShared) {
    let mut state = shared
        .state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    loop {
        if state.shutdown {
            break;
        }

        let now = Instant::now();
        match state.entries.peek() {
            None => {
                state = shared
                    .cv
                    .wait(state)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            }
            Some(entry) if entry.deadline > now => {
                let sleep = entry.deadline - now;
                let (guard, _) = shared
                    .cv
                    .wait_timeout(state, sleep)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                state = guard;
            }
            Some(_) => {
                let Some(entry) = state.entries.pop() else { continue };
                drop(state);
                fire(entry, false);
                state = shared
                    .state
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            }
        }
    }

    // Reject everything left so awaiters are not stranded.
    let leftovers = std::mem::take(&mut state.entries);
    drop(state);
    for entry in leftovers {
        fire(entry, true);
    }
}

fn fire(entry: TimerEntry, cancelled: bool) {
    match entry.kind {
        TimerEntryKind::Delay(source) => {
            if cancelled {
                source.reject(EngineError::cancelled("timer manager was shut down"));
            } else {
                source.resolve(());
            }
        }
        TimerEntryKind::Trip(state) => {
            // A tripped-by-teardown expiration still counts as expired.
            if let Some(state) = state.upgrade() {
                state.trip();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::wait_result;

    #[test]
    fn delay_resolves_after_roughly_the_requested_time() {
        let manager = TimerManager::start();
        let started = Instant::now();
        let task = manager.delay(Duration::from_millis(30));

        wait_result(&task, Some(Duration::from_secs(5))).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(25));
        manager.stop();
    }

    #[test]
    fn delays_fire_in_deadline_order() {
        let manager = TimerManager::start();
        let slow = manager.delay(Duration::from_millis(60));
        let fast = manager.delay(Duration::from_millis(10));

        wait_result(&fast, Some(Duration::from_secs(5))).unwrap();
        assert!(!slow.is_ready());
        wait_result(&slow, Some(Duration::from_secs(5))).unwrap();
        manager.stop();
    }

    #[test]
    fn stop_rejects_pending_delays() {
        let manager = TimerManager::start();
        let task = manager.delay(Duration::from_secs(3600));
        manager.stop();

        let err = wait_result(&task, Some(Duration::from_secs(5))).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn delay_after_stop_is_rejected_immediately() {
        let manager = TimerManager::start();
        manager.stop();
        let task = manager.delay(Duration::from_millis(1));
        assert!(task.is_rejected());
    }
}
