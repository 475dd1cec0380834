// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! FIFO work-queue executor drained by its owning thread.
//!
//! Enqueue is multi-producer; [`WorkQueueExecutor::poll`] is single-consumer
//! and must only be called from the thread that owns the queue (asserted in
//! debug builds). [`WorkQueueExecutor::notify`] wakes a blocked `poll`
//! without delivering work - the shutdown escape hatch.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crate::tasks::executor::{CurrentExecutorScope, Executor, Invocation};

pub struct WorkQueueExecutor {
    state: Mutex<QueueState>,
    cv: Condvar,
    owner: Mutex<Option<ThreadId>>,
    self_ref: Weak<WorkQueueExecutor>,
}

struct QueueState {
    queue: VecDeque<Invocation>,
    notified: bool,
}

impl WorkQueueExecutor {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                notified: false,
            }),
            cv: Condvar::new(),
            owner: Mutex::new(None),
            self_ref: self_ref.clone(),
        })
    }

    /// Drains the queue on the calling thread.
    ///
    /// - `Some(0)`: drains whatever is currently enqueued and returns
    ///   immediately.
    /// - `Some(timeout)`: waits up to `timeout` for the first invocation
    ///   (or a [`notify`](Self::notify)), then drains.
    /// - `None`: blocks until an enqueue or a `notify`.
    pub fn poll(&self, timeout: Option<Duration>) {
        self.assert_owner_thread();

        let batch: Vec<Invocation> = {
            let mut state = lock(&self.state);
            match timeout {
                Some(timeout) if timeout.is_zero() => {}
                Some(timeout) => {
                    let deadline = Instant::now() + timeout;
                    while state.queue.is_empty() && !state.notified {
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        let (guard, wait_result) = self
                            .cv
                            .wait_timeout(state, deadline - now)
                            .unwrap_or_else(std::sync::PoisonError::into_inner);
                        state = guard;
                        if wait_result.timed_out() {
                            break;
                        }
                    }
                }
                None => {
                    while state.queue.is_empty() && !state.notified {
                        state = self
                            .cv
                            .wait(state)
                            .unwrap_or_else(std::sync::PoisonError::into_inner);
                    }
                }
            }
            state.notified = false;
            state.queue.drain(..).collect()
        };

        if batch.is_empty() {
            return;
        }

        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let _scope = CurrentExecutorScope::enter(this);
        for invocation in batch {
            invocation();
        }
    }

    /// Wakes a blocked [`poll`](Self::poll) without delivering work.
    pub fn notify(&self) {
        let mut state = lock(&self.state);
        state.notified = true;
        drop(state);
        self.cv.notify_all();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.state).queue.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize { lock(&self.state).queue.len() }

    fn assert_owner_thread(&self) {
        if cfg!(debug_assertions) {
            let mut owner = self
                .owner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let current = std::thread::current().id();
            match *owner {
                None => *owner = Some(current),
                Some(recorded) => debug_assert_eq!(
                    recorded, current,
                    "poll must only be called from the owning thread"
                ),
            }
        }
    }
}

impl Executor for WorkQueueExecutor {
    fn execute(&self, invocation: Invocation) {
        let mut state = lock(&self.state);
        state.queue.push_back(invocation);
        drop(state);
        self.cv.notify_one();
    }
}

impl std::fmt::Debug for WorkQueueExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueueExecutor")
            .field("len", &self.len())
            .finish()
    }
}

fn lock(mutex: &Mutex<QueueState>) -> std::sync::MutexGuard<'_, QueueState> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
