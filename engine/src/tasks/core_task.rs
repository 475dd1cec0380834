// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The raw single-shot task cell underneath [`Task`](super::Task).
//!
//! The cell is a tagged state machine: a packed flag word tracks readiness
//! and continuation handoff, and two tiny mutex-guarded slots serialize the
//! resolve path and the ready-callback path. The observable contract:
//!
//! - `Ready` transitions exactly once; a resolve attempt after that is a
//!   silent no-op returning `false`.
//! - The continuation fires exactly once, either on the executor captured at
//!   await time or inline on the resolving thread (see
//!   [`CoreTaskState::set_continue_on_captured_executor`]).
//! - The ready-callback fires before the continuation is scheduled, outside
//!   of any cell lock (the callback may recurse into the cell).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::ErrorPtr;
use crate::tasks::diagnostics;
use crate::tasks::executor::{ExecutorPtr, Invocation, current_executor};

const READY: u32 = 1 << 0;
const HAS_CONTINUATION: u32 = 1 << 2;
const CONTINUATION_SCHEDULED: u32 = 1 << 3;

/// An invocation plus the executor captured at the moment the awaiter
/// attached it.
pub struct TaskContinuation {
    pub invocation: Invocation,
    pub executor: Option<ExecutorPtr>,
}

impl std::fmt::Debug for TaskContinuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContinuation")
            .field("has_executor", &self.executor.is_some())
            .finish()
    }
}

/// Handed to the resolver callback; calling [`Rejector::reject_with`] turns
/// the resolution into a rejection.
#[derive(Debug, Default)]
pub struct Rejector {
    error: Option<ErrorPtr>,
}

impl Rejector {
    pub fn reject_with(&mut self, error: ErrorPtr) { self.error = Some(error); }
}

#[derive(Debug)]
pub struct CoreTaskState {
    flags: AtomicU32,
    continue_on_captured_executor: AtomicBool,
    /// Error slot, doubling as the resolve lock: `READY` is published while
    /// this is held, so resolution is serialized.
    error: Mutex<Option<ErrorPtr>>,
    continuation: Mutex<Option<TaskContinuation>>,
    ready_callback: Mutex<Option<InvocationSlot>>,
}

struct InvocationSlot(Invocation);

impl std::fmt::Debug for InvocationSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Invocation")
    }
}

impl Default for CoreTaskState {
    fn default() -> Self { Self::new() }
}

impl CoreTaskState {
    #[must_use]
    pub fn new() -> Self {
        diagnostics::on_task_created();
        Self {
            flags: AtomicU32::new(0),
            continue_on_captured_executor: AtomicBool::new(true),
            error: Mutex::new(None),
            continuation: Mutex::new(None),
            ready_callback: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.flags.load(Ordering::Acquire) & READY != 0
    }

    /// Runs `resolver` and publishes `Ready`, then fires the ready-callback
    /// and attempts to schedule the continuation. Returns `false` without
    /// touching any state when the cell is already resolved.
    ///
    /// `resolver` runs while the resolve lock is held; it must not recurse
    /// into resolution of the same cell.
    pub fn try_resolve_with(&self, resolver: impl FnOnce(&mut Rejector)) -> bool {
        {
            let mut error_slot = lock(&self.error);
            if self.flags.load(Ordering::Acquire) & READY != 0 {
                return false;
            }

            let mut rejector = Rejector::default();
            resolver(&mut rejector);
            *error_slot = rejector.error;

            let prev = self.flags.fetch_or(READY, Ordering::Release);
            debug_assert_eq!(prev & READY, 0, "Ready flag set twice");
        }

        self.invoke_ready_callback();
        self.try_schedule_continuation();
        true
    }

    pub fn try_reject_with(&self, error: ErrorPtr) -> bool {
        self.try_resolve_with(|rejector| rejector.reject_with(error))
    }

    /// Valid only after the cell is ready.
    #[must_use]
    pub fn error(&self) -> Option<ErrorPtr> {
        debug_assert!(self.is_ready(), "error is observable only after Ready");
        lock(&self.error).clone()
    }

    /// Records the continuation; schedules it right away when the cell is
    /// already ready. Attaching a second continuation is a contract
    /// violation.
    pub fn set_continuation(&self, mut continuation: TaskContinuation) {
        if !self.continue_on_captured_executor.load(Ordering::Acquire) {
            // Checked again at scheduling time, but the executor reference
            // can be released right away.
            continuation.executor = None;
        }

        {
            let mut slot = lock(&self.continuation);
            debug_assert!(slot.is_none(), "task continuation already attached");
            if continuation.executor.is_some() {
                diagnostics::on_executor_captured();
            }
            *slot = Some(continuation);
        }

        let prev = self.flags.fetch_or(HAS_CONTINUATION, Ordering::Release);
        debug_assert_eq!(prev & HAS_CONTINUATION, 0);

        self.try_schedule_continuation();
    }

    #[must_use]
    pub fn has_continuation(&self) -> bool {
        self.flags.load(Ordering::Acquire) & HAS_CONTINUATION != 0
    }

    #[must_use]
    pub fn has_captured_executor(&self) -> bool {
        lock(&self.continuation)
            .as_ref()
            .is_some_and(|continuation| continuation.executor.is_some())
    }

    /// Must be called before the continuation is attached. `false` means the
    /// continuation runs inline on the resolving thread instead of bouncing
    /// back to the captured executor.
    pub fn set_continue_on_captured_executor(&self, value: bool) {
        debug_assert_eq!(
            self.flags.load(Ordering::Acquire)
                & (HAS_CONTINUATION | CONTINUATION_SCHEDULED),
            0,
            "cannot change continue-on-captured-executor after the \
             continuation is attached"
        );
        self.continue_on_captured_executor
            .store(value, Ordering::Release);
    }

    #[must_use]
    pub fn is_continue_on_captured_executor(&self) -> bool {
        self.continue_on_captured_executor.load(Ordering::Acquire)
    }

    /// Stores the one-shot ready-callback, or invokes `callback` immediately
    /// (outside the lock) when the cell is already ready.
    pub fn set_ready_callback(&self, callback: Invocation) {
        let run_now = {
            let mut slot = lock(&self.ready_callback);
            if self.is_ready() {
                Some(callback)
            } else {
                debug_assert!(slot.is_none(), "ready callback already set");
                *slot = Some(InvocationSlot(callback));
                None
            }
        };

        if let Some(callback) = run_now {
            callback();
        }
    }

    /// Drops a stored ready-callback, if any. Used by aggregate awaiters
    /// when they reset their input lists.
    pub fn clear_ready_callback(&self) {
        lock(&self.ready_callback).take();
    }

    fn invoke_ready_callback(&self) {
        let callback = lock(&self.ready_callback).take();
        if let Some(InvocationSlot(callback)) = callback {
            callback();
        }
    }

    /// On the first observation of `Ready ∧ HasContinuation`, atomically
    /// claims `ContinuationScheduled` and hands the continuation off.
    fn try_schedule_continuation(&self) {
        const READY_WITH_CONTINUATION: u32 = READY | HAS_CONTINUATION;

        let mut flags = self.flags.load(Ordering::Acquire);
        if flags & READY_WITH_CONTINUATION != READY_WITH_CONTINUATION {
            return;
        }

        loop {
            if flags & CONTINUATION_SCHEDULED != 0 {
                return;
            }
            match self.flags.compare_exchange_weak(
                flags,
                flags | CONTINUATION_SCHEDULED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => flags = actual,
            }
        }

        let Some(continuation) = lock(&self.continuation).take() else {
            debug_assert!(false, "scheduled continuation is missing");
            return;
        };
        if continuation.executor.is_some() {
            diagnostics::on_executor_released();
        }

        let executor = continuation.executor.or_else(current_executor);
        let continue_on_captured =
            self.continue_on_captured_executor.load(Ordering::Acquire);

        // BE AWARE: right after the submit below, the resuming awaiter may
        // drop the last reference to this cell. No field of `self` may be
        // touched past this point.
        match executor {
            Some(executor) if continue_on_captured => {
                executor.execute(continuation.invocation);
            }
            _ => (continuation.invocation)(),
        }
    }
}

impl Drop for CoreTaskState {
    fn drop(&mut self) {
        if let Some(continuation) = self.continuation.get_mut().ok().and_then(Option::take)
            && continuation.executor.is_some()
        {
            diagnostics::on_executor_released();
        }
        diagnostics::on_task_destroyed();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
