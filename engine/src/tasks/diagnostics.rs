// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Process-wide task bookkeeping.
//!
//! A task that still holds a captured executor at process exit is a shutdown
//! bug: its continuation can never run once the executor is torn down. The
//! counters here are cheap enough to keep in release builds and are reported
//! by [`report_alive_tasks`] during runtime shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};

static ALIVE_TASKS: AtomicUsize = AtomicUsize::new(0);
static TASKS_WITH_CAPTURED_EXECUTOR: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn on_task_created() { ALIVE_TASKS.fetch_add(1, Ordering::Relaxed); }

pub(crate) fn on_task_destroyed() { ALIVE_TASKS.fetch_sub(1, Ordering::Relaxed); }

pub(crate) fn on_executor_captured() {
    TASKS_WITH_CAPTURED_EXECUTOR.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn on_executor_released() {
    TASKS_WITH_CAPTURED_EXECUTOR.fetch_sub(1, Ordering::Relaxed);
}

#[must_use]
pub fn alive_task_count() -> usize { ALIVE_TASKS.load(Ordering::Relaxed) }

#[must_use]
pub fn alive_tasks_with_captured_executor() -> usize {
    TASKS_WITH_CAPTURED_EXECUTOR.load(Ordering::Relaxed)
}

#[must_use]
pub fn has_alive_tasks_with_captured_executor() -> bool {
    alive_tasks_with_captured_executor() > 0
}

/// Logs a report about tasks that are still alive. Intended to be called at
/// process exit, after executors have been drained.
pub fn report_alive_tasks() {
    let captured = alive_tasks_with_captured_executor();
    if captured == 0 {
        tracing::debug!(target: "task", "no alive tasks with captured executor");
    } else {
        tracing::warn!(
            target: "task",
            count = captured,
            "tasks still holding a captured executor at shutdown"
        );
    }
}
