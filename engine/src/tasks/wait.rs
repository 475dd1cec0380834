// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Blocking waits: park the calling thread until a task resolves.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{EngineError, TaskResult};
use crate::tasks::task::{AnyTask, Task};

/// One-shot thread event.
pub(crate) struct Event {
    signaled: Mutex<bool>,
    cv: Condvar,
}

impl Event {
    pub(crate) fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    pub(crate) fn set(&self) {
        let mut signaled = self
            .signaled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *signaled = true;
        drop(signaled);
        self.cv.notify_all();
    }

    /// Returns `true` when the event was signaled, `false` on timeout.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut signaled = self
            .signaled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match timeout {
            None => {
                while !*signaled {
                    signaled = self
                        .cv
                        .wait(signaled)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                }
                true
            }
            Some(timeout) => {
                let deadline = std::time::Instant::now() + timeout;
                while !*signaled {
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _) = self
                        .cv
                        .wait_timeout(signaled, deadline - now)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    signaled = guard;
                }
                true
            }
        }
    }
}

/// Blocks until `task` is ready or `timeout` elapses. Returns `true` when
/// the task became ready. Never call this from a thread whose executor is
/// needed to resolve `task`.
pub fn wait(task: &AnyTask, timeout: Option<Duration>) -> bool {
    if task.is_ready() {
        return true;
    }

    let event = Arc::new(Event::new());
    let signal = event.clone();
    task.core().set_ready_callback(Box::new(move || signal.set()));

    let became_ready = event.wait(timeout);
    task.core().clear_ready_callback();
    became_ready
}

/// Blocks until `task` is ready, then extracts its result. A timeout is
/// reported as [`EngineError::Timeout`].
pub fn wait_result<T: Send + 'static>(
    task: &Task<T>,
    timeout: Option<Duration>,
) -> TaskResult<T> {
    if !wait(&task.untyped(), timeout) {
        return Err(EngineError::timeout());
    }
    task.take_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::task::TaskSource;

    #[test]
    fn wait_on_ready_task_returns_immediately() {
        let task = Task::resolved(1);
        assert!(wait(&task.untyped(), Some(Duration::ZERO)));
    }

    #[test]
    fn wait_times_out_on_unready_task() {
        let source: TaskSource<()> = TaskSource::new();
        let task = source.task();
        assert!(!wait(&task.untyped(), Some(Duration::from_millis(20))));

        // A late resolve must not see a stale callback.
        source.resolve(());
        assert!(wait(&task.untyped(), None));
    }

    #[test]
    fn wait_result_reports_timeout_as_error() {
        let source: TaskSource<i32> = TaskSource::new();
        let task = source.task();
        let err = wait_result(&task, Some(Duration::from_millis(10))).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn wait_result_returns_value_resolved_elsewhere() {
        let source: TaskSource<i32> = TaskSource::new();
        let task = source.task();

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            source.resolve(99);
        });

        assert_eq!(wait_result(&task, Some(Duration::from_secs(1))).unwrap(), 99);
    }
}
