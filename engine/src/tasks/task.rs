// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Typed task façade over the [`CoreTaskState`] cell.
//!
//! A [`Task`] is a single-shot future: it carries either a value of `T` or a
//! shared [`ErrorPtr`]. Awaiting a task that is not yet ready stashes a
//! resume-continuation in the cell and returns control to the executor; by
//! default the resumption is bounced back to the executor captured at await
//! time (see the end-to-end tests for the exact handoff semantics).
//!
//! [`TaskSource`] is the producer side; `resolve`/`reject` are single-shot.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use crate::error::{EngineError, ErrorPtr, TaskResult};
use crate::tasks::core_task::{CoreTaskState, TaskContinuation};
use crate::tasks::executor::current_executor;

pub(crate) struct TaskState<T> {
    pub(crate) core: CoreTaskState,
    value: Mutex<Option<T>>,
}

/// Type-erased view of a task, used by aggregate awaiters and blocking
/// waits that do not care about the payload type.
#[derive(Clone)]
pub struct AnyTask {
    state: Arc<dyn UntypedTaskState>,
}

pub(crate) trait UntypedTaskState: Send + Sync {
    fn core(&self) -> &CoreTaskState;
}

impl<T: Send + 'static> UntypedTaskState for TaskState<T> {
    fn core(&self) -> &CoreTaskState { &self.core }
}

impl AnyTask {
    #[must_use]
    pub fn is_ready(&self) -> bool { self.state.core().is_ready() }

    pub(crate) fn core(&self) -> &CoreTaskState { self.state.core() }
}

impl std::fmt::Debug for AnyTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyTask")
            .field("is_ready", &self.is_ready())
            .finish()
    }
}

/// Typed handle around a task cell. Consume it by awaiting (inside a
/// spawned future) or via [`wait_result`](super::wait_result).
pub struct Task<T> {
    state: Arc<TaskState<T>>,
    /// `Future::poll` may be called again before completion; the
    /// continuation must only be attached once per cell.
    continuation_installed: bool,
}

impl<T: Send + 'static> Task<T> {
    /// A task that is already ready with `value`.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        let task = Self::new();
        task.state
            .core
            .try_resolve_with(|_| *lock(&task.state.value) = Some(value));
        task
    }

    /// A task that is already rejected with `error`.
    #[must_use]
    pub fn rejected(error: ErrorPtr) -> Self {
        let task = Self::new();
        task.state.core.try_reject_with(error);
        task
    }

    fn new() -> Self {
        Self {
            state: Arc::new(TaskState {
                core: CoreTaskState::new(),
                value: Mutex::new(None),
            }),
            continuation_installed: false,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool { self.state.core.is_ready() }

    /// Valid only after the task is ready.
    #[must_use]
    pub fn error(&self) -> Option<ErrorPtr> { self.state.core.error() }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.is_ready() && self.state.core.error().is_some()
    }

    /// Controls whether the awaiter resumes on the executor captured at
    /// await time (`true`, the default) or inline on the resolving thread.
    /// Must be called before the task is awaited.
    pub fn set_continue_on_captured_executor(&self, value: bool) {
        self.state.core.set_continue_on_captured_executor(value);
    }

    /// Drops the handle without awaiting; the producer side keeps the cell
    /// alive until resolution.
    pub fn detach(self) { drop(self); }

    /// Type-erased view for aggregate awaiters / blocking waits.
    #[must_use]
    pub fn untyped(&self) -> AnyTask {
        AnyTask {
            state: self.state.clone(),
        }
    }

    /// Extracts the result of a ready task. The payload can be taken only
    /// once; a second extraction reports a contract violation.
    pub fn take_result(&self) -> TaskResult<T> {
        debug_assert!(self.is_ready(), "result is observable only after Ready");
        if let Some(error) = self.state.core.error() {
            return Err(error);
        }
        match lock(&self.state.value).take() {
            Some(value) => Ok(value),
            None => Err(EngineError::contract_violation(
                "task result was already consumed",
            )),
        }
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("is_ready", &self.state.core.is_ready())
            .finish()
    }
}

impl<T: Send + 'static> Future for Task<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.state.core.is_ready() {
            return Poll::Ready(this.take_result());
        }

        if !this.continuation_installed {
            this.continuation_installed = true;
            let waker = cx.waker().clone();
            this.state.core.set_continuation(TaskContinuation {
                invocation: Box::new(move || waker.wake()),
                executor: current_executor(),
            });
            // If the task resolved in between, set_continuation scheduled
            // the wake-up already; the harness will poll again.
        }

        Poll::Pending
    }
}

/// Producer handle paired with a [`Task`]. Resolution is single-shot: the
/// first `resolve`/`reject` wins, later calls return `false`.
pub struct TaskSource<T> {
    state: Arc<TaskState<T>>,
    task_taken: AtomicBool,
}

impl<T: Send + 'static> TaskSource<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(TaskState {
                core: CoreTaskState::new(),
                value: Mutex::new(None),
            }),
            task_taken: AtomicBool::new(false),
        }
    }

    /// The consumer-side task. May be taken once.
    #[must_use]
    pub fn task(&self) -> Task<T> {
        let taken = self.task_taken.swap(true, Ordering::AcqRel);
        debug_assert!(!taken, "task was already taken from this source");
        Task {
            state: self.state.clone(),
            continuation_installed: false,
        }
    }

    pub fn resolve(&self, value: T) -> bool {
        self.state
            .core
            .try_resolve_with(|_| *lock(&self.state.value) = Some(value))
    }

    pub fn reject(&self, error: ErrorPtr) -> bool {
        self.state.core.try_reject_with(error)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool { self.state.core.is_ready() }
}

impl<T: Send + 'static> Default for TaskSource<T> {
    fn default() -> Self { Self::new() }
}

impl<T> std::fmt::Debug for TaskSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSource")
            .field("is_ready", &self.state.core.is_ready())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_task_yields_its_value() {
        let task = Task::resolved(42);
        assert!(task.is_ready());
        assert!(task.error().is_none());
        assert_eq!(task.take_result().unwrap(), 42);
    }

    #[test]
    fn rejected_task_yields_its_error() {
        let task: Task<i32> = Task::rejected(EngineError::rejected("nope"));
        assert!(task.is_ready());
        assert!(task.is_rejected());
        let err = task.take_result().unwrap_err();
        assert!(matches!(*err, EngineError::Rejected(_)));
    }

    #[test]
    fn source_resolution_is_single_shot() {
        let source = TaskSource::new();
        let task = source.task();

        assert!(source.resolve(1));
        assert!(!source.resolve(2));
        assert!(!source.reject(EngineError::rejected("late")));

        assert_eq!(task.take_result().unwrap(), 1);
    }

    #[test]
    fn result_can_be_taken_only_once() {
        let task = Task::resolved("hello".to_owned());
        assert_eq!(task.take_result().unwrap(), "hello");

        let err = task.take_result().unwrap_err();
        assert!(matches!(*err, EngineError::ContractViolation(_)));
    }

    #[test]
    fn source_resolves_from_another_thread() {
        let source = TaskSource::new();
        let task = source.task();

        let producer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            source.resolve("done".to_owned())
        });

        assert!(crate::tasks::wait(&task.untyped(), None));
        assert_eq!(task.take_result().unwrap(), "done");
        assert!(producer.join().unwrap());
    }
}
