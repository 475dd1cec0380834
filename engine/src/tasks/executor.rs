// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Executors are polymorphic sinks for [`Invocation`]s.
//!
//! Every thread has a notion of a *current* executor: while an executor runs
//! an invocation it installs itself into a thread-local slot, so code running
//! inside the invocation (most importantly a task continuation capture) can
//! ask "where am I running?". A dedicated thread (a concurrent game-system
//! thread, the window thread) can also install a long-lived thread executor
//! via [`set_this_thread_executor`].
//!
//! There is additionally a single process-wide *default* executor, used for
//! background continuations and as the fallback target wherever no executor
//! was captured. It is an explicit handle with `set`/`get`/`has` and must be
//! torn down during shutdown - never an ambient global mutated from drop
//! glue.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};

/// A small, movable unit of work accepted by an executor.
pub type Invocation = Box<dyn FnOnce() + Send + 'static>;

/// Sink that runs invocations some time later with `current_executor()`
/// pointing at itself. Executors are reference counted; an executor outlives
/// any invocation it accepted.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, invocation: Invocation);
}

pub type ExecutorPtr = Arc<dyn Executor>;

impl std::fmt::Debug for dyn Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Executor")
    }
}

thread_local! {
    static THIS_THREAD_EXECUTOR: RefCell<Option<ExecutorPtr>> =
        const { RefCell::new(None) };
}

static DEFAULT_EXECUTOR: RwLock<Option<ExecutorPtr>> = RwLock::new(None);

/// The executor currently running an invocation on this thread, or the
/// executor installed for this thread, or `None`.
#[must_use]
pub fn current_executor() -> Option<ExecutorPtr> {
    THIS_THREAD_EXECUTOR.with(|slot| slot.borrow().clone())
}

/// Installs a long-lived executor for the calling thread (e.g. the work
/// queue of a concurrent game-system thread). Pass `None` to clear.
pub fn set_this_thread_executor(executor: Option<ExecutorPtr>) {
    THIS_THREAD_EXECUTOR.with(|slot| *slot.borrow_mut() = executor);
}

/// Scope guard that makes `executor` the current one for the duration of an
/// invocation, restoring the previous value (the thread executor, usually)
/// on drop.
pub(crate) struct CurrentExecutorScope {
    prev: Option<ExecutorPtr>,
}

impl CurrentExecutorScope {
    pub(crate) fn enter(executor: ExecutorPtr) -> Self {
        let prev = THIS_THREAD_EXECUTOR
            .with(|slot| slot.borrow_mut().replace(executor));
        Self { prev }
    }
}

impl Drop for CurrentExecutorScope {
    fn drop(&mut self) {
        THIS_THREAD_EXECUTOR
            .with(|slot| *slot.borrow_mut() = self.prev.take());
    }
}

/// Replaces the process-wide default executor. Pass `None` during shutdown
/// after all concurrent containers have been joined.
pub fn set_default_executor(executor: Option<ExecutorPtr>) {
    let mut slot = DEFAULT_EXECUTOR
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    *slot = executor;
}

#[must_use]
pub fn default_executor() -> Option<ExecutorPtr> {
    DEFAULT_EXECUTOR
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}

#[must_use]
pub fn has_default_executor() -> bool { default_executor().is_some() }

/// Runs invocations immediately on the calling thread, with itself installed
/// as the current executor. Fallback wherever no real executor is available
/// (early bootstrap, unit tests).
#[derive(Debug, Default)]
pub struct InlineExecutor;

impl InlineExecutor {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self) }
}

impl Executor for InlineExecutor {
    fn execute(&self, invocation: Invocation) {
        let scope_executor: ExecutorPtr = Arc::new(InlineExecutor);
        let _scope = CurrentExecutorScope::enter(scope_executor);
        invocation();
    }
}

/// Future that reschedules its awaiter onto `executor`. Awaiting an executor
/// is how a task switches threads: resumption happens on the target because
/// the wake-up is delivered as an invocation submitted to it.
#[derive(Debug)]
pub struct YieldToExecutor {
    executor: Option<ExecutorPtr>,
}

impl Future for YieldToExecutor {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.executor.take() {
            Some(executor) => {
                let waker = cx.waker().clone();
                executor.execute(Box::new(move || waker.wake()));
                Poll::Pending
            }
            // Second poll only happens after the wake-up ran on the target.
            None => Poll::Ready(()),
        }
    }
}

/// Switches the awaiting task onto `executor`.
#[must_use]
pub fn yield_to(executor: &ExecutorPtr) -> YieldToExecutor {
    YieldToExecutor {
        executor: Some(executor.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn current_executor_is_scoped_to_the_invocation() {
        assert!(current_executor().is_none());

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_invocation = seen.clone();

        let executor: ExecutorPtr = Arc::new(InlineExecutor);
        executor.execute(Box::new(move || {
            if current_executor().is_some() {
                seen_in_invocation.fetch_add(1, Ordering::SeqCst);
            }
        }));

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(current_executor().is_none());
    }

    #[test]
    fn thread_executor_survives_invocation_scopes() {
        let thread_executor: ExecutorPtr = Arc::new(InlineExecutor);
        set_this_thread_executor(Some(thread_executor.clone()));

        {
            let other: ExecutorPtr = Arc::new(InlineExecutor);
            let _scope = CurrentExecutorScope::enter(other.clone());
            assert!(Arc::ptr_eq(&current_executor().unwrap(), &other));
        }

        assert!(Arc::ptr_eq(
            &current_executor().unwrap(),
            &thread_executor
        ));
        set_this_thread_executor(None);
    }
}
