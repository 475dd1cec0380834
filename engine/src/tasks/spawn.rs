// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Drives engine futures on an [`Executor`](super::Executor).
//!
//! The harness is the systems-language rendition of a coroutine frame: the
//! future lives in a mutex slot and is re-polled whenever its waker fires.
//! The waker polls *inline* - the thread an invocation wakes up on is chosen
//! by the task cell (captured executor vs resolving thread), not by the
//! waker itself. That keeps the continuation-handoff policy in exactly one
//! place.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::task::{Context, Poll, Wake, Waker};

use crate::error::TaskResult;
use crate::tasks::executor::ExecutorPtr;
use crate::tasks::task::{Task, TaskSource};

type BoxedTaskFuture<T> = Pin<Box<dyn Future<Output = TaskResult<T>> + Send>>;

/// Spawns `future` onto `executor` and returns the task that resolves with
/// its output. The future is first polled from an invocation on `executor`,
/// so `current_executor()` inside the future reports `executor` and awaited
/// tasks capture it.
pub fn spawn_on<T, F>(executor: ExecutorPtr, future: F) -> Task<T>
where
    T: Send + 'static,
    F: Future<Output = TaskResult<T>> + Send + 'static,
{
    let source = TaskSource::new();
    let task = source.task();

    let harness = Arc::new(SpawnHarness {
        future: Mutex::new(Some(Box::pin(future) as BoxedTaskFuture<T>)),
        source,
        repoll: AtomicBool::new(false),
    });

    executor.execute(Box::new(move || harness.poll_now()));
    task
}

struct SpawnHarness<T: Send + 'static> {
    future: Mutex<Option<BoxedTaskFuture<T>>>,
    source: TaskSource<T>,
    /// A wake-up arrived while another thread (or an outer frame on this
    /// thread) was mid-poll; that poller owes us another pass.
    repoll: AtomicBool,
}

impl<T: Send + 'static> SpawnHarness<T> {
    fn poll_now(self: &Arc<Self>) {
        loop {
            let mut slot = match self.future.try_lock() {
                Ok(slot) => slot,
                Err(TryLockError::WouldBlock) => {
                    // Someone else is polling; make them go around again.
                    self.repoll.store(true, Ordering::SeqCst);
                    return;
                }
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };
            self.repoll.store(false, Ordering::SeqCst);

            let Some(future) = slot.as_mut() else {
                return; // Already completed.
            };

            let waker = Waker::from(Arc::clone(self));
            let mut cx = Context::from_waker(&waker);
            match future.as_mut().poll(&mut cx) {
                Poll::Ready(result) => {
                    *slot = None;
                    drop(slot);
                    match result {
                        Ok(value) => {
                            self.source.resolve(value);
                        }
                        Err(error) => {
                            self.source.reject(error);
                        }
                    }
                    return;
                }
                Poll::Pending => {
                    drop(slot);
                    if !self.repoll.swap(false, Ordering::SeqCst) {
                        return;
                    }
                    // A wake raced in while we were polling; go again.
                }
            }
        }
    }
}

impl<T: Send + 'static> Wake for SpawnHarness<T> {
    fn wake(self: Arc<Self>) { self.poll_now(); }

    fn wake_by_ref(self: &Arc<Self>) { self.poll_now(); }
}
