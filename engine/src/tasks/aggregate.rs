// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Aggregate awaiters: [`when_all`] and [`when_any`].
//!
//! Both return `Task<bool>`: `true` when the condition was met before the
//! expiration tripped, `false` otherwise. Input errors are treated as normal
//! completions - an aggregate only reports `false` for its *own* timeout.
//!
//! The shared awaiter state releases every input reference and clears every
//! ready-callback *before* resolving its own task source. Without that
//! ordering the awaiter's resumption could observe inputs that still carry
//! callbacks into freed state.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::tasks::expiration::{Expiration, ExpirationSubscription};
use crate::tasks::task::{AnyTask, Task, TaskSource};

const COMPLETION_NONE: u8 = 0;
const COMPLETION_TRUE: u8 = 1;
const COMPLETION_FALSE: u8 = 2;

struct AwaiterState {
    counter: AtomicUsize,
    completion: AtomicU8,
    inputs: Mutex<Vec<AnyTask>>,
    source: TaskSource<bool>,
    subscription: Mutex<Option<ExpirationSubscription>>,
}

impl AwaiterState {
    fn new(inputs: Vec<AnyTask>, counter: usize) -> Arc<Self> {
        Arc::new(Self {
            counter: AtomicUsize::new(counter),
            completion: AtomicU8::new(COMPLETION_NONE),
            inputs: Mutex::new(inputs),
            source: TaskSource::new(),
            subscription: Mutex::new(None),
        })
    }

    fn is_completed(&self) -> bool {
        self.completion.load(Ordering::Acquire) != COMPLETION_NONE
    }

    /// First call wins; every later call (late input completion, expiration
    /// racing the condition) is ignored.
    fn resolve(&self, result: bool) {
        let new_state = if result { COMPLETION_TRUE } else { COMPLETION_FALSE };
        if self
            .completion
            .compare_exchange(
                COMPLETION_NONE,
                new_state,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        self.reset_inputs();
        // Release the expiration subscription before signaling completion;
        // the timer must not observe a half-resolved awaiter.
        lock(&self.subscription).take();
        self.source.resolve(result);
    }

    /// Clears ready-callbacks and drops the input references. Must happen
    /// before `source.resolve` (see module docs).
    fn reset_inputs(&self) {
        let inputs = {
            let mut slot = lock(&self.inputs);
            std::mem::take(&mut *slot)
        };
        for input in &inputs {
            input.core().clear_ready_callback();
        }
        drop(inputs);
    }
}

/// Resolves `true` once every input is ready, `false` once `expiration`
/// trips first. An empty input list is vacuously `true` regardless of the
/// expiration.
#[must_use]
pub fn when_all(
    tasks: impl IntoIterator<Item = AnyTask>,
    expiration: Expiration,
) -> Task<bool> {
    let tasks: Vec<AnyTask> = tasks.into_iter().collect();

    if tasks.iter().all(AnyTask::is_ready) {
        return Task::resolved(true);
    }
    if expiration.is_expired() {
        return Task::resolved(false);
    }

    let counter = tasks.len();
    let state = AwaiterState::new(tasks.clone(), counter);
    let task = state.source.task();

    subscribe_expiration(&state, &expiration);

    for input in &tasks {
        if state.is_completed() {
            break;
        }
        let awaiter = state.clone();
        input.core().set_ready_callback(Box::new(move || {
            if awaiter.counter.fetch_sub(1, Ordering::AcqRel) == 1 {
                awaiter.resolve(true);
            }
        }));
    }

    task
}

/// Resolves `true` once any input is ready, `false` once `expiration` trips
/// first. An empty input list resolves `true` immediately (the empty
/// condition is treated as already satisfied).
#[must_use]
pub fn when_any(
    tasks: impl IntoIterator<Item = AnyTask>,
    expiration: Expiration,
) -> Task<bool> {
    let tasks: Vec<AnyTask> = tasks.into_iter().collect();

    if tasks.is_empty() || tasks.iter().any(AnyTask::is_ready) {
        return Task::resolved(true);
    }
    if expiration.is_expired() {
        return Task::resolved(false);
    }

    let state = AwaiterState::new(tasks.clone(), 0);
    let task = state.source.task();

    subscribe_expiration(&state, &expiration);

    for input in &tasks {
        if state.is_completed() {
            break;
        }
        let awaiter = state.clone();
        input
            .core()
            .set_ready_callback(Box::new(move || awaiter.resolve(true)));
    }

    task
}

fn subscribe_expiration(state: &Arc<AwaiterState>, expiration: &Expiration) {
    if expiration.is_eternal() {
        return;
    }
    let weak = Arc::downgrade(state);
    let subscription = expiration.subscribe(move || {
        if let Some(state) = weak.upgrade() {
            state.resolve(false);
        }
    });
    *lock(&state.subscription) = Some(subscription);
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::tasks::expiration::ExpirationSource;
    use crate::tasks::task::TaskSource;
    use crate::tasks::wait_result;
    use std::time::Duration;

    #[test]
    fn when_all_of_empty_list_is_vacuously_true() {
        let expired = ExpirationSource::new();
        expired.trip();
        let task = when_all(Vec::new(), expired.expiration());
        assert!(wait_result(&task, None).unwrap());
    }

    #[test]
    fn when_any_of_empty_list_is_true() {
        let task = when_any(Vec::new(), Expiration::eternal());
        assert!(wait_result(&task, None).unwrap());
    }

    #[test]
    fn when_all_resolves_after_every_input() {
        let sources: Vec<TaskSource<i32>> =
            (0..3).map(|_| TaskSource::new()).collect();
        let tasks: Vec<_> = sources.iter().map(TaskSource::task).collect();

        let all = when_all(
            tasks.iter().map(Task::untyped),
            Expiration::eternal(),
        );
        assert!(!all.is_ready());

        sources[0].resolve(0);
        sources[2].resolve(2);
        assert!(!all.is_ready());

        sources[1].resolve(1);
        assert!(wait_result(&all, Some(Duration::from_secs(1))).unwrap());
    }

    #[test]
    fn when_all_treats_rejections_as_completions() {
        let ok: TaskSource<()> = TaskSource::new();
        let bad: TaskSource<()> = TaskSource::new();
        let tasks = [ok.task(), bad.task()];

        let all = when_all(
            tasks.iter().map(Task::untyped),
            Expiration::eternal(),
        );

        ok.resolve(());
        bad.reject(EngineError::rejected("input failed"));
        assert!(wait_result(&all, Some(Duration::from_secs(1))).unwrap());
    }

    #[test]
    fn when_all_resolves_false_when_expiration_trips_first() {
        let pending: TaskSource<()> = TaskSource::new();
        let task = pending.task();
        let cancel = ExpirationSource::new();

        let all = when_all([task.untyped()], cancel.expiration());
        assert!(!all.is_ready());

        cancel.trip();
        assert!(!wait_result(&all, Some(Duration::from_secs(1))).unwrap());

        // A late completion is ignored and does not re-resolve.
        pending.resolve(());
        assert!(all.error().is_none());
    }

    #[test]
    fn when_all_with_already_expired_expiration_is_false() {
        let pending: TaskSource<()> = TaskSource::new();
        let expired = ExpirationSource::new();
        expired.trip();

        let all = when_all([pending.task().untyped()], expired.expiration());
        assert!(!wait_result(&all, None).unwrap());
    }

    #[test]
    fn when_any_resolves_on_first_completion() {
        let first: TaskSource<()> = TaskSource::new();
        let second: TaskSource<()> = TaskSource::new();
        let tasks = [first.task(), second.task()];

        let any = when_any(
            tasks.iter().map(Task::untyped),
            Expiration::eternal(),
        );
        assert!(!any.is_ready());

        second.resolve(());
        assert!(wait_result(&any, Some(Duration::from_secs(1))).unwrap());

        // Input callbacks were reset; the remaining input resolves quietly.
        first.resolve(());
    }

    #[test]
    fn when_any_resolves_false_when_expiration_trips_first() {
        let pending: TaskSource<()> = TaskSource::new();
        let task = pending.task();
        let cancel = ExpirationSource::new();

        let any = when_any([task.untyped()], cancel.expiration());
        cancel.trip();
        assert!(!wait_result(&any, Some(Duration::from_secs(1))).unwrap());
    }

    #[test]
    fn when_all_with_all_inputs_already_ready_is_immediate() {
        let tasks = [Task::resolved(1), Task::resolved(2)];
        let all = when_all(
            tasks.iter().map(Task::untyped),
            Expiration::eternal(),
        );
        assert!(all.is_ready());
    }
}
