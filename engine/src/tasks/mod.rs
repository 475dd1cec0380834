// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Cooperative task runtime: single-shot task cells with continuation
//! handoff, pluggable executors, aggregate awaiters and cancellation
//! tokens.
//!
//! The moving parts, bottom up:
//!
//! - [`CoreTaskState`] - the raw cell (readiness, error slot, continuation
//!   handoff, ready-callback).
//! - [`Executor`] / [`WorkQueueExecutor`] / [`ThreadPoolExecutor`] /
//!   [`WindowThreadExecutor`] - sinks for invocations, with a thread-local
//!   *current* executor and a process-wide *default*.
//! - [`Task`] / [`TaskSource`] - the typed façade; tasks are futures and are
//!   driven by [`spawn_on`].
//! - [`when_all`] / [`when_any`] / [`Expiration`] - aggregates and
//!   timeouts.
//! - [`wait`] / [`wait_result`] - blocking waits for threads that sit
//!   outside the executor world.

pub mod aggregate;
pub mod core_task;
pub mod diagnostics;
pub mod executor;
pub mod expiration;
pub mod spawn;
pub mod task;
pub mod thread_pool;
pub mod timer;
pub mod wait;
pub mod window_executor;
pub mod work_queue;

pub use aggregate::{when_all, when_any};
pub use core_task::{CoreTaskState, Rejector, TaskContinuation};
pub use executor::{
    Executor, ExecutorPtr, InlineExecutor, Invocation, YieldToExecutor, current_executor,
    default_executor, has_default_executor, set_default_executor,
    set_this_thread_executor, yield_to,
};
pub use expiration::{Expiration, ExpirationSource, ExpirationSubscription};
pub use spawn::spawn_on;
pub use task::{AnyTask, Task, TaskSource};
pub use thread_pool::ThreadPoolExecutor;
pub use timer::{TimerManager, delay, set_timer_manager, timer_manager};
pub use wait::{wait, wait_result};
pub use window_executor::WindowThreadExecutor;
pub use work_queue::WorkQueueExecutor;
