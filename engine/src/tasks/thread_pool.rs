// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Thread-pool executor backed by a tokio multi-thread runtime.
//!
//! Invocations may run on any worker. A pool instance is normally installed
//! as the process default executor (see
//! [`set_default_executor`](super::set_default_executor)); background
//! continuations and the independent phase of service initialization land
//! here.

use std::sync::{Arc, Weak};

use miette::IntoDiagnostic;

use crate::tasks::executor::{CurrentExecutorScope, Executor, Invocation};

pub struct ThreadPoolExecutor {
    runtime: tokio::runtime::Runtime,
    self_ref: Weak<ThreadPoolExecutor>,
}

impl ThreadPoolExecutor {
    /// Builds a pool with tokio's default worker count (one per core).
    pub fn try_new() -> miette::Result<Arc<Self>> {
        Self::try_with_workers(None)
    }

    pub fn try_with_workers(workers: Option<usize>) -> miette::Result<Arc<Self>> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.thread_name("pulse-worker").enable_all();
        if let Some(workers) = workers {
            builder.worker_threads(workers);
        }
        let runtime = builder.build().into_diagnostic()?;

        Ok(Arc::new_cyclic(|self_ref| Self {
            runtime,
            self_ref: self_ref.clone(),
        }))
    }

    /// Handle to the underlying tokio runtime (used by tests and by
    /// collaborators that schedule their own async work).
    #[must_use]
    pub fn handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, invocation: Invocation) {
        let self_ref = self.self_ref.clone();
        self.runtime.spawn(async move {
            let _scope = self_ref
                .upgrade()
                .map(|this| CurrentExecutorScope::enter(this));
            invocation();
        });
    }
}

impl std::fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ThreadPoolExecutor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::executor::{ExecutorPtr, current_executor};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn invocations_run_on_a_worker_thread() {
        let pool = ThreadPoolExecutor::try_with_workers(Some(2)).unwrap();
        let main_thread = std::thread::current().id();

        let ran_elsewhere = Arc::new(AtomicBool::new(false));
        let saw_current = Arc::new(AtomicBool::new(false));
        let event = Arc::new(crate::tasks::wait::Event::new());

        let flag = ran_elsewhere.clone();
        let current = saw_current.clone();
        let signal = event.clone();
        let executor: ExecutorPtr = pool.clone();
        executor.execute(Box::new(move || {
            flag.store(std::thread::current().id() != main_thread, Ordering::SeqCst);
            current.store(current_executor().is_some(), Ordering::SeqCst);
            signal.set();
        }));

        assert!(event.wait(Some(Duration::from_secs(5))));
        assert!(ran_elsewhere.load(Ordering::SeqCst));
        assert!(saw_current.load(Ordering::SeqCst));
    }
}
