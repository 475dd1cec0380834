// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Executor for the OS message-pump thread.
//!
//! The platform window collaborator owns the UI thread; between platform
//! messages it calls [`WindowThreadExecutor::pump`] so that invocations
//! (most notably service initialization redirected through an
//! initialization proxy) run on that thread. The core only defines the
//! pumping contract - the message loop itself lives with the collaborator.

use std::sync::Arc;
use std::time::Duration;

use crate::tasks::executor::{Executor, Invocation};
use crate::tasks::work_queue::WorkQueueExecutor;

#[derive(Debug)]
pub struct WindowThreadExecutor {
    queue: Arc<WorkQueueExecutor>,
}

impl WindowThreadExecutor {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: WorkQueueExecutor::new(),
        })
    }

    /// Runs everything currently enqueued. Must be called from the
    /// message-pump thread, between messages; never blocks.
    pub fn pump(&self) { self.queue.poll(Some(Duration::ZERO)); }

    /// Blocks the pump thread up to `timeout` waiting for work. Used by
    /// headless hosts that have no message traffic to interleave with.
    pub fn pump_blocking(&self, timeout: Option<Duration>) {
        self.queue.poll(timeout);
    }

    /// Wakes a blocked [`pump_blocking`](Self::pump_blocking).
    pub fn notify(&self) { self.queue.notify(); }

    #[must_use]
    pub fn queue(&self) -> &Arc<WorkQueueExecutor> { &self.queue }
}

impl Executor for WindowThreadExecutor {
    fn execute(&self, invocation: Invocation) {
        self.queue.execute(invocation);
    }
}
