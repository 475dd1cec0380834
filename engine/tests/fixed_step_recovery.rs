// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Timer-manager teardown underneath a fixed-step system: the pending
//! delay rejects, but the update loop must recover and keep calling
//! `update` every cycle until the system stops itself.
//!
//! This binary owns the timer-manager global, so it runs exactly one test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pulse_engine::main_loop::{ConcurrentExecutionContainer, GameSceneUpdate};
use pulse_engine::service::{
    ClassDescriptor, ServiceInitialization, ServiceProvider, ServiceShutdown,
};
use pulse_engine::tasks::{
    ExecutorPtr, Task, ThreadPoolExecutor, TimerManager, set_default_executor,
    set_timer_manager, wait_result,
};

struct ResilientSystem {
    updates: Arc<AtomicUsize>,
    max_updates: usize,
}

impl GameSceneUpdate for ResilientSystem {
    fn update(&self, _dt: Duration) -> Task<bool> {
        let count = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        Task::resolved(count < self.max_updates)
    }

    fn fixed_update_time_step(&self) -> Option<Duration> {
        Some(Duration::from_millis(10))
    }
}

#[test]
fn update_loop_survives_timer_manager_teardown() {
    let pool = ThreadPoolExecutor::try_with_workers(Some(2)).unwrap();
    set_default_executor(Some(pool as ExecutorPtr));
    set_timer_manager(Some(TimerManager::start()));

    let updates = Arc::new(AtomicUsize::new(0));
    let probe = updates.clone();
    let descriptor = ClassDescriptor::builder("ResilientSystem", move || {
        pulse_engine::service_registration!(ResilientSystem {
            updates: probe.clone(),
            max_updates: 30,
        } => [dyn GameSceneUpdate])
    })
    .with_interface::<dyn GameSceneUpdate>()
    .build();

    let provider = ServiceProvider::new();
    let container = ConcurrentExecutionContainer::new(descriptor, provider);
    wait_result(&container.pre_init_service(), Some(Duration::from_secs(5))).unwrap();
    wait_result(&container.init_service(), Some(Duration::from_secs(5))).unwrap();

    // Let a few fixed-step cycles run with a live timer.
    let deadline = Instant::now() + Duration::from_secs(5);
    while updates.load(Ordering::SeqCst) < 3 {
        assert!(Instant::now() < deadline);
        std::thread::sleep(Duration::from_millis(5));
    }

    // Tear the timer down mid-flight: the in-progress sleep rejects and
    // every later sleep rejects immediately. The loop must keep updating.
    set_timer_manager(None);

    let deadline = Instant::now() + Duration::from_secs(10);
    while updates.load(Ordering::SeqCst) < 30 {
        assert!(
            Instant::now() < deadline,
            "update loop stalled after timer teardown (reached {})",
            updates.load(Ordering::SeqCst)
        );
        std::thread::sleep(Duration::from_millis(5));
    }

    wait_result(
        &ServiceShutdown::shutdown_service(container.as_ref()),
        Some(Duration::from_secs(10)),
    )
    .unwrap();
    assert!(container.work_queue().unwrap().is_empty());
}
