// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! End-to-end behavior of the task runtime: continuation handoff to the
//! captured executor, aggregate awaiters racing a timed expiration, and
//! the blocking-wait boundary cases.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use pulse_engine::tasks::{
    Expiration, ExecutorPtr, Task, TaskSource, ThreadPoolExecutor, TimerManager,
    WorkQueueExecutor, set_default_executor, set_timer_manager, spawn_on, wait_result,
    when_all, when_any,
};

fn ensure_runtime() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let pool = ThreadPoolExecutor::try_with_workers(Some(2)).unwrap();
        set_default_executor(Some(pool as ExecutorPtr));
        set_timer_manager(Some(TimerManager::start()));
    });
}

/// A task awaited on a work queue resumes on that queue, not on the
/// thread that resolved it.
#[test]
fn continuation_resumes_on_the_captured_executor() {
    ensure_runtime();

    let queue = WorkQueueExecutor::new();
    let source: TaskSource<i32> = TaskSource::new();
    let inner = source.task();

    let resume_thread: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));
    let observed = resume_thread.clone();
    let outer = spawn_on(queue.clone() as ExecutorPtr, async move {
        let value = inner.await?;
        *observed.lock().unwrap() = Some(std::thread::current().id());
        Ok(value)
    });

    // First poll: the future suspends on `inner`, capturing the queue.
    queue.poll(Some(Duration::ZERO));
    assert!(!outer.is_ready());

    // Resolve from a thread-pool worker.
    let resolver_done = Arc::new(AtomicBool::new(false));
    let done = resolver_done.clone();
    pulse_engine::tasks::default_executor()
        .unwrap()
        .execute(Box::new(move || {
            source.resolve(21);
            done.store(true, Ordering::SeqCst);
        }));

    // The resumption lands on the queue: pumping it completes the task.
    let deadline = Instant::now() + Duration::from_secs(5);
    while !outer.is_ready() {
        assert!(Instant::now() < deadline, "resumption never arrived");
        queue.poll(Some(Duration::from_millis(10)));
    }

    assert_eq!(
        resume_thread.lock().unwrap().unwrap(),
        std::thread::current().id(),
        "resumption must run on the thread pumping the captured queue"
    );
    assert!(resolver_done.load(Ordering::SeqCst));
    assert_eq!(wait_result(&outer, None).unwrap(), 21);
}

/// With captured-executor resumption opted out, the awaiter resumes inline
/// on the resolving thread.
#[test]
fn opted_out_continuation_resumes_on_the_resolving_thread() {
    ensure_runtime();

    let queue = WorkQueueExecutor::new();
    let source: TaskSource<()> = TaskSource::new();
    let inner = source.task();
    inner.set_continue_on_captured_executor(false);

    let resume_thread: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));
    let observed = resume_thread.clone();
    let outer = spawn_on(queue.clone() as ExecutorPtr, async move {
        inner.await?;
        *observed.lock().unwrap() = Some(std::thread::current().id());
        Ok(())
    });

    queue.poll(Some(Duration::ZERO));
    assert!(!outer.is_ready());

    let resolver_thread = std::thread::spawn(move || {
        source.resolve(());
        std::thread::current().id()
    });
    let resolver_thread_id = resolver_thread.join().unwrap();

    // No queue pumping needed: the resolve itself drove the resumption.
    assert!(outer.is_ready());
    assert_eq!(resume_thread.lock().unwrap().unwrap(), resolver_thread_id);
}

/// Three sources, two of which resolve around the expiration deadline:
/// the aggregate reports `false`, late completions are ignored, nothing
/// fires twice.
#[test]
fn when_all_with_timeout_reports_false_and_ignores_late_completions() {
    ensure_runtime();

    let first: TaskSource<()> = TaskSource::new();
    let second: TaskSource<()> = TaskSource::new();
    let third: TaskSource<()> = TaskSource::new();
    let tasks = [first.task(), second.task(), third.task()];

    let started = Instant::now();
    let all = when_all(
        tasks.iter().map(Task::untyped),
        Expiration::after(Duration::from_millis(50)),
    );

    // #1 resolves before the deadline, #2 after it, #3 never.
    std::thread::sleep(Duration::from_millis(10));
    first.resolve(());

    let result = wait_result(&all, Some(Duration::from_secs(5))).unwrap();
    let elapsed = started.elapsed();
    assert!(!result);
    assert!(elapsed >= Duration::from_millis(45), "expired too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "expired far too late: {elapsed:?}");

    // The late completion must be a quiet no-op.
    second.resolve(());
    std::thread::sleep(Duration::from_millis(20));
    assert!(second.is_ready());
    assert!(!third.is_ready());
}

#[test]
fn when_all_resolves_true_when_everything_beats_the_deadline() {
    ensure_runtime();

    let sources: Vec<TaskSource<()>> = (0..3).map(|_| TaskSource::new()).collect();
    let tasks: Vec<_> = sources.iter().map(TaskSource::task).collect();

    let all = when_all(
        tasks.iter().map(Task::untyped),
        Expiration::after(Duration::from_secs(5)),
    );

    for source in &sources {
        source.resolve(());
    }
    assert!(wait_result(&all, Some(Duration::from_secs(5))).unwrap());
}

#[test]
fn when_any_with_timeout_reports_first_completion() {
    ensure_runtime();

    let fast: TaskSource<()> = TaskSource::new();
    let slow: TaskSource<()> = TaskSource::new();
    let tasks = [fast.task(), slow.task()];

    let any = when_any(
        tasks.iter().map(Task::untyped),
        Expiration::after(Duration::from_secs(5)),
    );

    fast.resolve(());
    assert!(wait_result(&any, Some(Duration::from_secs(5))).unwrap());
    drop(slow);
}

/// Executor switching: a future spawned on the pool can hop onto a work
/// queue and back.
#[test]
fn yield_to_switches_the_running_thread() {
    ensure_runtime();

    let queue = WorkQueueExecutor::new();
    let queue_for_future: ExecutorPtr = queue.clone();

    let main_thread = std::thread::current().id();
    let hopped: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));
    let observed = hopped.clone();

    let task = spawn_on(
        pulse_engine::tasks::default_executor().unwrap(),
        async move {
            pulse_engine::tasks::yield_to(&queue_for_future).await;
            *observed.lock().unwrap() = Some(std::thread::current().id());
            Ok(())
        },
    );

    let deadline = Instant::now() + Duration::from_secs(5);
    while !task.is_ready() {
        assert!(Instant::now() < deadline, "never hopped onto the queue");
        queue.poll(Some(Duration::from_millis(10)));
    }

    assert_eq!(hopped.lock().unwrap().unwrap(), main_thread);
}

#[test]
fn delay_tasks_ride_the_timer_manager() {
    ensure_runtime();

    let started = Instant::now();
    let task = pulse_engine::tasks::delay(Duration::from_millis(30));
    wait_result(&task, Some(Duration::from_secs(5))).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(25));
}
