// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Hosts one `Concurrent` game system on a dedicated thread.
//!
//! The container owns the thread (named `"SYS (<classname>)"`), the work
//! queue installed as that thread's executor, and the system instance it
//! constructs there. Initialization calls arriving from the service
//! provider are redirected onto the system's thread through an
//! initialization proxy, so `pre_init`/`init`/`shutdown` of the system all
//! run where its state lives.
//!
//! Update-loop policy:
//! - fixed step while alive: the queue poll blocks, the thread sleeps
//!   through the slack of each step;
//! - free-running or shutting down: zero-timeout polls, the loop spins
//!   through accumulated work promptly.
//!
//! A fixed-step sleep is an awaited delay task. If that delay resolves with
//! an error (the timer manager is being torn down) the loop notifies its
//! queue and keeps going: the system's `update` must be called on every
//! cycle until it returns `false`, even mid-shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::service::{
    ClassDescriptor, GetApiMode, InitializationProxy, ServiceInitialization,
    ServiceProvider, ServiceShutdown,
};
use crate::main_loop::game_system::GameSceneUpdate;
use crate::tasks::{
    ExecutorPtr, InlineExecutor, Task, TaskSource, WorkQueueExecutor, default_executor,
    delay, set_this_thread_executor, spawn_on, yield_to,
};

struct SystemHandles {
    scene_update: Arc<dyn GameSceneUpdate>,
    initialization: Option<Arc<dyn ServiceInitialization>>,
    shutdown: Option<Arc<dyn ServiceShutdown>>,
}

pub struct ConcurrentExecutionContainer {
    system_class: Arc<ClassDescriptor>,
    provider: Arc<ServiceProvider>,
    self_ref: Weak<ConcurrentExecutionContainer>,

    work_queue: OnceLock<Arc<WorkQueueExecutor>>,
    handles: OnceLock<SystemHandles>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_completion: Mutex<Option<Task<()>>>,

    is_alive: AtomicBool,
    is_shutdown_completed: AtomicBool,

    pre_init_completion: TaskSource<()>,
    init_completion: TaskSource<()>,
    init_gate: Mutex<Option<Task<()>>>,
}

impl ConcurrentExecutionContainer {
    #[must_use]
    pub fn new(
        system_class: Arc<ClassDescriptor>,
        provider: Arc<ServiceProvider>,
    ) -> Arc<Self> {
        let init_completion = TaskSource::new();
        let init_gate = Mutex::new(Some(init_completion.task()));
        Arc::new_cyclic(|self_ref| Self {
            system_class,
            provider,
            self_ref: self_ref.clone(),
            work_queue: OnceLock::new(),
            handles: OnceLock::new(),
            thread: Mutex::new(None),
            thread_completion: Mutex::new(None),
            is_alive: AtomicBool::new(false),
            is_shutdown_completed: AtomicBool::new(false),
            pre_init_completion: TaskSource::new(),
            init_completion,
            init_gate,
        })
    }

    #[must_use]
    pub fn system_class(&self) -> &Arc<ClassDescriptor> { &self.system_class }

    #[must_use]
    pub fn is_alive(&self) -> bool { self.is_alive.load(Ordering::Acquire) }

    #[must_use]
    pub fn work_queue(&self) -> Option<&Arc<WorkQueueExecutor>> {
        self.work_queue.get()
    }

    fn container(&self) -> Arc<Self> {
        self.self_ref
            .upgrade()
            .expect("container is owned by the main loop for its whole life")
    }

    fn launch_thread(&self) {
        let container = self.container();
        let thread_name = format!("SYS ({})", self.system_class.class_name());

        let thread_completion: TaskSource<()> = TaskSource::new();
        *lock(&self.thread_completion) = Some(thread_completion.task());

        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || container.thread_main(&thread_completion))
            .expect("failed to spawn game-system thread");

        *lock(&self.thread) = Some(handle);
    }

    fn thread_main(self: &Arc<Self>, thread_completion: &TaskSource<()>) {
        let queue = WorkQueueExecutor::new();
        let _ = self.work_queue.set(queue.clone());
        set_this_thread_executor(Some(queue.clone()));

        // Construct and register the system on its own thread.
        let registration = self.system_class.construct();
        let scene_update = registration
            .get_interface::<dyn GameSceneUpdate>(GetApiMode::Create)
            .expect("a concurrent game system must implement GameSceneUpdate");
        let initialization = registration
            .get_interface::<dyn ServiceInitialization>(GetApiMode::Create);
        let shutdown =
            registration.get_interface::<dyn ServiceShutdown>(GetApiMode::Create);
        self.provider.add_service(registration);

        let _ = self.handles.set(SystemHandles {
            scene_update,
            initialization,
            shutdown,
        });

        let execution_task =
            spawn_on(queue.clone() as ExecutorPtr, self.container().run_system());

        // With a fixed update step the poll may block: to maintain the
        // requested rate the thread simply sleeps through the slack. A
        // free-running system polls with a zero timeout so updates run at
        // the maximum speed the queue allows.
        while !execution_task.is_ready() {
            let fixed_step = self
                .handles
                .get()
                .is_some_and(|handles| {
                    handles.scene_update.fixed_update_time_step().is_some()
                });
            let blocking = fixed_step && self.is_alive.load(Ordering::Acquire);
            queue.poll(if blocking { None } else { Some(Duration::ZERO) });
        }

        // Drain residual work until shutdown finished with the queue.
        while !self.is_shutdown_completed.load(Ordering::Acquire) {
            queue.poll(Some(Duration::ZERO));
        }
        queue.poll(Some(Duration::ZERO));

        set_this_thread_executor(None);
        thread_completion.resolve(());
    }

    /// The system's whole life on its own thread, driven by the queue.
    async fn run_system(self: Arc<Self>) -> crate::error::TaskResult<()> {
        self.is_alive.store(true, Ordering::Release);

        let handles = self
            .handles
            .get()
            .expect("handles are set before the first queue poll");

        if let Some(initialization) = &handles.initialization {
            // Dependency analysis stays with the system; only the calls
            // are redirected here so they run on this thread.
            self.provider.set_initialization_proxy(
                initialization,
                Some(InitializationProxy {
                    initialization: self.container(),
                    shutdown: Some(self.container()),
                }),
            );

            if let Err(error) = initialization.pre_init_service().await {
                tracing::error!(
                    target: "service",
                    system = self.system_class.class_name(),
                    %error,
                    "game system pre-init failed"
                );
            }
        }

        self.pre_init_completion.resolve(());

        // Wait for the provider's init phase to reach this system.
        let init_gate = lock(&self.init_gate)
            .take()
            .expect("run_system is entered exactly once");
        let _ = init_gate.await;

        let scene_update = handles.scene_update.clone();
        let queue: ExecutorPtr = self
            .work_queue
            .get()
            .expect("queue exists for the thread's whole life")
            .clone();

        let mut last_step = Instant::now();
        loop {
            let dt = last_step.elapsed();
            last_step = Instant::now();

            let do_continue = scene_update.update(dt).await?;
            if !do_continue {
                self.notify_queue();
                break;
            }

            if self.is_alive.load(Ordering::Acquire) {
                self.sync_scene_state(&scene_update).await;
            } else {
                // update may have completed synchronously; always yield to
                // the queue so accumulated async work gets pumped.
                yield_to(&queue).await;
            }

            if let Some(fixed_step) = scene_update.fixed_update_time_step() {
                let update_duration = last_step.elapsed();
                if update_duration < fixed_step {
                    if delay(fixed_step - update_duration).await.is_err() {
                        // Timer manager torn down mid-sleep; wake the queue
                        // and keep cycling so update still gets called.
                        self.notify_queue();
                    }
                } else {
                    // Overran the step: give the queue a chance, then go
                    // straight into the next simulation step.
                    yield_to(&queue).await;
                }
            }

            // A shutdown request still gets one more update (above) before
            // the loop ends; residual queue work is drained by the thread.
            if !self.is_alive.load(Ordering::Acquire) {
                self.notify_queue();
                break;
            }
        }

        Ok(())
    }

    /// Hop to the application executor, publish, hop back.
    async fn sync_scene_state(&self, scene_update: &Arc<dyn GameSceneUpdate>) {
        let scene_update = scene_update.clone();
        let sync_task = spawn_on(application_executor(), async move {
            scene_update.sync_scene_state();
            Ok(())
        });
        let _ = sync_task.await;
    }

    fn notify_queue(&self) {
        if let Some(queue) = self.work_queue.get() {
            queue.notify();
        }
    }
}

impl ServiceInitialization for ConcurrentExecutionContainer {
    /// Launches the system thread; resolves once the system's own
    /// `pre_init_service` completed there.
    fn pre_init_service(&self) -> Task<()> {
        self.launch_thread();
        self.pre_init_completion.task()
    }

    /// Switches to the system's work queue, initializes the system there
    /// and opens the update-loop gate.
    fn init_service(&self) -> Task<()> {
        let container = self.container();
        let queue: ExecutorPtr = self
            .work_queue
            .get()
            .expect("init_service is called after pre_init_service")
            .clone();

        spawn_on(queue, async move {
            let handles = container
                .handles
                .get()
                .expect("handles exist once the thread runs");
            if let Some(initialization) = &handles.initialization {
                if let Err(error) = initialization.init_service().await {
                    tracing::error!(
                        target: "service",
                        system = container.system_class.class_name(),
                        %error,
                        "game system init failed"
                    );
                }
            }
            container.init_completion.resolve(());
            Ok(())
        })
    }
}

impl ServiceShutdown for ConcurrentExecutionContainer {
    /// Stops the update loop, shuts the system down on its own thread,
    /// then joins the thread. Once the returned task resolves the worker
    /// thread is gone and the queue holds no pending invocations.
    fn shutdown_service(&self) -> Task<()> {
        debug_assert!(!self.is_shutdown_completed.load(Ordering::Acquire));
        let container = self.container();

        spawn_on(application_executor(), async move {
            container.is_alive.store(false, Ordering::Release);

            let handles = container
                .handles
                .get()
                .expect("shutdown_service is called after pre_init_service");

            if let Some(shutdown) = handles.shutdown.clone() {
                let queue: ExecutorPtr = container
                    .work_queue
                    .get()
                    .expect("queue exists once the thread runs")
                    .clone();
                yield_to(&queue).await;
                if let Err(error) = shutdown.shutdown_service().await {
                    tracing::error!(
                        target: "service",
                        system = container.system_class.class_name(),
                        %error,
                        "game system shutdown failed"
                    );
                }
            }

            container
                .is_shutdown_completed
                .store(true, Ordering::Release);
            container.notify_queue();

            // The thread polls its own queue; awaiting its completion must
            // happen from the outside, so switch off the system executor
            // before blocking on it.
            yield_to(&application_executor()).await;
            let thread_completion = lock(&container.thread_completion).take();
            if let Some(thread_completion) = thread_completion {
                let _ = thread_completion.await;
            }
            let thread = lock(&container.thread).take();
            if let Some(thread) = thread {
                let _join_result = thread.join();
            }

            Ok(())
        })
    }
}

impl std::fmt::Debug for ConcurrentExecutionContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentExecutionContainer")
            .field("system_class", &self.system_class.class_name())
            .field("is_alive", &self.is_alive())
            .finish()
    }
}

fn application_executor() -> ExecutorPtr {
    default_executor().unwrap_or_else(|| InlineExecutor::new() as ExecutorPtr)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
