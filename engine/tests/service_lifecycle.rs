// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Dependency-ordered service initialization and shutdown, initialization
//! proxies, and the disposal phase.

use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread::ThreadId;
use std::time::Duration;

use pulse_engine::service::{
    AsyncDisposable, Disposable, GetApiMode, InitializationProxy, ServiceInitialization,
    ServiceProvider, ServiceShutdown,
};
use pulse_engine::service_registration;
use pulse_engine::tasks::{
    ExecutorPtr, Task, ThreadPoolExecutor, TimerManager, WorkQueueExecutor,
    set_default_executor, set_timer_manager, spawn_on, wait_result,
};

fn ensure_runtime() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let pool = ThreadPoolExecutor::try_with_workers(Some(2)).unwrap();
        set_default_executor(Some(pool as ExecutorPtr));
        set_timer_manager(Some(TimerManager::start()));
    });
}

type EventLog = Arc<Mutex<Vec<String>>>;

fn log_event(log: &EventLog, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

// Marker interfaces the dependency graph is expressed in.
trait StorageApi: Send + Sync {}
trait AssetsApi: Send + Sync {}
trait SceneApi: Send + Sync {}

struct RecordingService {
    name: &'static str,
    dependencies: Vec<TypeId>,
    log: EventLog,
}

impl StorageApi for RecordingService {}
impl AssetsApi for RecordingService {}
impl SceneApi for RecordingService {}

impl ServiceInitialization for RecordingService {
    fn pre_init_service(&self) -> Task<()> {
        log_event(&self.log, format!("{}:pre_init", self.name));
        Task::resolved(())
    }

    fn init_service(&self) -> Task<()> {
        log_event(&self.log, format!("{}:init", self.name));
        Task::resolved(())
    }

    fn service_dependencies(&self) -> Vec<TypeId> { self.dependencies.clone() }
}

impl ServiceShutdown for RecordingService {
    fn shutdown_service(&self) -> Task<()> {
        log_event(&self.log, format!("{}:shutdown", self.name));
        Task::resolved(())
    }
}

/// E2E: S1, S2 (depends on S1), S3 (depends on S1 and S2). Init starts in
/// dependency order, shutdown runs in reverse.
#[test]
fn dependent_services_initialize_in_order_and_shut_down_in_reverse() {
    ensure_runtime();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let provider = ServiceProvider::new();

    // Registration order is deliberately scrambled.
    provider.add_service(service_registration!(RecordingService {
        name: "s3",
        dependencies: vec![TypeId::of::<dyn StorageApi>(), TypeId::of::<dyn AssetsApi>()],
        log: log.clone(),
    } => [dyn SceneApi, dyn ServiceInitialization, dyn ServiceShutdown]));
    provider.add_service(service_registration!(RecordingService {
        name: "s1",
        dependencies: Vec::new(),
        log: log.clone(),
    } => [dyn StorageApi, dyn ServiceInitialization, dyn ServiceShutdown]));
    provider.add_service(service_registration!(RecordingService {
        name: "s2",
        dependencies: vec![TypeId::of::<dyn StorageApi>()],
        log: log.clone(),
    } => [dyn AssetsApi, dyn ServiceInitialization, dyn ServiceShutdown]));

    wait_result(&provider.init_services(), Some(Duration::from_secs(5))).unwrap();
    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["s1:init", "s2:init", "s3:init"]
    );

    log.lock().unwrap().clear();
    wait_result(&provider.shutdown_services(), Some(Duration::from_secs(5))).unwrap();
    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["s3:shutdown", "s2:shutdown", "s1:shutdown"]
    );
}

/// A failing pre-init is logged but does not prevent the independent
/// remainder from initializing.
#[test]
fn initialization_failure_does_not_abort_other_services() {
    ensure_runtime();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let provider = ServiceProvider::new();

    struct FailingService;

    impl ServiceInitialization for FailingService {
        fn pre_init_service(&self) -> Task<()> {
            Task::rejected(pulse_engine::EngineError::rejected("broken on purpose"))
        }
    }

    provider.add_service(
        service_registration!(FailingService => [dyn ServiceInitialization]),
    );
    provider.add_service(service_registration!(RecordingService {
        name: "s1",
        dependencies: Vec::new(),
        log: log.clone(),
    } => [dyn StorageApi, dyn ServiceInitialization]));

    wait_result(&provider.pre_init_services(), Some(Duration::from_secs(5))).unwrap();
    assert_eq!(log.lock().unwrap().as_slice(), ["s1:pre_init"]);
}

/// An initialization proxy receives the calls on behalf of its source and
/// can force them onto a specific thread (here: a window-thread-style work
/// queue).
#[test]
fn initialization_proxy_redirects_calls() {
    ensure_runtime();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let provider = ServiceProvider::new();

    struct ProxiedService {
        log: EventLog,
    }

    impl StorageApi for ProxiedService {}

    impl ServiceInitialization for ProxiedService {
        fn init_service(&self) -> Task<()> {
            log_event(&self.log, "source:init");
            Task::resolved(())
        }
    }

    impl ServiceShutdown for ProxiedService {
        fn shutdown_service(&self) -> Task<()> {
            log_event(&self.log, "source:shutdown");
            Task::resolved(())
        }
    }

    struct WindowThreadProxy {
        log: EventLog,
        queue: Arc<WorkQueueExecutor>,
        source: Arc<dyn ServiceInitialization>,
        init_thread: Arc<Mutex<Option<ThreadId>>>,
    }

    impl ServiceInitialization for WindowThreadProxy {
        /// Redirects the source's initialization onto the window-thread
        /// queue and records which thread it actually ran on.
        fn init_service(&self) -> Task<()> {
            log_event(&self.log, "proxy:init");
            let source = self.source.clone();
            let init_thread = self.init_thread.clone();
            spawn_on(self.queue.clone() as ExecutorPtr, async move {
                *init_thread.lock().unwrap() = Some(std::thread::current().id());
                source.init_service().await?;
                Ok(())
            })
        }
    }

    let source = Arc::new(ProxiedService { log: log.clone() });
    provider.add_service(service_registration!(shared source.clone() => [
        dyn StorageApi, dyn ServiceInitialization, dyn ServiceShutdown
    ]));

    let queue = WorkQueueExecutor::new();
    let init_thread: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));
    let proxy = Arc::new(WindowThreadProxy {
        log: log.clone(),
        queue: queue.clone(),
        source: source.clone(),
        init_thread: init_thread.clone(),
    });

    let source_init: Arc<dyn ServiceInitialization> = source;
    provider.set_initialization_proxy(
        &source_init,
        Some(InitializationProxy {
            initialization: proxy,
            shutdown: None,
        }),
    );

    let init = provider.init_services();
    // Pump the "window thread" until initialization completes there.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !init.is_ready() {
        assert!(std::time::Instant::now() < deadline);
        queue.poll(Some(Duration::from_millis(5)));
    }

    assert_eq!(log.lock().unwrap().as_slice(), ["proxy:init", "source:init"]);
    // The redirected init ran on the pumping (window) thread.
    assert_eq!(
        init_thread.lock().unwrap().unwrap(),
        std::thread::current().id()
    );

    // Shutdown is NOT redirected (the proxy exposes no shutdown), so the
    // source handles it directly.
    log.lock().unwrap().clear();
    wait_result(&provider.shutdown_services(), Some(Duration::from_secs(5))).unwrap();
    assert_eq!(log.lock().unwrap().as_slice(), ["source:shutdown"]);
}

/// Disposal: async disposables are awaited first, then sync disposables
/// run, then the provider is sealed.
#[test]
fn disposal_runs_async_then_sync_and_seals_the_provider() {
    ensure_runtime();
    let provider = ServiceProvider::new();

    struct DisposableService {
        async_disposed: AtomicBool,
        sync_disposed: AtomicBool,
    }

    impl AsyncDisposable for DisposableService {
        fn dispose_async(&self) -> Task<()> {
            self.async_disposed.store(true, Ordering::SeqCst);
            Task::resolved(())
        }
    }

    impl Disposable for DisposableService {
        fn dispose(&self) {
            // dispose_async already ran for this accessor.
            assert!(self.async_disposed.load(Ordering::SeqCst));
            self.sync_disposed.store(true, Ordering::SeqCst);
        }
    }

    let service = Arc::new(DisposableService {
        async_disposed: AtomicBool::new(false),
        sync_disposed: AtomicBool::new(false),
    });
    provider.add_service(service_registration!(shared service.clone() => [
        dyn AsyncDisposable, dyn Disposable
    ]));

    wait_result(&provider.shutdown_services(), Some(Duration::from_secs(5))).unwrap();
    assert!(service.async_disposed.load(Ordering::SeqCst));
    assert!(service.sync_disposed.load(Ordering::SeqCst));
    assert!(provider.is_sealed());
}

/// Lazy services materialize during lookup even under `get_all`, and
/// shutdown skips services that never materialized.
#[test]
fn unmaterialized_lazy_services_are_skipped_at_shutdown() {
    ensure_runtime();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let provider = ServiceProvider::new();

    let lazy_log = log.clone();
    provider.add_service(service_registration!(lazy move || RecordingService {
        name: "lazy",
        dependencies: Vec::new(),
        log: lazy_log.clone(),
    } => [dyn StorageApi, dyn ServiceShutdown]));

    // Never looked up with Create: shutdown must not fabricate it.
    assert!(
        provider
            .get_all::<dyn ServiceShutdown>(GetApiMode::DoNotCreate)
            .is_empty()
    );
    wait_result(&provider.shutdown_services(), Some(Duration::from_secs(5))).unwrap();
    assert!(log.lock().unwrap().is_empty());
}
