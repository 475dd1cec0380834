// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The service provider: a typed container of long-lived singletons.
//!
//! Lookup is interface-based (`find::<dyn SomeService>()`); construction is
//! lazy for factory registrations; initialization and shutdown run in
//! dependency order (see [`dependency`](super::dependency)). The accessor
//! and class tables sit behind a shared mutex - reads take the shared lock,
//! mutations the exclusive one, and lazy fabrication happens with no lock
//! held at all because a user factory may recurse into the provider.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::service::class_descriptor::ClassDescriptor;
use crate::service::dependency::{OrderableService, order_services};
use crate::service::lifecycle::{
    AsyncDisposable, Disposable, ServiceInitialization, ServiceShutdown,
};
use crate::service::registration::{GetApiMode, ServiceRegistration};
use crate::tasks::{
    Expiration, ExecutorPtr, InlineExecutor, Task, default_executor, spawn_on,
    when_all,
};

/// Redirection target for a service's initialization calls. Dependency
/// analysis stays with the *source* service; only the calls are redirected.
/// Shutdown is redirected iff the proxy exposes it.
#[derive(Clone)]
pub struct InitializationProxy {
    pub initialization: Arc<dyn ServiceInitialization>,
    pub shutdown: Option<Arc<dyn ServiceShutdown>>,
}

impl std::fmt::Debug for InitializationProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InitializationProxy")
    }
}

#[derive(Default)]
struct ProviderState {
    accessors: Vec<Arc<ServiceRegistration>>,
    /// Caches resolved `Arc<dyn I>` handles keyed by interface id.
    instance_cache: HashMap<TypeId, Box<dyn std::any::Any + Send + Sync>>,
    classes: Vec<Arc<ClassDescriptor>>,
    /// Keyed by the data pointer of the source's initialization interface.
    proxies: HashMap<usize, InitializationProxy>,
    sealed: bool,
}

#[derive(Default)]
pub struct ServiceProvider {
    state: RwLock<ProviderState>,
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServiceProvider")
    }
}

impl ServiceProvider {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Registers a service accessor. Forbidden once the provider is sealed
    /// (after shutdown/disposal).
    pub fn add_service(&self, registration: ServiceRegistration) {
        let mut state = self.write();
        debug_assert!(!state.sealed, "provider is sealed, add_service is forbidden");
        if state.sealed {
            tracing::error!(
                target: "service",
                service = registration.service_name(),
                "ignoring service registration on a sealed provider"
            );
            return;
        }
        state.accessors.push(Arc::new(registration));
    }

    /// Looks the interface up, fabricating a lazy service if needed.
    #[must_use]
    pub fn find<I>(&self) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let interface_id = TypeId::of::<I>();

        let accessor = {
            let state = self.read();
            if let Some(cached) = state.instance_cache.get(&interface_id) {
                return cached.downcast_ref::<Arc<I>>().cloned();
            }
            state
                .accessors
                .iter()
                .find(|accessor| accessor.has_interface_id(interface_id))
                .cloned()
        };

        // The factory may recurse into the provider; no lock is held here.
        let api = accessor?.get_interface::<I>(GetApiMode::Create)?;

        let mut state = self.write();
        state
            .instance_cache
            .entry(interface_id)
            .or_insert_with(|| Box::new(api.clone()));
        Some(api)
    }

    /// Like [`find`](Self::find) but asserts presence.
    #[must_use]
    pub fn get<I>(&self) -> Arc<I>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.find::<I>().unwrap_or_else(|| {
            panic!("service `{}` is not registered", std::any::type_name::<I>())
        })
    }

    #[must_use]
    pub fn has<I>(&self) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let interface_id = TypeId::of::<I>();
        let state = self.read();
        state.instance_cache.contains_key(&interface_id)
            || state
                .accessors
                .iter()
                .any(|accessor| accessor.has_interface_id(interface_id))
    }

    /// Every service advertising `I`, each materialized unless
    /// `GetApiMode::DoNotCreate` is passed.
    #[must_use]
    pub fn get_all<I>(&self, mode: GetApiMode) -> Vec<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let interface_id = TypeId::of::<I>();
        let accessors: Vec<_> = {
            let state = self.read();
            state
                .accessors
                .iter()
                .filter(|accessor| accessor.has_interface_id(interface_id))
                .cloned()
                .collect()
        };

        // An accessor advertising I can still yield nothing here: in
        // DoNotCreate mode a lazy service may be unmaterialized.
        accessors
            .iter()
            .filter_map(|accessor| accessor.get_interface::<I>(mode))
            .collect()
    }

    pub fn add_class(&self, descriptor: Arc<ClassDescriptor>) {
        let mut state = self.write();
        debug_assert!(!state.sealed, "provider is sealed, add_class is forbidden");
        state.classes.push(descriptor);
    }

    /// Class descriptors matching the interface set: any-of when
    /// `match_any`, all-of otherwise. Registration order is preserved.
    #[must_use]
    pub fn find_classes(
        &self,
        interfaces: &[TypeId],
        match_any: bool,
    ) -> Vec<Arc<ClassDescriptor>> {
        let state = self.read();
        state
            .classes
            .iter()
            .filter(|descriptor| {
                if match_any {
                    interfaces.iter().any(|id| descriptor.has_interface_id(*id))
                } else {
                    interfaces.iter().all(|id| descriptor.has_interface_id(*id))
                }
            })
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn find_classes_implementing<I: ?Sized + 'static>(
        &self,
    ) -> Vec<Arc<ClassDescriptor>> {
        self.find_classes(&[TypeId::of::<I>()], true)
    }

    /// Redirects `source`'s initialization (and, iff the proxy exposes it,
    /// shutdown) to `proxy`. Pass `None` to remove the redirection.
    pub fn set_initialization_proxy(
        &self,
        source: &Arc<dyn ServiceInitialization>,
        proxy: Option<InitializationProxy>,
    ) {
        let key = init_ptr_key(source);
        let mut state = self.write();
        match proxy {
            Some(proxy) => {
                debug_assert!(
                    !state.proxies.contains_key(&key),
                    "initialization proxy for source already set"
                );
                state.proxies.insert(key, proxy);
            }
            None => {
                state.proxies.remove(&key);
            }
        }
    }

    /// Runs `pre_init_service` across all services, dependency-ordered.
    pub fn pre_init_services(self: &Arc<Self>) -> Task<()> {
        self.run_initialization_phase(InitPhase::PreInit)
    }

    /// Runs `init_service` across all services, dependency-ordered.
    pub fn init_services(self: &Arc<Self>) -> Task<()> {
        self.run_initialization_phase(InitPhase::Init)
    }

    /// Shuts every service down in reverse initialization order, then runs
    /// disposal (`dispose_async` awaited concurrently, then `dispose`),
    /// then seals the provider.
    pub fn shutdown_services(self: &Arc<Self>) -> Task<()> {
        let provider = self.clone();
        spawn_on(phase_executor(), async move {
            provider.write().sealed = true;
            let accessors = provider.accessor_snapshot();

            // Split shutdown participants: services that also initialize
            // are ordered by their (source) dependencies; the rest belong
            // to the independent group.
            let mut with_init = Vec::new();
            let mut without_init = Vec::new();
            for accessor in &accessors {
                let Some(shutdown) =
                    accessor.get_interface::<dyn ServiceShutdown>(GetApiMode::DoNotCreate)
                else {
                    continue;
                };
                match accessor
                    .get_interface::<dyn ServiceInitialization>(GetApiMode::DoNotCreate)
                {
                    Some(init) => {
                        with_init.push((shutdown, init, accessor.interface_ids()));
                    }
                    None => without_init.push(shutdown),
                }
            }

            let orderable: Vec<OrderableService> = with_init
                .iter()
                .map(|(_, init, interfaces)| OrderableService {
                    interfaces: interfaces.clone(),
                    declared_dependencies: init.service_dependencies(),
                })
                .collect();
            let ordered = order_services(&orderable)?;

            // Dependency-bearing services first, reverse of init order.
            for &index in ordered.dependent.iter().rev() {
                let (shutdown, init, _) = &with_init[index];
                let target = provider.shutdown_instance(shutdown, init);
                if let Err(error) = target.shutdown_service().await {
                    tracing::error!(target: "service", %error, "service shutdown failed");
                }
            }

            // Independent services: concurrently, together with
            // shutdown-only services.
            let mut pending = Vec::new();
            for &index in &ordered.independent {
                let (shutdown, init, _) = &with_init[index];
                let task = provider.shutdown_instance(shutdown, init).shutdown_service();
                if !task.is_ready() {
                    pending.push(task);
                }
            }
            for shutdown in &without_init {
                let task = shutdown.shutdown_service();
                if !task.is_ready() {
                    pending.push(task);
                }
            }
            let _ = when_all(pending.iter().map(Task::untyped), Expiration::eternal())
                .await;

            // Disposal: async first (a service exposing both may leave the
            // sync dispose empty), then sync, then the provider stays
            // sealed for good.
            let mut dispose_tasks = Vec::new();
            for accessor in &accessors {
                if let Some(disposable) =
                    accessor.get_interface::<dyn AsyncDisposable>(GetApiMode::DoNotCreate)
                {
                    let task = disposable.dispose_async();
                    if !task.is_ready() {
                        dispose_tasks.push(task);
                    }
                }
                if let Some(disposable) =
                    accessor.get_interface::<dyn Disposable>(GetApiMode::DoNotCreate)
                {
                    disposable.dispose();
                }
            }
            let _ = when_all(
                dispose_tasks.iter().map(Task::untyped),
                Expiration::eternal(),
            )
            .await;

            Ok(())
        })
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool { self.read().sealed }

    fn run_initialization_phase(self: &Arc<Self>, phase: InitPhase) -> Task<()> {
        let provider = self.clone();
        spawn_on(phase_executor(), async move {
            let participants = provider.initialization_participants();

            let orderable: Vec<OrderableService> = participants
                .iter()
                .map(|(service, interfaces)| OrderableService {
                    interfaces: interfaces.clone(),
                    declared_dependencies: service.service_dependencies(),
                })
                .collect();
            let ordered = order_services(&orderable)?;

            // Independent services run their phase concurrently.
            let mut pending = Vec::new();
            for &index in &ordered.independent {
                let service = provider.initialization_instance(&participants[index].0);
                let task = phase.run(service.as_ref());
                if task.is_ready() {
                    log_phase_error(phase, &task);
                } else {
                    pending.push(task);
                }
            }
            let _ = when_all(pending.iter().map(Task::untyped), Expiration::eternal())
                .await;
            for task in &pending {
                log_phase_error(phase, task);
            }

            // Dependent services run strictly one after another.
            for &index in &ordered.dependent {
                let service = provider.initialization_instance(&participants[index].0);
                if let Err(error) = phase.run(service.as_ref()).await {
                    // Logged but not fatal: remaining services still get
                    // their chance to initialize.
                    tracing::error!(
                        target: "service",
                        phase = phase.name(),
                        %error,
                        "service initialization failed"
                    );
                }
            }

            Ok(())
        })
    }

    /// Everything implementing [`ServiceInitialization`], materialized, each
    /// with the interface ids its accessor advertises.
    #[allow(clippy::type_complexity)]
    fn initialization_participants(
        &self,
    ) -> Vec<(Arc<dyn ServiceInitialization>, Vec<TypeId>)> {
        self.accessor_snapshot()
            .iter()
            .filter_map(|accessor| {
                let init = accessor
                    .get_interface::<dyn ServiceInitialization>(GetApiMode::Create)?;
                Some((init, accessor.interface_ids()))
            })
            .collect()
    }

    fn accessor_snapshot(&self) -> Vec<Arc<ServiceRegistration>> {
        self.read().accessors.clone()
    }

    fn initialization_instance(
        &self,
        source: &Arc<dyn ServiceInitialization>,
    ) -> Arc<dyn ServiceInitialization> {
        let key = init_ptr_key(source);
        self.read()
            .proxies
            .get(&key)
            .map_or_else(|| source.clone(), |proxy| proxy.initialization.clone())
    }

    fn shutdown_instance(
        &self,
        shutdown: &Arc<dyn ServiceShutdown>,
        source_init: &Arc<dyn ServiceInitialization>,
    ) -> Arc<dyn ServiceShutdown> {
        let key = init_ptr_key(source_init);
        self.read()
            .proxies
            .get(&key)
            .and_then(|proxy| proxy.shutdown.clone())
            .unwrap_or_else(|| shutdown.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ProviderState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ProviderState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[derive(Clone, Copy, Debug)]
enum InitPhase {
    PreInit,
    Init,
}

impl InitPhase {
    fn run(self, service: &dyn ServiceInitialization) -> Task<()> {
        match self {
            InitPhase::PreInit => service.pre_init_service(),
            InitPhase::Init => service.init_service(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            InitPhase::PreInit => "pre_init",
            InitPhase::Init => "init",
        }
    }
}

fn log_phase_error(phase: InitPhase, task: &Task<()>) {
    if let Some(error) = task.error() {
        tracing::error!(
            target: "service",
            phase = phase.name(),
            %error,
            "service initialization failed"
        );
    }
}

/// Identity key for a service's initialization interface: the data pointer
/// of the shared allocation (stable across `Arc` clones and interface
/// casts).
fn init_ptr_key(service: &Arc<dyn ServiceInitialization>) -> usize {
    Arc::as_ptr(service).cast::<()>() as usize
}

fn phase_executor() -> ExecutorPtr {
    default_executor().unwrap_or_else(|| InlineExecutor::new() as ExecutorPtr)
}

static SERVICE_PROVIDER: RwLock<Option<Arc<ServiceProvider>>> = RwLock::new(None);

/// Installs the process-wide provider. Pass `None` at the very end of
/// shutdown, after disposal.
pub fn set_service_provider(provider: Option<Arc<ServiceProvider>>) {
    let mut slot = SERVICE_PROVIDER
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    debug_assert!(
        provider.is_none() || slot.is_none(),
        "service provider already set"
    );
    *slot = provider;
}

#[must_use]
pub fn has_service_provider() -> bool {
    SERVICE_PROVIDER
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .is_some()
}

/// The process-wide provider; panics when none is installed.
#[must_use]
pub fn service_provider() -> Arc<ServiceProvider> {
    SERVICE_PROVIDER
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
        .expect("service provider is not set")
}
