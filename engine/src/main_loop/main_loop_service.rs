// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The main-loop orchestrator.
//!
//! During pre-init it discovers every registered game-system class, sorts
//! each into sequential or concurrent execution, and wires the per-frame
//! phase vectors. Each frame, [`MainLoopService::do_game_step`] pumps
//! pre-update, the scene manager, post-update and the debug GUI in that
//! order. Phase vectors preserve registration order; systems must not
//! assume visibility of each other's writes within a phase.

use std::any::TypeId;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::main_loop::collaborators::{DebugGuiService, PlatformWindowService, SceneManager};
use crate::main_loop::concurrent_container::ConcurrentExecutionContainer;
use crate::main_loop::game_system::{
    ExecutionMode, GamePostUpdate, GamePreUpdate, GameSceneUpdate,
    PREFERRED_EXECUTION_MODE,
};
use crate::service::{
    ClassDescriptor, GetApiMode, ServiceInitialization, ServiceProvider,
    ServiceShutdown,
};
use crate::tasks::{ExecutorPtr, InlineExecutor, Task, default_executor, spawn_on};

#[derive(Default)]
struct Phases {
    pre_update: Vec<Arc<dyn GamePreUpdate>>,
    scene_update: Vec<Arc<dyn GameSceneUpdate>>,
    post_update: Vec<Arc<dyn GamePostUpdate>>,
}

pub struct MainLoopService {
    provider: Arc<ServiceProvider>,
    self_ref: Weak<MainLoopService>,
    phases: Mutex<Phases>,
    containers: Mutex<Vec<Arc<ConcurrentExecutionContainer>>>,
    scene_manager: Mutex<Option<Arc<dyn SceneManager>>>,
    debug_gui: Mutex<Option<Arc<dyn DebugGuiService>>>,
}

impl MainLoopService {
    #[must_use]
    pub fn new(provider: Arc<ServiceProvider>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            provider,
            self_ref: self_ref.clone(),
            phases: Mutex::new(Phases::default()),
            containers: Mutex::new(Vec::new()),
            scene_manager: Mutex::new(None),
            debug_gui: Mutex::new(None),
        })
    }

    /// One sequential frame step. `dt` is in seconds; phase callbacks get
    /// it converted to whole milliseconds (truncated), the scene manager
    /// keeps the float seconds.
    pub fn do_game_step(&self, dt: f32) {
        let dt_ms = Duration::from_millis((1000.0 * dt) as u64);

        let phases = lock(&self.phases);
        for pre_update in &phases.pre_update {
            pre_update.game_pre_update(dt_ms);
        }

        if let Some(scene_manager) = lock(&self.scene_manager).as_ref() {
            scene_manager.update(dt);
        }

        for post_update in &phases.post_update {
            post_update.game_post_update(dt_ms);
        }
        drop(phases);

        if let Some(debug_gui) = lock(&self.debug_gui).as_ref()
            && debug_gui.is_active()
        {
            debug_gui.cache_render_data();
            debug_gui.tick();
        }
    }

    /// Awaits the scene manager's shutdown; the provider-wide service
    /// shutdown then takes care of the concurrent containers.
    pub fn shutdown_main_loop(&self) -> Task<()> {
        let scene_manager = lock(&self.scene_manager).clone();
        match scene_manager {
            Some(scene_manager) => scene_manager.shutdown(),
            None => Task::resolved(()),
        }
    }

    #[must_use]
    pub fn containers(&self) -> Vec<Arc<ConcurrentExecutionContainer>> {
        lock(&self.containers).clone()
    }

    fn service(&self) -> Arc<Self> {
        self.self_ref
            .upgrade()
            .expect("main loop service is registered for the whole run")
    }

    /// Classifies one discovered class and brings it up.
    async fn pre_init_game_system(
        self: &Arc<Self>,
        system_class: Arc<ClassDescriptor>,
    ) -> crate::error::TaskResult<()> {
        let preferred_mode = system_class
            .attributes()
            .get::<ExecutionMode>(PREFERRED_EXECUTION_MODE)
            .unwrap_or_default();

        if system_class.has_interface::<dyn GameSceneUpdate>()
            && preferred_mode == ExecutionMode::Concurrent
        {
            let container = ConcurrentExecutionContainer::new(
                system_class,
                self.provider.clone(),
            );
            lock(&self.containers).push(container.clone());
            let _ = container.pre_init_service().await;
            return Ok(());
        }

        let registration = system_class.construct();
        let scene_update =
            registration.get_interface::<dyn GameSceneUpdate>(GetApiMode::Create);
        let pre_update =
            registration.get_interface::<dyn GamePreUpdate>(GetApiMode::Create);
        let post_update =
            registration.get_interface::<dyn GamePostUpdate>(GetApiMode::Create);
        let initialization = registration
            .get_interface::<dyn ServiceInitialization>(GetApiMode::Create);
        self.provider.add_service(registration);

        {
            let mut phases = lock(&self.phases);
            if let Some(scene_update) = scene_update {
                phases.scene_update.push(scene_update);
            }
            if let Some(pre_update) = pre_update {
                phases.pre_update.push(pre_update);
            }
            if let Some(post_update) = post_update {
                phases.post_update.push(post_update);
            }
        }

        if let Some(initialization) = initialization {
            let _ = initialization.pre_init_service().await;
        }
        Ok(())
    }
}

impl ServiceInitialization for MainLoopService {
    /// Collects phase participants among already-registered services, then
    /// discovers and brings up the game-system classes in registration
    /// order.
    fn pre_init_service(&self) -> Task<()> {
        let service = self.service();
        spawn_on(phase_executor(), async move {
            {
                let registered_pre_update = service
                    .provider
                    .get_all::<dyn GamePreUpdate>(GetApiMode::Create);
                let registered_post_update = service
                    .provider
                    .get_all::<dyn GamePostUpdate>(GetApiMode::Create);
                let mut phases = lock(&service.phases);
                phases.pre_update.extend(registered_pre_update);
                phases.post_update.extend(registered_post_update);
            }

            let system_classes = service.provider.find_classes(
                &[
                    TypeId::of::<dyn GamePreUpdate>(),
                    TypeId::of::<dyn GamePostUpdate>(),
                    TypeId::of::<dyn GameSceneUpdate>(),
                ],
                true,
            );

            for system_class in system_classes {
                service.pre_init_game_system(system_class).await?;
            }
            Ok(())
        })
    }

    fn init_service(&self) -> Task<()> {
        if self.provider.has::<dyn SceneManager>() {
            *lock(&self.scene_manager) = Some(self.provider.get::<dyn SceneManager>());
        }
        if self.provider.has::<dyn DebugGuiService>() {
            *lock(&self.debug_gui) = Some(self.provider.get::<dyn DebugGuiService>());
        }
        Task::resolved(())
    }

    /// The main loop never runs before a window is available.
    fn service_dependencies(&self) -> Vec<TypeId> {
        vec![TypeId::of::<dyn PlatformWindowService>()]
    }
}

impl ServiceShutdown for MainLoopService {
    fn shutdown_service(&self) -> Task<()> { Task::resolved(()) }
}

impl std::fmt::Debug for MainLoopService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phases = lock(&self.phases);
        f.debug_struct("MainLoopService")
            .field("pre_update", &phases.pre_update.len())
            .field("scene_update", &phases.scene_update.len())
            .field("post_update", &phases.post_update.len())
            .field("containers", &lock(&self.containers).len())
            .finish()
    }
}

fn phase_executor() -> ExecutorPtr {
    default_executor().unwrap_or_else(|| InlineExecutor::new() as ExecutorPtr)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
