// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Whole-runtime smoke test: bring-up, module activation, game-system
//! discovery, frames, dependency-ordered teardown.
//!
//! The application owns process-wide globals, so this binary runs exactly
//! one test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulse_engine::CoreApplication;
use pulse_engine::game_system_class;
use pulse_engine::input::{ActionType, InputSystemImpl, test_fixtures::TestInputDevice};
use pulse_engine::main_loop::{
    GamePostUpdate, GamePreUpdate, MainLoopService, PlatformWindowService,
};
use pulse_engine::modules::{EngineModule, ModuleManager};
use pulse_engine::service::{ServiceInitialization, ServiceProvider, ServiceShutdown};
use pulse_engine::service_registration;
use pulse_engine::tasks::wait_result;

/// Headless stand-in for the platform window collaborator.
struct HeadlessWindow;

impl PlatformWindowService for HeadlessWindow {
    fn pump_messages(&self) -> bool { true }
}

impl ServiceInitialization for HeadlessWindow {}

struct FrameCounterSystem {
    frames: Arc<AtomicUsize>,
}

impl GamePostUpdate for FrameCounterSystem {
    fn game_post_update(&self, _dt: Duration) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

struct CoreInputModule {
    keyboard: Arc<TestInputDevice>,
}

impl EngineModule for CoreInputModule {
    fn module_name(&self) -> &str { "CoreInput" }

    fn initialize(&self, provider: &Arc<ServiceProvider>) {
        let input = InputSystemImpl::with_devices(vec![self.keyboard.clone() as _]);
        provider.add_service(service_registration!(shared input => [
            InputSystemImpl, dyn GamePreUpdate, dyn ServiceInitialization
        ]));
    }
}

#[test]
fn application_lifecycle_end_to_end() {
    let app = CoreApplication::start().unwrap();
    let provider = app.provider().clone();

    // Configuration first: the module list honors `engine/modules`.
    app.properties()
        .merge_from_str(
            r#"{"engine": {"modules": {"optionalModules": ["CoreVfx"], "searchEnvPath": false}}}"#,
        )
        .unwrap();
    let config: Option<pulse_engine::modules::EngineModulesConfig> =
        app.properties().get_value("engine/modules");
    assert!(!config.unwrap().search_env_path);

    // Window collaborator + module-provided input + a discovered system.
    provider.add_service(service_registration!(HeadlessWindow => [
        dyn PlatformWindowService, dyn ServiceInitialization
    ]));

    let keyboard = Arc::new(TestInputDevice::keyboard("keyboard", &["space"]));
    let modules = ModuleManager::new(provider.clone());
    modules.register_module(Arc::new(CoreInputModule {
        keyboard: keyboard.clone(),
    }));
    // CoreVfx is optional per configuration; its absence is non-fatal.
    modules
        .load_modules_list("CoreInput,CoreVfx", Some(app.properties().as_ref()))
        .unwrap();

    let frames = Arc::new(AtomicUsize::new(0));
    let frame_probe = frames.clone();
    provider.add_class(game_system_class!("FrameCounterSystem", || {
        FrameCounterSystem { frames: frame_probe.clone() }
    } => [dyn GamePostUpdate]));

    let main_loop = MainLoopService::new(provider.clone());
    provider.add_service(service_registration!(shared main_loop.clone() => [
        MainLoopService, dyn ServiceInitialization, dyn ServiceShutdown
    ]));

    // Dependency-ordered startup: the main loop waits for the window
    // service, then discovers and constructs the game systems.
    app.initialize_services().unwrap();

    // Bind an action and run a few frames.
    let input = provider.get::<InputSystemImpl>();
    let jumps = Arc::new(AtomicUsize::new(0));
    let jump_probe = jumps.clone();
    let signal = input
        .create_signal_for("pressed", "keyboard", |signal| {
            signal.base_mut().properties_mut().set("key", "space");
        })
        .unwrap();
    let _action = input.add_action(
        "jump",
        ActionType::Trigger,
        signal,
        Box::new(move |_signal| {
            jump_probe.fetch_add(1, Ordering::SeqCst);
        }),
    );

    main_loop.do_game_step(0.016);
    keyboard.press("space");
    main_loop.do_game_step(0.016);
    main_loop.do_game_step(0.016);

    assert_eq!(jumps.load(Ordering::SeqCst), 1);
    assert_eq!(frames.load(Ordering::SeqCst), 3);

    // The scene-manager-free main loop shutdown is a no-op task.
    wait_result(&main_loop.shutdown_main_loop(), Some(Duration::from_secs(5)))
        .unwrap();

    modules.deinitialize_modules();
    app.shutdown().unwrap();
}
