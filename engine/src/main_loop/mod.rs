// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Main-loop orchestration: game-system discovery and classification,
//! per-frame phase sequencing, and dedicated threads for concurrent
//! systems.

pub mod collaborators;
pub mod concurrent_container;
pub mod game_system;
pub mod main_loop_service;

pub use collaborators::{DebugGuiService, PlatformWindowService, SceneManager};
pub use concurrent_container::ConcurrentExecutionContainer;
pub use game_system::{
    ExecutionMode, GamePostUpdate, GamePreUpdate, GameSceneUpdate,
    PREFERRED_EXECUTION_MODE,
};
pub use main_loop_service::MainLoopService;
