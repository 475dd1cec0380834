// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Lifecycle interfaces a service may expose to the provider.
//!
//! `pre_init`/`init` run dependency-ordered during startup, `shutdown` runs
//! in reverse order; disposal runs after shutdown (async variants first).
//! A service exposes any subset of these - the provider queries them by
//! interface.

use std::any::TypeId;

use crate::tasks::Task;

/// Participation in the dependency-ordered initialization phases.
pub trait ServiceInitialization: Send + Sync {
    fn pre_init_service(&self) -> Task<()> { Task::resolved(()) }

    fn init_service(&self) -> Task<()> { Task::resolved(()) }

    /// Interface ids of services this one must be initialized after.
    fn service_dependencies(&self) -> Vec<TypeId> { Vec::new() }
}

/// Participation in the (reverse-ordered) shutdown phase.
pub trait ServiceShutdown: Send + Sync {
    fn shutdown_service(&self) -> Task<()>;
}

/// Asynchronous disposal; runs after shutdown, awaited concurrently across
/// services. A service exposing both disposal interfaces gets
/// `dispose_async` first and may leave `dispose` empty.
pub trait AsyncDisposable: Send + Sync {
    fn dispose_async(&self) -> Task<()>;
}

/// Synchronous disposal; runs last.
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}
