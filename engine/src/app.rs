// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Process-wide runtime bring-up and teardown.
//!
//! The engine keeps a small number of explicit global handles: the default
//! executor, the timer manager and the service provider. This type owns the
//! full lifecycle so no ambient global is ever mutated from drop glue, and
//! shutdown runs in the required order: provider-wide service shutdown and
//! disposal first (which joins every concurrent container), then the timer,
//! then the executor, with a task-diagnostics report at the very end.

use std::sync::Arc;
use std::time::Duration;

use crate::config::GlobalProperties;
use crate::service::{ServiceProvider, set_service_provider};
use crate::service_registration;
use crate::tasks::{
    ExecutorPtr, ThreadPoolExecutor, TimerManager, diagnostics, set_default_executor,
    set_timer_manager, wait_result,
};

pub struct CoreApplication {
    provider: Arc<ServiceProvider>,
    executor: Arc<ThreadPoolExecutor>,
    properties: Arc<GlobalProperties>,
}

impl CoreApplication {
    /// Brings the runtime up: default thread-pool executor, timer manager,
    /// service provider and the global property tree (registered as a
    /// service).
    pub fn start() -> miette::Result<Self> {
        let executor = ThreadPoolExecutor::try_new()?;
        set_default_executor(Some(executor.clone() as ExecutorPtr));
        set_timer_manager(Some(TimerManager::start()));

        let provider = ServiceProvider::new();
        set_service_provider(Some(provider.clone()));

        let properties = Arc::new(GlobalProperties::new());
        provider.add_service(
            service_registration!(shared properties.clone() => [GlobalProperties]),
        );

        Ok(Self {
            provider,
            executor,
            properties,
        })
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<ServiceProvider> { &self.provider }

    #[must_use]
    pub fn executor(&self) -> ExecutorPtr { self.executor.clone() }

    #[must_use]
    pub fn properties(&self) -> &Arc<GlobalProperties> { &self.properties }

    /// Runs the provider's `pre_init` + `init` phases, blocking until both
    /// completed.
    pub fn initialize_services(&self) -> miette::Result<()> {
        wait_result(&self.provider.pre_init_services(), None)
            .map_err(|error| miette::miette!("pre-init failed: {error}"))?;
        wait_result(&self.provider.init_services(), None)
            .map_err(|error| miette::miette!("init failed: {error}"))?;
        Ok(())
    }

    /// Tears the runtime down in dependency order. Blocks until every
    /// service (including concurrent containers) has shut down and been
    /// disposed.
    pub fn shutdown(self) -> miette::Result<()> {
        let shutdown = self.provider.shutdown_services();
        wait_result(&shutdown, Some(Duration::from_secs(60)))
            .map_err(|error| miette::miette!("service shutdown failed: {error}"))?;

        set_service_provider(None);
        set_timer_manager(None);
        diagnostics::report_alive_tasks();
        set_default_executor(None);
        Ok(())
    }
}

impl std::fmt::Debug for CoreApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CoreApplication")
    }
}
