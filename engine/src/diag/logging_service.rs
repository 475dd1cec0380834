// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The logging service: installs the sinks once per process and reports
//! where the file sink writes.

use std::path::PathBuf;

use crate::diag::log_config::LogConfig;
use crate::diag::log_init::try_init;
use crate::service::ServiceShutdown;
use crate::tasks::Task;

pub struct LoggingService {
    log_file_path: Option<PathBuf>,
}

impl LoggingService {
    /// Installs the global subscriber. When a subscriber is already set
    /// (embedding host, repeated engine bring-up in tests) the service
    /// degrades to a no-op with a warning, mirroring "logger is already
    /// set".
    #[must_use]
    pub fn new(config: &LogConfig) -> Self {
        let log_file_path = match try_init(config) {
            Ok(log_file_path) => log_file_path,
            Err(error) => {
                tracing::warn!(target: "service", %error, "logger is already set");
                None
            }
        };
        Self { log_file_path }
    }

    #[must_use]
    pub fn log_file_path(&self) -> Option<&PathBuf> {
        self.log_file_path.as_ref()
    }
}

impl ServiceShutdown for LoggingService {
    fn shutdown_service(&self) -> Task<()> {
        // The file appender writes synchronously; nothing to flush here.
        Task::resolved(())
    }
}

impl std::fmt::Debug for LoggingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingService")
            .field("log_file_path", &self.log_file_path)
            .finish()
    }
}
