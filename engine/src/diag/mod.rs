// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Diagnostics: tracing-based logging with console and timestamped file
//! sinks.
//!
//! Log categories used by the core are tracing targets: `task`, `service`,
//! `input`, `module`.

pub mod log_config;
pub mod log_init;
pub mod logging_service;

pub use log_config::{
    DisplayPreference, LogConfig, default_log_dir, timestamped_log_file_name,
};
pub use log_init::{try_create_file_appender, try_init};
pub use logging_service::LoggingService;
