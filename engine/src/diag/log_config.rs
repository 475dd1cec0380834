// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Logging configuration: where log lines go and at which level.

use std::path::PathBuf;

use tracing_core::LevelFilter;

/// Display sink for log output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DisplayPreference {
    #[default]
    Stderr,
    Stdout,
    /// No console output (file-only setups).
    None,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level_filter: LevelFilter,
    pub display: DisplayPreference,
    /// File-sink stem; the full file name becomes
    /// `<stem>.<YYYY-MM-DD>.<HH-MM-SS>.log` under the log directory.
    pub file_stem: Option<String>,
    /// Overrides the default `<LocalAppData>/nau/logs` directory.
    pub log_dir_override: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level_filter: LevelFilter::INFO,
            display: DisplayPreference::default(),
            file_stem: None,
            log_dir_override: None,
        }
    }
}

impl LogConfig {
    /// Console-only config at the given level.
    #[must_use]
    pub fn console(level_filter: LevelFilter) -> Self {
        Self {
            level_filter,
            ..Self::default()
        }
    }

    /// Console + file sink config.
    #[must_use]
    pub fn with_file(level_filter: LevelFilter, file_stem: impl Into<String>) -> Self {
        Self {
            level_filter,
            file_stem: Some(file_stem.into()),
            ..Self::default()
        }
    }
}

/// Default log directory: `<LocalAppData>/nau/logs` on Windows,
/// `~/.local/share/nau/logs` elsewhere.
#[must_use]
pub fn default_log_dir() -> PathBuf {
    let app_data = std::env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("XDG_DATA_HOME").map(PathBuf::from)
        })
        .or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".local").join("share"))
        })
        .unwrap_or_else(std::env::temp_dir);
    app_data.join("nau").join("logs")
}

/// `<stem>.<YYYY-MM-DD>.<HH-MM-SS>.log`
#[must_use]
pub fn timestamped_log_file_name(stem: &str) -> String {
    let now = chrono::Local::now();
    format!("{stem}.{}.log", now.format("%Y-%m-%d.%H-%M-%S"))
}
