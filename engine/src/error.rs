// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Domain errors carried by task cells and surfaced at API boundaries.
//!
//! Tasks transport their failure as a shared [`ErrorPtr`] so that every
//! observer of a rejected task (the awaiter, aggregate awaiters, diagnostic
//! logging) sees the same value without cloning the underlying error.
//! Fallible top-level operations return [`miette::Result`] instead.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

/// Shared handle to a task error. Cheap to clone; every holder observes the
/// same underlying error value.
pub type ErrorPtr = Arc<EngineError>;

/// Result type produced by awaiting a [`Task`](crate::tasks::Task).
pub type TaskResult<T> = Result<T, ErrorPtr>;

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// A blocking or aggregate wait ran out of time.
    #[error("operation timed out")]
    Timeout,

    /// The operation was abandoned before it could complete (e.g. the timer
    /// manager was torn down underneath a pending delay).
    #[error("operation was cancelled: {0}")]
    Cancelled(String),

    /// A task completed with an error payload supplied by its producer.
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// API misuse that is fatal in debug builds and reported in release.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A service `pre_init`/`init` task rejected.
    #[error("service initialization failed: {0}")]
    ServiceInitialization(String),

    /// A required module could not be activated.
    #[error("module `{name}` could not be loaded: {reason}")]
    ModuleLoad { name: String, reason: String },

    /// Surfaced by I/O collaborators; the core treats it as a rejection.
    #[error("i/o failure: {0}")]
    Io(String),

    /// Surfaced by parsing collaborators; the core treats it as a rejection.
    #[error("parse failure: {0}")]
    Parse(String),
}

impl EngineError {
    #[must_use]
    pub fn timeout() -> ErrorPtr { Arc::new(EngineError::Timeout) }

    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> ErrorPtr {
        Arc::new(EngineError::Cancelled(reason.into()))
    }

    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> ErrorPtr {
        Arc::new(EngineError::Rejected(reason.into()))
    }

    #[must_use]
    pub fn contract_violation(reason: impl Into<String>) -> ErrorPtr {
        Arc::new(EngineError::ContractViolation(reason.into()))
    }

    pub fn is_timeout(&self) -> bool { matches!(self, EngineError::Timeout) }

    pub fn is_cancelled(&self) -> bool { matches!(self, EngineError::Cancelled(_)) }
}
