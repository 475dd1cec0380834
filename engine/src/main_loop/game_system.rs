// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Per-frame game-system interfaces and their execution-mode attribute.
//!
//! A game system participates in one or more of the frame phases:
//! pre-update, scene update, post-update. Scene-update systems may ask to
//! run *concurrently* - on a dedicated thread with its own work queue -
//! through the [`PREFERRED_EXECUTION_MODE`] class attribute.

use std::time::Duration;

use strum_macros::{Display, EnumString};

use crate::tasks::Task;

/// Class-attribute key carrying an [`ExecutionMode`].
pub const PREFERRED_EXECUTION_MODE: &str = "PreferredExecutionMode";

#[derive(Clone, Copy, Debug, Default, Display, EnumString, Eq, PartialEq)]
pub enum ExecutionMode {
    /// Updated inline in the main frame step.
    #[default]
    Sequential,
    /// Hosted on a dedicated thread with its own work queue.
    Concurrent,
}

/// First frame phase; runs before the scene updates.
pub trait GamePreUpdate: Send + Sync {
    fn game_pre_update(&self, dt: Duration);
}

/// Last frame phase; runs after the scene updates.
pub trait GamePostUpdate: Send + Sync {
    fn game_post_update(&self, dt: Duration);
}

/// Scene-phase participant. Sequential systems are driven by the main loop;
/// concurrent ones by their container thread.
pub trait GameSceneUpdate: Send + Sync {
    /// One simulation step. Resolving `false` requests main-loop exit (for
    /// a concurrent system: terminates its update loop).
    fn update(&self, dt: Duration) -> Task<bool>;

    /// Publishes the results of the last step to the rest of the engine.
    /// For a concurrent system this is invoked under the application's
    /// default executor, not the system's own thread.
    fn sync_scene_state(&self) {}

    /// A fixed simulation step, or `None` to run free (every loop
    /// iteration, as fast as the queue allows).
    fn fixed_update_time_step(&self) -> Option<Duration> { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn execution_mode_round_trips_through_strings() {
        assert_eq!(ExecutionMode::Sequential.to_string(), "Sequential");
        assert_eq!(
            ExecutionMode::from_str("Concurrent").unwrap(),
            ExecutionMode::Concurrent
        );
        assert!(ExecutionMode::from_str("Sideways").is_err());
    }

    #[test]
    fn sequential_is_the_default_mode() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
    }
}
