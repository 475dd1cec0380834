// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Signal factory over the closed set of signal types.

use crate::input::signal::InputSignal;
use crate::input::signals_key::{KeyAxisSignal, PressedSignal, ReleasedSignal};
use crate::input::signals_logic::{AndSignal, NotSignal, OrSignal};
use crate::input::signals_modify::{ClampSignal, DeadZoneSignal, ScaleSignal};
use crate::input::signals_move::{MoveRelativeSignal, MoveSignal};
use crate::input::signals_processing::{DelaySignal, MultipleSignal};

/// Every signal type tag the factory understands.
pub const SIGNAL_TYPES: [&str; 13] = [
    "pressed",
    "released",
    "move",
    "move_relative",
    "key_axis",
    "or",
    "and",
    "not",
    "delay",
    "multiple",
    "scale",
    "dead_zone",
    "clamp",
];

/// Creates a signal by its type tag; `None` for unknown tags.
#[must_use]
pub fn create_signal_by_type(signal_type: &str) -> Option<Box<dyn InputSignal>> {
    let signal: Box<dyn InputSignal> = match signal_type {
        "pressed" => Box::new(PressedSignal::new()),
        "released" => Box::new(ReleasedSignal::new()),
        "move" => Box::new(MoveSignal::new()),
        "move_relative" => Box::new(MoveRelativeSignal::new()),
        "key_axis" => Box::new(KeyAxisSignal::new()),
        "or" => Box::new(OrSignal::new()),
        "and" => Box::new(AndSignal::new()),
        "not" => Box::new(NotSignal::new()),
        "delay" => Box::new(DelaySignal::new()),
        "multiple" => Box::new(MultipleSignal::new()),
        "scale" => Box::new(ScaleSignal::new()),
        "dead_zone" => Box::new(DeadZoneSignal::new()),
        "clamp" => Box::new(ClampSignal::new()),
        _ => return None,
    };
    Some(signal)
}
