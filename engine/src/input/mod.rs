// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Input subsystem: a composable signal graph evaluated once per frame,
//! mapped onto actions gated by context tags.
//!
//! Signals form trees (primitive leaves bound to device controllers,
//! combinator/processing nodes above them); actions bind a signal to a
//! callback and fire on the signal's state per [`ActionType`]. The whole
//! tree round-trips through the [`DataBlock`](crate::data_block::DataBlock)
//! key-value tree.

pub mod action;
pub mod device;
pub mod factory;
pub mod gate;
pub mod properties;
pub mod signal;
pub mod signals_key;
pub mod signals_logic;
pub mod signals_modify;
pub mod signals_move;
pub mod signals_processing;
pub mod system;
pub mod test_fixtures;
pub mod vec;

mod test_input_actions;
mod test_input_signals;

pub use action::{ActionCallback, ActionType, InputAction};
pub use device::{
    DeviceType, InputController, InputDevice, InputSource, InputSourceManager,
    KeyState,
};
pub use factory::{SIGNAL_TYPES, create_signal_by_type};
pub use gate::SignalGate;
pub use properties::{PropertyValue, SignalProperties};
pub use signal::{InputSignal, SignalBase, SignalContext, SignalState};
pub use system::InputSystemImpl;
pub use vec::{Vec2, Vec3, Vec4};
