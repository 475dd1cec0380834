// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Device and controller contracts.
//!
//! Devices are platform collaborators (the actual keyboard/mouse/gamepad
//! backend lives outside the core); a controller is the engine-side proxy a
//! signal binds to, resolved by name. Input *sources* identify which OS
//! surface (window) events arrive through.

use std::sync::Arc;

use strum_macros::Display;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum DeviceType {
    Unsupported,
    Keyboard,
    Mouse,
    Joystick,
    Touch,
    Other,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyState {
    Released,
    Pressed,
}

/// Platform-dependent input device access.
pub trait InputDevice: Send + Sync {
    fn name(&self) -> String;

    fn device_type(&self) -> DeviceType;

    fn key_count(&self) -> usize;

    fn axis_count(&self) -> usize;

    fn key_name(&self, key_id: u32) -> String;

    fn axis_name(&self, axis_id: u32) -> String;

    /// Resolves a key id by name; `None` for unknown keys.
    fn key_by_name(&self, key_name: &str) -> Option<u32>;

    fn axis_by_name(&self, axis_name: &str) -> Option<u32>;

    fn key_state(&self, key_id: u32) -> KeyState;

    fn axis_state(&self, axis_id: u32) -> f32;
}

/// Platform-independent proxy a signal binds to.
pub trait InputController: Send + Sync {
    fn name(&self) -> String;

    fn device(&self) -> Arc<dyn InputDevice>;

    /// Called once per frame before signals evaluate.
    fn update(&self, _dt: f32) {}
}

pub(crate) struct InputControllerImpl {
    name: String,
    device: Arc<dyn InputDevice>,
}

impl InputControllerImpl {
    pub(crate) fn new(name: String, device: Arc<dyn InputDevice>) -> Arc<Self> {
        Arc::new(Self { name, device })
    }
}

impl InputController for InputControllerImpl {
    fn name(&self) -> String { self.name.clone() }

    fn device(&self) -> Arc<dyn InputDevice> { self.device.clone() }
}

/// Platform handle + name pair identifying where OS input events arrive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InputSource {
    pub handle: usize,
    pub name: String,
}

/// Collaborator that supplies the current set of input sources (typically
/// one per platform window).
pub trait InputSourceManager: Send + Sync {
    fn sources(&self) -> Vec<InputSource>;
}
