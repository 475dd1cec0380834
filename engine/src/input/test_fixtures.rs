// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! In-memory input device for tests and examples - the platform backend
//! stand-in.

use std::sync::Mutex;

use crate::input::device::{DeviceType, InputDevice, KeyState};

#[derive(Debug)]
pub struct TestInputDevice {
    name: String,
    device_type: DeviceType,
    key_names: Vec<String>,
    key_states: Mutex<Vec<KeyState>>,
    axes: Mutex<Vec<f32>>,
}

impl TestInputDevice {
    #[must_use]
    pub fn keyboard(name: impl Into<String>, keys: &[&str]) -> Self {
        Self {
            name: name.into(),
            device_type: DeviceType::Keyboard,
            key_names: keys.iter().map(|&key| key.to_owned()).collect(),
            key_states: Mutex::new(vec![KeyState::Released; keys.len()]),
            axes: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn mouse(name: impl Into<String>, keys: &[&str], axis_count: usize) -> Self {
        Self {
            name: name.into(),
            device_type: DeviceType::Mouse,
            key_names: keys.iter().map(|&key| key.to_owned()).collect(),
            key_states: Mutex::new(vec![KeyState::Released; keys.len()]),
            axes: Mutex::new(vec![0.0; axis_count]),
        }
    }

    pub fn press(&self, key_name: &str) { self.set_key(key_name, KeyState::Pressed); }

    pub fn release(&self, key_name: &str) {
        self.set_key(key_name, KeyState::Released);
    }

    pub fn set_axis(&self, axis_id: usize, value: f32) {
        let mut axes = lock(&self.axes);
        if axis_id < axes.len() {
            axes[axis_id] = value;
        }
    }

    fn set_key(&self, key_name: &str, state: KeyState) {
        if let Some(key_id) = self.key_by_name(key_name) {
            lock(&self.key_states)[key_id as usize] = state;
        }
    }
}

impl InputDevice for TestInputDevice {
    fn name(&self) -> String { self.name.clone() }

    fn device_type(&self) -> DeviceType { self.device_type }

    fn key_count(&self) -> usize { self.key_names.len() }

    fn axis_count(&self) -> usize { lock(&self.axes).len() }

    fn key_name(&self, key_id: u32) -> String {
        self.key_names
            .get(key_id as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn axis_name(&self, axis_id: u32) -> String { format!("axis{axis_id}") }

    fn key_by_name(&self, key_name: &str) -> Option<u32> {
        self.key_names
            .iter()
            .position(|name| name == key_name)
            .map(|index| index as u32)
    }

    fn axis_by_name(&self, axis_name: &str) -> Option<u32> {
        axis_name
            .strip_prefix("axis")
            .and_then(|suffix| suffix.parse().ok())
    }

    fn key_state(&self, key_id: u32) -> KeyState {
        lock(&self.key_states)
            .get(key_id as usize)
            .copied()
            .unwrap_or(KeyState::Released)
    }

    fn axis_state(&self, axis_id: u32) -> f32 {
        lock(&self.axes).get(axis_id as usize).copied().unwrap_or(0.0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
