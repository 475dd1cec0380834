// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Key-driven signals: `pressed`, `released`, `key_axis`.
//!
//! The key id is resolved from the `key` property through the bound
//! controller's device and cached; it is re-resolved only when the
//! properties change.

use crate::data_block::DataBlock;
use crate::input::device::KeyState;
use crate::input::signal::{InputSignal, SignalBase, SignalContext, SignalState};

pub(crate) mod key_blk {
    pub const KEY: &str = "key";
    pub const AXIS: &str = "axis";
    pub const COEFF: &str = "coeff";
}

/// Shared behavior of the key-driven signal types.
struct KeySignalCore {
    base: SignalBase,
    /// Cached key id; `None` until resolved.
    key: Option<u32>,
}

impl KeySignalCore {
    fn new(signal_type: &'static str) -> Self {
        let mut base = SignalBase::new(signal_type);
        base.properties_mut().add(key_blk::KEY, "");
        Self { base, key: None }
    }

    /// Current device state of the configured key, if resolvable.
    fn key_state(&mut self) -> Option<KeyState> {
        let changed = self.base.properties_mut().consume_changed();
        if self.key.is_none() || changed {
            let key_name = self
                .base
                .properties()
                .get_str(key_blk::KEY)
                .unwrap_or_default()
                .to_owned();
            if key_name.is_empty() {
                return None;
            }
            let controller = self.base.controller()?.clone();
            self.key = controller.device().key_by_name(&key_name);
        }

        let key = self.key?;
        let controller = self.base.controller()?.clone();
        Some(controller.device().key_state(key))
    }

    fn serialize_key(&self, block: &mut DataBlock) {
        block.add_str(
            key_blk::KEY,
            self.base.properties().get_str(key_blk::KEY).unwrap_or_default(),
        );
    }

    fn deserialize_key(&mut self, block: &DataBlock) {
        self.key = None;
        self.base
            .properties_mut()
            .set(key_blk::KEY, block.get_str(key_blk::KEY).unwrap_or_default());
    }
}

/// High while the key is pressed.
pub struct PressedSignal {
    core: KeySignalCore,
}

impl PressedSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: KeySignalCore::new("pressed"),
        }
    }
}

impl Default for PressedSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for PressedSignal {
    fn base(&self) -> &SignalBase { &self.core.base }

    fn base_mut(&mut self) -> &mut SignalBase { &mut self.core.base }

    fn update(&mut self, _dt: f32) {
        let Some(key_state) = self.core.key_state() else { return };
        let state = if key_state == KeyState::Pressed {
            SignalState::High
        } else {
            SignalState::Low
        };
        self.core.base.update_state(state);
    }

    fn serialize_properties(&self, block: &mut DataBlock) {
        self.core.serialize_key(block);
    }

    fn deserialize_properties(&mut self, block: &DataBlock, _ctx: &dyn SignalContext) {
        self.core.deserialize_key(block);
    }
}

/// High while the key is released.
pub struct ReleasedSignal {
    core: KeySignalCore,
}

impl ReleasedSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: KeySignalCore::new("released"),
        }
    }
}

impl Default for ReleasedSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for ReleasedSignal {
    fn base(&self) -> &SignalBase { &self.core.base }

    fn base_mut(&mut self) -> &mut SignalBase { &mut self.core.base }

    fn update(&mut self, _dt: f32) {
        let Some(key_state) = self.core.key_state() else { return };
        let state = if key_state == KeyState::Released {
            SignalState::High
        } else {
            SignalState::Low
        };
        self.core.base.update_state(state);
    }

    fn serialize_properties(&self, block: &mut DataBlock) {
        self.core.serialize_key(block);
    }

    fn deserialize_properties(&mut self, block: &DataBlock, _ctx: &dyn SignalContext) {
        self.core.deserialize_key(block);
    }
}

/// Converts a key state into an axis value: while the key is pressed the
/// configured vector component carries `coeff`, otherwise zero.
pub struct KeyAxisSignal {
    core: KeySignalCore,
}

impl KeyAxisSignal {
    #[must_use]
    pub fn new() -> Self {
        let mut core = KeySignalCore::new("key_axis");
        core.base.properties_mut().add(key_blk::AXIS, -1_i32);
        core.base.properties_mut().add(key_blk::COEFF, 0.0_f32);
        Self { core }
    }
}

impl Default for KeyAxisSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for KeyAxisSignal {
    fn base(&self) -> &SignalBase { &self.core.base }

    fn base_mut(&mut self) -> &mut SignalBase { &mut self.core.base }

    fn update(&mut self, _dt: f32) {
        let Some(key_state) = self.core.key_state() else { return };

        let axis = self
            .core
            .base
            .properties()
            .get_i32(key_blk::AXIS)
            .unwrap_or(-1);
        if !(0..4).contains(&axis) {
            return;
        }
        let coeff = self
            .core
            .base
            .properties()
            .get_f32(key_blk::COEFF)
            .unwrap_or_default();

        if key_state == KeyState::Pressed {
            self.core.base.update_state(SignalState::High);
            self.core.base.vector[axis as usize] = coeff;
        } else {
            self.core.base.update_state(SignalState::Low);
            self.core.base.vector[axis as usize] = 0.0;
        }
    }

    fn serialize_properties(&self, block: &mut DataBlock) {
        self.core.serialize_key(block);
        let properties = self.core.base.properties();
        block.add_int(key_blk::AXIS, properties.get_i32(key_blk::AXIS).unwrap_or(-1));
        block.add_real(
            key_blk::COEFF,
            properties.get_f32(key_blk::COEFF).unwrap_or_default(),
        );
    }

    fn deserialize_properties(&mut self, block: &DataBlock, _ctx: &dyn SignalContext) {
        self.core.deserialize_key(block);
        let properties = self.core.base.properties_mut();
        properties.set(key_blk::AXIS, block.get_int(key_blk::AXIS, -1));
        properties.set(key_blk::COEFF, block.get_real(key_blk::COEFF, 0.0));
    }
}
