// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Axis-driven signals: `move` (absolute values) and `move_relative`
//! (per-frame offsets).
//!
//! Axis ids come from the `axis_x..axis_w` properties (`-1` = unused) and
//! double as the vector component each value lands in.

use crate::data_block::DataBlock;
use crate::input::signal::{InputSignal, SignalBase, SignalContext, SignalState};
use crate::input::vec::{AXIS_COUNT, Vec4};

pub(crate) mod axis_blk {
    pub const AXIS_X: &str = "axis_x";
    pub const AXIS_Y: &str = "axis_y";
    pub const AXIS_Z: &str = "axis_z";
    pub const AXIS_W: &str = "axis_w";
}

const AXIS_KEYS: [&str; AXIS_COUNT] = [
    axis_blk::AXIS_X,
    axis_blk::AXIS_Y,
    axis_blk::AXIS_Z,
    axis_blk::AXIS_W,
];

struct AxisSignalCore {
    base: SignalBase,
    /// Cached axis ids; re-read only when the properties change.
    axes: [i32; AXIS_COUNT],
    value_prev: Vec4,
}

impl AxisSignalCore {
    fn new(signal_type: &'static str) -> Self {
        let mut base = SignalBase::new(signal_type);
        for key in AXIS_KEYS {
            base.properties_mut().add(key, -1_i32);
        }
        Self {
            base,
            axes: [-1; AXIS_COUNT],
            value_prev: Vec4::ZERO,
        }
    }

    fn refresh_axes(&mut self) {
        if self.base.properties_mut().consume_changed() {
            for (slot, key) in self.axes.iter_mut().zip(AXIS_KEYS) {
                *slot = self.base.properties().get_i32(key).unwrap_or(-1);
            }
        }
    }

    /// Reads every configured axis into `target` (component = axis id).
    fn read_axes(&self, target: &mut Vec4) {
        let Some(controller) = self.base.controller() else { return };
        let device = controller.device();
        for &axis in &self.axes {
            if (0..AXIS_COUNT as i32).contains(&axis) {
                target[axis as usize] = device.axis_state(axis as u32);
            }
        }
    }

    fn serialize_axes(&self, block: &mut DataBlock) {
        for key in AXIS_KEYS {
            block.add_int(key, self.base.properties().get_i32(key).unwrap_or(-1));
        }
    }

    fn deserialize_axes(&mut self, block: &DataBlock) {
        for key in AXIS_KEYS {
            self.base.properties_mut().set(key, block.get_int(key, -1));
        }
    }
}

/// High on any frame the absolute axis values differ from the previous
/// frame; the vector carries the absolute values.
pub struct MoveSignal {
    core: AxisSignalCore,
}

impl MoveSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: AxisSignalCore::new("move"),
        }
    }
}

impl Default for MoveSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for MoveSignal {
    fn base(&self) -> &SignalBase { &self.core.base }

    fn base_mut(&mut self) -> &mut SignalBase { &mut self.core.base }

    fn update(&mut self, _dt: f32) {
        self.core.refresh_axes();

        let mut vector = self.core.base.vector4();
        self.core.read_axes(&mut vector);
        self.core.base.vector = vector;

        if vector.similar(self.core.value_prev) {
            self.core.base.update_state(SignalState::Low);
        } else {
            self.core.base.update_state(SignalState::High);
            self.core.value_prev = vector;
        }
    }

    fn serialize_properties(&self, block: &mut DataBlock) {
        self.core.serialize_axes(block);
    }

    fn deserialize_properties(&mut self, block: &DataBlock, _ctx: &dyn SignalContext) {
        self.core.deserialize_axes(block);
    }
}

/// High on any frame the axis values moved; the vector carries
/// `previous − current`.
pub struct MoveRelativeSignal {
    core: AxisSignalCore,
    value_curr: Vec4,
}

impl MoveRelativeSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: AxisSignalCore::new("move_relative"),
            value_curr: Vec4::ZERO,
        }
    }
}

impl Default for MoveRelativeSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for MoveRelativeSignal {
    fn base(&self) -> &SignalBase { &self.core.base }

    fn base_mut(&mut self) -> &mut SignalBase { &mut self.core.base }

    fn update(&mut self, _dt: f32) {
        self.core.refresh_axes();

        let mut current = self.value_curr;
        self.core.read_axes(&mut current);
        self.value_curr = current;

        if current.similar(self.core.value_prev) {
            self.core.base.update_state(SignalState::Low);
        } else {
            self.core.base.update_state(SignalState::High);
            self.core.base.vector = self.core.value_prev - current;
            self.core.value_prev = current;
        }
    }

    fn serialize_properties(&self, block: &mut DataBlock) {
        self.core.serialize_axes(block);
    }

    fn deserialize_properties(&mut self, block: &DataBlock, _ctx: &dyn SignalContext) {
        self.core.deserialize_axes(block);
    }
}
