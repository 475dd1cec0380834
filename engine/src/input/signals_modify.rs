// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Vector-shaping signals: `scale`, `dead_zone`, `clamp`.
//!
//! All three forward the child's state untouched and post-process the
//! aggregated vector.

use crate::data_block::DataBlock;
use crate::input::gate::SignalGate;
use crate::input::signal::{InputSignal, SignalBase, SignalContext, SignalState};
use crate::input::vec::AXIS_COUNT;

pub(crate) mod modify_blk {
    pub const SCALE: &str = "scale";
    pub const DEAD_ZONE: &str = "dead_zone";
    pub const CLAMP: &str = "clamp";
}

macro_rules! modify_signal {
    (
        $(#[$docs:meta])*
        $name:ident, $type_tag:literal, $property:path, $apply:expr
    ) => {
        $(#[$docs])*
        pub struct $name {
            gate: SignalGate,
            factor: f32,
        }

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                let mut gate = SignalGate::new($type_tag, 1);
                gate.base.properties_mut().add($property, 0.0_f32);
                Self { gate, factor: 0.0 }
            }
        }

        impl Default for $name {
            fn default() -> Self { Self::new() }
        }

        impl InputSignal for $name {
            fn base(&self) -> &SignalBase { &self.gate.base }

            fn base_mut(&mut self) -> &mut SignalBase { &mut self.gate.base }

            fn add_input(&mut self, signal: Box<dyn InputSignal>) {
                self.gate.add_input(signal);
            }

            fn input(&self, index: usize) -> Option<&dyn InputSignal> {
                self.gate.input(index)
            }

            fn max_inputs(&self) -> usize { self.gate.max_inputs() }

            fn update(&mut self, dt: f32) {
                if self.gate.base.properties_mut().consume_changed() {
                    self.factor = self
                        .gate
                        .base
                        .properties()
                        .get_f32($property)
                        .unwrap_or_default();
                }

                let mut state = SignalState::Low;
                self.gate.update_inputs(dt, |input| {
                    state = input.base().state();
                });
                self.gate.base.update_state(state);

                let apply: fn(&mut SignalGate, f32) = $apply;
                apply(&mut self.gate, self.factor);
            }

            fn serialize_properties(&self, block: &mut DataBlock) {
                self.gate.serialize_children(block);
                block.add_real(
                    $property,
                    self.gate.base.properties().get_f32($property).unwrap_or_default(),
                );
            }

            fn deserialize_properties(
                &mut self,
                block: &DataBlock,
                ctx: &dyn SignalContext,
            ) {
                self.gate.deserialize_children(block, ctx);
                self.gate
                    .base
                    .properties_mut()
                    .set($property, block.get_real($property, 0.0));
            }
        }
    };
}

modify_signal!(
    /// Multiplies every vector component by `scale`.
    ScaleSignal,
    "scale",
    modify_blk::SCALE,
    |gate, factor| {
        gate.base.vector = gate.base.vector * factor;
    }
);

modify_signal!(
    /// Zeroes every vector component whose magnitude is below `dead_zone`.
    DeadZoneSignal,
    "dead_zone",
    modify_blk::DEAD_ZONE,
    |gate, factor| {
        for axis in 0..AXIS_COUNT {
            let value = gate.base.vector[axis];
            if value.abs() < factor {
                gate.base.vector[axis] = 0.0;
            }
        }
    }
);

modify_signal!(
    /// Clamps every vector component to `[-clamp, +clamp]`.
    ClampSignal,
    "clamp",
    modify_blk::CLAMP,
    |gate, factor| {
        for axis in 0..AXIS_COUNT {
            let value = gate.base.vector[axis];
            gate.base.vector[axis] = value.clamp(-factor, factor);
        }
    }
);
