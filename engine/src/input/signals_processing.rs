// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Temporal signals: `delay` (held-for) and `multiple` (n-taps-within).

use crate::data_block::DataBlock;
use crate::input::gate::SignalGate;
use crate::input::signal::{InputSignal, SignalBase, SignalContext, SignalState};
use crate::input::vec::Vec4;

pub(crate) mod processing_blk {
    pub const DELAY: &str = "delay";
    pub const NUM: &str = "num";
}

/// High once the child has been continuously high for `delay` seconds.
pub struct DelaySignal {
    gate: SignalGate,
    delay: f32,
    passed: f32,
}

impl DelaySignal {
    #[must_use]
    pub fn new() -> Self {
        let mut gate = SignalGate::new("delay", 1);
        gate.base.properties_mut().add(processing_blk::DELAY, 0.0_f32);
        Self {
            gate,
            delay: 0.0,
            passed: 0.0,
        }
    }
}

impl Default for DelaySignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for DelaySignal {
    fn base(&self) -> &SignalBase { &self.gate.base }

    fn base_mut(&mut self) -> &mut SignalBase { &mut self.gate.base }

    fn add_input(&mut self, signal: Box<dyn InputSignal>) {
        self.gate.add_input(signal);
    }

    fn input(&self, index: usize) -> Option<&dyn InputSignal> { self.gate.input(index) }

    fn max_inputs(&self) -> usize { self.gate.max_inputs() }

    fn update(&mut self, dt: f32) {
        if self.gate.base.properties_mut().consume_changed() {
            self.delay = self
                .gate
                .base
                .properties()
                .get_f32(processing_blk::DELAY)
                .unwrap_or_default();
        }

        let mut child_high = false;
        let mut child_vector = Vec4::ZERO;
        self.gate.update_inputs(dt, |input| {
            child_high = input.base().is_high();
            child_vector = input.base().vector4();
        });

        if child_high {
            self.passed += dt;
        } else {
            self.passed = 0.0;
        }

        let state = if child_high && self.passed > self.delay {
            SignalState::High
        } else {
            SignalState::Low
        };
        self.gate.base.update_state(state);
        self.gate.base.vector = child_vector;
    }

    fn serialize_properties(&self, block: &mut DataBlock) {
        self.gate.serialize_children(block);
        block.add_real(
            processing_blk::DELAY,
            self.gate
                .base
                .properties()
                .get_f32(processing_blk::DELAY)
                .unwrap_or_default(),
        );
    }

    fn deserialize_properties(&mut self, block: &DataBlock, ctx: &dyn SignalContext) {
        self.gate.deserialize_children(block, ctx);
        self.gate
            .base
            .properties_mut()
            .set(processing_blk::DELAY, block.get_real(processing_blk::DELAY, 0.0));
    }
}

/// High once the child transitioned low→high `num` times with no gap
/// longer than `delay` seconds; the tap counter resets after `delay`
/// seconds without a transition.
pub struct MultipleSignal {
    gate: SignalGate,
    delay: f32,
    num: i32,
    passed: f32,
    num_current: i32,
}

impl MultipleSignal {
    #[must_use]
    pub fn new() -> Self {
        let mut gate = SignalGate::new("multiple", 1);
        gate.base.properties_mut().add(processing_blk::DELAY, 0.0_f32);
        gate.base.properties_mut().add(processing_blk::NUM, 1_i32);
        Self {
            gate,
            delay: 0.0,
            num: 1,
            passed: 0.0,
            num_current: 0,
        }
    }
}

impl Default for MultipleSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for MultipleSignal {
    fn base(&self) -> &SignalBase { &self.gate.base }

    fn base_mut(&mut self) -> &mut SignalBase { &mut self.gate.base }

    fn add_input(&mut self, signal: Box<dyn InputSignal>) {
        self.gate.add_input(signal);
    }

    fn input(&self, index: usize) -> Option<&dyn InputSignal> { self.gate.input(index) }

    fn max_inputs(&self) -> usize { self.gate.max_inputs() }

    fn update(&mut self, dt: f32) {
        if self.gate.base.properties_mut().consume_changed() {
            self.delay = self
                .gate
                .base
                .properties()
                .get_f32(processing_blk::DELAY)
                .unwrap_or_default();
            self.num = self
                .gate
                .base
                .properties()
                .get_i32(processing_blk::NUM)
                .unwrap_or(1);
        }

        let mut tapped = false;
        let mut child_high = false;
        let mut child_vector = Vec4::ZERO;
        self.gate.update_inputs(dt, |input| {
            child_high = input.base().is_high();
            tapped = child_high && input.base().previous_state() == SignalState::Low;
            child_vector = input.base().vector4();
        });

        if child_high {
            if tapped {
                // Count the low→high transition and restart the gap clock.
                self.num_current += 1;
                self.passed = 0.0;
            }
        } else {
            self.passed += dt;
            if self.passed > self.delay {
                self.num_current = 0;
            }
        }

        let state = if self.num_current >= self.num {
            SignalState::High
        } else {
            SignalState::Low
        };
        self.gate.base.update_state(state);
        self.gate.base.vector = child_vector;
    }

    fn serialize_properties(&self, block: &mut DataBlock) {
        self.gate.serialize_children(block);
        let properties = self.gate.base.properties();
        block.add_real(
            processing_blk::DELAY,
            properties.get_f32(processing_blk::DELAY).unwrap_or_default(),
        );
        block.add_int(
            processing_blk::NUM,
            properties.get_i32(processing_blk::NUM).unwrap_or(1),
        );
    }

    fn deserialize_properties(&mut self, block: &DataBlock, ctx: &dyn SignalContext) {
        self.gate.deserialize_children(block, ctx);
        let properties = self.gate.base.properties_mut();
        properties.set(processing_blk::DELAY, block.get_real(processing_blk::DELAY, 0.0));
        properties.set(processing_blk::NUM, block.get_int(processing_blk::NUM, 1));
    }
}
