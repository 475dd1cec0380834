// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Composite-signal plumbing: the bounded child list and its evaluation
//! pass.
//!
//! A composite signal pre-aggregates its children's vectors (componentwise
//! sum) before applying its own transform, and nests its children into the
//! serialized tree as `signal0..signalN-1` with a sibling `signals = N`.

use smallvec::SmallVec;

use crate::data_block::DataBlock;
use crate::input::signal::{InputSignal, SignalBase, SignalContext, blk};
use crate::input::vec::Vec4;

const MAX_GATE_INPUTS: usize = 4;

pub(crate) mod gate_blk {
    pub const SIGNAL: &str = "signal";
    pub const SIGNALS: &str = "signals";
}

pub struct SignalGate {
    pub(crate) base: SignalBase,
    inputs: SmallVec<[Box<dyn InputSignal>; MAX_GATE_INPUTS]>,
    max_inputs: usize,
}

impl SignalGate {
    #[must_use]
    pub fn new(signal_type: &'static str, max_inputs: usize) -> Self {
        debug_assert!(max_inputs <= MAX_GATE_INPUTS);
        Self {
            base: SignalBase::new(signal_type),
            inputs: SmallVec::new(),
            max_inputs,
        }
    }

    pub fn add_input(&mut self, signal: Box<dyn InputSignal>) {
        if self.inputs.len() >= self.max_inputs {
            debug_assert!(false, "signal child list is full");
            tracing::error!(
                target: "input",
                signal_type = self.base.signal_type(),
                max_inputs = self.max_inputs,
                "ignoring child signal beyond the input cap"
            );
            return;
        }
        self.inputs.push(signal);
    }

    #[must_use]
    pub fn input(&self, index: usize) -> Option<&dyn InputSignal> {
        self.inputs.get(index).map(Box::as_ref)
    }

    #[must_use]
    pub fn max_inputs(&self) -> usize { self.max_inputs }

    /// Updates every child, sums their vectors into this node's vector and
    /// lets `visit` observe each updated child.
    pub fn update_inputs(&mut self, dt: f32, mut visit: impl FnMut(&dyn InputSignal)) {
        self.base.vector = Vec4::ZERO;
        for input in &mut self.inputs {
            input.update(dt);
            self.base.vector += input.base().vector4();
            visit(input.as_ref());
        }
    }

    pub fn serialize_children(&self, block: &mut DataBlock) {
        for (index, input) in self.inputs.iter().enumerate() {
            let child = block.add_block(format!("{}{index}", gate_blk::SIGNAL));
            input.serialize(child);
        }
        block.add_int(gate_blk::SIGNALS, self.inputs.len() as i32);
    }

    pub fn deserialize_children(&mut self, block: &DataBlock, ctx: &dyn SignalContext) {
        let count = block.get_int(gate_blk::SIGNALS, 0);
        for index in 0..count {
            let Some(child_block) = block.get_block(&format!("{}{index}", gate_blk::SIGNAL))
            else {
                continue;
            };
            let Some(signal_type) = child_block.get_str(blk::TYPE) else {
                continue;
            };
            let Some(mut signal) = ctx.create_signal(signal_type) else {
                tracing::error!(
                    target: "input",
                    signal_type,
                    "unknown nested signal type"
                );
                continue;
            };
            signal.deserialize(child_block, ctx);
            self.inputs.push(signal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::signal::SignalState;

    struct ConstantSignal {
        base: SignalBase,
        level: SignalState,
    }

    impl ConstantSignal {
        fn boxed(level: SignalState, vector: Vec4) -> Box<dyn InputSignal> {
            let mut base = SignalBase::new("constant");
            base.vector = vector;
            Box::new(Self { base, level })
        }
    }

    impl InputSignal for ConstantSignal {
        fn base(&self) -> &SignalBase { &self.base }

        fn base_mut(&mut self) -> &mut SignalBase { &mut self.base }

        fn update(&mut self, _dt: f32) {
            let level = self.level;
            self.base.update_state(level);
        }

        fn serialize_properties(&self, _block: &mut DataBlock) {}

        fn deserialize_properties(
            &mut self,
            _block: &DataBlock,
            _ctx: &dyn SignalContext,
        ) {
        }
    }

    #[test]
    fn children_vectors_are_summed() {
        let mut gate = SignalGate::new("or", 4);
        gate.add_input(ConstantSignal::boxed(
            SignalState::High,
            Vec4::new(1.0, 0.0, 0.0, 0.0),
        ));
        gate.add_input(ConstantSignal::boxed(
            SignalState::Low,
            Vec4::new(0.5, 2.0, 0.0, 0.0),
        ));

        let mut high_children = 0;
        gate.update_inputs(0.016, |input| {
            if input.base().is_high() {
                high_children += 1;
            }
        });

        assert_eq!(gate.base.vector4(), Vec4::new(1.5, 2.0, 0.0, 0.0));
        assert_eq!(high_children, 1);
    }

    #[test]
    fn child_cap_is_enforced() {
        let mut gate = SignalGate::new("not", 1);
        gate.add_input(ConstantSignal::boxed(SignalState::Low, Vec4::ZERO));
        assert!(gate.input(0).is_some());
        assert_eq!(gate.max_inputs(), 1);
        // The second child is refused (debug builds assert).
        if cfg!(not(debug_assertions)) {
            gate.add_input(ConstantSignal::boxed(SignalState::Low, Vec4::ZERO));
            assert!(gate.input(1).is_none());
        }
    }
}
