// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Combinator signals: `or`, `and`, `not`.
//!
//! Child vectors are pre-summed by the gate; the combinators only derive
//! the state.

use crate::data_block::DataBlock;
use crate::input::gate::SignalGate;
use crate::input::signal::{InputSignal, SignalBase, SignalContext, SignalState};

macro_rules! gate_signal_boilerplate {
    () => {
        fn base(&self) -> &SignalBase { &self.gate.base }

        fn base_mut(&mut self) -> &mut SignalBase { &mut self.gate.base }

        fn add_input(&mut self, signal: Box<dyn InputSignal>) {
            self.gate.add_input(signal);
        }

        fn input(&self, index: usize) -> Option<&dyn InputSignal> {
            self.gate.input(index)
        }

        fn max_inputs(&self) -> usize { self.gate.max_inputs() }

        fn serialize_properties(&self, block: &mut DataBlock) {
            self.gate.serialize_children(block);
        }

        fn deserialize_properties(
            &mut self,
            block: &DataBlock,
            ctx: &dyn SignalContext,
        ) {
            self.gate.deserialize_children(block, ctx);
        }
    };
}

/// High iff any child is high.
pub struct OrSignal {
    gate: SignalGate,
}

impl OrSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: SignalGate::new("or", 4),
        }
    }
}

impl Default for OrSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for OrSignal {
    gate_signal_boilerplate!();

    fn update(&mut self, dt: f32) {
        let mut state = SignalState::Low;
        self.gate.update_inputs(dt, |input| {
            if input.base().is_high() {
                state = SignalState::High;
            }
        });
        self.gate.base.update_state(state);
    }
}

/// High iff every child is high.
pub struct AndSignal {
    gate: SignalGate,
}

impl AndSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: SignalGate::new("and", 4),
        }
    }
}

impl Default for AndSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for AndSignal {
    gate_signal_boilerplate!();

    fn update(&mut self, dt: f32) {
        let mut state = SignalState::High;
        self.gate.update_inputs(dt, |input| {
            if !input.base().is_high() {
                state = SignalState::Low;
            }
        });
        self.gate.base.update_state(state);
    }
}

/// High iff the (single) child is low.
pub struct NotSignal {
    gate: SignalGate,
}

impl NotSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: SignalGate::new("not", 1),
        }
    }
}

impl Default for NotSignal {
    fn default() -> Self { Self::new() }
}

impl InputSignal for NotSignal {
    gate_signal_boilerplate!();

    fn update(&mut self, dt: f32) {
        let mut state = SignalState::Low;
        self.gate.update_inputs(dt, |input| {
            if !input.base().is_high() {
                state = SignalState::High;
            }
        });
        self.gate.base.update_state(state);
    }
}
