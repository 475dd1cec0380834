// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The signal node: common state, the evaluation contract and tree
//! serialization.
//!
//! A signal evaluates once per frame and exposes two observables: a binary
//! *state* (with its one-frame-previous value) and a vector in R⁴. Concrete
//! types live in the `signals_*` modules; composition (child lists) is in
//! [`gate`](super::gate).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::data_block::DataBlock;
use crate::input::device::InputController;
use crate::input::properties::SignalProperties;
use crate::input::vec::{Vec2, Vec3, Vec4};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SignalState {
    #[default]
    Low,
    High,
}

/// Services a signal needs while deserializing: controller resolution and
/// child-signal fabrication. Implemented by the input system.
pub trait SignalContext {
    fn controller(&self, name: &str) -> Option<Arc<dyn InputController>>;

    fn create_signal(&self, signal_type: &str) -> Option<Box<dyn InputSignal>>;
}

static SIGNAL_INDEX: AtomicUsize = AtomicUsize::new(0);

/// State shared by every signal node.
#[derive(Default)]
pub struct SignalBase {
    name: String,
    signal_type: &'static str,
    pub(crate) vector: Vec4,
    controller: Option<Arc<dyn InputController>>,
    pub(crate) properties: SignalProperties,
    curr_state: SignalState,
    prev_state: SignalState,
}

impl SignalBase {
    #[must_use]
    pub fn new(signal_type: &'static str) -> Self {
        Self {
            signal_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    pub fn set_name(&mut self, name: impl Into<String>) { self.name = name.into(); }

    /// `<type>_<n>` with non-alphanumerics sanitized to `_`.
    pub fn generate_name(&mut self) {
        let index = SIGNAL_INDEX.fetch_add(1, Ordering::Relaxed);
        let raw = format!("{}_{index}", self.signal_type);
        self.name = raw
            .chars()
            .map(|chr| if chr.is_alphanumeric() || chr == '_' { chr } else { '_' })
            .collect();
    }

    #[must_use]
    pub fn signal_type(&self) -> &'static str { self.signal_type }

    #[must_use]
    pub fn controller(&self) -> Option<&Arc<dyn InputController>> {
        self.controller.as_ref()
    }

    pub fn set_controller(&mut self, controller: Option<Arc<dyn InputController>>) {
        self.controller = controller;
    }

    #[must_use]
    pub fn state(&self) -> SignalState { self.curr_state }

    #[must_use]
    pub fn previous_state(&self) -> SignalState { self.prev_state }

    #[must_use]
    pub fn is_high(&self) -> bool { self.curr_state == SignalState::High }

    /// Shifts current into previous; called exactly once per `update`.
    pub fn update_state(&mut self, state: SignalState) {
        self.prev_state = self.curr_state;
        self.curr_state = state;
    }

    #[must_use]
    pub fn value(&self) -> f32 { self.vector.x }

    #[must_use]
    pub fn vector2(&self) -> Vec2 { self.vector.xy() }

    #[must_use]
    pub fn vector3(&self) -> Vec3 { self.vector.xyz() }

    #[must_use]
    pub fn vector4(&self) -> Vec4 { self.vector }

    #[must_use]
    pub fn properties(&self) -> &SignalProperties { &self.properties }

    pub fn properties_mut(&mut self) -> &mut SignalProperties { &mut self.properties }
}

impl std::fmt::Debug for SignalBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBase")
            .field("type", &self.signal_type)
            .field("name", &self.name)
            .field("state", &self.curr_state)
            .finish()
    }
}

impl std::fmt::Debug for dyn InputSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSignal")
            .field("type", &self.base().signal_type())
            .field("name", &self.base().name())
            .finish()
    }
}

pub(crate) mod blk {
    pub const TYPE: &str = "type";
    pub const NAME: &str = "name";
    pub const CONTROLLER: &str = "controller";
    pub const PROPERTIES: &str = "properties";
}

/// A node of the input evaluation graph.
pub trait InputSignal: Send {
    fn base(&self) -> &SignalBase;

    fn base_mut(&mut self) -> &mut SignalBase;

    /// Evaluates the node for this frame.
    fn update(&mut self, dt: f32);

    /// Adds a child. Exceeding [`max_inputs`](Self::max_inputs) is a
    /// contract violation; non-composite signals accept no children.
    fn add_input(&mut self, signal: Box<dyn InputSignal>) {
        drop(signal);
        debug_assert!(false, "signal type accepts no child inputs");
        tracing::error!(
            target: "input",
            signal_type = self.base().signal_type(),
            "signal type accepts no child inputs"
        );
    }

    fn input(&self, _index: usize) -> Option<&dyn InputSignal> { None }

    fn max_inputs(&self) -> usize { 0 }

    fn serialize_properties(&self, block: &mut DataBlock);

    fn deserialize_properties(&mut self, block: &DataBlock, ctx: &dyn SignalContext);

    fn serialize(&self, block: &mut DataBlock) {
        let base = self.base();
        block.add_str(blk::NAME, base.name());
        block.add_str(blk::TYPE, base.signal_type());
        let controller_name = base
            .controller()
            .map(|controller| controller.name())
            .unwrap_or_default();
        block.add_str(blk::CONTROLLER, controller_name);

        let mut properties = DataBlock::new();
        self.serialize_properties(&mut properties);
        *block.add_block(blk::PROPERTIES) = properties;
    }

    fn deserialize(&mut self, block: &DataBlock, ctx: &dyn SignalContext) -> bool {
        if let Some(name) = block.get_str(blk::NAME) {
            self.base_mut().set_name(name);
        }
        if let Some(controller_name) = block.get_str(blk::CONTROLLER) {
            let controller = ctx.controller(controller_name);
            self.base_mut().set_controller(controller);
        }
        if let Some(properties) = block.get_block(blk::PROPERTIES) {
            self.deserialize_properties(properties, ctx);
        }
        true
    }
}
