// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Input actions: a signal bound to a callback, gated by context tags.

use std::collections::BTreeSet;

use strum_macros::{Display, EnumString};

use crate::data_block::DataBlock;
use crate::input::signal::{InputSignal, SignalContext, SignalState, blk};

/// How the action reacts to its signal.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum ActionType {
    /// Fires on the low→high transition only.
    Trigger,
    /// Fires every frame the signal is high.
    Continuous,
}

pub type ActionCallback = Box<dyn FnMut(&dyn InputSignal) + Send>;

pub(crate) mod action_blk {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const TAGS: &str = "tags";
    pub const SIGNAL: &str = "signal";
}

pub struct InputAction {
    name: String,
    action_type: ActionType,
    signal: Box<dyn InputSignal>,
    tags: BTreeSet<String>,
    callback: ActionCallback,
    /// A trigger needs an observed low→high transition; a signal that is
    /// already high on the very first evaluation does not count.
    evaluated_once: bool,
}

impl InputAction {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        action_type: ActionType,
        signal: Box<dyn InputSignal>,
        callback: ActionCallback,
    ) -> Self {
        Self {
            name: name.into(),
            action_type,
            signal,
            tags: BTreeSet::new(),
            callback,
            evaluated_once: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn action_type(&self) -> ActionType { self.action_type }

    #[must_use]
    pub fn signal(&self) -> &dyn InputSignal { self.signal.as_ref() }

    pub fn signal_mut(&mut self) -> &mut dyn InputSignal { self.signal.as_mut() }

    pub fn add_context_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn remove_context_tag(&mut self, tag: &str) { self.tags.remove(tag); }

    #[must_use]
    pub fn has_context_tag(&self, tag: &str) -> bool { self.tags.contains(tag) }

    /// Untagged actions are always eligible; the empty (default) tag is
    /// always considered active; otherwise the tag sets must intersect.
    #[must_use]
    pub fn is_context_active(&self, active_contexts: &BTreeSet<String>) -> bool {
        self.tags.is_empty()
            || self.tags.contains("")
            || self.tags.iter().any(|tag| active_contexts.contains(tag))
    }

    /// Per-frame evaluation: updates the signal, then fires the callback
    /// when the action type's condition holds and a context tag is active.
    pub fn update(&mut self, dt: f32, active_contexts: &BTreeSet<String>) {
        self.signal.update(dt);
        let first_evaluation = !self.evaluated_once;
        self.evaluated_once = true;

        let base = self.signal.base();
        let should_fire = match self.action_type {
            ActionType::Trigger => {
                !first_evaluation
                    && base.previous_state() == SignalState::Low
                    && base.state() == SignalState::High
            }
            ActionType::Continuous => base.state() == SignalState::High,
        };

        if should_fire && self.is_context_active(active_contexts) {
            (self.callback)(self.signal.as_ref());
        }
    }

    /// Schema: `name`, `type` (`trigger`|`continuous`), repeated `tags`
    /// params, and the nested `signal` block.
    #[must_use]
    pub fn serialize(&self) -> DataBlock {
        let mut block = DataBlock::new();
        block.add_str(action_blk::NAME, &self.name);
        block.add_str(action_blk::TYPE, self.action_type.to_string());
        for tag in &self.tags {
            block.add_str(action_blk::TAGS, tag);
        }
        let signal_block = block.add_block(action_blk::SIGNAL);
        self.signal.serialize(signal_block);
        block
    }

    /// Rebuilds an action from its serialized block.
    #[must_use]
    pub fn from_block(
        block: &DataBlock,
        ctx: &dyn SignalContext,
        callback: ActionCallback,
    ) -> Option<Self> {
        let name = block.get_str(action_blk::NAME)?;
        let action_type: ActionType =
            block.get_str(action_blk::TYPE)?.parse().ok()?;

        let signal_block = block.get_block(action_blk::SIGNAL)?;
        let signal_type = signal_block.get_str(blk::TYPE)?;
        let mut signal = ctx.create_signal(signal_type)?;
        signal.deserialize(signal_block, ctx);

        let mut action = InputAction::new(name, action_type, signal, callback);
        for tag in block.get_str_list(action_blk::TAGS) {
            action.add_context_tag(tag);
        }
        Some(action)
    }
}

impl std::fmt::Debug for InputAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputAction")
            .field("name", &self.name)
            .field("type", &self.action_type)
            .field("tags", &self.tags)
            .finish()
    }
}
