// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Hierarchical key-value tree - the structured-data contract the core
//! consumes.
//!
//! Parsing/emitting the on-disk *text* format belongs to a collaborator;
//! the core works with the tree itself and, where a file form is needed
//! (input bindings), round-trips the tree through JSON via serde.
//!
//! Parameters are ordered and may repeat under the same name (used e.g.
//! for an action's `tag` list). Nested blocks are ordered too; equality is
//! structural, which is what the round-trip tests rely on.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i32),
    Real(f32),
    Str(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataBlock {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    params: Vec<(String, ParamValue)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<(String, DataBlock)>,
}

impl DataBlock {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn add_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push((name.into(), ParamValue::Str(value.into())));
    }

    pub fn add_int(&mut self, name: impl Into<String>, value: i32) {
        self.params.push((name.into(), ParamValue::Int(value)));
    }

    pub fn add_real(&mut self, name: impl Into<String>, value: f32) {
        self.params.push((name.into(), ParamValue::Real(value)));
    }

    /// Appends an empty nested block and returns it for filling in.
    pub fn add_block(&mut self, name: impl Into<String>) -> &mut DataBlock {
        self.blocks.push((name.into(), DataBlock::new()));
        // Just pushed, so the last element exists.
        &mut self.blocks.last_mut().expect("blocks is non-empty").1
    }

    /// First string parameter under `name`.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.params.iter().find_map(|(param, value)| {
            if param == name
                && let ParamValue::Str(text) = value
            {
                Some(text.as_str())
            } else {
                None
            }
        })
    }

    #[must_use]
    pub fn get_int(&self, name: &str, default: i32) -> i32 {
        self.params
            .iter()
            .find_map(|(param, value)| {
                if param == name
                    && let ParamValue::Int(number) = value
                {
                    Some(*number)
                } else {
                    None
                }
            })
            .unwrap_or(default)
    }

    #[must_use]
    pub fn get_real(&self, name: &str, default: f32) -> f32 {
        self.params
            .iter()
            .find_map(|(param, value)| {
                if param == name
                    && let ParamValue::Real(number) = value
                {
                    Some(*number)
                } else {
                    None
                }
            })
            .unwrap_or(default)
    }

    /// Every string parameter under `name`, in insertion order.
    #[must_use]
    pub fn get_str_list(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter_map(|(param, value)| {
                if param == name
                    && let ParamValue::Str(text) = value
                {
                    Some(text.as_str())
                } else {
                    None
                }
            })
            .collect()
    }

    #[must_use]
    pub fn get_block(&self, name: &str) -> Option<&DataBlock> {
        self.blocks
            .iter()
            .find_map(|(block_name, block)| (block_name == name).then_some(block))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.blocks.is_empty()
    }

    /// JSON form used for persisting input bindings.
    pub fn to_json(&self) -> miette::Result<String> {
        miette::IntoDiagnostic::into_diagnostic(serde_json::to_string_pretty(self))
    }

    pub fn from_json(text: &str) -> miette::Result<DataBlock> {
        miette::IntoDiagnostic::into_diagnostic(serde_json::from_str(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> DataBlock {
        let mut root = DataBlock::new();
        root.add_str("name", "jump");
        root.add_int("count", 2);
        root.add_real("delay", 0.5);
        root.add_str("tag", "gameplay");
        root.add_str("tag", "menu");
        let nested = root.add_block("signal");
        nested.add_str("type", "pressed");
        root
    }

    #[test]
    fn parameters_are_typed_and_ordered() {
        let block = sample();
        assert_eq!(block.get_str("name"), Some("jump"));
        assert_eq!(block.get_int("count", 0), 2);
        assert_eq!(block.get_real("delay", 0.0), 0.5);
        assert_eq!(block.get_int("missing", 7), 7);
        assert_eq!(block.get_str_list("tag"), ["gameplay", "menu"]);
    }

    #[test]
    fn nested_blocks_are_reachable_by_name() {
        let block = sample();
        let signal = block.get_block("signal").unwrap();
        assert_eq!(signal.get_str("type"), Some("pressed"));
        assert!(block.get_block("nope").is_none());
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let block = sample();
        let text = block.to_json().unwrap();
        let parsed = DataBlock::from_json(&text).unwrap();
        assert_eq!(parsed, block);

        // Byte-identical re-serialization.
        assert_eq!(parsed.to_json().unwrap(), text);
    }
}
