// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Application-wide property tree with `/`-separated compound paths.
//!
//! Values live as JSON; typed access goes through serde. Writing follows
//! merge semantics: primitive values (numbers, strings, booleans, arrays)
//! are replaced, objects are merged key by key.

use std::sync::RwLock;

use miette::IntoDiagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

#[derive(Default)]
pub struct GlobalProperties {
    root: RwLock<Map<String, Value>>,
}

impl GlobalProperties {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.get_read(path).is_some()
    }

    /// Snapshot of the value at `path` (`"app/section_0/prop_1"` style).
    #[must_use]
    pub fn get_read(&self, path: &str) -> Option<Value> {
        let root = self.read();
        let mut current: &Value = root.get(first_segment(path)?)?;
        for segment in path_segments(path).skip(1) {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// Sets the value at `path`, creating intermediate objects. An object
    /// landing on an existing object merges; anything else replaces.
    pub fn set(&self, path: &str, value: Value) -> miette::Result<()> {
        let segments: Vec<&str> = path_segments(path).collect();
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| miette::miette!("empty property path"))?;

        let mut root = self.write();
        let mut current: &mut Map<String, Value> = &mut root;
        for &segment in parents {
            let entry = current
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                // A primitive in the middle of the path gets replaced by a
                // section, same as merging a document would do.
                *entry = Value::Object(Map::new());
            }
            current = entry
                .as_object_mut()
                .ok_or_else(|| miette::miette!("property path is not a section"))?;
        }

        match current.get_mut(*leaf) {
            Some(existing) => merge_value(existing, value),
            None => {
                current.insert((*leaf).to_owned(), value);
            }
        }
        Ok(())
    }

    /// Typed read via serde.
    #[must_use]
    pub fn get_value<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.get_read(path)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(error) => {
                tracing::warn!(
                    target: "service",
                    path,
                    %error,
                    "failed to apply property value"
                );
                None
            }
        }
    }

    /// Typed write via serde.
    pub fn set_value<T: Serialize>(&self, path: &str, value: &T) -> miette::Result<()> {
        let value = serde_json::to_value(value).into_diagnostic()?;
        self.set(path, value)
    }

    /// Parses a JSON document and merges all its properties in.
    pub fn merge_from_str(&self, text: &str) -> miette::Result<()> {
        let value: Value = serde_json::from_str(text).into_diagnostic()?;
        let Value::Object(object) = value else {
            return Err(miette::miette!("properties document must be an object"));
        };
        let mut root = self.write();
        for (key, incoming) in object {
            match root.get_mut(&key) {
                Some(existing) => merge_value(existing, incoming),
                None => {
                    root.insert(key, incoming);
                }
            }
        }
        Ok(())
    }

    /// Serializes the whole tree (diagnostics, tests).
    pub fn dump_to_string(&self) -> miette::Result<String> {
        serde_json::to_string_pretty(&Value::Object(self.read().clone()))
            .into_diagnostic()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Map<String, Value>> {
        self.root
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Map<String, Value>> {
        self.root
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for GlobalProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GlobalProperties")
    }
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn first_segment(path: &str) -> Option<&str> { path_segments(path).next() }

/// Objects merge key by key; everything else replaces.
fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (existing, incoming) => *existing = incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[test]
    fn compound_paths_read_nested_values() {
        let properties = GlobalProperties::new();
        properties
            .merge_from_str(r#"{"app": {"window": {"width": 1280}}}"#)
            .unwrap();

        assert!(properties.contains("app/window/width"));
        assert!(!properties.contains("app/window/height"));
        assert_eq!(
            properties.get_value::<u32>("app/window/width"),
            Some(1280)
        );
    }

    #[test]
    fn primitives_replace_and_objects_merge() {
        let properties = GlobalProperties::new();
        properties
            .merge_from_str(r#"{"engine": {"modules": {"searchEnvPath": true}, "fps": 60}}"#)
            .unwrap();
        properties
            .merge_from_str(r#"{"engine": {"modules": {"optionalModules": ["vfx"]}, "fps": 144}}"#)
            .unwrap();

        // Section merged, primitive replaced.
        assert_eq!(properties.get_value::<bool>("engine/modules/searchEnvPath"), Some(true));
        assert_eq!(
            properties.get_value::<Vec<String>>("engine/modules/optionalModules"),
            Some(vec!["vfx".to_owned()])
        );
        assert_eq!(properties.get_value::<u32>("engine/fps"), Some(144));
    }

    #[test]
    fn typed_round_trip_through_serde() {
        #[derive(Debug, Deserialize, PartialEq, Serialize)]
        struct WindowConfig {
            width: u32,
            title: String,
        }

        let properties = GlobalProperties::new();
        let config = WindowConfig {
            width: 800,
            title: "demo".into(),
        };
        properties.set_value("app/window", &config).unwrap();

        assert_eq!(properties.get_value::<WindowConfig>("app/window"), Some(config));
        // A mismatched type reads as absent.
        assert_eq!(properties.get_value::<u32>("app/window"), None);
    }

    #[test]
    fn set_merges_sections_in_place() {
        let properties = GlobalProperties::new();
        properties
            .set("engine/modules", serde_json::json!({"searchEnvPath": false}))
            .unwrap();
        properties
            .set("engine/modules", serde_json::json!({"searchPaths": ["bin"]}))
            .unwrap();

        assert_eq!(
            properties.get_value::<bool>("engine/modules/searchEnvPath"),
            Some(false)
        );
        assert_eq!(
            properties.get_value::<Vec<String>>("engine/modules/searchPaths"),
            Some(vec!["bin".to_owned()])
        );
    }
}
