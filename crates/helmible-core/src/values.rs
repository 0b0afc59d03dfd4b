//! Values inspection
//!
//! Helm templates overload `{{ if x }}` to mean either boolean evaluation or
//! a definedness check, and `range` bodies refer to list members through the
//! implicit dot. Both translations need to know what the chart's values
//! actually look like, so the emitter consults a read-only [`Inspector`] over
//! the parsed `values.yaml` document.

use indexmap::IndexSet;
use serde_yaml::Value;
use thiserror::Error;

/// Error raised while resolving a dotted path against the values document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InspectError {
    /// A path segment (terminal or intermediate) does not exist, or an
    /// intermediate segment resolves to something that cannot be descended
    /// into.
    #[error("invalid path")]
    InvalidPath,

    /// The terminal key exists but carries no value (`pullPolicy:`).
    #[error("invalid path; \"{0}\" has no value")]
    NoValue(String),

    /// `enumerate` was asked for children of a path that does not resolve.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The path was empty.
    #[error("path must have at least one element")]
    EmptyPath,
}

/// Read-only queries against a loaded values tree.
///
/// The inspector borrows the document; it never caches and never mutates, so
/// concurrent readers are safe by construction.
#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    values: &'a Value,
}

impl<'a> Inspector<'a> {
    pub fn new(values: &'a Value) -> Self {
        Self { values }
    }

    /// Whether the dotted path (already split into segments) is bound to a
    /// YAML boolean.
    ///
    /// Returns `Ok(false)` for any present non-boolean value, including the
    /// string literals `"true"` and `"false"`. A missing key at any level and
    /// a null intermediate value are both `InvalidPath`; a null terminal
    /// value is reported separately so that broken YAML such as `pullPolicy:`
    /// gets a specific hint.
    pub fn is_bool(&self, path: &[&str]) -> Result<bool, InspectError> {
        let (last, intermediate) = path.split_last().ok_or(InspectError::EmptyPath)?;

        let mut current = self.values;
        for segment in intermediate {
            let mapping = current.as_mapping().ok_or(InspectError::InvalidPath)?;
            match mapping.get(&Value::from(*segment)) {
                Some(Value::Null) | None => return Err(InspectError::InvalidPath),
                Some(child) => current = child,
            }
        }

        let mapping = current.as_mapping().ok_or(InspectError::InvalidPath)?;
        match mapping.get(&Value::from(*last)) {
            None => Err(InspectError::InvalidPath),
            Some(Value::Null) => Err(InspectError::NoValue((*last).to_string())),
            Some(value) => Ok(value.is_bool()),
        }
    }

    /// Convenience wrapper splitting a dotted identifier such as
    /// `image.pullPolicy` before delegating to [`Inspector::is_bool`].
    pub fn is_bool_path(&self, dotted: &str) -> Result<bool, InspectError> {
        let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
        self.is_bool(&segments)
    }

    /// Enumerates the member names reachable at a dotted path.
    ///
    /// For a mapping this is its child keys. For a sequence it is the union
    /// of the string entries and, for entries that are themselves mappings,
    /// their keys, which is the shape a `range` body can project with the
    /// implicit dot.
    pub fn enumerate(&self, dotted: &str) -> Result<IndexSet<String>, InspectError> {
        let mut current = self.values;
        for segment in dotted.split('.').filter(|s| !s.is_empty()) {
            let mapping = current
                .as_mapping()
                .ok_or_else(|| InspectError::PathNotFound(dotted.to_string()))?;
            current = mapping
                .get(&Value::from(segment))
                .ok_or_else(|| InspectError::PathNotFound(dotted.to_string()))?;
        }

        let mut members = IndexSet::new();
        match current {
            Value::Mapping(mapping) => {
                for key in mapping.keys() {
                    if let Some(name) = key.as_str() {
                        members.insert(name.to_string());
                    }
                }
            }
            Value::Sequence(items) => {
                for item in items {
                    match item {
                        Value::String(name) => {
                            members.insert(name.clone());
                        }
                        Value::Mapping(mapping) => {
                            for key in mapping.keys() {
                                if let Some(name) = key.as_str() {
                                    members.insert(name.to_string());
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => return Err(InspectError::PathNotFound(dotted.to_string())),
        }
        Ok(members)
    }
}
