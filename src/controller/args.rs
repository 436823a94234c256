//! Structured action arguments
//!
//! Untyped key/value bundle carried with every action. Values are tagged so
//! they survive the trip through the control socket unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::host::{Surface, SurfaceControl};

/// Single argument value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    /// Integer
    Int(i64),
    /// Boolean
    Bool(bool),
    /// String
    String(String),
    /// Output surface handle
    Surface(Surface),
    /// Layer handle
    SurfaceControl(SurfaceControl),
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::String(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::String(v)
    }
}

impl From<Surface> for ArgValue {
    fn from(v: Surface) -> Self {
        ArgValue::Surface(v)
    }
}

impl From<SurfaceControl> for ArgValue {
    fn from(v: SurfaceControl) -> Self {
        ArgValue::SurfaceControl(v)
    }
}

/// Argument bundle passed to [`Controller::apply`](super::Controller::apply)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionArgs(BTreeMap<String, ArgValue>);

impl ActionArgs {
    /// Empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value lookup
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    /// Integer value, `None` if missing or of another type
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(ArgValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(ArgValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// String value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ArgValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Output surface value
    pub fn get_surface(&self, key: &str) -> Option<Surface> {
        match self.0.get(key) {
            Some(ArgValue::Surface(v)) => Some(*v),
            _ => None,
        }
    }

    /// Layer handle value
    pub fn get_surface_control(&self, key: &str) -> Option<SurfaceControl> {
        match self.0.get(key) {
            Some(ArgValue::SurfaceControl(v)) => Some(*v),
            _ => None,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters_reject_other_types() {
        let args = ActionArgs::new()
            .with("PARENT_SURFACE", SurfaceControl(4))
            .with("DISPLAY_ID", 0i64);

        assert_eq!(args.get_surface_control("PARENT_SURFACE"), Some(SurfaceControl(4)));
        assert_eq!(args.get_surface("PARENT_SURFACE"), None);
        assert_eq!(args.get_int("DISPLAY_ID"), Some(0));
        assert_eq!(args.get_bool("DISPLAY_ID"), None);
        assert_eq!(args.get_str("MISSING"), None);
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_insert_replaces() {
        let mut args = ActionArgs::new();
        args.insert("KEY", "first");
        args.insert("KEY", "second");

        assert_eq!(args.get_str("KEY"), Some("second"));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_json_shape() {
        let args = ActionArgs::new()
            .with("PARENT_SURFACE", Surface(9))
            .with("FLAG", true);

        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "FLAG": { "bool": true },
                "PARENT_SURFACE": { "surface": 9 },
            })
        );

        let parsed: ActionArgs =
            serde_json::from_str(r#"{"PARENT_SURFACE": {"surface_control": 12}}"#).unwrap();
        assert_eq!(
            parsed.get_surface_control("PARENT_SURFACE"),
            Some(SurfaceControl(12))
        );
    }
}
