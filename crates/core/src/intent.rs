//! Intent results — what every public operation hands back to its caller.
//!
//! The caller is typically a planner that reads `message` to decide what to
//! try next, so failures always carry a human-readable diagnostic.

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// The result of an intent (go to, collect, craft, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    /// Whether the intent succeeded
    pub success: bool,

    /// Human-readable outcome, naming the failure kind on failure
    pub message: String,

    /// Stable failure label (see `TaskError::kind`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Intent-specific fields
    #[serde(default, flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl IntentResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            reason: None,
            data: serde_json::Map::new(),
        }
    }

    pub fn fail(message: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            reason: Some(reason.into()),
            data: serde_json::Map::new(),
        }
    }

    /// A failure derived from a task error.
    pub fn from_error(context: &str, err: &TaskError) -> Self {
        Self::fail(format!("{context}: {err}"), err.kind())
    }

    /// Attach an intent-specific field.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.data.insert(key.to_string(), value);
        self
    }

    /// Label a result that succeeded as a call but carries a negative
    /// answer (e.g. a reachability probe that found no path).
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Read back an intent-specific field.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}
