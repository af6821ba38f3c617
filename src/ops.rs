//! Config operations: listing and key lookup, and their result type.
//!
//! Both read the settings graph as it is, so they are normally run right
//! after a loading [`init`](crate::ClifBuilder::init). Null optional
//! sections are not allocated; their keys simply do not appear.

use std::fmt;

use serde_json::Value;

use crate::error::ClifError;
use crate::settings::Settings;
use crate::walk::{self, WalkContext};

/// Result of a config operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigResult {
    /// One key's resolved value.
    KeyValue { key: String, value: String },
    /// All resolved configuration key-value pairs, in field order.
    Listing { entries: Vec<(String, String)> },
}

impl fmt::Display for ConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigResult::KeyValue { key, value } => write!(f, "{key} = {value}"),
            ConfigResult::Listing { entries } => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                Ok(())
            }
        }
    }
}

/// List every reachable leaf as a dotted key and its current value.
pub fn list_values(
    settings: &mut dyn Settings,
    context: &WalkContext,
) -> Result<ConfigResult, ClifError> {
    let entries = walk::collect(settings, context)?
        .into_iter()
        .map(|(key, value)| (key, format_value(&value)))
        .collect();
    Ok(ConfigResult::Listing { entries })
}

/// Look up one leaf by dotted key.
pub fn get_value(
    settings: &mut dyn Settings,
    context: &WalkContext,
    key: &str,
) -> Result<ConfigResult, ClifError> {
    let (key, value) = walk::collect(settings, context)?
        .into_iter()
        .find(|(candidate, _)| candidate == key)
        .ok_or_else(|| ClifError::KeyNotFound(key.into()))?;
    Ok(ConfigResult::KeyValue {
        key,
        value: format_value(&value),
    })
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "<not set>".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
