//! Source providers: the layers a leaf value can come from.
//!
//! ```text
//! Declared defaults     Field::default(...)
//!        ↑ overridden by
//! Config file           logger.level
//!        ↑ overridden by
//! Environment vars      MYAPP_LOGGER_LEVEL
//!        ↑ overridden by
//! Overrides             --set logger.level=debug
//! ```
//!
//! Every layer is sparse: a source that has nothing for a setting returns
//! `Ok(None)` and the value from the layer below stands.

use serde_json::Value;

use crate::error::ClifError;
use crate::settings::LeafKind;
use crate::types::Origin;

/// What a source is asked about: one leaf of the settings graph.
#[derive(Debug, Clone, Copy)]
pub struct Setting<'a> {
    /// Dotted path, e.g. `logger.level`.
    pub key: &'a str,
    /// Environment variable name, e.g. `MYAPP_LOGGER_LEVEL`.
    pub env_key: &'a str,
    pub kind: LeafKind,
    pub default: Option<&'a Value>,
    pub monitored: bool,
}

pub trait Source {
    fn origin(&self) -> Origin;

    fn lookup(&self, setting: &Setting<'_>) -> Result<Option<Value>, ClifError>;
}

/// Runtime context that string defaults may refer to.
#[derive(Debug, Clone, Default)]
pub struct DefaultContext {
    pub app_name: String,
    pub user: Option<String>,
    pub home: String,
}

/// Supplies each field's declared default. Never fails.
#[derive(Debug, Clone)]
pub struct DefaultSource {
    context: DefaultContext,
}

impl DefaultSource {
    pub fn new(context: DefaultContext) -> Self {
        Self { context }
    }

    fn expand(&self, text: &str) -> String {
        text.replace("${APPNAME}", &self.context.app_name)
            .replace("${USER}", self.context.user.as_deref().unwrap_or(""))
            .replace("${HOME}", &self.context.home)
    }
}

impl Source for DefaultSource {
    fn origin(&self) -> Origin {
        Origin::Default
    }

    fn lookup(&self, setting: &Setting<'_>) -> Result<Option<Value>, ClifError> {
        Ok(setting.default.map(|value| match value {
            Value::String(text) if text.contains("${") => Value::String(self.expand(text)),
            other => other.clone(),
        }))
    }
}
