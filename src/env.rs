use std::collections::HashMap;
use std::env::VarError;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::coerce;
use crate::error::ClifError;
use crate::source::{Setting, Source};
use crate::types::Origin;

/// Where environment variables are read from.
///
/// The process environment in production; an in-memory map in tests, so
/// nothing has to mutate global state.
pub trait Environment: Send + Sync + fmt::Debug {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    /// A value that is not valid Unicode is logged and treated as unset.
    fn var(&self, key: &str) -> Option<String> {
        match std::env::var(key) {
            Ok(value) => Some(value),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(_)) => {
                tracing::warn!(event = "clif.env.not_unicode", key = %key);
                None
            }
        }
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// A mutable in-memory environment, shareable with a running watcher.
#[derive(Debug, Default)]
pub struct MapEnvironment {
    vars: RwLock<HashMap<String, String>>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            vars: RwLock::new(vars),
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.vars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.vars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl Environment for MapEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// Normalize a name for use in an environment variable: uppercase ASCII
/// alphanumerics, everything else folded to `_`.
pub fn env_segment(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Derive `{APPNAME}_{SEGMENT}_{SEGMENT}...` from a setting's path.
pub fn env_key(app_name: &str, segments: &[&str]) -> String {
    let mut key = env_segment(app_name);
    for segment in segments {
        key.push('_');
        key.push_str(&env_segment(segment));
    }
    key
}

/// Expand `${APPNAME}` in a per-field environment name template.
pub fn expand_env_template(template: &str, app_name: &str) -> String {
    template.replace("${APPNAME}", &env_segment(app_name))
}

/// Reads each setting's environment variable.
///
/// Set-but-empty variables count as absent. Raw text is converted to the
/// leaf's kind, so `MYAPP_CONSOLE_WIDTH=80` arrives as an integer.
#[derive(Debug, Clone)]
pub struct EnvSource {
    environment: Arc<dyn Environment>,
}

impl EnvSource {
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment }
    }

    /// The raw value, empty treated as unset.
    pub fn raw(&self, env_key: &str) -> Option<String> {
        self.environment.var(env_key).filter(|v| !v.is_empty())
    }
}

impl Source for EnvSource {
    fn origin(&self) -> Origin {
        Origin::Environment
    }

    fn lookup(&self, setting: &Setting<'_>) -> Result<Option<Value>, ClifError> {
        match self.raw(setting.env_key) {
            Some(raw) => coerce::from_text(setting.env_key, &raw, setting.kind).map(Some),
            None => Ok(None),
        }
    }
}
