use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClifError {
    #[error("configuration error - InitConfig(core configuration not present)")]
    MissingCoreConfig,

    #[error("configuration error - InitConfig(core configuration is anonymous): field '{field}'")]
    AnonymousCoreConfig { field: &'static str },

    #[error("configuration error - InitConfig(core configuration is unexported): field '{field}'")]
    NonExportedCoreConfig { field: &'static str },

    #[error(
        "configuration error - InitConfig(non-pointer of embedded {type_name}): field '{field}'"
    )]
    EmbeddedCoreNotPointer {
        field: &'static str,
        type_name: &'static str,
    },

    #[error("configuration error - failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("configuration error - failed to parse {path}: {reason}")]
    Unmarshal { path: PathBuf, reason: String },

    #[error("configuration error - section '{section}' must be a mapping, found {found}")]
    UnmarshalSection {
        section: String,
        found: &'static str,
    },

    #[error("configuration error - invalid data type - {key} != {expected} (found {found})")]
    UnmarshalType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("configuration error - value {value} for '{key}' does not fit in {target}")]
    OutOfRange {
        key: String,
        value: String,
        target: &'static str,
    },

    #[error("configuration error - invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("configuration error - home directory could not be determined")]
    HomeDirUnavailable,

    #[error("configuration error - watching requires a running tokio runtime")]
    NoRuntime,

    #[error("configuration error - file watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("configuration error - watcher task failed: {0}")]
    WatcherFailed(String),

    #[error("configuration error - key not found: {0}")]
    KeyNotFound(String),
}

impl ClifError {
    /// Stable short code for the error kind, usable in logs and scripts.
    ///
    /// Unmarshal errors inside a toolkit section carry that section's code:
    /// `CC03LC01` for `logger.*`, `CC03CC01` for `console.*`.
    pub fn code(&self) -> &'static str {
        match self {
            ClifError::MissingCoreConfig => "CC01",
            ClifError::AnonymousCoreConfig { .. } => "CC02",
            ClifError::Unmarshal { .. } => "CC03",
            ClifError::UnmarshalSection { section, .. } => section_code(section),
            ClifError::UnmarshalType { key, .. } | ClifError::OutOfRange { key, .. } => {
                section_code(key)
            }
            ClifError::FileRead { .. } => "CC04",
            ClifError::NonExportedCoreConfig { .. } => "CC05",
            ClifError::EmbeddedCoreNotPointer { .. } => "CC06",
            ClifError::InvalidValue { .. } => "CC07",
            ClifError::HomeDirUnavailable => "CC08",
            ClifError::NoRuntime | ClifError::Watch(_) | ClifError::WatcherFailed(_) => "CC09",
            ClifError::KeyNotFound(_) => "CC10",
        }
    }
}

fn section_code(key: &str) -> &'static str {
    match key.split('.').next() {
        Some("logger") => "CC03LC01",
        Some("console") => "CC03CC01",
        _ => "CC03",
    }
}
