//! Config file loading and the file source.
//!
//! The file is read once, at initialization, from the path held in the core
//! configuration's metadata. Its extension picks the decoder:
//!
//! - `yaml` / `yml`: YAML
//! - `json`: JSON
//! - `toml`: TOML
//!
//! Anything else is logged and ignored, not an error. Whatever the format,
//! the document is decoded into an untyped `serde_json` mapping. Leaves look
//! their dotted key up in that mapping; top-level keys that no field asks
//! for are simply never read.
//!
//! A missing file is skipped when the path is the default one, and fatal
//! ([`ClifError::FileRead`]) when the caller named the file explicitly.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::coerce::type_name;
use crate::error::ClifError;
use crate::source::{Setting, Source};
use crate::types::{ConfigFormat, Origin};

/// A decoded config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub path: PathBuf,
    pub root: Map<String, Value>,
}

impl ConfigDocument {
    /// Look up a dotted key. Intermediate sections must be mappings.
    ///
    /// `null` values count as absent, so `level:` with nothing after it in
    /// YAML leaves the lower layers in place.
    pub fn get(&self, key: &str) -> Result<Option<&Value>, ClifError> {
        let mut current = &self.root;
        let mut segments = key.split('.').peekable();
        let mut consumed = 0;

        while let Some(segment) = segments.next() {
            let Some(value) = current.get(segment) else {
                return Ok(None);
            };
            consumed += segment.len() + usize::from(consumed > 0);

            if segments.peek().is_none() {
                return Ok((!value.is_null()).then_some(value));
            }
            match value {
                Value::Object(section) => current = section,
                Value::Null => return Ok(None),
                other => {
                    return Err(ClifError::UnmarshalSection {
                        section: key[..consumed].to_string(),
                        found: type_name(other),
                    });
                }
            }
        }
        Ok(None)
    }

    /// A top-level section, if present and a mapping.
    pub fn section(&self, name: &str) -> Result<Option<&Map<String, Value>>, ClifError> {
        match self.root.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(section)) => Ok(Some(section)),
            Some(other) => Err(ClifError::UnmarshalSection {
                section: name.to_string(),
                found: type_name(other),
            }),
        }
    }
}

/// Decode file content in the given format into a top-level mapping.
/// An empty document is an empty mapping.
pub fn parse_document(
    path: &Path,
    content: &str,
    format: ConfigFormat,
) -> Result<Map<String, Value>, ClifError> {
    let unmarshal = |reason: String| ClifError::Unmarshal {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = match format {
        ConfigFormat::Yaml | ConfigFormat::Json if content.trim().is_empty() => Value::Null,
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| unmarshal(e.to_string()))?,
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| unmarshal(e.to_string()))?,
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| unmarshal(e.to_string()))?,
    };

    match value {
        Value::Object(root) => Ok(root),
        Value::Null => Ok(Map::new()),
        other => Err(unmarshal(format!(
            "top level must be a mapping, found {}",
            type_name(&other)
        ))),
    }
}

/// Read and decode the config file at `path`.
///
/// Returns `Ok(None)` when there is nothing to load: the file is missing and
/// was not `explicit`, or its extension is not a known format.
pub fn load_config_file(path: &Path, explicit: bool) -> Result<Option<ConfigDocument>, ClifError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
            tracing::debug!(
                event = "clif.file.not_found",
                path = %path.display(),
                "default config file not present, skipping"
            );
            return Ok(None);
        }
        Err(e) => {
            return Err(ClifError::FileRead {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let Some(format) = ConfigFormat::from_path(path) else {
        tracing::warn!(
            event = "clif.file.unknown_format",
            path = %path.display(),
            "config file extension not recognized, ignoring file"
        );
        return Ok(None);
    };

    let root = parse_document(path, &content, format)?;
    tracing::debug!(
        event = "clif.file.loaded",
        path = %path.display(),
        sections = root.len(),
    );
    Ok(Some(ConfigDocument {
        path: path.to_path_buf(),
        root,
    }))
}

/// Supplies values from the decoded config file, if any.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    document: Option<ConfigDocument>,
}

impl FileSource {
    pub fn new(document: Option<ConfigDocument>) -> Self {
        Self { document }
    }

    pub fn document(&self) -> Option<&ConfigDocument> {
        self.document.as_ref()
    }
}

impl Source for FileSource {
    fn origin(&self) -> Origin {
        Origin::File
    }

    fn lookup(&self, setting: &Setting<'_>) -> Result<Option<Value>, ClifError> {
        match &self.document {
            Some(document) => Ok(document.get(setting.key)?.cloned()),
            None => Ok(None),
        }
    }
}
