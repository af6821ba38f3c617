//! Programmatic and command-line overrides: the highest-priority layer.
//!
//! Overrides are `(dotted_key, value)` pairs. If several target the same key,
//! the last one wins. String values aimed at non-string leaves are parsed
//! the same way environment variables are, so `--set console.width=80`
//! works without the caller knowing the field's type.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::coerce;
use crate::error::ClifError;
use crate::source::{Setting, Source};
use crate::types::Origin;

#[derive(Debug, Clone, Default)]
pub struct OverrideSource {
    entries: Vec<(String, Value)>,
}

impl OverrideSource {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl Source for OverrideSource {
    fn origin(&self) -> Origin {
        Origin::Override
    }

    fn lookup(&self, setting: &Setting<'_>) -> Result<Option<Value>, ClifError> {
        let Some((_, value)) = self.entries.iter().rev().find(|(key, _)| key == setting.key)
        else {
            return Ok(None);
        };
        match value {
            Value::String(raw) => coerce::from_text(setting.key, raw, setting.kind).map(Some),
            other => Ok(Some(other.clone())),
        }
    }
}

/// Split a `key=value` assignment as given on the command line.
pub fn parse_assignment(text: &str) -> Result<(String, String), ClifError> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ClifError::InvalidValue {
            key: text.to_string(),
            reason: "expected KEY=VALUE".into(),
        }),
    }
}

/// Flatten any serializable value into dotted override pairs.
///
/// Nested structs and maps become dotted keys; `None`/`null` values are
/// skipped, so optional clap arguments that were not given never override
/// anything. Sequences are kept whole.
pub fn overrides_from<S: Serialize>(source: &S) -> Result<Vec<(String, Value)>, ClifError> {
    let value = serde_json::to_value(source).map_err(|e| ClifError::InvalidValue {
        key: "<overrides>".into(),
        reason: e.to_string(),
    })?;
    let mut out = Vec::new();
    match value {
        Value::Object(map) => flatten_into(&map, "", &mut out),
        Value::Null => {}
        other => {
            return Err(ClifError::InvalidValue {
                key: "<overrides>".into(),
                reason: format!("expected a struct or map, found {}", coerce::type_name(&other)),
            });
        }
    }
    Ok(out)
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Null => {}
            Value::Object(nested) => flatten_into(nested, &dotted, out),
            other => out.push((dotted, other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LeafKind;
    use serde_json::json;

    fn setting(key: &str, kind: LeafKind) -> Setting<'_> {
        Setting {
            key,
            env_key: "UNUSED",
            kind,
            default: None,
            monitored: false,
        }
    }

    #[test]
    fn last_entry_wins() {
        let source = OverrideSource::new(vec![
            ("console.width".into(), json!(10)),
            ("console.width".into(), json!(20)),
        ]);
        assert_eq!(
            source.lookup(&setting("console.width", LeafKind::Int)).unwrap(),
            Some(json!(20))
        );
    }

    #[test]
    fn string_values_parse_by_kind() {
        let source = OverrideSource::new(vec![
            ("console.width".into(), json!("80")),
            ("name".into(), json!("80")),
        ]);
        assert_eq!(
            source.lookup(&setting("console.width", LeafKind::Int)).unwrap(),
            Some(json!(80))
        );
        assert_eq!(
            source.lookup(&setting("name", LeafKind::Str)).unwrap(),
            Some(json!("80"))
        );
    }

    #[test]
    fn unmatched_key_is_none() {
        let source = OverrideSource::new(vec![("a".into(), json!(1))]);
        assert_eq!(source.lookup(&setting("b", LeafKind::Int)).unwrap(), None);
        assert_eq!(source.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn assignment_parsing() {
        assert_eq!(
            parse_assignment("logger.level=debug").unwrap(),
            ("logger.level".to_string(), "debug".to_string())
        );
        assert_eq!(
            parse_assignment("title=a=b").unwrap(),
            ("title".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn flatten_skips_none_and_nests() {
        #[derive(Serialize)]
        struct Console {
            width: Option<u16>,
            height: Option<u16>,
        }
        #[derive(Serialize)]
        struct Args {
            console: Console,
            name: Option<String>,
            verbose: bool,
        }
        let args = Args {
            console: Console {
                width: Some(120),
                height: None,
            },
            name: None,
            verbose: true,
        };
        let pairs = overrides_from(&args).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("console.width".to_string(), json!(120)),
                ("verbose".to_string(), json!(true)),
            ]
        );
    }

    #[test]
    fn flatten_rejects_scalars() {
        assert!(overrides_from(&5).is_err());
    }
}
