use std::fmt;
use std::path::Path;

/// Config file formats, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` or `.yml`
    Yaml,
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a path's extension (case-insensitive).
    /// Returns `None` for anything unrecognized.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

/// Which layer supplied a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    Default,
    File,
    Environment,
    Override,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::Default => "default",
            Origin::File => "file",
            Origin::Environment => "env",
            Origin::Override => "override",
        };
        f.write_str(name)
    }
}

/// When the watcher calls notification callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyMode {
    /// Only when the polled value differs from the last one seen.
    #[default]
    OnChange,
    /// On every tick, whether or not the value changed.
    EveryTick,
}

/// A config operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigAction {
    List,
    Get { key: String },
}
