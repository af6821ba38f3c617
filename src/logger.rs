//! Logger settings: the `logger` section.

use serde_json::{Map, Value};

use crate::configuration::decode_section;
use crate::error::ClifError;
use crate::settings::{Field, Settings, Visitor};

/// ```yaml
/// logger:
///   level: debug      # MYAPP_LOGGER_LEVEL, monitored
///   colorized: true   # MYAPP_LOGGER_COLORIZED
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerConfiguration {
    pub level: String,
    pub colorized: bool,
}

impl LoggerConfiguration {
    /// Decode a `logger` mapping on its own. Missing keys take their
    /// declared defaults.
    pub fn from_section(section: &Map<String, Value>) -> Result<Self, ClifError> {
        decode_section("logger", section)
    }

    /// The level as a `tracing` level, if it names one.
    pub fn tracing_level(&self) -> Option<tracing::Level> {
        self.level.parse().ok()
    }
}

impl Settings for LoggerConfiguration {
    fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
        v.field(
            Field::leaf("level", &mut self.level)
                .default("info")
                .env("${APPNAME}_LOGGER_LEVEL")
                .monitored(),
        )?;
        v.field(
            Field::leaf("colorized", &mut self.colorized)
                .default(false)
                .env("${APPNAME}_LOGGER_COLORIZED"),
        )
    }
}
