//! Console size settings: the `console` section.
//!
//! Only the requested size is carried here. The terminal itself is owned by
//! the application.

use serde_json::{Map, Value};

use crate::configuration::decode_section;
use crate::error::ClifError;
use crate::settings::{Field, Settings, Visitor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleConfiguration {
    pub width: u16,
    pub height: u16,
}

impl ConsoleConfiguration {
    pub fn from_section(section: &Map<String, Value>) -> Result<Self, ClifError> {
        decode_section("console", section)
    }

    /// `None` until both dimensions are set.
    pub fn size(&self) -> Option<(u16, u16)> {
        (self.width > 0 && self.height > 0).then_some((self.width, self.height))
    }
}

impl Settings for ConsoleConfiguration {
    fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
        v.field(Field::leaf("width", &mut self.width))?;
        v.field(Field::leaf("height", &mut self.height))
    }
}
