//! Layered configuration for small CLI tools. Put one core block in your
//! settings struct, call `init`, and go.
//!
//! Clif finds its own [`Configuration`] block inside an arbitrary
//! application settings type, fills every field of that type from compiled
//! defaults, a config file, environment variables and overrides, and then
//! keeps watching the environment for the settings you care about.
//!
//! ```ignore
//! let cancel = CancellationToken::new();
//! let mut settings = AppSettings::default();
//! let watcher = Clif::builder()
//!     .app_name("myapp")
//!     .init(&cancel, &mut settings)?;
//! ```
//!
//! That call resolves the `core` field, reads `config.yaml`, applies
//! `MYAPP_*` environment variables, allocates every optional section, and
//! starts a watcher task that lives until `cancel` fires.
//!
//! # Settings types
//!
//! There is no runtime reflection. A settings type describes its fields by
//! implementing [`Settings`]: each field is offered to a [`Visitor`] as a
//! leaf, a nested struct, an optional boxed struct, or something to skip.
//!
//! ```ignore
//! #[derive(Default)]
//! struct AppSettings {
//!     core: Option<Box<Configuration>>,
//!     name: String,
//!     server: ServerSettings,
//!     cache: Option<Box<CacheSettings>>,
//!     scratch: String,
//! }
//!
//! impl Settings for AppSettings {
//!     fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
//!         v.field(Field::pointer("core", &mut self.core))?;
//!         v.field(Field::leaf("name", &mut self.name).default("${APPNAME}"))?;
//!         v.field(Field::nested("server", &mut self.server))?;
//!         v.field(Field::pointer("cache", &mut self.cache))?;
//!         v.field(Field::leaf("scratch", &mut self.scratch).private())
//!     }
//! }
//! ```
//!
//! The core block must be an `Option<Box<Configuration>>` offered under its
//! own name. Offering it by value, as an embedded field, or as a private
//! field is an error at `init`, before anything is modified.
//!
//! # Layer precedence
//!
//! ```text
//! Declared defaults     Field::default("info")
//!        ↑ overridden by
//! Config file           logger.level
//!        ↑ overridden by
//! Environment vars      MYAPP_LOGGER_LEVEL
//!        ↑ overridden by
//! Overrides             .cli_override() / --set
//! ```
//!
//! Every layer is sparse: a layer that has nothing for a key leaves the
//! value from the layer below. Empty environment variables and `null` file
//! values count as nothing.
//!
//! # Keys and environment variables
//!
//! A setting's key is its field path joined with dots: `server.port`. The
//! core block adds no segment, so its sections sit at the top level of the
//! config file beside the application's own fields:
//!
//! ```yaml
//! logger:
//!   level: debug
//!   colorized: true
//! console:
//!   width: 120
//! server:
//!   port: 8080
//! ```
//!
//! The environment variable is the app name and the key segments,
//! uppercased, joined with `_`, everything non-alphanumeric folded to `_`:
//!
//! | Env var                 | Key              |
//! |-------------------------|------------------|
//! | `MYAPP_LOGGER_LEVEL`    | `logger.level`   |
//! | `MYAPP_SERVER_PORT`     | `server.port`    |
//!
//! Fields can name their variable explicitly with
//! [`Field::env`]. Raw text from the environment and from `--set` is parsed
//! according to the field's type.
//!
//! # Config file
//!
//! `config.yaml` by default; the extension picks the decoder (`yaml`,
//! `yml`, `json`, `toml`). Unknown top-level keys are ignored. A missing
//! default file is skipped, a missing file named with
//! [`config_file()`](ClifBuilder::config_file) is an error.
//!
//! # Watching
//!
//! Unless disabled with [`no_watch()`](ClifBuilder::no_watch), `init` starts
//! a tokio task and returns its [`WatchHandle`]. The task logs config file
//! changes and polls the environment variables that have callbacks
//! registered through [`Configuration::add_notify_on_change`]. By default a
//! callback runs only when its variable's value changes
//! ([`NotifyMode::OnChange`]); [`NotifyMode::EveryTick`] calls it on every
//! poll.
//!
//! # Error handling
//!
//! All fallible operations return [`ClifError`]. Each error carries a short
//! code from [`ClifError::code`]; messages name the offending field, key or
//! path. Errors inside the watcher are logged through `tracing` and never
//! stop it.

pub mod error;
pub mod settings;
pub mod types;
pub mod walk;

mod anchor;
mod builder;
#[cfg(feature = "clap")]
mod cli;
mod coerce;
mod configuration;
mod console;
mod env;
mod file;
mod logger;
mod ops;
mod overrides;
mod registry;
mod source;
mod watch;

#[cfg(test)]
mod fixtures;

pub use anchor::{Anchor, resolve_anchor};
pub use builder::{Clif, ClifBuilder, init_config};
#[cfg(feature = "clap")]
pub use cli::{ClifArgs, ConfigArgs, ConfigSubcommand};
pub use configuration::{ConfigOption, Configuration, Metadata};
pub use console::ConsoleConfiguration;
pub use env::{EnvSource, Environment, MapEnvironment, ProcessEnvironment};
pub use error::ClifError;
pub use file::{ConfigDocument, FileSource, load_config_file};
pub use logger::LoggerConfiguration;
pub use ops::ConfigResult;
pub use overrides::{OverrideSource, overrides_from, parse_assignment};
pub use registry::{NotifyFn, NotifyRegistry};
pub use settings::{Field, FieldKind, Leaf, LeafKind, Pointer, Settings, Visibility, Visitor};
pub use source::{DefaultContext, DefaultSource, Setting, Source};
pub use types::{ConfigAction, ConfigFormat, NotifyMode, Origin};
pub use watch::{ChangeWatcher, WatchHandle};
