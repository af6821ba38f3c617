//! Clap adapter for clif.
//!
//! Compiled only with the `clap` Cargo feature (on by default). It offers
//! two things to flatten into an application's own clap derive:
//!
//! - [`ClifArgs`]: global flags for the toolkit's own settings and for
//!   generic `--set key=value` overrides.
//! - [`ConfigArgs`] / [`ConfigSubcommand`]: a `config list|get` subcommand
//!   group.
//!
//! Both only produce plain values ([`ConfigOption`]s and a
//! [`ConfigAction`]); everything else goes through
//! [`ClifBuilder`](crate::ClifBuilder).

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::Value;

use crate::builder::ClifBuilder;
use crate::configuration::ConfigOption;
use crate::error::ClifError;
use crate::overrides::parse_assignment;
use crate::types::ConfigAction;

/// Command-line flags for the core configuration.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     clif: ClifArgs,
/// }
/// ```
#[derive(Debug, Clone, Default, Args)]
pub struct ClifArgs {
    /// Config file to read (default: config.yaml).
    #[arg(long = "config", global = true)]
    pub config_file: Option<PathBuf>,

    /// Application name, used for `${APPNAME}` and env variable names.
    #[arg(long, global = true)]
    pub app_name: Option<String>,

    #[arg(long, global = true)]
    pub logger_level: Option<String>,

    #[arg(long, global = true)]
    pub logger_colorized: Option<bool>,

    #[arg(long, global = true)]
    pub console_width: Option<u16>,

    #[arg(long, global = true)]
    pub console_height: Option<u16>,

    /// Override any setting, e.g. `--set server.port=8080`. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub set: Vec<String>,

    /// Do not start the change watcher.
    #[arg(long, global = true)]
    pub no_watch: bool,

    /// Skip loading the config file and environment.
    #[arg(long, global = true)]
    pub no_load: bool,
}

impl ClifArgs {
    /// The options these flags stand for, in a fixed order: file and name
    /// first, then section flags, then `--set` pairs in command-line order.
    pub fn into_options(self) -> Result<Vec<ConfigOption>, ClifError> {
        let mut options = Vec::new();
        if let Some(name) = self.app_name {
            options.push(ConfigOption::AppName(name));
        }
        if let Some(path) = self.config_file {
            options.push(ConfigOption::ConfigFile(path));
        }

        let sections: [(&str, Option<Value>); 4] = [
            ("logger.level", self.logger_level.map(Value::from)),
            ("logger.colorized", self.logger_colorized.map(Value::from)),
            ("console.width", self.console_width.map(Value::from)),
            ("console.height", self.console_height.map(Value::from)),
        ];
        for (key, value) in sections {
            if let Some(value) = value {
                options.push(ConfigOption::Override(key.to_string(), value));
            }
        }
        for assignment in &self.set {
            let (key, value) = parse_assignment(assignment)?;
            options.push(ConfigOption::Override(key, Value::String(value)));
        }

        if self.no_load {
            options.push(ConfigOption::NoLoad);
        }
        if self.no_watch {
            options.push(ConfigOption::NoWatch);
        }
        Ok(options)
    }

    /// Append these flags to `builder`.
    pub fn apply(self, builder: ClifBuilder) -> Result<ClifBuilder, ClifError> {
        Ok(self
            .into_options()?
            .into_iter()
            .fold(builder, ClifBuilder::option))
    }
}

/// Clap-derived args for the `config` subcommand group.
///
/// ```ignore
/// #[derive(Subcommand)]
/// enum Commands {
///     Config(ConfigArgs),
/// }
/// ```
#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigSubcommand>,
}

/// Available config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show all resolved configuration key-value pairs.
    List,
    /// Show the resolved value of one key.
    Get {
        /// Dotted key path (e.g. "logger.level").
        key: String,
    },
}

impl ConfigArgs {
    /// Bare `config` and `config list` both map to `ConfigAction::List`.
    pub fn into_action(self) -> ConfigAction {
        match self.action {
            None | Some(ConfigSubcommand::List) => ConfigAction::List,
            Some(ConfigSubcommand::Get { key }) => ConfigAction::Get { key },
        }
    }
}
