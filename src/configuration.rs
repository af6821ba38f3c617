//! The toolkit's own configuration block.
//!
//! A caller embeds exactly one `Option<Box<Configuration>>` in its settings
//! type. [`init`](crate::ClifBuilder::init) finds it, fills in [`Metadata`],
//! and walks the `logger` and `console` sections along with the caller's
//! own fields.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio_util::task::TaskTracker;

use crate::console::ConsoleConfiguration;
use crate::env::{Environment, ProcessEnvironment};
use crate::error::ClifError;
use crate::file::{ConfigDocument, FileSource};
use crate::logger::LoggerConfiguration;
use crate::registry::{NotifyFn, NotifyRegistry};
use crate::settings::{Field, Settings, Visitor};
use crate::source::{DefaultContext, DefaultSource};
use crate::types::NotifyMode;
use crate::walk::{self, WalkContext};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Where configuration comes from and how it is watched.
///
/// Built from process defaults, then adjusted by [`ConfigOption`]s before
/// any source is read.
#[derive(Debug, Clone)]
pub struct Metadata {
    app_name: String,
    config_file: PathBuf,
    file_explicit: bool,
    home_dir: Option<PathBuf>,
    config_dir: PathBuf,
    load: bool,
    watch: bool,
    tracker: Option<TaskTracker>,
    interval: Duration,
    notify_mode: NotifyMode,
    environment: Arc<dyn Environment>,
    overrides: Vec<(String, Value)>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            app_name: process_name(),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            file_explicit: false,
            home_dir: None,
            config_dir: PathBuf::new(),
            load: true,
            watch: true,
            tracker: None,
            interval: DEFAULT_WATCH_INTERVAL,
            notify_mode: NotifyMode::default(),
            environment: Arc::new(ProcessEnvironment),
            overrides: Vec::new(),
        }
    }
}

impl Metadata {
    /// Process defaults with `options` applied in order.
    ///
    /// The config directory defaults to the home directory joined with the
    /// config file name. Without a home directory that default cannot be
    /// formed, which is only an error if no option set the directory.
    pub fn resolve(options: &[ConfigOption]) -> Result<Self, ClifError> {
        let mut metadata = Metadata {
            home_dir: directories::UserDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
            ..Metadata::default()
        };
        let mut dir_given = false;
        for option in options {
            dir_given |= matches!(option, ConfigOption::ConfigDir(_));
            option.apply(&mut metadata);
        }
        if metadata.interval.is_zero() {
            return Err(zero_interval());
        }
        if !dir_given {
            let home = metadata
                .home_dir
                .as_ref()
                .ok_or(ClifError::HomeDirUnavailable)?;
            metadata.config_dir = home.join(&metadata.config_file);
        }
        Ok(metadata)
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn home_dir(&self) -> Option<&Path> {
        self.home_dir.as_deref()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Whether the caller named the config file. A missing explicit file is
    /// an error; a missing default one is not.
    pub fn is_file_explicit(&self) -> bool {
        self.file_explicit
    }

    pub fn load(&self) -> bool {
        self.load
    }

    pub fn watch(&self) -> bool {
        self.watch
    }

    pub fn tracker(&self) -> Option<&TaskTracker> {
        self.tracker.as_ref()
    }

    pub fn watch_interval(&self) -> Duration {
        self.interval
    }

    pub fn notify_mode(&self) -> NotifyMode {
        self.notify_mode
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    pub fn overrides(&self) -> &[(String, Value)] {
        &self.overrides
    }

    /// The values `${APPNAME}`, `${USER}` and `${HOME}` expand to in
    /// declared defaults.
    pub fn default_context(&self) -> DefaultContext {
        DefaultContext {
            app_name: self.app_name.clone(),
            user: self
                .environment
                .var("USER")
                .or_else(|| self.environment.var("USERNAME")),
            home: self
                .home_dir
                .as_ref()
                .map(|home| home.display().to_string())
                .unwrap_or_default(),
        }
    }
}

pub(crate) fn zero_interval() -> ClifError {
    ClifError::InvalidValue {
        key: "watch_interval".into(),
        reason: "must be greater than zero".into(),
    }
}

fn process_name() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

/// One adjustment to [`Metadata`], applied before sources are read.
#[derive(Debug, Clone)]
pub enum ConfigOption {
    AppName(String),
    /// Read this file instead of `config.yaml`. Marks the file explicit.
    ConfigFile(PathBuf),
    ConfigDir(PathBuf),
    /// Skip the file and the walk entirely.
    NoLoad,
    /// Do not start the change watcher.
    NoWatch,
    /// The watcher registers with this tracker, so shutdown can wait on it.
    TaskTracker(TaskTracker),
    WatchInterval(Duration),
    NotifyMode(NotifyMode),
    Environment(Arc<dyn Environment>),
    /// A highest-precedence value for a dotted key.
    Override(String, Value),
}

impl ConfigOption {
    pub fn apply(&self, metadata: &mut Metadata) {
        match self {
            ConfigOption::AppName(name) => metadata.app_name = name.clone(),
            ConfigOption::ConfigFile(path) => {
                metadata.config_file = path.clone();
                metadata.file_explicit = true;
            }
            ConfigOption::ConfigDir(path) => metadata.config_dir = path.clone(),
            ConfigOption::NoLoad => metadata.load = false,
            ConfigOption::NoWatch => metadata.watch = false,
            ConfigOption::TaskTracker(tracker) => metadata.tracker = Some(tracker.clone()),
            ConfigOption::WatchInterval(interval) => metadata.interval = *interval,
            ConfigOption::NotifyMode(mode) => metadata.notify_mode = *mode,
            ConfigOption::Environment(environment) => {
                metadata.environment = Arc::clone(environment);
            }
            ConfigOption::Override(key, value) => {
                metadata.overrides.push((key.clone(), value.clone()));
            }
        }
    }
}

/// The core configuration block.
///
/// `logger` and `console` are `None` until a loading init allocates them.
/// The notification registry is created with the block and survives
/// re-initialization, so callbacks may be registered before `init`.
#[derive(Debug, Default)]
pub struct Configuration {
    pub metadata: Metadata,
    pub logger: Option<Box<LoggerConfiguration>>,
    pub console: Option<Box<ConsoleConfiguration>>,
    registry: Arc<NotifyRegistry>,
}

impl Configuration {
    /// Call `callback` when the environment variable `setting` is polled.
    ///
    /// `setting` is the variable's name, e.g. `MYAPP_LOGGER_LEVEL`.
    pub fn add_notify_on_change<F>(&self, setting: &str, callback: F)
    where
        F: Fn(&str, Option<&str>) + Send + Sync + 'static,
    {
        let callback: NotifyFn = Arc::new(callback);
        self.registry.register(setting, callback);
    }

    pub fn registry(&self) -> Arc<NotifyRegistry> {
        Arc::clone(&self.registry)
    }

    /// Environment names of the fields marked monitored, as of the last walk.
    pub fn monitored_settings(&self) -> Vec<String> {
        self.registry.monitored()
    }

    pub fn logger(&self) -> Option<&LoggerConfiguration> {
        self.logger.as_deref()
    }

    pub fn console(&self) -> Option<&ConsoleConfiguration> {
        self.console.as_deref()
    }
}

impl Settings for Configuration {
    fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
        v.field(Field::skip("metadata"))?;
        v.field(Field::pointer("logger", &mut self.logger))?;
        v.field(Field::pointer("console", &mut self.console))
    }
}

/// Decode one top-level section into a fresh `T`, declared defaults first.
/// Errors name keys as `{section}.{field}`.
pub(crate) fn decode_section<T: Settings + Default>(
    section: &'static str,
    values: &Map<String, Value>,
) -> Result<T, ClifError> {
    let mut root = Map::new();
    root.insert(section.to_string(), Value::Object(values.clone()));
    let file = FileSource::new(Some(ConfigDocument {
        path: PathBuf::from(section),
        root,
    }));
    let defaults = DefaultSource::new(DefaultContext::default());

    let mut decoded = T::default();
    walk::merge(
        &mut decoded,
        &[&defaults, &file],
        &WalkContext::default().prefix(section),
    )?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnvironment;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn defaults_before_options() {
        let metadata = Metadata::resolve(&[ConfigOption::ConfigDir("/etc/app".into())]).unwrap();
        assert_eq!(metadata.config_file(), Path::new("config.yaml"));
        assert!(!metadata.is_file_explicit());
        assert!(metadata.load());
        assert!(metadata.watch());
        assert_eq!(metadata.watch_interval(), Duration::from_secs(5));
        assert_eq!(metadata.notify_mode(), NotifyMode::OnChange);
        assert!(metadata.tracker().is_none());
        assert!(metadata.overrides().is_empty());
    }

    #[test]
    fn options_apply_in_order() {
        let metadata = Metadata::resolve(&[
            ConfigOption::AppName("first".into()),
            ConfigOption::AppName("second".into()),
            ConfigOption::ConfigFile("/tmp/app.json".into()),
            ConfigOption::ConfigDir("/tmp".into()),
            ConfigOption::NoLoad,
            ConfigOption::NoWatch,
            ConfigOption::WatchInterval(Duration::from_millis(10)),
            ConfigOption::NotifyMode(NotifyMode::EveryTick),
            ConfigOption::Override("console.width".into(), json!(80)),
        ])
        .unwrap();
        assert_eq!(metadata.app_name(), "second");
        assert_eq!(metadata.config_file(), Path::new("/tmp/app.json"));
        assert!(metadata.is_file_explicit());
        assert_eq!(metadata.config_dir(), Path::new("/tmp"));
        assert!(!metadata.load());
        assert!(!metadata.watch());
        assert_eq!(metadata.watch_interval(), Duration::from_millis(10));
        assert_eq!(metadata.notify_mode(), NotifyMode::EveryTick);
        assert_eq!(metadata.overrides(), &[("console.width".to_string(), json!(80))]);
    }

    #[test]
    fn zero_watch_interval_is_rejected() {
        let err = Metadata::resolve(&[
            ConfigOption::ConfigDir("/tmp".into()),
            ConfigOption::WatchInterval(Duration::ZERO),
        ])
        .unwrap_err();
        assert!(matches!(err, ClifError::InvalidValue { ref key, .. } if key == "watch_interval"));
        assert_eq!(err.code(), "CC07");
    }

    #[test]
    fn config_dir_joins_home_and_file() {
        let Some(home) = directories::UserDirs::new().map(|d| d.home_dir().to_path_buf()) else {
            return;
        };
        let metadata = Metadata::resolve(&[ConfigOption::ConfigFile("app.yml".into())]).unwrap();
        assert_eq!(metadata.home_dir(), Some(home.as_path()));
        assert_eq!(metadata.config_dir(), home.join("app.yml"));
    }

    #[test]
    fn default_context_reads_user_from_environment() {
        let env = Arc::new(MapEnvironment::from_pairs([("USER", "alice")]));
        let metadata = Metadata::resolve(&[
            ConfigOption::AppName("svc".into()),
            ConfigOption::ConfigDir("/x".into()),
            ConfigOption::Environment(env),
        ])
        .unwrap();
        let context = metadata.default_context();
        assert_eq!(context.app_name, "svc");
        assert_eq!(context.user.as_deref(), Some("alice"));
    }

    #[test]
    fn visit_exposes_sections_only() {
        struct Names(Vec<&'static str>);
        impl Visitor for Names {
            fn field(&mut self, field: Field<'_>) -> Result<(), ClifError> {
                self.0.push(field.name());
                Ok(())
            }
        }
        let mut names = Names(Vec::new());
        Configuration::default().visit(&mut names).unwrap();
        assert_eq!(names.0, vec!["metadata", "logger", "console"]);
    }

    #[test]
    fn notify_registration_reaches_registry() {
        let core = Configuration::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        core.add_notify_on_change("APP_LOGGER_LEVEL", move |setting, value| {
            sink.lock()
                .unwrap()
                .push((setting.to_string(), value.map(str::to_string)));
        });

        let registry = core.registry();
        assert_eq!(registry.callback_count("APP_LOGGER_LEVEL"), 1);
        for (setting, callbacks) in registry.snapshot() {
            for callback in callbacks {
                callback(&setting, Some("debug"));
            }
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("APP_LOGGER_LEVEL".to_string(), Some("debug".to_string()))]
        );
    }

    #[test]
    fn decode_section_applies_defaults_then_values() {
        let values = json!({"colorized": true});
        let logger: LoggerConfiguration =
            decode_section("logger", values.as_object().unwrap()).unwrap();
        assert_eq!(logger.level, "info");
        assert!(logger.colorized);
    }
}
