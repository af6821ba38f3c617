use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::anchor::{Anchor, resolve_anchor};
use crate::configuration::{ConfigOption, Metadata};
use crate::env::{EnvSource, Environment};
use crate::error::ClifError;
use crate::file::{FileSource, load_config_file};
use crate::ops::{self, ConfigResult};
use crate::overrides::{OverrideSource, overrides_from};
use crate::settings::Settings;
use crate::source::DefaultSource;
use crate::types::{ConfigAction, NotifyMode};
use crate::walk::{self, WalkContext, WalkReport};
use crate::watch::{ChangeWatcher, WatchHandle};

/// Entry point for building a clif configuration.
pub struct Clif;

impl Clif {
    pub fn builder() -> ClifBuilder {
        ClifBuilder::default()
    }
}

/// Builder for initializing a settings graph.
///
/// Each method records one [`ConfigOption`]; they are applied in call order
/// on top of the process defaults when [`init`](Self::init) runs.
#[derive(Debug, Clone, Default)]
pub struct ClifBuilder {
    options: Vec<ConfigOption>,
}

impl ClifBuilder {
    /// Override the application name (default: the executable's file stem).
    /// Used for `${APPNAME}` and as the environment variable prefix.
    pub fn app_name(self, name: &str) -> Self {
        self.option(ConfigOption::AppName(name.to_string()))
    }

    /// Read this config file instead of `config.yaml`. A file named here
    /// must exist.
    pub fn config_file(self, path: impl Into<PathBuf>) -> Self {
        self.option(ConfigOption::ConfigFile(path.into()))
    }

    pub fn config_dir(self, path: impl Into<PathBuf>) -> Self {
        self.option(ConfigOption::ConfigDir(path.into()))
    }

    /// Resolve the anchor only: no file, no walk.
    pub fn no_load(self) -> Self {
        self.option(ConfigOption::NoLoad)
    }

    pub fn no_watch(self) -> Self {
        self.option(ConfigOption::NoWatch)
    }

    /// Spawn the watcher on `tracker` so shutdown can wait for it.
    pub fn task_tracker(self, tracker: TaskTracker) -> Self {
        self.option(ConfigOption::TaskTracker(tracker))
    }

    /// Environment polling interval (default: 5s).
    pub fn watch_interval(self, interval: Duration) -> Self {
        self.option(ConfigOption::WatchInterval(interval))
    }

    pub fn notify_mode(self, mode: NotifyMode) -> Self {
        self.option(ConfigOption::NotifyMode(mode))
    }

    /// Read environment variables from `environment` instead of the process.
    pub fn environment(self, environment: Arc<dyn Environment>) -> Self {
        self.option(ConfigOption::Environment(environment))
    }

    /// Add a CLI override. `None` values are ignored (useful for optional clap args).
    pub fn cli_override<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.option(ConfigOption::Override(key.to_string(), v.into())),
            None => self,
        }
    }

    /// Add CLI overrides from any serializable source, keyed by field path.
    ///
    /// Serializes `source` into flat dotted pairs and skips `None` values.
    /// Keys that match no setting are logged at init and otherwise ignored,
    /// so clap-only fields like `command` or `verbose` do no harm.
    ///
    /// Composes with [`cli_override`](Self::cli_override); later calls take
    /// precedence.
    pub fn cli_overrides_from<S: Serialize>(self, source: &S) -> Result<Self, ClifError> {
        Ok(overrides_from(source)?
            .into_iter()
            .fold(self, |builder, (key, value)| {
                builder.option(ConfigOption::Override(key, value))
            }))
    }

    pub fn option(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    /// Resolve the core configuration in `settings`, populate the graph
    /// and, unless disabled, start the change watcher.
    ///
    /// Returns the watcher's handle when one was started. It stops when
    /// `cancel` fires or the handle is cancelled.
    pub fn init<S: Settings>(
        self,
        cancel: &CancellationToken,
        settings: &mut S,
    ) -> Result<Option<WatchHandle>, ClifError> {
        init_config(cancel, settings, self.options)
    }

    /// Handle a `ConfigAction` and print the result to stdout.
    pub fn handle_and_print<S: Settings>(
        self,
        action: &ConfigAction,
        settings: &mut S,
    ) -> Result<(), ClifError> {
        let result = self.handle(action, settings)?;
        println!("{result}");
        Ok(())
    }

    /// Populate `settings` without watching, then run `action` against it.
    pub fn handle<S: Settings>(
        mut self,
        action: &ConfigAction,
        settings: &mut S,
    ) -> Result<ConfigResult, ClifError> {
        self.options.push(ConfigOption::NoWatch);
        let (anchor, _) = populate(settings, &self.options)?;
        let context = WalkContext::new(anchor.metadata.app_name()).anchor(anchor.field);

        match action {
            ConfigAction::List => ops::list_values(settings, &context),
            ConfigAction::Get { key } => ops::get_value(settings, &context, key),
        }
    }
}

/// Initialize `settings` from `options`, applied in order.
///
/// The anchor is resolved first; if that fails nothing has been modified.
/// With loading enabled, every leaf is then populated from declared
/// defaults, the config file, the environment and overrides, in rising
/// precedence. The watcher is only started once that has succeeded.
pub fn init_config(
    cancel: &CancellationToken,
    settings: &mut dyn Settings,
    options: impl IntoIterator<Item = ConfigOption>,
) -> Result<Option<WatchHandle>, ClifError> {
    let options: Vec<ConfigOption> = options.into_iter().collect();
    let (anchor, report) = populate(settings, &options)?;
    let metadata = &anchor.metadata;
    if !metadata.watch() {
        return Ok(None);
    }

    let baseline = report.map(|report| report.monitored).unwrap_or_default();
    let watcher = ChangeWatcher::new(
        Arc::clone(&anchor.registry),
        Arc::clone(metadata.environment()),
        metadata.watch_interval(),
        metadata.notify_mode(),
    )
    .with_baseline(baseline);
    let handle = watcher.spawn(&watch_paths(metadata), cancel, metadata.tracker())?;
    tracing::info!(
        event = "clif.init.watching",
        app = %metadata.app_name(),
        interval_ms = metadata.watch_interval().as_millis() as u64,
    );
    Ok(Some(handle))
}

/// The config file, the directory holding it and the config dir, without
/// duplicates.
fn watch_paths(metadata: &Metadata) -> Vec<PathBuf> {
    let file = metadata.config_file();
    let parent = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut paths: Vec<PathBuf> = Vec::new();
    for path in [file, parent, metadata.config_dir()] {
        if !paths.iter().any(|known| known == path) {
            paths.push(path.to_path_buf());
        }
    }
    paths
}

fn populate(
    settings: &mut dyn Settings,
    options: &[ConfigOption],
) -> Result<(Anchor, Option<WalkReport>), ClifError> {
    let anchor = resolve_anchor(settings, options)?;
    if !anchor.metadata.load() {
        tracing::debug!(event = "clif.init.load_skipped", field = anchor.field);
        return Ok((anchor, None));
    }
    let report = load(settings, &anchor)?;
    anchor
        .registry
        .set_monitored(report.monitored.iter().map(|(name, _)| name.clone()));
    Ok((anchor, Some(report)))
}

fn load(settings: &mut dyn Settings, anchor: &Anchor) -> Result<WalkReport, ClifError> {
    let metadata = &anchor.metadata;
    let document = load_config_file(metadata.config_file(), metadata.is_file_explicit())?;

    let defaults = DefaultSource::new(metadata.default_context());
    let file = FileSource::new(document);
    let env = EnvSource::new(Arc::clone(metadata.environment()));
    let overrides = OverrideSource::new(metadata.overrides().to_vec());
    let context = WalkContext::new(metadata.app_name())
        .anchor(anchor.field)
        .environment(Arc::clone(metadata.environment()));

    let report = walk::merge(settings, &[&defaults, &file, &env, &overrides], &context)?;

    for key in overrides.keys() {
        if !report.keys.iter().any(|known| known == key) {
            tracing::debug!(
                event = "clif.init.override_unmatched",
                key = %key,
                "override matches no setting"
            );
        }
    }
    tracing::info!(
        event = "clif.init.loaded",
        app = %metadata.app_name(),
        settings = report.keys.len(),
        resolved = report.resolved.len(),
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnvironment;
    use crate::fixtures::test::{CoreByValue, NoCore, Outer, PublicCore};
    use crate::types::Origin;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn builder(dir: &TempDir, env: &[(&str, &str)]) -> ClifBuilder {
        let environment: Arc<dyn Environment> =
            Arc::new(MapEnvironment::from_pairs(env.iter().copied()));
        Clif::builder()
            .app_name("app")
            .config_dir(dir.path())
            .environment(environment)
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn builder_records_options_in_order() {
        let builder = Clif::builder()
            .app_name("a")
            .no_load()
            .no_watch()
            .cli_override("console.width", Some(80))
            .cli_override::<i64>("console.height", None);
        let options = builder.options();
        assert_eq!(options.len(), 4);
        assert!(matches!(&options[0], ConfigOption::AppName(name) if name == "a"));
        assert!(matches!(options[1], ConfigOption::NoLoad));
        assert!(matches!(options[2], ConfigOption::NoWatch));
        assert!(matches!(&options[3], ConfigOption::Override(key, _) if key == "console.width"));
    }

    #[test]
    fn file_values_reach_core_sections() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "config.yaml",
            "logger:\n  level: debug\n  colorized: true\nconsole:\n  width: 50\n  height: 10\n",
        );

        let mut outer = Outer::default();
        let handle = builder(&dir, &[])
            .config_file(&file)
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();
        assert!(handle.is_none());

        let core = outer.core.as_ref().unwrap();
        let logger = core.logger().unwrap();
        let console = core.console().unwrap();
        assert_eq!(logger.level, "debug");
        assert!(logger.colorized);
        assert_eq!(console.width, 50);
        assert_eq!(console.height, 10);
    }

    #[test]
    fn json_file_is_read_by_extension() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "config.json", r#"{"console": {"width": 120}}"#);

        let mut outer = Outer::default();
        builder(&dir, &[])
            .config_file(&file)
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();
        assert_eq!(outer.core.unwrap().console.unwrap().width, 120);
    }

    #[test]
    fn every_pointer_is_allocated() {
        let dir = TempDir::new().unwrap();
        let mut outer = Outer::default();
        builder(&dir, &[])
            .config_file(write(&dir, "config.yaml", ""))
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();

        assert!(outer.inner_ptr.as_ref().unwrap().leaf_ptr.is_some());
        assert_eq!(outer.inner.leaf_ptr.as_ref().unwrap().label, "app-leaf");
        let core = outer.core.as_ref().unwrap();
        assert_eq!(core.logger().unwrap().level, "info");
        assert_eq!(core.console().unwrap().size(), None);
    }

    #[test]
    fn precedence_env_over_file_over_default() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "config.yaml",
            "logger:\n  level: debug\nexternal: from-file\nnumber: 1\n",
        );

        let mut outer = Outer::default();
        builder(&dir, &[("APP_LOGGER_LEVEL", "warn"), ("APP_NUMBER", "2")])
            .config_file(&file)
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();

        let core = outer.core.as_ref().unwrap();
        assert_eq!(core.logger().unwrap().level, "warn");
        assert!(!core.logger().unwrap().colorized);
        assert_eq!(outer.external, "from-file");
        assert_eq!(outer.number, 2);
    }

    #[test]
    fn overrides_beat_environment() {
        let dir = TempDir::new().unwrap();
        let mut outer = Outer::default();
        builder(&dir, &[("APP_LOGGER_LEVEL", "warn")])
            .cli_override("logger.level", Some("error"))
            .cli_override("console.width", Some("90"))
            .cli_override("not.a.setting", Some(1))
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();

        let core = outer.core.as_ref().unwrap();
        assert_eq!(core.logger().unwrap().level, "error");
        assert_eq!(core.console().unwrap().width, 90);
    }

    #[test]
    fn overrides_from_serializable_args() {
        #[derive(Serialize)]
        struct Console {
            width: Option<u16>,
        }
        #[derive(Serialize)]
        struct Args {
            console: Console,
            verbose: bool,
        }
        let args = Args {
            console: Console { width: Some(33) },
            verbose: true,
        };

        let dir = TempDir::new().unwrap();
        let mut outer = Outer::default();
        builder(&dir, &[])
            .cli_overrides_from(&args)
            .unwrap()
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();
        assert_eq!(outer.core.unwrap().console.unwrap().width, 33);
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "config.yaml", "plugins:\n  a: 1\nlogger:\n  level: trace\n");
        let mut outer = Outer::default();
        builder(&dir, &[])
            .config_file(&file)
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();
        assert_eq!(outer.core.unwrap().logger.unwrap().level, "trace");
    }

    #[test]
    fn missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let mut outer = Outer::default();
        let err = builder(&dir, &[])
            .config_file(dir.path().join("absent.yaml"))
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap_err();
        assert!(matches!(err, ClifError::FileRead { .. }));
        assert_eq!(err.code(), "CC04");
    }

    #[test]
    fn malformed_section_fails_with_section_code() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "config.yaml", "console: wide\n");
        let mut outer = Outer::default();
        let err = builder(&dir, &[])
            .config_file(&file)
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap_err();
        assert_eq!(err.code(), "CC03CC01");
    }

    #[test]
    fn unknown_extension_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "config.ini", "[logger]\nlevel=debug\n");
        let mut outer = Outer::default();
        builder(&dir, &[])
            .config_file(&file)
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();
        assert_eq!(outer.core.unwrap().logger.unwrap().level, "info");
    }

    #[test]
    fn no_load_resolves_anchor_only() {
        let dir = TempDir::new().unwrap();
        let mut settings = PublicCore::default();
        builder(&dir, &[])
            .no_load()
            .no_watch()
            .init(&CancellationToken::new(), &mut settings)
            .unwrap();

        let core = settings.core.as_ref().unwrap();
        assert_eq!(core.metadata.app_name(), "app");
        assert_eq!(core.metadata.config_file(), Path::new("config.yaml"));
        assert!(core.logger.is_none());
        assert!(core.console.is_none());
    }

    #[test]
    fn anchor_errors_surface_from_init() {
        let cancel = CancellationToken::new();
        let err = Clif::builder()
            .no_watch()
            .init(&cancel, &mut NoCore::default())
            .unwrap_err();
        assert!(matches!(err, ClifError::MissingCoreConfig));

        let err = Clif::builder()
            .no_watch()
            .init(&cancel, &mut CoreByValue::default())
            .unwrap_err();
        assert_eq!(err.code(), "CC06");
    }

    #[test]
    fn monitored_settings_are_recorded() {
        let dir = TempDir::new().unwrap();
        let mut outer = Outer::default();
        builder(&dir, &[])
            .no_watch()
            .init(&CancellationToken::new(), &mut outer)
            .unwrap();
        assert_eq!(
            outer.core.unwrap().monitored_settings(),
            vec!["APP_LOGGER_LEVEL".to_string()]
        );
    }

    #[test]
    fn second_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "config.yaml", "external: x\nconsole:\n  width: 7\n");
        let run = |outer: &mut Outer| {
            builder(&dir, &[("APP_NUMBER", "5")])
                .config_file(&file)
                .no_watch()
                .init(&CancellationToken::new(), outer)
                .unwrap();
        };

        let mut outer = Outer::default();
        run(&mut outer);
        run(&mut outer);
        assert_eq!(outer.external, "x");
        assert_eq!(outer.number, 5);
        assert_eq!(outer.core.unwrap().console.unwrap().width, 7);
    }

    #[test]
    fn walk_report_tracks_origins() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "config.yaml", "external: x\n");
        let options = builder(&dir, &[("APP_NUMBER", "5")])
            .config_file(&file)
            .no_watch()
            .options()
            .to_vec();

        let mut outer = Outer::default();
        let (_, report) = populate(&mut outer, &options).unwrap();
        let report = report.unwrap();
        assert_eq!(report.origin_of("external"), Some(Origin::File));
        assert_eq!(report.origin_of("number"), Some(Origin::Environment));
        assert_eq!(report.origin_of("logger.level"), Some(Origin::Default));
        assert_eq!(report.origin_of("boolean"), None);
    }

    #[test]
    fn watching_needs_a_runtime() {
        let dir = TempDir::new().unwrap();
        let mut outer = Outer::default();
        let err = builder(&dir, &[])
            .init(&CancellationToken::new(), &mut outer)
            .unwrap_err();
        assert!(matches!(err, ClifError::NoRuntime));
    }

    #[test]
    fn watch_paths_include_parent_directory() {
        let metadata = Metadata::resolve(&[
            ConfigOption::ConfigFile("/etc/app/config.yaml".into()),
            ConfigOption::ConfigDir("/etc/app".into()),
        ])
        .unwrap();
        assert_eq!(
            watch_paths(&metadata),
            vec![PathBuf::from("/etc/app/config.yaml"), PathBuf::from("/etc/app")]
        );

        let metadata = Metadata::resolve(&[ConfigOption::ConfigDir("/srv".into())]).unwrap();
        assert_eq!(
            watch_paths(&metadata),
            vec![
                PathBuf::from("config.yaml"),
                PathBuf::from("."),
                PathBuf::from("/srv"),
            ]
        );
    }

    #[tokio::test]
    async fn zero_watch_interval_fails_before_anything_starts() {
        let dir = TempDir::new().unwrap();
        let mut outer = Outer::default();
        let err = builder(&dir, &[])
            .watch_interval(Duration::ZERO)
            .init(&CancellationToken::new(), &mut outer)
            .unwrap_err();
        assert!(matches!(err, ClifError::InvalidValue { ref key, .. } if key == "watch_interval"));
        assert!(outer.core.is_none());
    }

    #[test]
    fn handle_list_and_get() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "config.yaml", "logger:\n  level: debug\n");

        let mut outer = Outer::default();
        let listing = builder(&dir, &[])
            .config_file(&file)
            .handle(&ConfigAction::List, &mut outer)
            .unwrap();
        let ConfigResult::Listing { entries } = listing else {
            panic!("expected listing");
        };
        assert!(entries.contains(&("logger.level".to_string(), "debug".to_string())));
        assert!(entries.contains(&("console.width".to_string(), "0".to_string())));

        let mut outer = Outer::default();
        let value = builder(&dir, &[])
            .config_file(&file)
            .handle(
                &ConfigAction::Get {
                    key: "logger.colorized".into(),
                },
                &mut outer,
            )
            .unwrap();
        assert_eq!(
            value,
            ConfigResult::KeyValue {
                key: "logger.colorized".into(),
                value: "false".into(),
            }
        );
    }

    #[tokio::test]
    async fn watcher_notifies_on_env_change() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "config.yaml", "logger:\n  level: info\n");
        let env = Arc::new(MapEnvironment::new());
        let environment: Arc<dyn Environment> = Arc::clone(&env) as Arc<dyn Environment>;

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let mut outer = Outer::default();
        let handle = Clif::builder()
            .app_name("app")
            .config_dir(dir.path())
            .config_file(&file)
            .environment(environment)
            .watch_interval(Duration::from_millis(10))
            .task_tracker(tracker.clone())
            .init(&cancel, &mut outer)
            .unwrap()
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        outer
            .core
            .as_ref()
            .unwrap()
            .add_notify_on_change("APP_LOGGER_LEVEL", move |setting, value| {
                let _ = tx.send((setting.to_string(), value.map(str::to_string)));
            });

        env.set("APP_LOGGER_LEVEL", "trace");
        let seen = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, ("APP_LOGGER_LEVEL".to_string(), Some("trace".to_string())));

        cancel.cancel();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .unwrap();
        handle.join().await.unwrap();
    }

    #[test]
    fn override_value_types_pass_through() {
        let builder = Clif::builder().cli_override("console.width", Some(json!(12)));
        assert!(matches!(
            &builder.options()[0],
            ConfigOption::Override(_, value) if *value == json!(12)
        ));
    }
}
