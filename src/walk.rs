//! Depth-first traversal of a settings graph.
//!
//! The walker visits every field in declaration order. What happens at a
//! leaf is up to a [`LeafHandler`]: [`merge`] asks each source in
//! precedence order and writes the winner back, [`collect`] only reads.
//!
//! Structural rules, shared by both:
//!
//! - Private fields and [`Skip`](crate::FieldKind::Skip) fields are ignored.
//! - Struct fields are entered with the field name appended to the key path.
//! - Pointer fields are entered the same way. When merging, a null pointer
//!   is first allocated with its type's default, so every optional section
//!   is populated after a successful walk. When collecting, null pointers
//!   are left alone.
//! - Embedded fields add no key segment.
//! - The core configuration anchor adds no key segment either: its sections
//!   (`logger`, `console`) live at the top level beside the caller's own
//!   fields. Any other field of the core type is skipped.
//!
//! The first error aborts the walk. Values written before it stay written.

use std::sync::Arc;

use serde_json::Value;

use crate::configuration::Configuration;
use crate::env::{Environment, env_key, expand_env_template};
use crate::error::ClifError;
use crate::settings::{Field, FieldKind, Leaf, Settings, Visibility, Visitor};
use crate::source::{Setting, Source};
use crate::types::Origin;

/// Naming context for a walk.
#[derive(Debug, Clone, Default)]
pub struct WalkContext {
    /// Used to derive environment variable names.
    pub app_name: String,
    /// Name of the top-level field holding the core configuration.
    pub anchor: Option<&'static str>,
    /// Key segments prepended to every setting, for walking a sub-tree.
    pub prefix: Vec<&'static str>,
    /// Consulted for the starting value of monitored settings.
    pub environment: Option<Arc<dyn Environment>>,
}

impl WalkContext {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    pub fn anchor(mut self, field: &'static str) -> Self {
        self.anchor = Some(field);
        self
    }

    pub fn prefix(mut self, segment: &'static str) -> Self {
        self.prefix.push(segment);
        self
    }

    pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }
}

/// One leaf that some source supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub key: String,
    pub env_key: String,
    pub origin: Origin,
}

/// What a merge walk did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkReport {
    pub resolved: Vec<Resolved>,
    /// Monitored settings by environment name, with the value seen while
    /// walking (`None` if unset).
    pub monitored: Vec<(String, Option<String>)>,
    /// Every leaf key visited, in order.
    pub keys: Vec<String>,
}

impl WalkReport {
    pub fn origin_of(&self, key: &str) -> Option<Origin> {
        self.resolved
            .iter()
            .find(|resolved| resolved.key == key)
            .map(|resolved| resolved.origin)
    }
}

pub(crate) trait LeafHandler {
    fn leaf(&mut self, setting: &Setting<'_>, leaf: &mut dyn Leaf) -> Result<(), ClifError>;
}

struct Walker<'h, H> {
    context: &'h WalkContext,
    allocate: bool,
    handler: &'h mut H,
    path: Vec<&'static str>,
    depth: usize,
}

impl<'h, H: LeafHandler> Walker<'h, H> {
    fn new(context: &'h WalkContext, allocate: bool, handler: &'h mut H) -> Self {
        Self {
            context,
            allocate,
            handler,
            path: context.prefix.clone(),
            depth: 0,
        }
    }

    fn descend(
        &mut self,
        segment: Option<&'static str>,
        node: &mut dyn Settings,
    ) -> Result<(), ClifError> {
        if let Some(segment) = segment {
            self.path.push(segment);
        }
        self.depth += 1;
        let result = node.visit(self);
        self.depth -= 1;
        if segment.is_some() {
            self.path.pop();
        }
        result
    }
}

impl<H: LeafHandler> Visitor for Walker<'_, H> {
    fn field(&mut self, field: Field<'_>) -> Result<(), ClifError> {
        if field.visibility() == Visibility::Private {
            return Ok(());
        }
        let is_core = field.targets::<Configuration>();
        let segment = (!field.is_embedded()).then_some(field.name());

        match field.kind {
            FieldKind::Skip => Ok(()),
            FieldKind::Leaf(leaf) => {
                self.path.push(field.name);
                let key = self.path.join(".");
                let env_key = match field.env {
                    Some(template) => expand_env_template(template, &self.context.app_name),
                    None => env_key(&self.context.app_name, &self.path),
                };
                self.path.pop();

                let setting = Setting {
                    key: &key,
                    env_key: &env_key,
                    kind: leaf.kind(),
                    default: field.default.as_ref(),
                    monitored: field.monitored,
                };
                self.handler.leaf(&setting, leaf)
            }
            FieldKind::Struct(_) if is_core => {
                tracing::trace!(
                    event = "clif.walk.core_by_value_skipped",
                    field = field.name,
                );
                Ok(())
            }
            FieldKind::Struct(node) => self.descend(segment, node),
            FieldKind::Pointer(pointer) => {
                let segment = if is_core {
                    if !self.is_anchor_name(field.name) {
                        tracing::trace!(event = "clif.walk.extra_core_skipped", field = field.name);
                        return Ok(());
                    }
                    None
                } else {
                    segment
                };
                let node = if self.allocate {
                    Some(pointer.allocate())
                } else {
                    pointer.get_mut()
                };
                match node {
                    Some(node) => self.descend(segment, node),
                    None => Ok(()),
                }
            }
        }
    }
}

impl<H> Walker<'_, H> {
    fn is_anchor_name(&self, name: &str) -> bool {
        self.depth == 0 && self.context.anchor == Some(name)
    }
}

struct Merge<'s> {
    sources: &'s [&'s dyn Source],
    environment: Option<&'s dyn Environment>,
    report: WalkReport,
}

impl LeafHandler for Merge<'_> {
    fn leaf(&mut self, setting: &Setting<'_>, leaf: &mut dyn Leaf) -> Result<(), ClifError> {
        self.report.keys.push(setting.key.to_string());
        if setting.monitored {
            let seen = self
                .environment
                .and_then(|env| env.var(setting.env_key))
                .filter(|v| !v.is_empty());
            self.report.monitored.push((setting.env_key.to_string(), seen));
        }

        let mut winner: Option<(Origin, Value)> = None;
        for source in self.sources {
            if let Some(value) = source.lookup(setting)? {
                winner = Some((source.origin(), value));
            }
        }
        let Some((origin, value)) = winner else {
            return Ok(());
        };

        leaf.assign(setting.key, &value)?;
        tracing::trace!(
            event = "clif.walk.assigned",
            key = setting.key,
            origin = %origin,
        );
        self.report.resolved.push(Resolved {
            key: setting.key.to_string(),
            env_key: setting.env_key.to_string(),
            origin,
        });
        Ok(())
    }
}

/// Populate every leaf of `node` from `sources`, listed lowest precedence
/// first. Null pointers are allocated on the way down.
pub fn merge(
    node: &mut dyn Settings,
    sources: &[&dyn Source],
    context: &WalkContext,
) -> Result<WalkReport, ClifError> {
    let mut handler = Merge {
        sources,
        environment: context.environment.as_deref(),
        report: WalkReport::default(),
    };
    node.visit(&mut Walker::new(context, true, &mut handler))?;
    Ok(handler.report)
}

struct Collect {
    entries: Vec<(String, Value)>,
}

impl LeafHandler for Collect {
    fn leaf(&mut self, setting: &Setting<'_>, leaf: &mut dyn Leaf) -> Result<(), ClifError> {
        self.entries.push((setting.key.to_string(), leaf.current()));
        Ok(())
    }
}

/// Every reachable leaf as `(dotted key, current value)`. Never allocates.
pub fn collect(
    node: &mut dyn Settings,
    context: &WalkContext,
) -> Result<Vec<(String, Value)>, ClifError> {
    let mut handler = Collect {
        entries: Vec::new(),
    };
    node.visit(&mut Walker::new(context, false, &mut handler))?;
    Ok(handler.entries)
}
