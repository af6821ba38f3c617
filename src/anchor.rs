//! Locating the core configuration inside a caller's settings type.
//!
//! Only the top-level fields are inspected, in declaration order:
//!
//! | Field                                  | Outcome                    |
//! |----------------------------------------|----------------------------|
//! | `Configuration` by value               | `EmbeddedCoreNotPointer`   |
//! | `Option<Box<Configuration>>`, embedded | `AnonymousCoreConfig`      |
//! | `Option<Box<Configuration>>`, private  | `NonExportedCoreConfig`    |
//! | `Option<Box<Configuration>>`, public   | the anchor                 |
//!
//! The first public pointer wins; nothing after it is inspected. A caller
//! type with no candidate fails with `MissingCoreConfig`.
//!
//! All checks and the metadata build happen before the anchor field is
//! touched, so a failed resolution leaves the caller's value as it was.

use std::sync::Arc;

use crate::configuration::{ConfigOption, Configuration, Metadata};
use crate::error::ClifError;
use crate::registry::NotifyRegistry;
use crate::settings::{Field, FieldKind, Settings, Visibility, Visitor};

/// A resolved anchor: which field it is, plus copies of what the walk and
/// the watcher need once the caller's value is borrowed elsewhere.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub field: &'static str,
    pub metadata: Metadata,
    pub registry: Arc<NotifyRegistry>,
}

struct Resolver<'o> {
    options: &'o [ConfigOption],
    anchor: Option<Anchor>,
}

impl Visitor for Resolver<'_> {
    fn field(&mut self, field: Field<'_>) -> Result<(), ClifError> {
        if self.anchor.is_some() || !field.targets::<Configuration>() {
            return Ok(());
        }

        let type_name = field.target_name();
        let pointer = match field.kind {
            FieldKind::Pointer(pointer) => pointer,
            FieldKind::Struct(_) => {
                return Err(ClifError::EmbeddedCoreNotPointer {
                    field: field.name,
                    type_name,
                });
            }
            FieldKind::Leaf(_) | FieldKind::Skip => return Ok(()),
        };
        if field.embedded {
            return Err(ClifError::AnonymousCoreConfig { field: field.name });
        }
        if field.visibility == Visibility::Private {
            return Err(ClifError::NonExportedCoreConfig { field: field.name });
        }

        let Some(slot) = pointer
            .as_any_mut()
            .downcast_mut::<Option<Box<Configuration>>>()
        else {
            return Ok(());
        };
        let metadata = Metadata::resolve(self.options)?;

        let core = slot.get_or_insert_with(Box::default);
        core.metadata = metadata.clone();
        tracing::debug!(
            event = "clif.anchor.resolved",
            field = field.name,
            app = %metadata.app_name(),
            config_file = %metadata.config_file().display(),
        );
        self.anchor = Some(Anchor {
            field: field.name,
            metadata,
            registry: core.registry(),
        });
        Ok(())
    }
}

/// Find the core configuration field of `settings`, allocate it if needed
/// and fill in its metadata from `options`.
pub fn resolve_anchor(
    settings: &mut dyn Settings,
    options: &[ConfigOption],
) -> Result<Anchor, ClifError> {
    let mut resolver = Resolver {
        options,
        anchor: None,
    };
    settings.visit(&mut resolver)?;
    resolver.anchor.ok_or(ClifError::MissingCoreConfig)
}
