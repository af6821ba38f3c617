//! The capability visitor that stands in for runtime reflection.
//!
//! A settings type describes its own fields by implementing [`Settings`]:
//! it hands each field to a [`Visitor`] as a [`Field`], in declaration
//! order. A field is one of a closed set of kinds:
//!
//! - [`FieldKind::Leaf`]: a scalar value that sources can populate.
//! - [`FieldKind::Struct`]: a nested settings value held inline.
//! - [`FieldKind::Pointer`]: an `Option<Box<T>>` that is allocated on demand.
//! - [`FieldKind::Skip`]: anything the engine should leave alone.
//!
//! ```ignore
//! struct AppSettings {
//!     core: Option<Box<Configuration>>,
//!     name: String,
//!     server: ServerSettings,
//!     cache: Option<Box<CacheSettings>>,
//! }
//!
//! impl Settings for AppSettings {
//!     fn visit(&mut self, v: &mut dyn Visitor) -> Result<(), ClifError> {
//!         v.field(Field::pointer("core", &mut self.core))?;
//!         v.field(Field::leaf("name", &mut self.name).default("${APPNAME}"))?;
//!         v.field(Field::nested("server", &mut self.server))?;
//!         v.field(Field::pointer("cache", &mut self.cache))
//!     }
//! }
//! ```
//!
//! Struct and pointer fields carry the [`TypeId`] of their target, which is
//! how the anchor resolver recognizes the core configuration type.

use std::any::{Any, TypeId, type_name};
use std::fmt;

use serde_json::Value;

use crate::coerce;
use crate::error::ClifError;

/// A node in the settings graph.
pub trait Settings: 'static {
    /// Offer every field to `visitor`, in declaration order, stopping at the
    /// first error.
    fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<(), ClifError>;
}

/// Receives fields from [`Settings::visit`].
pub trait Visitor {
    fn field(&mut self, field: Field<'_>) -> Result<(), ClifError>;
}

/// The primitive shape of a leaf, used to interpret raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Int,
    Float,
    Bool,
    Str,
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeafKind::Int => "int",
            LeafKind::Float => "float",
            LeafKind::Bool => "bool",
            LeafKind::Str => "string",
        };
        f.write_str(name)
    }
}

/// A scalar settings value.
pub trait Leaf {
    fn kind(&self) -> LeafKind;

    /// Overwrite the value from a decoded one. `key` is only used for errors.
    fn assign(&mut self, key: &str, value: &Value) -> Result<(), ClifError>;

    /// The current value, for listing.
    fn current(&self) -> Value;
}

impl Leaf for String {
    fn kind(&self) -> LeafKind {
        LeafKind::Str
    }

    fn assign(&mut self, key: &str, value: &Value) -> Result<(), ClifError> {
        *self = coerce::to_string(key, value)?;
        Ok(())
    }

    fn current(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Leaf for bool {
    fn kind(&self) -> LeafKind {
        LeafKind::Bool
    }

    fn assign(&mut self, key: &str, value: &Value) -> Result<(), ClifError> {
        *self = coerce::to_bool(key, value)?;
        Ok(())
    }

    fn current(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Leaf for f64 {
    fn kind(&self) -> LeafKind {
        LeafKind::Float
    }

    fn assign(&mut self, key: &str, value: &Value) -> Result<(), ClifError> {
        *self = coerce::to_float(key, value)?;
        Ok(())
    }

    fn current(&self) -> Value {
        Value::from(*self)
    }
}

impl Leaf for i64 {
    fn kind(&self) -> LeafKind {
        LeafKind::Int
    }

    fn assign(&mut self, key: &str, value: &Value) -> Result<(), ClifError> {
        *self = coerce::to_int(key, value)?;
        Ok(())
    }

    fn current(&self) -> Value {
        Value::from(*self)
    }
}

impl Leaf for u64 {
    fn kind(&self) -> LeafKind {
        LeafKind::Int
    }

    fn assign(&mut self, key: &str, value: &Value) -> Result<(), ClifError> {
        *self = coerce::to_u64(key, value)?;
        Ok(())
    }

    fn current(&self) -> Value {
        Value::from(*self)
    }
}

macro_rules! narrow_int_leaf {
    ($($ty:ty),*) => {
        $(
            impl Leaf for $ty {
                fn kind(&self) -> LeafKind {
                    LeafKind::Int
                }

                fn assign(&mut self, key: &str, value: &Value) -> Result<(), ClifError> {
                    *self = coerce::to_int_as::<$ty>(key, value, stringify!($ty))?;
                    Ok(())
                }

                fn current(&self) -> Value {
                    Value::from(*self)
                }
            }
        )*
    };
}

narrow_int_leaf!(i32, u16, u32, usize);

/// `null` clears the value; anything else is assigned to the inner leaf.
impl<T: Leaf + Default> Leaf for Option<T> {
    fn kind(&self) -> LeafKind {
        match self {
            Some(inner) => inner.kind(),
            None => T::default().kind(),
        }
    }

    fn assign(&mut self, key: &str, value: &Value) -> Result<(), ClifError> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        self.get_or_insert_with(T::default).assign(key, value)
    }

    fn current(&self) -> Value {
        self.as_ref().map_or(Value::Null, |inner| inner.current())
    }
}

/// An optional, heap-allocated nested settings value.
pub trait Pointer {
    fn is_null(&self) -> bool;

    /// The pointee, allocating a default value first if the pointer is null.
    fn allocate(&mut self) -> &mut dyn Settings;

    /// The pointee if present; never allocates.
    fn get_mut(&mut self) -> Option<&mut dyn Settings>;

    /// The pointer itself, for downcasting to its concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Settings + Default> Pointer for Option<Box<T>> {
    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn allocate(&mut self) -> &mut dyn Settings {
        &mut **self.get_or_insert_with(Box::default)
    }

    fn get_mut(&mut self) -> Option<&mut dyn Settings> {
        match self {
            Some(inner) => Some(&mut **inner as &mut dyn Settings),
            None => None,
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Whether the engine may touch a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Internal helper state; skipped by the walker, rejected as an anchor.
    Private,
}

pub enum FieldKind<'a> {
    Leaf(&'a mut dyn Leaf),
    Struct(&'a mut dyn Settings),
    Pointer(&'a mut dyn Pointer),
    Skip,
}

/// One field of a settings node, as offered to a [`Visitor`].
pub struct Field<'a> {
    pub(crate) name: &'static str,
    pub(crate) visibility: Visibility,
    pub(crate) embedded: bool,
    pub(crate) monitored: bool,
    pub(crate) default: Option<Value>,
    pub(crate) env: Option<&'static str>,
    pub(crate) target: Option<(TypeId, &'static str)>,
    pub(crate) kind: FieldKind<'a>,
}

impl<'a> Field<'a> {
    fn new(name: &'static str, kind: FieldKind<'a>) -> Self {
        Self {
            name,
            visibility: Visibility::Public,
            embedded: false,
            monitored: false,
            default: None,
            env: None,
            target: None,
            kind,
        }
    }

    pub fn leaf<L: Leaf>(name: &'static str, value: &'a mut L) -> Self {
        Self::new(name, FieldKind::Leaf(value))
    }

    pub fn nested<T: Settings>(name: &'static str, value: &'a mut T) -> Self {
        let mut field = Self::new(name, FieldKind::Struct(value));
        field.target = Some((TypeId::of::<T>(), type_name::<T>()));
        field
    }

    pub fn pointer<T: Settings + Default>(name: &'static str, slot: &'a mut Option<Box<T>>) -> Self {
        let mut field = Self::new(name, FieldKind::Pointer(slot));
        field.target = Some((TypeId::of::<T>(), type_name::<T>()));
        field
    }

    pub fn skip(name: &'static str) -> Self {
        Self::new(name, FieldKind::Skip)
    }

    /// Mark the field as internal. Private fields are never populated.
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Mark the field as embedded: its own fields are addressed as if they
    /// belonged to the parent, without a key segment of their own.
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    /// Include the field in the change watcher's polling.
    pub fn monitored(mut self) -> Self {
        self.monitored = true;
        self
    }

    /// Value used when no other source provides one. String defaults may use
    /// `${APPNAME}`, `${USER}` and `${HOME}`.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Environment variable name, replacing the derived one. May use
    /// `${APPNAME}`.
    pub fn env(mut self, template: &'static str) -> Self {
        self.env = Some(template);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn is_monitored(&self) -> bool {
        self.monitored
    }

    /// Whether a struct or pointer field targets `T`.
    pub fn targets<T: 'static>(&self) -> bool {
        matches!(self.target, Some((id, _)) if id == TypeId::of::<T>())
    }

    pub(crate) fn target_name(&self) -> &'static str {
        self.target.map_or("?", |(_, name)| name)
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FieldKind::Leaf(_) => "leaf",
            FieldKind::Struct(_) => "struct",
            FieldKind::Pointer(_) => "pointer",
            FieldKind::Skip => "skip",
        };
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("visibility", &self.visibility)
            .field("embedded", &self.embedded)
            .field("monitored", &self.monitored)
            .finish()
    }
}
