//! `Meta`: the immutable, materialized descriptor.
//!
//! Every builder returns a new `Meta` and leaves the receiver untouched.
//! Nested metas are shared by reference (`Arc`) when unchanged.
//!
//! Identity is either derived, recomputed from structural content on every
//! rebuild, or fixed via [`Meta::with_id`] and carried through every later
//! derivation.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::descriptor::Descriptor;
use crate::editor::EditorRef;
use crate::error::Result;
use crate::factory;
use crate::identity::derive_id;
use crate::kind::Kind;
use crate::shape::Shape;

/// Facets shared by every kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct Base {
    pub description: Option<String>,
    pub optional: bool,
    pub category: Option<String>,
    pub editor: Option<EditorRef>,
    pub editor_props: Option<Map<String, Value>>,
    pub default_value: Option<Value>,
}

impl Base {
    pub(crate) fn from_descriptor(descriptor: &mut Descriptor) -> Self {
        Self {
            description: descriptor.description.take(),
            optional: descriptor.optional.unwrap_or(false),
            category: descriptor.category.take(),
            editor: descriptor.editor.take(),
            editor_props: descriptor.editor_props.take(),
            default_value: descriptor.default_value.take(),
        }
    }
}

struct MetaInner {
    kind: Kind,
    id: String,
    id_fixed: bool,
    base: Base,
    shape: Shape,
}

/// A materialized, immutable descriptor with a computed identity.
///
/// Cloning a `Meta` is cheap and yields the same instance (see [`Meta::ptr_eq`]).
#[derive(Clone)]
pub struct Meta(Arc<MetaInner>);

impl Meta {
    /// Assemble a meta, deriving the id unless one is pinned.
    pub(crate) fn assemble(
        kind: Kind,
        mut base: Base,
        shape: Shape,
        pinned: Option<String>,
    ) -> Self {
        if !kind.accepts_default() {
            base.default_value = None;
        }
        let (id, id_fixed) = match pinned {
            Some(id) => (id, true),
            None => (derive_id(kind, &base, &shape), false),
        };
        Meta(Arc::new(MetaInner {
            kind,
            id,
            id_fixed,
            base,
            shape,
        }))
    }

    /// New instance of the same kind with `base`/`shape` replaced.
    pub(crate) fn rebuild(&self, base: Base, shape: Shape) -> Self {
        let pinned = self.0.id_fixed.then(|| self.0.id.clone());
        Meta::assemble(self.0.kind, base, shape, pinned)
    }

    fn with_base(&self, edit: impl FnOnce(&mut Base)) -> Self {
        let mut base = self.0.base.clone();
        edit(&mut base);
        self.rebuild(base, self.0.shape.clone())
    }

    /// Materialize a descriptor. Literal `id`/`idFixed` fields are ignored.
    pub fn from_descriptor(descriptor: Descriptor) -> Result<Self> {
        factory::build(descriptor, false)
    }

    /// Rehydrate a serialized descriptor, re-pinning ids that carry
    /// `idFixed: true`.
    pub fn restore(descriptor: Descriptor) -> Result<Self> {
        factory::build(descriptor, true)
    }

    /// Materialize a descriptor from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        factory::meta_from_value(&value)
    }

    /// Materialize a descriptor from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        factory::meta_from_value(&value)
    }

    // --- Accessors ---

    /// The kind tag. Never changes after construction.
    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    /// Current id, either derived or pinned.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Whether the id was pinned with `with_id`.
    pub fn is_id_fixed(&self) -> bool {
        self.0.id_fixed
    }

    /// The id this meta would have if it were not pinned.
    pub fn derived_id(&self) -> String {
        derive_id(self.0.kind, &self.0.base, &self.0.shape)
    }

    /// Human-readable description.
    pub fn description(&self) -> Option<&str> {
        self.0.base.description.as_deref()
    }

    /// Whether a value may be omitted.
    pub fn is_optional(&self) -> bool {
        self.0.base.optional
    }

    /// Grouping label, set directly or via `group`.
    pub fn category(&self) -> Option<&str> {
        self.0.base.category.as_deref()
    }

    /// Editor binding, if any.
    pub fn editor(&self) -> Option<&EditorRef> {
        self.0.base.editor.as_ref()
    }

    /// Properties handed to the editor.
    pub fn editor_props(&self) -> Option<&Map<String, Value>> {
        self.0.base.editor_props.as_ref()
    }

    /// Always `None` for function and promise metas.
    pub fn default_value(&self) -> Option<&Value> {
        self.0.base.default_value.as_ref()
    }

    pub(crate) fn base(&self) -> &Base {
        &self.0.base
    }

    pub(crate) fn shape(&self) -> &Shape {
        &self.0.shape
    }

    /// Kind membership: true when our kind is `target` or specializes it.
    pub fn is(&self, target: impl Into<Kind>) -> bool {
        self.0.kind.implies(target.into())
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(a: &Meta, b: &Meta) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    // --- Withers ---

    /// Pin the id. The pinned id survives every later derivation.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Meta::assemble(
            self.0.kind,
            self.0.base.clone(),
            self.0.shape.clone(),
            Some(id.into()),
        )
    }

    /// Copy with a new description.
    pub fn with_description(&self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.with_base(|base| base.description = Some(text))
    }

    /// Copy with the optional flag set to `flag`.
    pub fn with_optional(&self, flag: bool) -> Self {
        self.with_base(|base| base.optional = flag)
    }

    /// Shorthand for `with_optional(true)`.
    pub fn optional(&self) -> Self {
        self.with_optional(true)
    }

    /// Copy with a new category.
    pub fn with_category(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with_base(|base| base.category = Some(name))
    }

    /// Copy bound to `editor`. The converter state is shared, not copied.
    pub fn with_editor(&self, editor: impl Into<EditorRef>) -> Self {
        let editor = editor.into();
        self.with_base(|base| base.editor = Some(editor))
    }

    /// Copy with a new editor property table.
    pub fn with_editor_props(&self, props: Map<String, Value>) -> Self {
        self.with_base(|base| base.editor_props = Some(props))
    }

    /// No-op on function and promise metas.
    pub fn with_default_value(&self, value: Value) -> Self {
        if !self.0.kind.accepts_default() {
            return self.clone();
        }
        self.with_base(|base| base.default_value = Some(value))
    }

    /// New meta from our descriptor overlaid with `overrides`.
    ///
    /// The kind never changes: an override `kind` is ignored, as are fields
    /// that belong to other kinds. A literal `id` in either descriptor is
    /// discarded unless our id is pinned, in which case it is carried over.
    pub fn clone_with(&self, overrides: Descriptor) -> Result<Self> {
        let mut merged = self.to_descriptor().merge(overrides);
        merged.kind = Some(self.0.kind);
        merged.id = None;
        merged.id_fixed = None;
        let rebuilt = factory::build_kind(self.0.kind, merged, false)?;
        if self.0.id_fixed {
            Ok(rebuilt.with_id(self.0.id.clone()))
        } else {
            Ok(rebuilt)
        }
    }

    /// Plain descriptor whose nested fields are the materialized metas.
    pub fn to_descriptor(&self) -> Descriptor {
        let base = &self.0.base;
        let mut descriptor = Descriptor {
            kind: Some(self.0.kind),
            id: Some(self.0.id.clone()),
            id_fixed: self.0.id_fixed.then_some(true),
            description: base.description.clone(),
            optional: base.optional.then_some(true),
            category: base.category.clone(),
            editor: base.editor.clone(),
            editor_props: base.editor_props.clone(),
            default_value: base.default_value.clone(),
            ..Descriptor::default()
        };
        self.0.shape.fill_descriptor(&mut descriptor);
        descriptor
    }
}

impl Default for Meta {
    /// The default primitive meta.
    fn default() -> Self {
        Meta::assemble(Kind::Primitive, Base::default(), Shape::Primitive, None)
    }
}

impl From<&Meta> for Kind {
    fn from(meta: &Meta) -> Self {
        meta.kind()
    }
}

/// Structural equality: same kind and same id.
impl PartialEq for Meta {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind == other.0.kind && self.0.id == other.0.id
    }
}

impl Eq for Meta {}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("kind", &self.0.kind)
            .field("id", &self.0.id)
            .field("id_fixed", &self.0.id_fixed)
            .field("base", &self.0.base)
            .field("shape", &self.0.shape)
            .finish()
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.0.kind, self.0.id)
    }
}

impl Serialize for Meta {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_descriptor().serialize(serializer)
    }
}
