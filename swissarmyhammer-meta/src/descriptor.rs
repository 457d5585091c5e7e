//! Plain structural descriptors, the input side of the meta factory.
//!
//! A descriptor is serde data (camelCase keys) so it can be authored in YAML or
//! JSON. Nested fields hold a [`MetaInput`]: either another raw descriptor or
//! an already materialized [`Meta`], which the factory reuses by reference.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::editor::EditorRef;
use crate::kind::Kind;
use crate::meta::Meta;

/// A nested field: raw descriptor or materialized meta.
#[derive(Debug, Clone)]
pub enum MetaInput {
    Meta(Meta),
    Descriptor(Box<Descriptor>),
}

impl From<Meta> for MetaInput {
    fn from(meta: Meta) -> Self {
        MetaInput::Meta(meta)
    }
}

impl From<&Meta> for MetaInput {
    fn from(meta: &Meta) -> Self {
        MetaInput::Meta(meta.clone())
    }
}

impl From<Descriptor> for MetaInput {
    fn from(descriptor: Descriptor) -> Self {
        MetaInput::Descriptor(Box::new(descriptor))
    }
}

impl From<Kind> for MetaInput {
    fn from(kind: Kind) -> Self {
        Descriptor::new(kind).into()
    }
}

impl Serialize for MetaInput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            MetaInput::Meta(meta) => meta.serialize(serializer),
            MetaInput::Descriptor(descriptor) => descriptor.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MetaInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Descriptor::deserialize(deserializer).map(MetaInput::from)
    }
}

/// Structural description of a shape before materialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Kind>,
    /// Ignored by the factory: a raw id never pins identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Written for pinned ids; honored only by [`Meta::restore`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_fixed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_props: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Explicit function marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_of: Option<MetaInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<IndexMap<String, MetaInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<MetaInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MetaInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<MetaInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<IndexMap<String, MetaInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invariant: Option<String>,
}

impl Descriptor {
    /// An empty descriptor with an explicit kind.
    pub fn new(kind: Kind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set the optional flag.
    pub fn optional(mut self, flag: bool) -> Self {
        self.optional = Some(flag);
        self
    }

    /// Set the category.
    pub fn category(mut self, name: impl Into<String>) -> Self {
        self.category = Some(name.into());
        self
    }

    /// Bind an editor.
    pub fn editor(mut self, editor: impl Into<EditorRef>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    /// Set the editor property table.
    pub fn editor_props(mut self, props: Map<String, Value>) -> Self {
        self.editor_props = Some(props);
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Mark as a function descriptor.
    pub fn function(mut self) -> Self {
        self.function = Some(true);
        self
    }

    /// Array of `item`.
    pub fn array_of(mut self, item: impl Into<MetaInput>) -> Self {
        self.array_of = Some(item.into());
        self
    }

    /// Add one attribute, keeping insertion order.
    pub fn attribute(mut self, name: impl Into<String>, meta: impl Into<MetaInput>) -> Self {
        self.attributes
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), meta.into());
        self
    }

    /// Append a function argument.
    pub fn argument(mut self, meta: impl Into<MetaInput>) -> Self {
        self.arguments.get_or_insert_with(Vec::new).push(meta.into());
        self
    }

    /// Set the function or promise result.
    pub fn result(mut self, meta: impl Into<MetaInput>) -> Self {
        self.result = Some(meta.into());
        self
    }

    /// Append a union alternative.
    pub fn alternative(mut self, meta: impl Into<MetaInput>) -> Self {
        self.types.get_or_insert_with(Vec::new).push(meta.into());
        self
    }

    /// Add a variant under `tag`.
    pub fn variant(mut self, tag: impl Into<String>, meta: impl Into<MetaInput>) -> Self {
        self.variants
            .get_or_insert_with(IndexMap::new)
            .insert(tag.into(), meta.into());
        self
    }

    /// Name the variant discriminant attribute.
    pub fn invariant(mut self, field: impl Into<String>) -> Self {
        self.invariant = Some(field.into());
        self
    }

    /// Field-wise overlay: every field set in `overrides` replaces ours.
    ///
    /// Maps and lists are replaced whole, not merged.
    pub fn merge(self, overrides: Descriptor) -> Descriptor {
        Descriptor {
            kind: overrides.kind.or(self.kind),
            id: overrides.id.or(self.id),
            id_fixed: overrides.id_fixed.or(self.id_fixed),
            description: overrides.description.or(self.description),
            optional: overrides.optional.or(self.optional),
            category: overrides.category.or(self.category),
            editor: overrides.editor.or(self.editor),
            editor_props: overrides.editor_props.or(self.editor_props),
            default_value: overrides.default_value.or(self.default_value),
            function: overrides.function.or(self.function),
            array_of: overrides.array_of.or(self.array_of),
            attributes: overrides.attributes.or(self.attributes),
            arguments: overrides.arguments.or(self.arguments),
            result: overrides.result.or(self.result),
            types: overrides.types.or(self.types),
            variants: overrides.variants.or(self.variants),
            invariant: overrides.invariant.or(self.invariant),
        }
    }

    /// True when no field is set at all.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.id.is_none()
            && self.id_fixed.is_none()
            && self.description.is_none()
            && self.optional.is_none()
            && self.category.is_none()
            && self.editor.is_none()
            && self.editor_props.is_none()
            && self.default_value.is_none()
            && self.function.is_none()
            && self.array_of.is_none()
            && self.attributes.is_none()
            && self.arguments.is_none()
            && self.result.is_none()
            && self.types.is_none()
            && self.variants.is_none()
            && self.invariant.is_none()
    }
}
