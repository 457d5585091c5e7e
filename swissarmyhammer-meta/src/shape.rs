//! Composite kinds: the kind-specific structure layered on a meta.
//!
//! Nested fields accept a raw descriptor or a materialized meta. Raw
//! descriptors go through the factory; materialized metas are kept as the
//! very same instance, so `item_meta()` and friends hand back what was passed.

use indexmap::IndexMap;

use crate::descriptor::{Descriptor, MetaInput};
use crate::error::{MetaError, Result};
use crate::factory::materialize;
use crate::kind::Kind;
use crate::meta::{Base, Meta};

/// Attribute name to meta, in insertion order.
pub type Attributes = IndexMap<String, Meta>;

/// Variant tag to object meta, in insertion order.
pub type Variants = IndexMap<String, Meta>;

/// Discriminant attribute used when a variant descriptor names none.
pub const DEFAULT_INVARIANT: &str = "type";

#[derive(Debug, Clone)]
pub(crate) enum Shape {
    Primitive,
    Array { item: Meta },
    Object { attributes: Attributes },
    Function { arguments: Vec<Meta>, result: Meta },
    Promise { result: Meta },
    Union { types: Vec<Meta> },
    /// Shared by variant and resource kinds.
    Variant { variants: Variants, invariant: String },
}

fn materialize_all(inputs: Vec<MetaInput>, restore: bool) -> Result<Vec<Meta>> {
    inputs
        .into_iter()
        .map(|input| materialize(input, restore))
        .collect()
}

fn materialize_map(inputs: IndexMap<String, MetaInput>, restore: bool) -> Result<Attributes> {
    inputs
        .into_iter()
        .map(|(name, input)| Ok((name, materialize(input, restore)?)))
        .collect()
}

fn materialize_or_default(input: Option<MetaInput>, restore: bool) -> Result<Meta> {
    input.map_or_else(|| Ok(Meta::default()), |input| materialize(input, restore))
}

fn check_variants(variants: &Variants) -> Result<()> {
    for (tag, meta) in variants {
        if !meta.is(Kind::Object) {
            return Err(MetaError::VariantNotObject {
                tag: tag.clone(),
                kind: meta.kind(),
            });
        }
    }
    Ok(())
}

impl Shape {
    /// Take the fields `kind` needs out of `descriptor`; fields of other
    /// kinds are left behind.
    pub(crate) fn from_descriptor(
        kind: Kind,
        descriptor: &mut Descriptor,
        restore: bool,
    ) -> Result<Self> {
        Ok(match kind {
            Kind::Primitive => Shape::Primitive,
            Kind::Array => Shape::Array {
                item: materialize_or_default(descriptor.array_of.take(), restore)?,
            },
            Kind::Object => Shape::Object {
                attributes: materialize_map(
                    descriptor.attributes.take().unwrap_or_default(),
                    restore,
                )?,
            },
            Kind::Function => Shape::Function {
                arguments: materialize_all(
                    descriptor.arguments.take().unwrap_or_default(),
                    restore,
                )?,
                result: materialize_or_default(descriptor.result.take(), restore)?,
            },
            Kind::Promise => Shape::Promise {
                result: materialize_or_default(descriptor.result.take(), restore)?,
            },
            Kind::Union => Shape::Union {
                types: materialize_all(descriptor.types.take().unwrap_or_default(), restore)?,
            },
            Kind::Variant | Kind::Resource => {
                let variants =
                    materialize_map(descriptor.variants.take().unwrap_or_default(), restore)?;
                check_variants(&variants)?;
                Shape::Variant {
                    variants,
                    invariant: descriptor
                        .invariant
                        .take()
                        .unwrap_or_else(|| DEFAULT_INVARIANT.to_string()),
                }
            }
        })
    }

    /// Write our nested metas into `descriptor` as materialized inputs.
    pub(crate) fn fill_descriptor(&self, descriptor: &mut Descriptor) {
        let as_inputs = |metas: &Attributes| -> IndexMap<String, MetaInput> {
            metas
                .iter()
                .map(|(name, meta)| (name.clone(), MetaInput::from(meta)))
                .collect()
        };
        match self {
            Shape::Primitive => {}
            Shape::Array { item } => descriptor.array_of = Some(item.into()),
            Shape::Object { attributes } => descriptor.attributes = Some(as_inputs(attributes)),
            Shape::Function { arguments, result } => {
                descriptor.function = Some(true);
                descriptor.arguments = Some(arguments.iter().map(MetaInput::from).collect());
                descriptor.result = Some(result.into());
            }
            Shape::Promise { result } => descriptor.result = Some(result.into()),
            Shape::Union { types } => {
                descriptor.types = Some(types.iter().map(MetaInput::from).collect())
            }
            Shape::Variant {
                variants,
                invariant,
            } => {
                descriptor.variants = Some(as_inputs(variants));
                descriptor.invariant = Some(invariant.clone());
            }
        }
    }
}

impl Meta {
    fn composite(kind: Kind, shape: Shape) -> Meta {
        Meta::assemble(kind, Base::default(), shape, None)
    }

    fn mismatch(&self, expected: Kind) -> MetaError {
        MetaError::KindMismatch {
            expected,
            actual: self.kind(),
        }
    }

    // --- Constructors ---

    pub fn array_of(item: impl Into<MetaInput>) -> Result<Meta> {
        let item = materialize(item.into(), false)?;
        Ok(Meta::composite(Kind::Array, Shape::Array { item }))
    }

    pub fn object<I, N, M>(attributes: I) -> Result<Meta>
    where
        I: IntoIterator<Item = (N, M)>,
        N: Into<String>,
        M: Into<MetaInput>,
    {
        let attributes = attributes
            .into_iter()
            .map(|(name, input)| Ok((name.into(), materialize(input.into(), false)?)))
            .collect::<Result<Attributes>>()?;
        Ok(Meta::composite(Kind::Object, Shape::Object { attributes }))
    }

    pub fn function<I, M>(arguments: I, result: impl Into<MetaInput>) -> Result<Meta>
    where
        I: IntoIterator<Item = M>,
        M: Into<MetaInput>,
    {
        let arguments = materialize_all(arguments.into_iter().map(Into::into).collect(), false)?;
        let result = materialize(result.into(), false)?;
        Ok(Meta::composite(
            Kind::Function,
            Shape::Function { arguments, result },
        ))
    }

    pub fn promise(result: impl Into<MetaInput>) -> Result<Meta> {
        let result = materialize(result.into(), false)?;
        Ok(Meta::composite(Kind::Promise, Shape::Promise { result }))
    }

    pub fn union<I, M>(types: I) -> Result<Meta>
    where
        I: IntoIterator<Item = M>,
        M: Into<MetaInput>,
    {
        let types = materialize_all(types.into_iter().map(Into::into).collect(), false)?;
        Ok(Meta::composite(Kind::Union, Shape::Union { types }))
    }

    pub fn variant<I, N, M>(invariant: impl Into<String>, variants: I) -> Result<Meta>
    where
        I: IntoIterator<Item = (N, M)>,
        N: Into<String>,
        M: Into<MetaInput>,
    {
        Meta::variant_like(Kind::Variant, invariant.into(), variants)
    }

    /// A resource: variant-shaped, and `is(Kind::Variant)` holds.
    pub fn resource<I, N, M>(invariant: impl Into<String>, variants: I) -> Result<Meta>
    where
        I: IntoIterator<Item = (N, M)>,
        N: Into<String>,
        M: Into<MetaInput>,
    {
        Meta::variant_like(Kind::Resource, invariant.into(), variants)
    }

    fn variant_like<I, N, M>(kind: Kind, invariant: String, variants: I) -> Result<Meta>
    where
        I: IntoIterator<Item = (N, M)>,
        N: Into<String>,
        M: Into<MetaInput>,
    {
        let variants = variants
            .into_iter()
            .map(|(tag, input)| Ok((tag.into(), materialize(input.into(), false)?)))
            .collect::<Result<Variants>>()?;
        check_variants(&variants)?;
        Ok(Meta::composite(
            kind,
            Shape::Variant {
                variants,
                invariant,
            },
        ))
    }

    // --- Accessors ---

    /// Array item meta.
    pub fn item_meta(&self) -> Option<&Meta> {
        match self.shape() {
            Shape::Array { item } => Some(item),
            _ => None,
        }
    }

    /// Object attributes.
    pub fn attributes(&self) -> Option<&Attributes> {
        match self.shape() {
            Shape::Object { attributes } => Some(attributes),
            _ => None,
        }
    }

    /// Function arguments, in order.
    pub fn arguments(&self) -> Option<&[Meta]> {
        match self.shape() {
            Shape::Function { arguments, .. } => Some(arguments),
            _ => None,
        }
    }

    /// Result meta of a function or promise.
    pub fn result_meta(&self) -> Option<&Meta> {
        match self.shape() {
            Shape::Function { result, .. } | Shape::Promise { result } => Some(result),
            _ => None,
        }
    }

    /// Union alternatives, in order.
    pub fn types(&self) -> Option<&[Meta]> {
        match self.shape() {
            Shape::Union { types } => Some(types),
            _ => None,
        }
    }

    /// Variant map of a variant or resource.
    pub fn variants(&self) -> Option<&Variants> {
        match self.shape() {
            Shape::Variant { variants, .. } => Some(variants),
            _ => None,
        }
    }

    /// Discriminant attribute name of a variant or resource.
    pub fn invariant(&self) -> Option<&str> {
        match self.shape() {
            Shape::Variant { invariant, .. } => Some(invariant),
            _ => None,
        }
    }

    // --- `of` builders ---

    /// Array with the item replaced.
    pub fn of_item(&self, item: impl Into<MetaInput>) -> Result<Meta> {
        if !matches!(self.shape(), Shape::Array { .. }) {
            return Err(self.mismatch(Kind::Array));
        }
        let item = materialize(item.into(), false)?;
        Ok(self.rebuild(self.base().clone(), Shape::Array { item }))
    }

    /// Union with the whole list of alternatives replaced.
    pub fn of_types<I, M>(&self, types: I) -> Result<Meta>
    where
        I: IntoIterator<Item = M>,
        M: Into<MetaInput>,
    {
        if !matches!(self.shape(), Shape::Union { .. }) {
            return Err(self.mismatch(Kind::Union));
        }
        let types = materialize_all(types.into_iter().map(Into::into).collect(), false)?;
        Ok(self.rebuild(self.base().clone(), Shape::Union { types }))
    }

    /// Variant with `partial` merged in: new tags appended, existing tags
    /// overwritten in place.
    pub fn of_variants<I, N, M>(&self, partial: I) -> Result<Meta>
    where
        I: IntoIterator<Item = (N, M)>,
        N: Into<String>,
        M: Into<MetaInput>,
    {
        let Shape::Variant {
            variants,
            invariant,
        } = self.shape()
        else {
            return Err(self.mismatch(Kind::Variant));
        };
        let mut merged = variants.clone();
        for (tag, input) in partial {
            let tag = tag.into();
            let meta = materialize(input.into(), false)?;
            if !meta.is(Kind::Object) {
                return Err(MetaError::VariantNotObject {
                    tag,
                    kind: meta.kind(),
                });
            }
            merged.insert(tag, meta);
        }
        Ok(self.rebuild(
            self.base().clone(),
            Shape::Variant {
                variants: merged,
                invariant: invariant.clone(),
            },
        ))
    }

    /// Object with its attribute map replaced.
    pub fn with_attributes(&self, attributes: Attributes) -> Result<Meta> {
        if !matches!(self.shape(), Shape::Object { .. }) {
            return Err(self.mismatch(Kind::Object));
        }
        Ok(self.rebuild(self.base().clone(), Shape::Object { attributes }))
    }
}
