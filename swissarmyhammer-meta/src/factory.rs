//! Kind dispatch: turning descriptors (or anything claiming to be one) into metas.

use serde_json::Value;
use tracing::trace;

use crate::descriptor::{Descriptor, MetaInput};
use crate::error::{MetaError, Result};
use crate::kind::Kind;
use crate::meta::{Base, Meta};
use crate::shape::Shape;

/// Single entry point: materialize a descriptor, pass a meta through.
///
/// ```rust
/// use swissarmyhammer_meta::{meta, Descriptor, Kind};
///
/// let list = meta(Descriptor::default().array_of(Kind::Primitive)).unwrap();
/// assert_eq!(list.kind(), Kind::Array);
/// assert!(swissarmyhammer_meta::Meta::ptr_eq(&meta(&list).unwrap(), &list));
/// ```
pub fn meta(input: impl Into<MetaInput>) -> Result<Meta> {
    materialize(input.into(), false)
}

/// Materialize an untyped value. Only JSON objects are descriptors; any
/// other literal is rejected with [`MetaError::InvalidDescriptor`].
pub fn meta_from_value(value: &Value) -> Result<Meta> {
    match value {
        Value::Object(_) => {
            let descriptor: Descriptor = serde_json::from_value(value.clone())
                .map_err(|err| MetaError::invalid(value, err.to_string()))?;
            build(descriptor, false)
        }
        other => Err(MetaError::invalid(other, "expected a descriptor object")),
    }
}

/// Classify a descriptor.
///
/// Structural fields win over the `kind` field: `arrayOf`, then
/// `attributes`, then the function marker (`function: true` or
/// `arguments`), then `result`. After that the explicit `kind` decides, then
/// `types` or `variants`, and finally primitive.
pub fn dispatch_kind(descriptor: &Descriptor) -> Kind {
    if descriptor.array_of.is_some() {
        Kind::Array
    } else if descriptor.attributes.is_some() {
        Kind::Object
    } else if descriptor.function == Some(true) || descriptor.arguments.is_some() {
        Kind::Function
    } else if descriptor.result.is_some() {
        Kind::Promise
    } else if let Some(kind) = descriptor.kind {
        kind
    } else if descriptor.types.is_some() {
        Kind::Union
    } else if descriptor.variants.is_some() {
        Kind::Variant
    } else {
        Kind::Primitive
    }
}

pub(crate) fn materialize(input: MetaInput, restore: bool) -> Result<Meta> {
    match input {
        MetaInput::Meta(meta) => Ok(meta),
        MetaInput::Descriptor(descriptor) => build(*descriptor, restore),
    }
}

pub(crate) fn build(descriptor: Descriptor, restore: bool) -> Result<Meta> {
    let kind = dispatch_kind(&descriptor);
    build_kind(kind, descriptor, restore)
}

/// Build a meta of a known kind. With `restore`, an `id` flagged
/// `idFixed: true` is pinned; otherwise literal ids are dropped.
pub(crate) fn build_kind(kind: Kind, mut descriptor: Descriptor, restore: bool) -> Result<Meta> {
    let pinned = match (restore, descriptor.id_fixed) {
        (true, Some(true)) => descriptor.id.take(),
        _ => None,
    };
    let base = Base::from_descriptor(&mut descriptor);
    let shape = Shape::from_descriptor(kind, &mut descriptor, restore)?;
    let meta = Meta::assemble(kind, base, shape, pinned);
    trace!(kind = %meta.kind(), id = %meta.id(), "materialized meta");
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_object_is_default_primitive() {
        let meta = meta_from_value(&json!({})).unwrap();
        assert_eq!(meta, Meta::default());
    }

    #[test]
    fn passthrough_is_identity() {
        let original = Meta::default().with_description("x");
        let same = meta(&original).unwrap();
        assert!(Meta::ptr_eq(&same, &original));
    }

    #[test]
    fn rejects_non_object_literals() {
        for value in [json!(1), json!([]), json!(null), json!(true), json!("x")] {
            match meta_from_value(&value) {
                Err(MetaError::InvalidDescriptor { value: named, .. }) => {
                    assert_eq!(named, value.to_string());
                }
                other => panic!("expected InvalidDescriptor for {value}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = meta_from_value(&json!({"kind": "widget"})).unwrap_err();
        assert!(matches!(err, MetaError::InvalidDescriptor { .. }));
        assert!(err.to_string().contains("widget"));
    }

    #[test]
    fn structural_fields_select_kind() {
        let cases = [
            (json!({"arrayOf": {}}), Kind::Array),
            (json!({"attributes": {}}), Kind::Object),
            (json!({"function": true, "result": {}}), Kind::Function),
            (json!({"arguments": [{}]}), Kind::Function),
            (json!({"result": {}}), Kind::Promise),
            (json!({"types": [{}, {}]}), Kind::Union),
            (json!({"variants": {}}), Kind::Variant),
            (json!({"kind": "resource"}), Kind::Resource),
            (json!({"kind": "union", "arrayOf": {}}), Kind::Array),
            (json!({"description": "plain"}), Kind::Primitive),
        ];
        for (value, expected) in cases {
            assert_eq!(meta_from_value(&value).unwrap().kind(), expected, "{value}");
        }
    }

    #[test]
    fn explicit_kind_without_fields_uses_defaults() {
        let array = meta_from_value(&json!({"kind": "array"})).unwrap();
        assert_eq!(array.item_meta().unwrap(), &Meta::default());
        let variant = meta_from_value(&json!({"kind": "variant"})).unwrap();
        assert_eq!(variant.invariant(), Some("type"));
        assert!(variant.variants().unwrap().is_empty());
    }

    #[test]
    fn nested_descriptors_are_materialized() {
        let meta = meta_from_value(&json!({
            "attributes": {
                "tags": {"arrayOf": {"description": "tag"}},
                "owner": {"kind": "primitive", "optional": true}
            }
        }))
        .unwrap();
        let attributes = meta.attributes().unwrap();
        assert_eq!(attributes["tags"].kind(), Kind::Array);
        assert_eq!(
            attributes["tags"].item_meta().unwrap().description(),
            Some("tag")
        );
        assert!(attributes["owner"].is_optional());
    }

    #[test]
    fn restore_pins_flagged_ids_only() {
        let descriptor: Descriptor = serde_json::from_value(json!({
            "kind": "primitive",
            "id": "pinned",
            "idFixed": true
        }))
        .unwrap();
        let restored = Meta::restore(descriptor.clone()).unwrap();
        assert_eq!(restored.id(), "pinned");
        assert!(restored.is_id_fixed());

        let plain = Meta::from_descriptor(descriptor).unwrap();
        assert_ne!(plain.id(), "pinned");
        assert!(!plain.is_id_fixed());
    }

    #[test]
    fn yaml_and_json_entry_points() {
        let from_yaml = Meta::from_yaml("arrayOf:\n  description: n\n").unwrap();
        let from_json = Meta::from_json(r#"{"arrayOf": {"description": "n"}}"#).unwrap();
        assert_eq!(from_yaml, from_json);
        assert!(Meta::from_yaml("- 1\n- 2\n").is_err());
    }
}
