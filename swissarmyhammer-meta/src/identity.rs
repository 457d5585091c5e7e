//! Derived identity: a deterministic fingerprint of a meta's structure.
//!
//! The fingerprint is a canonical JSON document (object keys sorted at every
//! level) hashed with SHA-256. Nested metas contribute their id, never their
//! address, so two independently built but structurally equal chains agree.
//! The default value contributes only its presence.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::kind::Kind;
use crate::meta::{Base, Meta};
use crate::shape::{Attributes, Shape};

/// Hex characters kept from the digest.
const ID_LEN: usize = 32;

/// Compute the derived id for the given structural content.
pub(crate) fn derive_id(kind: Kind, base: &Base, shape: &Shape) -> String {
    let fingerprint = fingerprint(kind, base, shape);
    let mut encoded = String::new();
    write_canonical(&fingerprint, &mut encoded);
    let digest = Sha256::digest(encoded.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(ID_LEN);
    hex
}

fn fingerprint(kind: Kind, base: &Base, shape: &Shape) -> Value {
    json!({
        "kind": kind.as_str(),
        "description": base.description,
        "optional": base.optional,
        "category": base.category,
        "editor": base.editor.as_ref().map(|e| e.handle()),
        "editorProps": base.editor_props,
        "hasDefault": base.default_value.is_some(),
        "shape": shape_fingerprint(shape),
    })
}

fn shape_fingerprint(shape: &Shape) -> Value {
    let ids = |metas: &[Meta]| -> Value {
        Value::Array(metas.iter().map(|m| Value::from(m.id())).collect())
    };
    let id_map = |metas: &Attributes| -> Value {
        let map: Map<String, Value> = metas
            .iter()
            .map(|(name, m)| (name.clone(), Value::from(m.id())))
            .collect();
        Value::Object(map)
    };
    match shape {
        Shape::Primitive => Value::Null,
        Shape::Array { item } => json!({ "item": item.id() }),
        Shape::Object { attributes } => json!({ "attributes": id_map(attributes) }),
        Shape::Function { arguments, result } => {
            json!({ "arguments": ids(arguments.as_slice()), "result": result.id() })
        }
        Shape::Promise { result } => json!({ "result": result.id() }),
        Shape::Union { types } => json!({ "types": ids(types.as_slice()) }),
        Shape::Variant {
            variants,
            invariant,
        } => json!({ "variants": id_map(variants), "invariant": invariant }),
    }
}

/// Serialize `value` as JSON with object keys sorted, independent of how the
/// map type orders its entries.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
