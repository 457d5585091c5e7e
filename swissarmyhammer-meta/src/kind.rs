//! The closed set of meta kinds and the "kind implies kind" relation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant selecting which composite shape a meta carries.
///
/// Fixed at construction; every derived meta keeps the kind of its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    #[default]
    Primitive,
    Array,
    Object,
    Function,
    Promise,
    Union,
    Variant,
    /// A variant with resource semantics. Shares the variant shape.
    Resource,
}

/// `(specialized, general)` pairs. Membership is reflexive plus this table.
const SPECIALIZES: &[(Kind, Kind)] = &[(Kind::Resource, Kind::Variant)];

impl Kind {
    pub const ALL: [Kind; 8] = [
        Kind::Primitive,
        Kind::Array,
        Kind::Object,
        Kind::Function,
        Kind::Promise,
        Kind::Union,
        Kind::Variant,
        Kind::Resource,
    ];

    /// Lowercase name, as used in descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Primitive => "primitive",
            Kind::Array => "array",
            Kind::Object => "object",
            Kind::Function => "function",
            Kind::Promise => "promise",
            Kind::Union => "union",
            Kind::Variant => "variant",
            Kind::Resource => "resource",
        }
    }

    /// True when `self` is `other` or is declared a specialization of it.
    pub fn implies(self, other: Kind) -> bool {
        self == other
            || SPECIALIZES
                .iter()
                .any(|&(special, general)| special == self && general == other)
    }

    /// Whether a default value is meaningful for this kind.
    pub fn accepts_default(self) -> bool {
        !matches!(self, Kind::Function | Kind::Promise)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
