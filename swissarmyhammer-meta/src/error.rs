//! Error types for the meta descriptor system

use thiserror::Error;

use crate::kind::Kind;

/// Result type for meta operations
pub type Result<T> = std::result::Result<T, MetaError>;

/// Errors that can occur while building, dispatching or loading metas
#[derive(Debug, Error)]
pub enum MetaError {
    /// The factory was handed something that is not a structural descriptor
    #[error("invalid descriptor {value}: {reason}")]
    InvalidDescriptor { value: String, reason: String },

    /// A kind-specific builder was called on a meta of another kind
    #[error("expected {expected} meta, found {actual}")]
    KindMismatch { expected: Kind, actual: Kind },

    /// A variant entry must be an object meta
    #[error("variant '{tag}' must be an object meta, found {kind}")]
    VariantNotObject { tag: String, kind: Kind },

    /// A converter loader resolved to something that is not callable
    #[error("converter loader resolved to {found}, expected a function or a module with a default export")]
    ConverterFormat { found: String },

    /// A resolved converter rejected a value
    #[error("converter for editor '{handle}' failed: {message}")]
    ConversionFailed { handle: String, message: String },

    /// Named meta not present in the catalog
    #[error("meta not found: {name}")]
    MetaNotFound { name: String },

    /// Catalog name that cannot be used as a file name
    #[error("invalid meta name '{name}': names must be a single path segment")]
    InvalidName { name: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MetaError {
    /// Build an `InvalidDescriptor` naming the offending JSON value.
    pub(crate) fn invalid(value: &serde_json::Value, reason: impl Into<String>) -> Self {
        MetaError::InvalidDescriptor {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_descriptor_names_value() {
        let err = MetaError::invalid(&json!([1, 2]), "expected a descriptor object");
        assert_eq!(
            err.to_string(),
            "invalid descriptor [1,2]: expected a descriptor object"
        );
    }

    #[test]
    fn test_kind_mismatch_display() {
        let err = MetaError::KindMismatch {
            expected: Kind::Array,
            actual: Kind::Object,
        };
        assert_eq!(err.to_string(), "expected array meta, found object");
    }

    #[test]
    fn test_converter_format_display() {
        let err = MetaError::ConverterFormat {
            found: "42".into(),
        };
        assert!(err.to_string().contains("resolved to 42"));
    }
}
