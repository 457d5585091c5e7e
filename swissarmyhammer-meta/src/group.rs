//! Attribute grouping: tag a set of attributes with a shared category.

use crate::error::Result;
use crate::meta::Meta;
use crate::shape::Attributes;

/// Return a new attribute map with the same keys, each meta re-tagged with
/// `label` as its category.
///
/// Only the category changes. Editor bindings are carried over as-is,
/// including converters that have not been loaded yet.
pub fn group(label: &str, attributes: &Attributes) -> Attributes {
    attributes
        .iter()
        .map(|(name, meta)| (name.clone(), meta.with_category(label)))
        .collect()
}

impl Meta {
    /// Object meta whose attributes are all grouped under `label`.
    pub fn grouped(&self, label: &str) -> Result<Meta> {
        let attributes = self.attributes().map(|a| group(label, a)).unwrap_or_default();
        self.with_attributes(attributes)
    }
}
