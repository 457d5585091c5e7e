//! Editor binding: an opaque editor handle plus its lazily loaded converter.
//!
//! Resolving the handle into presentable UI is up to the consumer; this crate
//! only carries the handle, the property table (on the meta) and the converter.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{warn, Instrument};

use crate::converter::{ConverterFunc, ConverterLoader, ConverterState};
use crate::error::{MetaError, Result};

/// Reference to an editor.
///
/// Clones share one [`ConverterState`], so a meta derived from another (a
/// wither, a grouping) keeps the same, possibly still unresolved, converter.
#[derive(Clone)]
pub struct EditorRef {
    handle: String,
    converter: Arc<ConverterState>,
}

impl EditorRef {
    /// An editor without a converter.
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            converter: Arc::new(ConverterState::new()),
        }
    }

    /// An editor whose converter is fetched on first use.
    pub fn with_loader(handle: impl Into<String>, loader: impl ConverterLoader + 'static) -> Self {
        Self {
            handle: handle.into(),
            converter: Arc::new(ConverterState::with_loader(loader)),
        }
    }

    /// An editor bound to an explicit converter state.
    pub fn with_converter(handle: impl Into<String>, converter: Arc<ConverterState>) -> Self {
        Self {
            handle: handle.into(),
            converter,
        }
    }

    /// Opaque editor handle.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Shared converter state.
    pub fn converter(&self) -> &Arc<ConverterState> {
        &self.converter
    }

    /// Load the converter (once) for this editor.
    pub async fn load(&self, value: Option<Value>) -> Result<ConverterFunc> {
        self.converter
            .load(value)
            .instrument(tracing::debug_span!("editor", handle = %self.handle))
            .await
    }

    /// Run `value` through the editor's converter.
    ///
    /// With no converter the value passes through unchanged. A broken
    /// converter also passes the value through, with a warning.
    pub async fn convert(&self, value: Value) -> Result<Value> {
        match self.load(Some(value.clone())).await? {
            ConverterFunc::Ready(f) => f(value).map_err(|err| MetaError::ConversionFailed {
                handle: self.handle.clone(),
                message: err.to_string(),
            }),
            ConverterFunc::Broken => {
                warn!(handle = %self.handle, "editor converter is broken, passing value through");
                Ok(value)
            }
            ConverterFunc::Absent => Ok(value),
        }
    }
}

impl PartialEq for EditorRef {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && Arc::ptr_eq(&self.converter, &other.converter)
    }
}

impl fmt::Debug for EditorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorRef")
            .field("handle", &self.handle)
            .field("converter", &self.converter)
            .finish()
    }
}

impl From<&str> for EditorRef {
    fn from(handle: &str) -> Self {
        EditorRef::new(handle)
    }
}

impl From<String> for EditorRef {
    fn from(handle: String) -> Self {
        EditorRef::new(handle)
    }
}

impl Serialize for EditorRef {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.handle)
    }
}

impl<'de> Deserialize<'de> for EditorRef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let handle = String::deserialize(deserializer)?;
        Ok(EditorRef::new(handle))
    }
}
