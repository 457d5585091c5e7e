//! Structural type descriptors with presentation metadata
//!
//! `swissarmyhammer-meta` describes data shapes at runtime: primitives, arrays,
//! objects, functions, promises, unions and discriminated variants, each
//! carrying presentation metadata (editor binding, default value, category)
//! and a content-addressed identity.
//!
//! # Architecture
//!
//! - **Immutable**: every builder returns a new `Meta`; nested metas are shared
//! - **Content-addressed**: ids are derived from structure unless pinned with `with_id`
//! - **Closed kinds**: a kind tag plus a small "kind implies kind" table, no subtyping
//! - **Lazy converters**: editor converters load once, on first use, single-flight
//! - **YAML on disk**: `MetaCatalog` keeps named descriptors, one file each

pub mod catalog;
pub mod converter;
pub mod descriptor;
pub mod editor;
pub mod error;
pub mod factory;
pub mod group;
mod identity;
pub mod kind;
pub mod meta;
pub mod shape;

pub use catalog::{CatalogDefaults, MetaCatalog, MetaCatalogBuilder, NamedMeta};
pub use converter::{ConvertFn, ConverterFunc, ConverterLoader, ConverterState, Export, Loaded};
pub use descriptor::{Descriptor, MetaInput};
pub use editor::EditorRef;
pub use error::{MetaError, Result};
pub use factory::{dispatch_kind, meta, meta_from_value};
pub use group::group;
pub use kind::Kind;
pub use meta::Meta;
pub use shape::{Attributes, Variants, DEFAULT_INVARIANT};
