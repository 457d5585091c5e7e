//! MetaCatalog: a directory of named descriptors.
//!
//! Each named meta is stored as one YAML descriptor under `definitions/`.
//! Pinned ids are written with `idFixed: true` and re-pinned on load, so a
//! meta survives the round-trip through disk with its identity intact.
//! Editor bindings persist as their handle only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use ulid::Ulid;

use crate::descriptor::Descriptor;
use crate::error::{MetaError, Result};
use crate::meta::Meta;

/// Default metas to seed into a catalog.
///
/// Passed to `MetaCatalogBuilder::with_defaults()`. On open, defaults whose
/// name is not on disk yet are written; existing files are left alone.
pub struct CatalogDefaults {
    metas: Vec<(String, Meta)>,
}

impl CatalogDefaults {
    /// Empty set of defaults.
    pub fn new() -> Self {
        Self { metas: Vec::new() }
    }

    /// Add a default named meta.
    pub fn meta(mut self, name: impl Into<String>, meta: Meta) -> Self {
        self.metas.push((name.into(), meta));
        self
    }

    /// Access the default named metas.
    pub fn metas(&self) -> &[(String, Meta)] {
        &self.metas
    }
}

impl Default for CatalogDefaults {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `MetaCatalog`. Created by `MetaCatalog::open()`.
pub struct MetaCatalogBuilder {
    root: PathBuf,
    defaults: Option<CatalogDefaults>,
}

impl MetaCatalogBuilder {
    /// Provide default metas, seeded on open without overwriting.
    pub fn with_defaults(mut self, defaults: CatalogDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Create directories, seed defaults, load from disk.
    pub async fn build(self) -> Result<MetaCatalog> {
        let root = self.root;
        fs::create_dir_all(root.join("definitions")).await?;

        if let Some(defaults) = self.defaults {
            seed_defaults(&root, &defaults).await?;
        }

        let mut catalog = MetaCatalog {
            root,
            metas: Vec::new(),
            name_index: HashMap::new(),
            id_index: HashMap::new(),
        };
        catalog.load_definitions().await?;

        debug!(metas = catalog.metas.len(), "meta catalog opened");
        Ok(catalog)
    }
}

async fn seed_defaults(root: &Path, defaults: &CatalogDefaults) -> Result<()> {
    for (name, meta) in &defaults.metas {
        let path = definition_path(root, name)?;
        if !path.exists() {
            let yaml = serde_yaml::to_string(meta)?;
            atomic_write(&path, yaml.as_bytes()).await?;
            debug!(%name, id = %meta.id(), "seeded default meta");
        }
    }
    Ok(())
}

/// Path of the YAML file for `name`. Names must be a single plain segment.
fn definition_path(root: &Path, name: &str) -> Result<PathBuf> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    if !plain {
        return Err(MetaError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(root.join("definitions").join(format!("{name}.yaml")))
}

/// A meta together with its catalog name.
#[derive(Debug, Clone)]
pub struct NamedMeta {
    pub name: String,
    pub meta: Meta,
}

/// Catalog of named metas backed by a directory:
/// ```text
/// <root>/
///   definitions/    ← one .yaml descriptor per named meta
/// ```
pub struct MetaCatalog {
    root: PathBuf,
    metas: Vec<NamedMeta>,
    name_index: HashMap<String, usize>,
    id_index: HashMap<String, usize>,
}

impl MetaCatalog {
    /// Open or create a catalog directory.
    ///
    /// ```rust,ignore
    /// let catalog = MetaCatalog::open(path)
    ///     .with_defaults(my_defaults())
    ///     .build()
    ///     .await?;
    /// ```
    pub fn open(root: impl Into<PathBuf>) -> MetaCatalogBuilder {
        MetaCatalogBuilder {
            root: root.into(),
            defaults: None,
        }
    }

    /// Get a meta by name.
    pub fn get(&self, name: &str) -> Option<&Meta> {
        self.name_index.get(name).map(|&i| &self.metas[i].meta)
    }

    /// Look up by meta id. When several entries share an id the last loaded wins.
    pub fn get_by_id(&self, id: &str) -> Option<&NamedMeta> {
        self.id_index.get(id).map(|&i| &self.metas[i])
    }

    /// All named metas, in load order.
    pub fn all(&self) -> &[NamedMeta] {
        &self.metas
    }

    /// Names of all metas, in load order.
    pub fn names(&self) -> Vec<&str> {
        self.metas.iter().map(|m| m.name.as_str()).collect()
    }

    /// Create or replace a named meta. Persists immediately.
    pub async fn write(&mut self, name: &str, meta: &Meta) -> Result<()> {
        let yaml = serde_yaml::to_string(meta)?;
        let path = definition_path(&self.root, name)?;
        atomic_write(&path, yaml.as_bytes()).await?;

        match self.name_index.get(name) {
            Some(&idx) => self.metas[idx].meta = meta.clone(),
            None => self.metas.push(NamedMeta {
                name: name.to_string(),
                meta: meta.clone(),
            }),
        }
        self.reindex();
        Ok(())
    }

    /// Delete a named meta and its file. The in-memory entry is only removed
    /// once the file is gone.
    pub async fn delete(&mut self, name: &str) -> Result<()> {
        let path = definition_path(&self.root, name)?;
        let idx = self
            .name_index
            .get(name)
            .copied()
            .ok_or_else(|| MetaError::MetaNotFound {
                name: name.to_string(),
            })?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.metas.remove(idx);
        self.reindex();
        Ok(())
    }

    /// Root directory of the catalog.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn reindex(&mut self) {
        self.name_index.clear();
        self.id_index.clear();
        for (idx, named) in self.metas.iter().enumerate() {
            self.name_index.insert(named.name.clone(), idx);
            self.id_index.insert(named.meta.id().to_string(), idx);
        }
    }

    async fn load_definitions(&mut self) -> Result<()> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(self.root.join("definitions")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path).await?;
            let parsed = serde_yaml::from_str::<Descriptor>(&content)
                .map_err(MetaError::from)
                .and_then(Meta::restore);
            match parsed {
                Ok(meta) => self.metas.push(NamedMeta {
                    name: name.to_string(),
                    meta,
                }),
                Err(e) => {
                    tracing::warn!(?path, %e, "skipping invalid meta definition");
                }
            }
        }
        self.reindex();
        Ok(())
    }
}

/// Write to a temp file then rename for atomic persistence.
async fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent dir"))?;
    let tmp = dir.join(format!(".tmp_{}", Ulid::new()));
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
