//! Reference manifests.
//!
//! A manifest maps a boundary reference id to the chunks that must be loaded
//! and the export to read from them. The on-disk shape is a flat JSON object:
//!
//! ```json
//! {
//!   "src/Button.tsx#default": {
//!     "id": "src/Button.tsx#default",
//!     "chunks": ["assets/Button-1a2b3c4d.mjs"],
//!     "name": "default"
//!   }
//! }
//! ```
//!
//! Field names and `chunks` order are part of the runtime contract. Unknown
//! fields are ignored when reading so newer writers stay loadable.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::boundary::ReferenceId;
use crate::util::fs::{read_to_string, write_atomic};

/// Where one exported binding of a boundary module lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryReference {
    pub id: ReferenceId,
    /// Chunk files to load, in load order. Never empty.
    pub chunks: Vec<String>,
    /// Export name, empty for the module-level reference of an export-less
    /// module.
    pub name: String,
}

/// Mapping from reference id to [`BoundaryReference`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    references: BTreeMap<ReferenceId, BoundaryReference>,
}

impl Manifest {
    /// Version of the manifest layout, recorded in `build-info.json`.
    pub const SCHEMA_VERSION: u32 = 1;

    /// Create an empty manifest.
    pub fn new() -> Self {
        Manifest {
            references: BTreeMap::new(),
        }
    }

    /// Insert a reference, returning the one it replaced.
    pub fn insert(&mut self, reference: BoundaryReference) -> Option<BoundaryReference> {
        self.references.insert(reference.id.clone(), reference)
    }

    /// Resolve an id to its reference.
    pub fn resolve(&self, id: &str) -> Option<&BoundaryReference> {
        self.references.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.references.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundaryReference> + '_ {
        self.references.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ReferenceId> + '_ {
        self.references.keys()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize manifest")
    }

    /// Parse from JSON, checking that every key matches its entry's id.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json).context("failed to parse manifest")?;

        for (key, reference) in &manifest.references {
            if key != &reference.id {
                bail!(
                    "manifest key `{}` does not match its entry id `{}`",
                    key,
                    reference.id
                );
            }
            if reference.chunks.is_empty() {
                bail!("manifest entry `{}` lists no chunks", key);
            }
        }

        Ok(manifest)
    }

    /// Load a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_to_string(path)?;
        Self::from_json(&content).with_context(|| format!("invalid manifest: {}", path.display()))
    }

    /// Write a manifest file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = self.to_json()?;
        content.push('\n');
        write_atomic(path, &content)
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a BoundaryReference;
    type IntoIter = std::collections::btree_map::Values<'a, ReferenceId, BoundaryReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.references.values()
    }
}
