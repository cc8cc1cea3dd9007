//! Chunks emitted by a bundler pass.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::manifest::Manifest;
use crate::core::pass::{ManifestKind, PassKind};

/// An emitted chunk as reported by the bundler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    /// Output file name relative to the pass output directory.
    pub file_name: String,

    /// Chunk name before naming policy was applied.
    #[serde(default)]
    pub name: String,

    /// Ids of the modules rendered into this chunk.
    pub module_ids: BTreeSet<String>,

    /// Whether this chunk is the output of an input entry.
    pub is_entry: bool,

    /// The module an entry chunk was built for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facade_module_id: Option<String>,

    /// File names of chunks this chunk statically imports, in import order.
    #[serde(default)]
    pub imports: Vec<String>,
}

impl ChunkDescriptor {
    /// Create a descriptor with no imports.
    pub fn new(
        file_name: impl Into<String>,
        module_ids: impl IntoIterator<Item = impl Into<String>>,
        is_entry: bool,
    ) -> Self {
        ChunkDescriptor {
            file_name: file_name.into(),
            name: String::new(),
            module_ids: module_ids.into_iter().map(Into::into).collect(),
            is_entry,
            facade_module_id: None,
            imports: Vec::new(),
        }
    }

    /// Set the facade module.
    pub fn with_facade(mut self, module_id: impl Into<String>) -> Self {
        self.facade_module_id = Some(module_id.into());
        self
    }

    /// Add a static import.
    pub fn with_import(mut self, file_name: impl Into<String>) -> Self {
        self.imports.push(file_name.into());
        self
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.module_ids.contains(module_id)
    }

    /// Whether this is the entry chunk built for `module_id`.
    pub fn is_facade_of(&self, module_id: &str) -> bool {
        self.is_entry && self.facade_module_id.as_deref() == Some(module_id)
    }
}

/// A manifest together with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassManifest {
    pub kind: ManifestKind,
    pub manifest: Manifest,
}

/// The validated result of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPassResult {
    pub pass: PassKind,
    pub out_dir: PathBuf,
    /// The input map the bundler was invoked with.
    pub input: Vec<(String, PathBuf)>,
    pub emitted_chunks: Vec<ChunkDescriptor>,
    pub manifest: Option<PassManifest>,
    pub warnings: Vec<String>,
}

impl BuildPassResult {
    /// Find an emitted chunk by file name.
    pub fn chunk(&self, file_name: &str) -> Option<&ChunkDescriptor> {
        self.emitted_chunks.iter().find(|c| c.file_name == file_name)
    }
}
