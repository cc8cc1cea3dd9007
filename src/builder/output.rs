//! Output naming and directive tagging.
//!
//! Code splitting and minification drop source-level directives, but the
//! runtime needs the directive verbatim at the top of an emitted chunk. Each
//! chunk is tagged once from the classification table and the bundler
//! prepends the banner the tags describe.

use std::collections::BTreeSet;

use crate::builder::bundler::{ChunkPlan, RenderedChunk};
use crate::builder::classifier::ClassificationTable;
use crate::core::boundary::Boundary;
use crate::util::hash::content_hash;

/// Directory for hashed chunks, relative to the pass output directory.
pub const ASSETS_DIR: &str = "assets";

/// Which directives a chunk must carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkTags {
    pub client: bool,
    pub server: bool,
}

impl ChunkTags {
    pub fn none() -> Self {
        ChunkTags::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.client && !self.server
    }

    /// The banner text; the client directive always precedes the server one.
    pub fn banner(&self) -> String {
        let mut banner = String::new();
        if self.client {
            banner.push_str(&Boundary::Client.banner());
        }
        if self.server {
            banner.push_str(&Boundary::Server.banner());
        }
        banner
    }
}

/// Naming and tagging policy for one pass.
#[derive(Debug, Clone)]
pub struct OutputMapper {
    /// Entry names that keep a stable file name.
    designated: BTreeSet<String>,
    extension: String,
}

impl OutputMapper {
    pub fn new(designated: impl IntoIterator<Item = String>, extension: impl Into<String>) -> Self {
        OutputMapper {
            designated: designated.into_iter().collect(),
            extension: extension.into(),
        }
    }

    /// Whether a chunk is the entry chunk of a designated entry.
    pub fn is_designated(&self, chunk: &RenderedChunk) -> bool {
        chunk.is_entry && self.designated.contains(&chunk.name)
    }

    /// File name for a chunk.
    ///
    /// Designated entries map to `<name>.<ext>`; every other chunk maps to
    /// `assets/<name>-<contenthash>.<ext>`.
    pub fn name_for(&self, chunk: &RenderedChunk, is_designated_entry: bool) -> String {
        let name = sanitize_chunk_name(&chunk.name);
        if is_designated_entry {
            format!("{}.{}", name, self.extension)
        } else {
            format!(
                "{}/{}-{}.{}",
                ASSETS_DIR,
                name,
                content_hash(&chunk.code),
                self.extension
            )
        }
    }

    /// Directive tags for a chunk, derived from its modules' classifications.
    pub fn tags_for(&self, chunk: &RenderedChunk, table: &ClassificationTable) -> ChunkTags {
        let mut tags = ChunkTags::none();
        for id in &chunk.module_ids {
            match table.directive_of(id) {
                Some(Boundary::Client) => tags.client = true,
                Some(Boundary::Server) => tags.server = true,
                None => {}
            }
        }
        tags
    }

    /// Name and tag a chunk in one step.
    pub fn plan(&self, chunk: &RenderedChunk, table: &ClassificationTable) -> ChunkPlan {
        let file_name = self.name_for(chunk, self.is_designated(chunk));
        let tags = self.tags_for(chunk, table);
        if !tags.is_empty() {
            tracing::debug!("adding `{}` banner to {}", tags.banner(), file_name);
        }
        ChunkPlan { file_name, tags }
    }
}

/// Replace characters that are awkward in file names.
fn sanitize_chunk_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "chunk".to_string()
    } else {
        sanitized
    }
}
