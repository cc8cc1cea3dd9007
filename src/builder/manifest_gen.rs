//! Manifest generation.
//!
//! Correlates the classification table with the chunks of one pass. Every
//! module carrying the manifest's directive must land in some chunk; a module
//! the bundler dropped would become a reference that silently fails to load
//! at runtime, so it fails the build instead.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

use crate::builder::classifier::ClassificationTable;
use crate::core::boundary::{module_key, Boundary, ReferenceId};
use crate::core::chunk::ChunkDescriptor;
use crate::core::manifest::{BoundaryReference, Manifest};
use crate::core::pass::PassKind;
use crate::errors::BuildError;

/// Output of [`ManifestGenerator::build`].
#[derive(Debug, Clone, Default)]
pub struct GeneratedManifest {
    pub manifest: Manifest,
    /// Module id each reference id was generated from.
    pub sources: BTreeMap<ReferenceId, String>,
    /// Modules that were resolved to a chunk, including export-less ones.
    pub resolved_modules: BTreeSet<String>,
    pub warnings: Vec<String>,
}

/// Builds the manifest of one boundary for one pass.
pub struct ManifestGenerator<'a> {
    pass: PassKind,
    boundary: Boundary,
    root: &'a Path,
}

impl<'a> ManifestGenerator<'a> {
    pub fn new(pass: PassKind, boundary: Boundary, root: &'a Path) -> Self {
        ManifestGenerator {
            pass,
            boundary,
            root,
        }
    }

    /// Build the manifest from the classification table and the emitted
    /// chunks.
    pub fn build(
        &self,
        table: &ClassificationTable,
        chunks: &[ChunkDescriptor],
    ) -> Result<GeneratedManifest, BuildError> {
        let graph = ChunkGraph::new(chunks);
        let mut out = GeneratedManifest::default();
        let mut load_orders: HashMap<usize, Vec<String>> = HashMap::new();

        for (module_id, classification) in table.modules_with(self.boundary) {
            let primary =
                graph
                    .primary_chunk(module_id)
                    .ok_or_else(|| BuildError::UnresolvedReference {
                        pass: self.pass,
                        module: module_id.to_string(),
                        boundary: self.boundary,
                    })?;

            let load_order = load_orders
                .entry(primary)
                .or_insert_with(|| graph.load_order(primary))
                .clone();

            out.resolved_modules.insert(module_id.to_string());

            let key = module_key(self.root, module_id);
            let exports: Vec<&str> = if classification.exports.is_empty() {
                let warning = format!(
                    "{} module `{}` has no exports; only a module-level reference was generated",
                    self.boundary, module_id
                );
                tracing::warn!("{}", warning);
                out.warnings.push(warning);
                vec![""]
            } else {
                classification.exports.iter().map(String::as_str).collect()
            };

            for export in exports {
                let id = ReferenceId::new(&key, export);
                tracing::debug!("{} -> {}", id, load_order.join(", "));
                out.sources.insert(id.clone(), module_id.to_string());
                out.manifest.insert(BoundaryReference {
                    id,
                    chunks: load_order.clone(),
                    name: export.to_string(),
                });
            }
        }

        Ok(out)
    }
}

/// Chunks of a pass with their static import edges.
struct ChunkGraph<'c> {
    chunks: Vec<&'c ChunkDescriptor>,
    graph: DiGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl<'c> ChunkGraph<'c> {
    fn new(chunks: &'c [ChunkDescriptor]) -> Self {
        let mut sorted: Vec<&ChunkDescriptor> = chunks.iter().collect();
        sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..sorted.len()).map(|i| graph.add_node(i)).collect();
        let by_name: HashMap<&str, usize> = sorted
            .iter()
            .enumerate()
            .map(|(i, c)| (c.file_name.as_str(), i))
            .collect();

        for (i, chunk) in sorted.iter().enumerate() {
            // Neighbours come back newest-first and the DFS stack reverses
            // them again, so imports are visited in declaration order
            for import in &chunk.imports {
                if let Some(&j) = by_name.get(import.as_str()) {
                    graph.add_edge(nodes[i], nodes[j], ());
                }
            }
        }

        ChunkGraph {
            chunks: sorted,
            graph,
            nodes,
        }
    }

    /// The chunk a consumer of `module_id` loads first.
    ///
    /// Prefers the entry chunk built for the module, then any entry chunk
    /// containing it, then the first containing chunk by file name.
    fn primary_chunk(&self, module_id: &str) -> Option<usize> {
        let containing: Vec<usize> = (0..self.chunks.len())
            .filter(|&i| self.chunks[i].contains(module_id))
            .collect();

        containing
            .iter()
            .copied()
            .find(|&i| self.chunks[i].is_facade_of(module_id))
            .or_else(|| containing.iter().copied().find(|&i| self.chunks[i].is_entry))
            .or_else(|| containing.first().copied())
    }

    /// `primary` followed by its transitive static imports, dependencies
    /// before the chunks that import them.
    fn load_order(&self, primary: usize) -> Vec<String> {
        let mut order = vec![self.chunks[primary].file_name.clone()];
        let mut dfs = DfsPostOrder::new(&self.graph, self.nodes[primary]);

        while let Some(node) = dfs.next(&self.graph) {
            let index = self.graph[node];
            if index != primary {
                order.push(self.chunks[index].file_name.clone());
            }
        }

        order
    }
}
