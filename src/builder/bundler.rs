//! The bundler seam.
//!
//! The bundler itself is an external collaborator. A pass hands it a
//! [`BundleRequest`] and a [`PassPlugin`]; the bundler reports every module it
//! parses to the plugin and asks the plugin how to name and tag every chunk it
//! renders.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::output::ChunkTags;
use crate::core::chunk::ChunkDescriptor;
use crate::core::pass::{BuildTarget, PassKind};

/// Which imports are left as runtime imports instead of being bundled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPolicy {
    /// Bundle every dependency except `node:` builtins.
    pub bundle_all_except_builtins: bool,

    /// Packages that always stay external.
    pub external: Vec<String>,
}

impl ExternalPolicy {
    /// Whether an import specifier is forced external by this policy.
    pub fn is_external(&self, specifier: &str) -> bool {
        let listed = self.external.iter().any(|pkg| {
            specifier == pkg
                || specifier
                    .strip_prefix(pkg.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });

        listed || (self.bundle_all_except_builtins && specifier.starts_with("node:"))
    }
}

/// Settings for one bundler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleRequest {
    pub pass: PassKind,
    /// Entry name to module path.
    pub input: BTreeMap<String, PathBuf>,
    pub target: BuildTarget,
    pub ssr: bool,
    pub externals: ExternalPolicy,
    /// Package export conditions used during resolution.
    pub conditions: Vec<String>,
    pub out_dir: PathBuf,
    pub minify: bool,
    /// Whether chunks are written to `out_dir`.
    pub write: bool,
    /// Clear `out_dir` before writing.
    pub empty_out_dir: bool,
}

/// A module as seen by the bundler's parse hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSource {
    pub id: String,
    pub code: String,
    /// Statically known export names.
    #[serde(default)]
    pub exports: Vec<String>,
}

/// A chunk that has been rendered but not yet named or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedChunk {
    pub name: String,
    pub module_ids: Vec<String>,
    pub is_entry: bool,
    #[serde(default)]
    pub facade_module_id: Option<String>,
    pub code: String,
}

/// How the bundler must emit a rendered chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub file_name: String,
    pub tags: ChunkTags,
}

impl ChunkPlan {
    /// Text the bundler prepends to the chunk.
    pub fn banner(&self) -> String {
        self.tags.banner()
    }
}

/// Hooks the core installs into a bundler pass.
pub trait PassPlugin {
    /// Called once for every module the bundler parses.
    fn module_parsed(&mut self, module: &ModuleSource) -> Result<()>;

    /// Called once for every chunk before it is written.
    fn plan_chunk(&mut self, chunk: &RenderedChunk) -> ChunkPlan;
}

/// What a bundler pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleOutput {
    pub chunks: Vec<ChunkDescriptor>,
}

/// The bundler returned something that cannot be interpreted as output.
///
/// Bundlers wrap this in their `anyhow::Error` so the driver can tell a
/// malformed result apart from a build failure.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct OutputShapeError(pub String);

/// A bundler engine.
pub trait Bundler {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Run one pass to completion.
    fn bundle(
        &mut self,
        request: &BundleRequest,
        plugin: &mut dyn PassPlugin,
    ) -> Result<BundleOutput>;
}

impl<B: Bundler + ?Sized> Bundler for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn bundle(
        &mut self,
        request: &BundleRequest,
        plugin: &mut dyn PassPlugin,
    ) -> Result<BundleOutput> {
        (**self).bundle(request, plugin)
    }
}
