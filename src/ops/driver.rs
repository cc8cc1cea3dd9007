//! The build driver.
//!
//! Runs the configured passes strictly in sequence. Each pass materializes
//! its input from the entry registry, invokes the bundler with a plugin that
//! classifies modules and names chunks, validates what came back and builds
//! the pass's manifest. Modules found to carry a directive become entries of
//! every later pass.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::builder::bundler::{
    BundleRequest, Bundler, ChunkPlan, ExternalPolicy, ModuleSource, OutputShapeError, PassPlugin,
    RenderedChunk,
};
use crate::builder::classifier::{ClassificationTable, DirectiveClassifier};
use crate::builder::events::BuildEvent;
use crate::builder::manifest_gen::ManifestGenerator;
use crate::builder::output::{ChunkTags, OutputMapper};
use crate::core::boundary::{Boundary, ReferenceId};
use crate::core::chunk::{BuildPassResult, ChunkDescriptor, PassManifest};
use crate::core::entry::{EntryCategory, EntryRegistry};
use crate::core::manifest::Manifest;
use crate::core::pass::{ManifestKind, PassKind};
use crate::errors::BuildError;
use crate::util::config::ProjectConfig;

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Pending,
    Running(PassKind),
    Completed,
    Failed {
        /// The pass that failed, `None` for pre-flight failures.
        pass: Option<PassKind>,
        cause: String,
    },
}

/// Everything a successful build produced.
#[derive(Debug, Clone)]
pub struct AggregatedOutput {
    /// Pass results in execution order.
    pub passes: Vec<BuildPassResult>,
    pub table: ClassificationTable,
    /// The registry after feed-forward, without per-pass framework entries.
    pub registry: EntryRegistry,
}

impl AggregatedOutput {
    pub fn pass(&self, kind: PassKind) -> Option<&BuildPassResult> {
        self.passes.iter().find(|p| p.pass == kind)
    }

    pub fn manifest(&self, kind: ManifestKind) -> Option<&Manifest> {
        self.manifests()
            .find(|m| m.kind == kind)
            .map(|m| &m.manifest)
    }

    pub fn manifests(&self) -> impl Iterator<Item = &PassManifest> + '_ {
        self.passes.iter().filter_map(|p| p.manifest.as_ref())
    }

    /// Warnings of every pass, in execution order.
    pub fn warnings(&self) -> impl Iterator<Item = (PassKind, &str)> + '_ {
        self.passes
            .iter()
            .flat_map(|p| p.warnings.iter().map(move |w| (p.pass, w.as_str())))
    }
}

/// Receives build events as they happen.
pub type Observer<'a> = Box<dyn FnMut(&BuildEvent) + 'a>;

/// Per-pass bookkeeping kept for the post-build checks.
struct PassRecord {
    pass: PassKind,
    boundary: Option<Boundary>,
    sources: BTreeMap<ReferenceId, String>,
    resolved: BTreeSet<String>,
}

/// The plugin installed into every pass.
struct BoundaryPlugin<'p> {
    classifier: DirectiveClassifier,
    table: &'p mut ClassificationTable,
    mapper: &'p OutputMapper,
    classify: bool,
}

impl PassPlugin for BoundaryPlugin<'_> {
    fn module_parsed(&mut self, module: &ModuleSource) -> anyhow::Result<()> {
        if self.classify {
            self.classifier.classify_into(module, self.table);
        }
        Ok(())
    }

    fn plan_chunk(&mut self, chunk: &RenderedChunk) -> ChunkPlan {
        if self.classify {
            self.mapper.plan(chunk, self.table)
        } else {
            ChunkPlan {
                file_name: self.mapper.name_for(chunk, self.mapper.is_designated(chunk)),
                tags: ChunkTags::none(),
            }
        }
    }
}

/// Runs one build invocation.
pub struct BuildDriver<'a> {
    config: &'a ProjectConfig,
    bundler: &'a mut dyn Bundler,
    boundary_split: bool,
    passes: Option<Vec<PassKind>>,
    state: DriverState,
    observer: Option<Observer<'a>>,
}

impl<'a> BuildDriver<'a> {
    pub fn new(config: &'a ProjectConfig, bundler: &'a mut dyn Bundler) -> Self {
        BuildDriver {
            config,
            bundler,
            boundary_split: config.build.boundary_split,
            passes: None,
            state: DriverState::Pending,
            observer: None,
        }
    }

    /// Override the configured boundary split setting.
    pub fn with_boundary_split(mut self, enabled: bool) -> Self {
        self.boundary_split = enabled;
        self
    }

    /// Run exactly these passes, in this order.
    pub fn with_passes(mut self, passes: Vec<PassKind>) -> Self {
        self.passes = Some(passes);
        self
    }

    pub fn with_observer(mut self, observer: impl FnMut(&BuildEvent) + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// The passes this driver will run.
    pub fn pass_order(&self) -> Vec<PassKind> {
        match &self.passes {
            Some(passes) => passes.clone(),
            None => self.config.pass_order(self.boundary_split),
        }
    }

    /// Run the build.
    pub fn run(&mut self) -> Result<AggregatedOutput, BuildError> {
        let result = self.execute();

        self.state = match &result {
            Ok(_) => DriverState::Completed,
            Err(err) => {
                let running = match self.state {
                    DriverState::Running(pass) => Some(pass),
                    _ => None,
                };
                DriverState::Failed {
                    pass: err.pass().or(running),
                    cause: err.to_string(),
                }
            }
        };

        result
    }

    fn execute(&mut self) -> Result<AggregatedOutput, BuildError> {
        let passes = self.pass_order();
        validate_pass_order(&passes, self.boundary_split)?;

        let mut registry = self.declared_entries()?;
        for &pass in &passes {
            for (name, _) in self.framework_entries(pass) {
                registry.reserve(name);
            }
        }
        self.preflight(&passes, &registry)?;

        let framework_paths: BTreeSet<PathBuf> = passes
            .iter()
            .flat_map(|&pass| self.framework_entries(pass))
            .map(|(_, path)| path)
            .collect();

        let mut table = ClassificationTable::new();
        let mut results = Vec::with_capacity(passes.len());
        let mut records = Vec::with_capacity(passes.len());

        for &pass in &passes {
            self.state = DriverState::Running(pass);

            let (result, record) = self.run_pass(pass, &registry, &mut table)?;
            for warning in &result.warnings {
                self.emit(BuildEvent::warning(Some(pass), warning.as_str()));
            }

            if self.boundary_split {
                feed_forward(&table, &mut registry, &framework_paths)?;
            }

            results.push(result);
            records.push(record);
        }

        if self.boundary_split {
            check_completeness(&records, &table)?;
            check_collisions(&records)?;
        }

        Ok(AggregatedOutput {
            passes: results,
            table,
            registry,
        })
    }

    /// Entries declared in the configuration.
    fn declared_entries(&self) -> Result<EntryRegistry, BuildError> {
        let entries = &self.config.entries;
        let mut registry = EntryRegistry::new();

        for (name, path) in &entries.client {
            registry.register(EntryCategory::ClientBoundary, name, self.config.resolve(path))?;
        }
        for (name, path) in &entries.server {
            registry.register(EntryCategory::ServerBoundary, name, self.config.resolve(path))?;
        }
        for (name, path) in &entries.custom {
            registry.register_override(EntryCategory::Custom, name, self.config.resolve(path))?;
        }

        Ok(registry)
    }

    /// Framework entries fed to a pass.
    fn framework_entries(&self, pass: PassKind) -> Vec<(&'static str, PathBuf)> {
        let paths = &self.config.paths;
        match pass {
            PassKind::Analyze | PassKind::ServerReference => {
                vec![("entries", self.config.entries_path())]
            }
            PassKind::Client => paths
                .client_entry
                .iter()
                .map(|p| ("entry.client", self.config.resolve(p)))
                .collect(),
            PassKind::StreamingSsr => paths
                .ssr_entry
                .iter()
                .map(|p| ("entry.server", self.config.resolve(p)))
                .collect(),
        }
    }

    /// The registry a pass materializes its input from.
    fn pass_registry(
        &self,
        base: &EntryRegistry,
        pass: PassKind,
    ) -> Result<EntryRegistry, BuildError> {
        let mut registry = base.clone();
        for (name, path) in self.framework_entries(pass) {
            registry.register(EntryCategory::Framework, name, path)?;
        }
        Ok(registry)
    }

    /// Checks that must pass before the bundler is invoked at all.
    fn preflight(&self, passes: &[PassKind], registry: &EntryRegistry) -> Result<(), BuildError> {
        if passes.iter().any(|p| p.needs_entries_file()) {
            let entries = self.config.entries_path();
            if !entries.is_file() {
                return Err(BuildError::EntriesNotFound { path: entries });
            }
        }

        for &pass in passes {
            for (_, path) in self.framework_entries(pass) {
                ensure_exists(&path)?;
            }
        }
        for entry in registry.entries() {
            ensure_exists(&entry.module_path)?;
        }

        for &pass in passes {
            self.pass_registry(registry, pass)?
                .materialize_for(pass.entry_categories())?;
        }

        Ok(())
    }

    fn request_for(&self, pass: PassKind, input: BTreeMap<String, PathBuf>) -> BundleRequest {
        let (externals, conditions) = match pass {
            PassKind::ServerReference => (
                ExternalPolicy {
                    bundle_all_except_builtins: true,
                    external: self.config.server_reference.external.clone(),
                },
                self.config.server_reference.conditions.clone(),
            ),
            _ => (ExternalPolicy::default(), Vec::new()),
        };

        BundleRequest {
            pass,
            input,
            target: pass.target(),
            ssr: pass.is_ssr(),
            externals,
            conditions,
            out_dir: self.config.out_dir(pass),
            minify: self.config.build.minify,
            write: pass.writes_output(),
            empty_out_dir: pass.writes_output(),
        }
    }

    fn run_pass(
        &mut self,
        pass: PassKind,
        registry: &EntryRegistry,
        table: &mut ClassificationTable,
    ) -> Result<(BuildPassResult, PassRecord), BuildError> {
        let start = Instant::now();
        let pass_registry = self.pass_registry(registry, pass)?;
        let input = pass_registry.materialize_for(pass.entry_categories())?;

        let designated: Vec<String> = pass_registry
            .entries()
            .iter()
            .filter(|e| e.category.is_designated())
            .filter(|e| input.get(&e.name) == Some(&e.module_path))
            .map(|e| e.name.clone())
            .collect();

        self.emit(BuildEvent::pass_started(pass, input.len()));
        tracing::info!("Running {} pass ({} entries)", pass, input.len());

        let manifest_kind = pass.manifest_kind().filter(|_| self.boundary_split);
        let boundary = manifest_kind.map(|k| k.boundary());
        let out_dir = self.config.out_dir(pass);
        let input_list: Vec<(String, PathBuf)> =
            input.iter().map(|(n, p)| (n.clone(), p.clone())).collect();

        let mut record = PassRecord {
            pass,
            boundary,
            sources: BTreeMap::new(),
            resolved: BTreeSet::new(),
        };
        let mut warnings = Vec::new();

        let chunks = if input.is_empty() {
            let warning = format!("{} pass has no entries and was skipped", pass);
            tracing::warn!("{}", warning);
            warnings.push(warning);
            Vec::new()
        } else {
            let request = self.request_for(pass, input);
            let mapper = OutputMapper::new(designated, self.config.build.extension.clone());
            let mut plugin = BoundaryPlugin {
                classifier: DirectiveClassifier::new(),
                table: &mut *table,
                mapper: &mapper,
                classify: self.boundary_split,
            };

            let bundler_name = self.bundler.name().to_string();
            let output = self
                .bundler
                .bundle(&request, &mut plugin)
                .map_err(|source| match source.downcast::<OutputShapeError>() {
                    Ok(shape) => BuildError::UnexpectedOutputShape {
                        pass,
                        reason: shape.0,
                    },
                    Err(source) => BuildError::PassExecution {
                        pass,
                        bundler: bundler_name,
                        source,
                    },
                })?;

            validate_output(pass, &request.input, &output.chunks)?;
            output.chunks
        };

        let manifest = match manifest_kind {
            Some(kind) => {
                let generated =
                    ManifestGenerator::new(pass, kind.boundary(), self.config.root())
                        .build(table, &chunks)?;
                warnings.extend(generated.warnings);
                record.sources = generated.sources;
                record.resolved = generated.resolved_modules;
                Some(PassManifest {
                    kind,
                    manifest: generated.manifest,
                })
            }
            None => None,
        };

        let references = manifest.as_ref().map(|m| m.manifest.len());
        tracing::info!(
            "Finished {} pass: {} chunks{}",
            pass,
            chunks.len(),
            references
                .map(|n| format!(", {} references", n))
                .unwrap_or_default()
        );
        self.emit(BuildEvent::PassFinished {
            pass,
            chunks: chunks.len(),
            references,
            duration_ms: start.elapsed().as_millis() as u64,
        });

        Ok((
            BuildPassResult {
                pass,
                out_dir,
                input: input_list,
                emitted_chunks: chunks,
                manifest,
                warnings,
            },
            record,
        ))
    }

    fn emit(&mut self, event: BuildEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }
}

fn ensure_exists(path: &Path) -> Result<(), BuildError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BuildError::EntriesNotFound {
            path: path.to_path_buf(),
        })
    }
}

fn validate_pass_order(passes: &[PassKind], boundary_split: bool) -> Result<(), BuildError> {
    let invalid = |reason: String| Err(BuildError::InvalidPassOrder { reason });

    if passes.is_empty() {
        return invalid("no passes to run".to_string());
    }

    let mut seen = BTreeSet::new();
    for (i, &pass) in passes.iter().enumerate() {
        if !seen.insert(pass) {
            return invalid(format!("`{}` is listed more than once", pass));
        }
        if pass == PassKind::Analyze && i != 0 {
            return invalid("`analyze` must run before every other pass".to_string());
        }
        if !boundary_split && matches!(pass, PassKind::Analyze | PassKind::ServerReference) {
            return invalid(format!("`{}` requires the boundary split", pass));
        }
    }

    Ok(())
}

/// Check that the bundler output can be interpreted.
fn validate_output(
    pass: PassKind,
    input: &BTreeMap<String, PathBuf>,
    chunks: &[ChunkDescriptor],
) -> Result<(), BuildError> {
    let shape = |reason: String| Err(BuildError::UnexpectedOutputShape { pass, reason });

    if chunks.is_empty() {
        return shape("no chunks were emitted".to_string());
    }

    let mut names = BTreeSet::new();
    for chunk in chunks {
        if chunk.file_name.is_empty() {
            return shape("a chunk has an empty file name".to_string());
        }
        if !names.insert(chunk.file_name.as_str()) {
            return shape(format!("`{}` was emitted more than once", chunk.file_name));
        }
    }

    for chunk in chunks {
        if let Some(missing) = chunk.imports.iter().find(|i| !names.contains(i.as_str())) {
            return shape(format!(
                "`{}` imports `{}`, which was not emitted",
                chunk.file_name, missing
            ));
        }
    }

    for (name, path) in input {
        let module_id = path.to_string_lossy();
        let found = chunks.iter().any(|c| {
            c.is_entry && (c.is_facade_of(&module_id) || (c.name == *name && c.contains(&module_id)))
        });
        if !found {
            return shape(format!("no entry chunk for input `{}`", name));
        }
    }

    Ok(())
}

/// Register directive-carrying modules as entries of later passes.
fn feed_forward(
    table: &ClassificationTable,
    registry: &mut EntryRegistry,
    framework_paths: &BTreeSet<PathBuf>,
) -> Result<(), BuildError> {
    for (module_id, classification) in table.iter() {
        let category = match classification.directive {
            Some(Boundary::Client) => EntryCategory::ClientBoundary,
            Some(Boundary::Server) => EntryCategory::ServerBoundary,
            None => continue,
        };

        let path = Path::new(module_id);
        // Virtual modules have no file to hand back to the bundler
        if !path.is_absolute() || framework_paths.contains(path) {
            continue;
        }

        if let Some(name) = registry.discover(category, path)? {
            tracing::debug!("registered `{}` as {} entry `{}`", module_id, category, name);
        }
    }
    Ok(())
}

/// Every directive module known at the end of the build must be resolvable
/// from each manifest of its boundary.
fn check_completeness(records: &[PassRecord], table: &ClassificationTable) -> Result<(), BuildError> {
    for record in records {
        let Some(boundary) = record.boundary else {
            continue;
        };
        if let Some((module, _)) = table
            .modules_with(boundary)
            .find(|(id, _)| !record.resolved.contains(*id))
        {
            return Err(BuildError::UnresolvedReference {
                pass: record.pass,
                module: module.to_string(),
                boundary,
            });
        }
    }
    Ok(())
}

/// An id must denote the same module in every manifest.
fn check_collisions(records: &[PassRecord]) -> Result<(), BuildError> {
    let mut seen: BTreeMap<&ReferenceId, (PassKind, &str)> = BTreeMap::new();

    for record in records {
        for (id, module) in &record.sources {
            match seen.get(id) {
                Some(&(first_pass, first_module)) if first_module != module.as_str() => {
                    return Err(BuildError::ManifestCollision {
                        id: id.clone(),
                        first_pass,
                        first_module: first_module.to_string(),
                        second_pass: record.pass,
                        second_module: module.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(id, (record.pass, module.as_str()));
                }
            }
        }
    }
    Ok(())
}
