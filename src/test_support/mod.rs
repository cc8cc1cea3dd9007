//! Test utilities for flightdeck unit tests.
//!
//! [`MemoryBundler`] stands in for a real bundler. It resolves a fixed module
//! graph, reports parsed modules to the pass plugin, groups modules into
//! chunks the way a code-splitting bundler would and lets the plugin name and
//! tag every chunk.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut project = TestProject::new();
//! project.module("src/Button.tsx", "'use client'\nexport default 1", &["default"], &[]);
//! project.declare_client("Button", "src/Button.tsx");
//!
//! let output = project.run().unwrap();
//! ```

pub mod fixtures;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{bail, Result};

use crate::builder::bundler::{
    BundleOutput, BundleRequest, Bundler, ModuleSource, PassPlugin, RenderedChunk,
};
use crate::core::chunk::ChunkDescriptor;
use crate::core::pass::PassKind;

pub use fixtures::*;

/// A module known to the [`MemoryBundler`].
#[derive(Debug, Clone, Default)]
pub struct FakeModule {
    pub code: String,
    pub exports: Vec<String>,
    /// Statically imported module ids, in declaration order.
    pub imports: Vec<String>,
    /// Dynamically imported module ids.
    pub dynamic_imports: Vec<String>,
}

/// In-memory bundler with a scripted module graph.
#[derive(Debug, Default)]
pub struct MemoryBundler {
    modules: BTreeMap<String, FakeModule>,
    tree_shaken: Vec<(PassKind, String)>,
    fail_on: Option<PassKind>,
    empty_output_on: Option<PassKind>,
    requests: Vec<BundleRequest>,
    emitted: BTreeMap<(PassKind, String), String>,
}

struct EntryPoint {
    name: String,
    module: String,
    is_entry: bool,
}

struct PlannedChunk {
    name: String,
    modules: Vec<String>,
    is_entry: bool,
    facade: Option<String>,
}

impl MemoryBundler {
    pub fn new() -> Self {
        MemoryBundler::default()
    }

    /// Add a module to the graph.
    pub fn add_module(&mut self, id: impl Into<String>, module: FakeModule) {
        self.modules.insert(id.into(), module);
    }

    pub fn add_dynamic_import(&mut self, from: &str, to: &str) {
        if let Some(module) = self.modules.get_mut(from) {
            module.dynamic_imports.push(to.to_string());
        }
    }

    /// Drop a module from the output of one pass after it was parsed.
    pub fn tree_shake(&mut self, pass: PassKind, id: impl Into<String>) {
        self.tree_shaken.push((pass, id.into()));
    }

    /// Fail the given pass.
    pub fn fail_on(&mut self, pass: PassKind) {
        self.fail_on = Some(pass);
    }

    /// Report no chunks for the given pass.
    pub fn empty_output_on(&mut self, pass: PassKind) {
        self.empty_output_on = Some(pass);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> &[BundleRequest] {
        &self.requests
    }

    pub fn request(&self, pass: PassKind) -> Option<&BundleRequest> {
        self.requests.iter().find(|r| r.pass == pass)
    }

    /// Passes invoked so far, in order.
    pub fn passes_run(&self) -> Vec<PassKind> {
        self.requests.iter().map(|r| r.pass).collect()
    }

    /// Content written for a chunk, banner included.
    pub fn emitted(&self, pass: PassKind, file_name: &str) -> Option<&str> {
        self.emitted
            .get(&(pass, file_name.to_string()))
            .map(String::as_str)
    }

    /// File names written by a pass.
    pub fn emitted_files(&self, pass: PassKind) -> Vec<&str> {
        self.emitted
            .keys()
            .filter(|(p, _)| *p == pass)
            .map(|(_, f)| f.as_str())
            .collect()
    }

    /// Modules statically reachable from `start`, in depth-first preorder.
    fn walk(&self, start: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![start.to_string()];

        while let Some(id) = stack.pop() {
            let Some(module) = self.modules.get(&id) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            order.push(id);
            for import in module.imports.iter().rev() {
                stack.push(import.clone());
            }
        }

        order
    }

    /// Group parsed modules into chunks by the set of entry points that
    /// reach them.
    fn plan_chunks(
        &self,
        points: &[EntryPoint],
        parsed: &[String],
        shaken: &BTreeSet<String>,
    ) -> Vec<PlannedChunk> {
        let point_index: HashMap<&str, usize> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.module.as_str(), i))
            .collect();

        let mut reached_by: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for (i, point) in points.iter().enumerate() {
            for id in self.walk(&point.module) {
                reached_by.entry(id).or_default().insert(i);
            }
        }

        let mut groups: Vec<(BTreeSet<usize>, Vec<String>)> = Vec::new();
        for id in parsed {
            if shaken.contains(id) {
                continue;
            }
            let key: BTreeSet<usize> = match point_index.get(id.as_str()) {
                Some(&i) => BTreeSet::from([i]),
                None => reached_by.get(id).cloned().unwrap_or_default(),
            };
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, modules)) => modules.push(id.clone()),
                None => groups.push((key, vec![id.clone()])),
            }
        }

        groups
            .into_iter()
            .map(|(key, modules)| {
                let owner = if key.len() == 1 {
                    key.iter().next().map(|&i| &points[i])
                } else {
                    None
                };
                match owner {
                    Some(point) if modules.contains(&point.module) => PlannedChunk {
                        name: point.name.clone(),
                        is_entry: point.is_entry,
                        facade: Some(point.module.clone()),
                        modules,
                    },
                    _ => PlannedChunk {
                        name: stem(&modules[0]),
                        is_entry: false,
                        facade: None,
                        modules,
                    },
                }
            })
            .collect()
    }

    fn render(&self, modules: &[String]) -> String {
        let mut code = String::new();
        for id in modules {
            code.push_str(&format!("// {}\n", id));
            for line in self.modules[id].code.lines() {
                let trimmed = line.trim_start();
                // Bundlers drop module-level directives when concatenating
                if trimmed.starts_with("'use ") || trimmed.starts_with("\"use ") {
                    continue;
                }
                code.push_str(line);
                code.push('\n');
            }
        }
        code
    }
}

impl Bundler for MemoryBundler {
    fn name(&self) -> &str {
        "memory"
    }

    fn bundle(
        &mut self,
        request: &BundleRequest,
        plugin: &mut dyn PassPlugin,
    ) -> Result<BundleOutput> {
        self.requests.push(request.clone());

        if self.fail_on == Some(request.pass) {
            bail!("simulated failure in the {} pass", request.pass);
        }

        let mut points: Vec<EntryPoint> = Vec::new();
        for (name, path) in &request.input {
            let module = path.to_string_lossy().into_owned();
            if !self.modules.contains_key(&module) {
                bail!("Could not resolve entry module \"{}\"", module);
            }
            points.push(EntryPoint {
                name: name.clone(),
                module,
                is_entry: true,
            });
        }

        let mut parsed: Vec<String> = Vec::new();
        let mut seen = BTreeSet::new();
        let mut next = 0;
        while next < points.len() {
            let start = points[next].module.clone();
            for id in self.walk(&start) {
                if !seen.insert(id.clone()) {
                    continue;
                }
                let module = &self.modules[&id];
                plugin.module_parsed(&ModuleSource {
                    id: id.clone(),
                    code: module.code.clone(),
                    exports: module.exports.clone(),
                })?;
                for target in &module.dynamic_imports {
                    if self.modules.contains_key(target)
                        && !points.iter().any(|p| &p.module == target)
                    {
                        points.push(EntryPoint {
                            name: stem(target),
                            module: target.clone(),
                            is_entry: false,
                        });
                    }
                }
                parsed.push(id);
            }
            next += 1;
        }

        if self.empty_output_on == Some(request.pass) {
            return Ok(BundleOutput::default());
        }

        let shaken: BTreeSet<String> = self
            .tree_shaken
            .iter()
            .filter(|(pass, _)| *pass == request.pass)
            .map(|(_, id)| id.clone())
            .collect();

        let planned = self.plan_chunks(&points, &parsed, &shaken);

        let chunk_of: HashMap<&str, usize> = planned
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.modules.iter().map(move |m| (m.as_str(), i)))
            .collect();

        let mut file_names = Vec::with_capacity(planned.len());
        for chunk in &planned {
            let rendered = RenderedChunk {
                name: chunk.name.clone(),
                module_ids: chunk.modules.clone(),
                is_entry: chunk.is_entry,
                facade_module_id: chunk.facade.clone(),
                code: self.render(&chunk.modules),
            };
            let plan = plugin.plan_chunk(&rendered);
            if request.write {
                self.emitted.insert(
                    (request.pass, plan.file_name.clone()),
                    format!("{}{}", plan.banner(), rendered.code),
                );
            }
            file_names.push(plan.file_name);
        }

        let chunks = planned
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let mut imports: Vec<String> = Vec::new();
                for id in &chunk.modules {
                    for import in &self.modules[id].imports {
                        if let Some(&j) = chunk_of.get(import.as_str()) {
                            if j != i && !imports.contains(&file_names[j]) {
                                imports.push(file_names[j].clone());
                            }
                        }
                    }
                }
                ChunkDescriptor {
                    file_name: file_names[i].clone(),
                    name: chunk.name.clone(),
                    module_ids: chunk.modules.iter().cloned().collect(),
                    is_entry: chunk.is_entry,
                    facade_module_id: chunk.facade.clone(),
                    imports,
                }
            })
            .collect();

        Ok(BundleOutput { chunks })
    }
}

fn stem(id: &str) -> String {
    Path::new(id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chunk".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::builder::bundler::{ChunkPlan, ExternalPolicy};
    use crate::builder::output::ChunkTags;
    use crate::core::pass::BuildTarget;

    struct NamePlugin;

    impl PassPlugin for NamePlugin {
        fn module_parsed(&mut self, _module: &ModuleSource) -> Result<()> {
            Ok(())
        }

        fn plan_chunk(&mut self, chunk: &RenderedChunk) -> ChunkPlan {
            ChunkPlan {
                file_name: format!("{}.js", chunk.name),
                tags: ChunkTags::none(),
            }
        }
    }

    fn module(code: &str, imports: &[&str]) -> FakeModule {
        FakeModule {
            code: code.to_string(),
            exports: vec!["default".to_string()],
            imports: imports.iter().map(|i| i.to_string()).collect(),
            dynamic_imports: Vec::new(),
        }
    }

    fn request(input: &[(&str, &str)]) -> BundleRequest {
        BundleRequest {
            pass: PassKind::Client,
            input: input
                .iter()
                .map(|(n, p)| (n.to_string(), PathBuf::from(p)))
                .collect::<BTreeMap<_, _>>(),
            target: BuildTarget::Browser,
            ssr: false,
            externals: ExternalPolicy::default(),
            conditions: Vec::new(),
            out_dir: PathBuf::from("/app/dist/client"),
            minify: false,
            write: true,
            empty_out_dir: true,
        }
    }

    #[test]
    fn test_shared_modules_are_split() {
        let mut bundler = MemoryBundler::new();
        bundler.add_module("/app/a.ts", module("a", &["/app/shared.ts"]));
        bundler.add_module("/app/b.ts", module("b", &["/app/shared.ts"]));
        bundler.add_module("/app/shared.ts", module("shared", &[]));

        let output = bundler
            .bundle(&request(&[("a", "/app/a.ts"), ("b", "/app/b.ts")]), &mut NamePlugin)
            .unwrap();

        let names: Vec<&str> = output.chunks.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.js", "shared.js", "b.js"]);
        assert_eq!(output.chunks[0].imports, vec!["shared.js"]);
        assert!(output.chunks[0].is_facade_of("/app/a.ts"));
        assert!(!output.chunks[1].is_entry);
    }

    #[test]
    fn test_dynamic_import_gets_own_chunk() {
        let mut bundler = MemoryBundler::new();
        bundler.add_module("/app/a.ts", module("a", &[]));
        bundler.add_module("/app/lazy.ts", module("lazy", &[]));
        bundler.add_dynamic_import("/app/a.ts", "/app/lazy.ts");

        let output = bundler
            .bundle(&request(&[("a", "/app/a.ts")]), &mut NamePlugin)
            .unwrap();

        assert_eq!(output.chunks.len(), 2);
        assert_eq!(output.chunks[1].file_name, "lazy.js");
        assert!(!output.chunks[1].is_entry);
        assert!(output.chunks[0].imports.is_empty());
    }

    #[test]
    fn test_directives_are_stripped_from_rendered_code() {
        let mut bundler = MemoryBundler::new();
        bundler.add_module("/app/a.ts", module("'use client'\nexport default 1", &[]));

        bundler
            .bundle(&request(&[("a", "/app/a.ts")]), &mut NamePlugin)
            .unwrap();

        let content = bundler.emitted(PassKind::Client, "a.js").unwrap();
        assert!(!content.contains("use client"));
        assert!(content.contains("export default 1"));
    }
}
