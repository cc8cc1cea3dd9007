//! Project fixtures backed by a temporary directory.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::errors::BuildError;
use crate::ops::driver::{AggregatedOutput, BuildDriver};
use crate::test_support::{FakeModule, MemoryBundler};
use crate::util::config::ProjectConfig;

/// Default content of the framework entries module.
pub const ENTRIES_SOURCE: &str = "export function getEntry(id) { return import(id) }\n";

/// A project on disk with a matching in-memory module graph.
pub struct TestProject {
    pub dir: TempDir,
    pub config: ProjectConfig,
    pub bundler: MemoryBundler,
}

impl TestProject {
    /// Create a project containing only the entries module.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::for_root(dir.path());
        let mut project = TestProject {
            dir,
            config,
            bundler: MemoryBundler::new(),
        };
        project.module("src/entries.ts", ENTRIES_SOURCE, &["getEntry"], &[]);
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Module id the bundler reports for a project file.
    pub fn id(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().into_owned()
    }

    /// Write a module and add it to the bundler's graph.
    ///
    /// `imports` are project-relative paths.
    pub fn module(&mut self, rel: &str, code: &str, exports: &[&str], imports: &[&str]) -> String {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, code).unwrap();

        let id = self.id(rel);
        let imports = imports.iter().map(|i| self.id(i)).collect();
        self.bundler.add_module(
            id.clone(),
            FakeModule {
                code: code.to_string(),
                exports: exports.iter().map(|e| e.to_string()).collect(),
                imports,
                dynamic_imports: Vec::new(),
            },
        );
        id
    }

    /// Make the entries module import the given modules.
    pub fn entries_import(&mut self, imports: &[&str]) {
        self.module("src/entries.ts", ENTRIES_SOURCE, &["getEntry"], imports);
    }

    pub fn dynamic_import(&mut self, from: &str, to: &str) {
        let (from, to) = (self.id(from), self.id(to));
        self.bundler.add_dynamic_import(&from, &to);
    }

    pub fn declare_client(&mut self, name: &str, rel: &str) {
        self.config
            .entries
            .client
            .insert(name.to_string(), PathBuf::from(rel));
    }

    pub fn declare_server(&mut self, name: &str, rel: &str) {
        self.config
            .entries
            .server
            .insert(name.to_string(), PathBuf::from(rel));
    }

    pub fn declare_custom(&mut self, name: &str, rel: &str) {
        self.config
            .entries
            .custom
            .insert(name.to_string(), PathBuf::from(rel));
    }

    /// Run a build with the project's configuration.
    pub fn run(&mut self) -> Result<AggregatedOutput, BuildError> {
        BuildDriver::new(&self.config, &mut self.bundler).run()
    }
}

impl Default for TestProject {
    fn default() -> Self {
        TestProject::new()
    }
}
