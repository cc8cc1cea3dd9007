//! Project configuration.
//!
//! A project is configured by a `Flightdeck.toml` at its root. Every section
//! is optional; relative paths are resolved against the directory holding the
//! file.
//!
//! ```toml
//! [paths]
//! entries = "src/entries.ts"
//! client-entry = "src/entry.client.tsx"
//! dist = "dist"
//!
//! [bundler]
//! command = "node"
//! args = ["scripts/bundle.mjs"]
//!
//! [entries.custom]
//! worker = "src/worker.ts"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::pass::PassKind;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "Flightdeck.toml";

/// Parsed `Flightdeck.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Source and output locations
    pub paths: PathsConfig,

    /// Build settings
    pub build: BuildSettings,

    /// External bundler program
    pub bundler: BundlerConfig,

    /// Settings for the server-reference pass
    pub server_reference: ServerReferenceConfig,

    /// Additional declared entries
    pub entries: EntriesConfig,

    /// Directory the configuration was loaded from.
    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PathsConfig {
    /// Framework entries module, required by the server-reference pass.
    pub entries: PathBuf,

    /// Browser bootstrap module.
    pub client_entry: Option<PathBuf>,

    /// Streaming renderer bootstrap module.
    pub ssr_entry: Option<PathBuf>,

    /// Output root.
    pub dist: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            entries: PathBuf::from("src/entries.ts"),
            client_entry: None,
            ssr_entry: None,
            dist: PathBuf::from("dist"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildSettings {
    /// Split the build at client/server boundaries.
    pub boundary_split: bool,

    /// Explicit pass order.
    pub passes: Option<Vec<PassKind>>,

    pub minify: bool,

    /// Extension of emitted chunks.
    pub extension: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            boundary_split: true,
            passes: None,
            minify: false,
            extension: "mjs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BundlerConfig {
    /// Program speaking the bundler protocol on stdin/stdout.
    pub command: Option<String>,

    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerReferenceConfig {
    /// Packages left as runtime imports.
    pub external: Vec<String>,

    /// Package export conditions.
    pub conditions: Vec<String>,
}

impl Default for ServerReferenceConfig {
    fn default() -> Self {
        ServerReferenceConfig {
            external: vec!["@prisma/client".to_string(), "react-dom".to_string()],
            conditions: vec!["react-server".to_string()],
        }
    }
}

/// Entries declared up front, by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntriesConfig {
    pub client: BTreeMap<String, PathBuf>,
    pub server: BTreeMap<String, PathBuf>,
    /// Auxiliary modules. These keep a stable file name and may shadow
    /// same-named entries of other categories.
    pub custom: BTreeMap<String, PathBuf>,
}

impl ProjectConfig {
    /// Default configuration for a project rooted at `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        ProjectConfig {
            root: root.into(),
            ..ProjectConfig::default()
        }
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let mut config: ProjectConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        config.root = parent
            .canonicalize()
            .with_context(|| format!("failed to resolve project root: {}", parent.display()))?;

        tracing::debug!("loaded {} (root {})", path.display(), config.root.display());
        Ok(config)
    }

    /// Find the configuration file by walking up from `start`.
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn entries_path(&self) -> PathBuf {
        self.resolve(&self.paths.entries)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.resolve(&self.paths.dist)
    }

    /// Output directory of a pass.
    pub fn out_dir(&self, pass: PassKind) -> PathBuf {
        self.dist_dir().join(pass.out_dir_name())
    }

    /// Pass order, explicit or derived from whether the boundary split is on.
    pub fn pass_order(&self, boundary_split: bool) -> Vec<PassKind> {
        match &self.build.passes {
            Some(passes) => passes.clone(),
            None if boundary_split => PassKind::DEFAULT_ORDER.to_vec(),
            None => PassKind::PLAIN_ORDER.to_vec(),
        }
    }
}
