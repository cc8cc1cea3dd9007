//! Implementation of `flightdeck build`.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::bundler::Bundler;
use crate::builder::events::BuildEvent;
use crate::core::manifest::Manifest;
use crate::core::pass::{ManifestKind, PassKind};
use crate::ops::driver::{AggregatedOutput, BuildDriver};
use crate::util::config::ProjectConfig;
use crate::util::fs::{relative_path, remove_file_if_exists, to_slash, write_atomic};
use crate::util::hash::Fingerprint;

/// Name of the build summary written next to the manifests.
pub const BUILD_INFO_FILE: &str = "build-info.json";

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Override `build.boundary-split`
    pub boundary_split: Option<bool>,

    /// Run only these passes, in this order
    pub passes: Option<Vec<PassKind>>,
}

/// Summary of one build, persisted as `build-info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub schema_version: u32,
    pub boundary_split: bool,
    pub passes: Vec<PassInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassInfo {
    pub pass: PassKind,
    /// Output directory relative to the project root.
    pub out_dir: String,
    /// Fingerprint of the pass input and emitted file names.
    pub fingerprint: String,
    pub chunks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl BuildInfo {
    fn from_output(config: &ProjectConfig, output: &AggregatedOutput, boundary_split: bool) -> Self {
        let passes = output
            .passes
            .iter()
            .map(|result| {
                let mut fingerprint = Fingerprint::new();
                fingerprint.update_str(result.pass.as_str());
                for (name, path) in &result.input {
                    fingerprint.update_str(name);
                    fingerprint.update_str(&to_slash(&relative_path(config.root(), path)));
                }
                fingerprint.update_strs(result.emitted_chunks.iter().map(|c| c.file_name.as_str()));

                PassInfo {
                    pass: result.pass,
                    out_dir: to_slash(&relative_path(config.root(), &result.out_dir)),
                    fingerprint: fingerprint.finish_short(),
                    chunks: result
                        .emitted_chunks
                        .iter()
                        .map(|c| c.file_name.clone())
                        .collect(),
                    manifest: result
                        .manifest
                        .as_ref()
                        .map(|m| m.kind.file_name().to_string()),
                    warnings: result.warnings.clone(),
                }
            })
            .collect();

        BuildInfo {
            schema_version: Manifest::SCHEMA_VERSION,
            boundary_split,
            passes,
        }
    }
}

/// What a successful build left on disk.
#[derive(Debug)]
pub struct BuildResult {
    pub output: AggregatedOutput,
    /// Manifest files written, by kind.
    pub manifests: Vec<(ManifestKind, PathBuf)>,
    pub build_info: PathBuf,
}

/// Run a build and persist its manifests.
///
/// On failure the manifests and build summary of a previous build are
/// removed, so a runtime never pairs stale references with new chunks.
pub fn build(
    config: &ProjectConfig,
    bundler: &mut dyn Bundler,
    opts: &BuildOptions,
    observer: &mut dyn FnMut(&BuildEvent),
) -> Result<BuildResult> {
    let start = Instant::now();
    let boundary_split = opts.boundary_split.unwrap_or(config.build.boundary_split);

    let result = {
        let mut driver =
            BuildDriver::new(config, bundler).with_observer(|event: &BuildEvent| observer(event));
        driver = driver.with_boundary_split(boundary_split);
        if let Some(passes) = &opts.passes {
            driver = driver.with_passes(passes.clone());
        }
        driver.run()
    };

    let output = match result {
        Ok(output) => output,
        Err(err) => {
            if let Err(cleanup) = invalidate_outputs(config) {
                tracing::warn!("failed to remove stale build output: {:#}", cleanup);
            }
            observer(&BuildEvent::error(err.pass(), err.to_string()));
            observer(&BuildEvent::finished(false, elapsed_ms(start), 0));
            return Err(err.into());
        }
    };

    let dist = config.dist_dir();
    let mut manifests = Vec::new();
    for kind in ManifestKind::ALL {
        let path = dist.join(kind.file_name());
        match output.manifest(kind) {
            Some(manifest) => {
                manifest.save(&path)?;
                tracing::info!("Wrote {}", path.display());
                observer(&BuildEvent::ManifestWritten {
                    kind,
                    path: path.clone(),
                    references: manifest.len(),
                });
                manifests.push((kind, path));
            }
            None => remove_file_if_exists(&path)?,
        }
    }

    let info = BuildInfo::from_output(config, &output, boundary_split);
    let build_info = dist.join(BUILD_INFO_FILE);
    let json = serde_json::to_string_pretty(&info).context("failed to serialize build info")?;
    write_atomic(&build_info, &format!("{}\n", json))?;

    observer(&BuildEvent::finished(
        true,
        elapsed_ms(start),
        output.passes.len(),
    ));

    Ok(BuildResult {
        output,
        manifests,
        build_info,
    })
}

/// Load the summary of the last successful build.
pub fn load_build_info(config: &ProjectConfig) -> Result<BuildInfo> {
    let path = config.dist_dir().join(BUILD_INFO_FILE);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn invalidate_outputs(config: &ProjectConfig) -> Result<()> {
    let dist = config.dist_dir();
    for kind in ManifestKind::ALL {
        remove_file_if_exists(&dist.join(kind.file_name()))?;
    }
    remove_file_if_exists(&dist.join(BUILD_INFO_FILE))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
