//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod manifest;

use anyhow::{bail, Result};

use crate::cli::Cli;
use flightdeck::util::config::{ProjectConfig, CONFIG_FILE_NAME};
use flightdeck::util::diagnostic::suggestions;

/// Load the project configuration named by `--config`, or search upwards from
/// the current directory.
pub fn load_config(cli: &Cli) -> Result<ProjectConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir()?;
            match ProjectConfig::find(&cwd) {
                Some(path) => path,
                None => bail!(
                    "could not find {} in {} or any parent directory\n{}",
                    CONFIG_FILE_NAME,
                    cwd.display(),
                    suggestions::NO_CONFIG
                ),
            }
        }
    };

    ProjectConfig::load(&path)
}
