//! `flightdeck manifest` command

use anyhow::{bail, Result};

use super::load_config;
use crate::cli::{Cli, ManifestArgs};
use flightdeck::core::manifest::Manifest;
use flightdeck::core::pass::ManifestKind;

pub fn execute(cli: &Cli, args: &ManifestArgs) -> Result<()> {
    let config = load_config(cli)?;
    let kind = ManifestKind::from(args.kind);
    let manifest = Manifest::load(&config.dist_dir().join(kind.file_name()))?;

    match &args.id {
        Some(id) => {
            let Some(reference) = manifest.resolve(id) else {
                bail!("`{}` is not in the {}", id, kind);
            };
            println!("{}", serde_json::to_string_pretty(reference)?);
        }
        None => {
            for reference in &manifest {
                println!("{} -> {}", reference.id, reference.chunks.join(", "));
            }
        }
    }

    Ok(())
}
