//! `flightdeck clean` command

use anyhow::Result;

use super::load_config;
use crate::cli::{CleanArgs, Cli};
use flightdeck::util::fs::remove_dir_all_if_exists;
use flightdeck::util::shell::Status;

pub fn execute(cli: &Cli, _args: &CleanArgs) -> Result<()> {
    let config = load_config(cli)?;
    let shell = cli.shell(false);

    let dist = config.dist_dir();
    remove_dir_all_if_exists(&dist)?;
    shell.status(Status::Removed, dist.display());

    Ok(())
}
