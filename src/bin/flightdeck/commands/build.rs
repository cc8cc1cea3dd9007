//! `flightdeck build` command

use anyhow::Result;

use super::load_config;
use crate::cli::{BuildArgs, Cli, MessageFormat};
use flightdeck::builder::events::BuildEvent;
use flightdeck::builder::process::ProcessBundler;
use flightdeck::ops::{build, BuildOptions};
use flightdeck::util::shell::Status;

pub fn execute(cli: &Cli, args: &BuildArgs) -> Result<()> {
    let shell = cli.shell(args.message_format == MessageFormat::Json);
    let config = load_config(cli)?;
    let mut bundler = ProcessBundler::from_config(&config)?;

    shell.note(format!(
        "{} ({})",
        config.root().display(),
        bundler.display_command()
    ));

    let opts = BuildOptions {
        boundary_split: args.no_boundary_split.then_some(false),
        passes: (!args.passes.is_empty()).then(|| args.passes.clone()),
    };

    let result = build(&config, &mut bundler, &opts, &mut |event: &BuildEvent| {
        shell.event(event)
    })?;

    if shell.is_verbose() {
        for pass in result.output.passes.iter().filter(|p| p.pass.writes_output()) {
            for chunk in &pass.emitted_chunks {
                shell.status(
                    Status::Wrote,
                    pass.out_dir.join(&chunk.file_name).display(),
                );
            }
        }
    }

    Ok(())
}
