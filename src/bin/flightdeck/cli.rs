//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use flightdeck::core::pass::{ManifestKind, PassKind};
use flightdeck::util::shell::{ColorChoice, Shell};

/// Flightdeck - A multi-pass build orchestrator for server components
#[derive(Parser)]
#[command(name = "flightdeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_parser = clap::value_parser!(ColorChoice))]
    pub color: ColorChoice,

    /// Path to Flightdeck.toml (defaults to searching upwards)
    #[arg(long, global = true, env = "FLIGHTDECK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn shell(&self, json: bool) -> Shell {
        Shell::from_flags(self.quiet, self.verbose, self.color, json)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every bundler pass and write the reference manifests
    Build(BuildArgs),

    /// Inspect a reference manifest from the last build
    Manifest(ManifestArgs),

    /// Remove build output
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build without splitting server and client boundaries
    #[arg(long)]
    pub no_boundary_split: bool,

    /// Run only these passes, in order (e.g. --pass server-reference,client)
    #[arg(long = "pass", value_delimiter = ',', value_parser = clap::value_parser!(PassKind))]
    pub passes: Vec<PassKind>,

    /// Output format for build messages
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Args)]
pub struct ManifestArgs {
    /// Manifest to read
    #[arg(value_enum)]
    pub kind: ManifestArg,

    /// Resolve a single reference id (e.g. `src/Button.tsx#default`)
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ManifestArg {
    Client,
    Server,
    Ssr,
}

impl From<ManifestArg> for ManifestKind {
    fn from(arg: ManifestArg) -> Self {
        match arg {
            ManifestArg::Client => ManifestKind::Client,
            ManifestArg::Server => ManifestKind::Server,
            ManifestArg::Ssr => ManifestKind::Ssr,
        }
    }
}

#[derive(Args)]
pub struct CleanArgs {}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
