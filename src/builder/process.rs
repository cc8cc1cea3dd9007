//! A bundler driven over stdin/stdout.
//!
//! The external program receives one JSON object per line and answers the
//! same way:
//!
//! ```text
//! -> {"type":"build", ...request}
//! <- {"type":"module","id":..,"code":..,"exports":[..]}
//! -> {"type":"ack"}
//! <- {"type":"render-chunk","name":..,"module_ids":[..],"is_entry":..,"code":..}
//! -> {"type":"chunk-plan","file_name":..,"banner":..}
//! <- {"type":"done","output":[..chunks]}   or   {"type":"error","message":..}
//! ```
//!
//! Lines not starting with `{` are treated as log output.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::bundler::{
    BundleOutput, BundleRequest, Bundler, ModuleSource, OutputShapeError, PassPlugin,
    RenderedChunk,
};
use crate::core::chunk::ChunkDescriptor;
use crate::util::config::{ProjectConfig, CONFIG_FILE_NAME};

/// Message sent to the bundler program.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Outgoing<'a> {
    Build {
        #[serde(flatten)]
        request: &'a BundleRequest,
    },
    Ack,
    ChunkPlan {
        file_name: String,
        banner: String,
    },
}

/// Message received from the bundler program.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Incoming {
    Module(ModuleSource),
    RenderChunk(RenderedChunk),
    Done { output: Vec<ChunkDescriptor> },
    Error { message: String },
}

/// One pass worth of protocol traffic.
pub struct Session<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Session { reader, writer }
    }

    /// Send the request and serve plugin hooks until the bundler is done.
    pub fn run(
        &mut self,
        request: &BundleRequest,
        plugin: &mut dyn PassPlugin,
    ) -> Result<BundleOutput> {
        self.send(&Outgoing::Build { request })?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .context("failed to read from bundler")?;
            if read == 0 {
                return Err(OutputShapeError(
                    "bundler exited without reporting its output".to_string(),
                )
                .into());
            }

            let message = line.trim();
            if !message.starts_with('{') {
                if !message.is_empty() {
                    tracing::debug!("bundler: {}", message);
                }
                continue;
            }

            let message: Incoming = serde_json::from_str(message)
                .map_err(|e| OutputShapeError(format!("malformed bundler message: {}", e)))?;

            match message {
                Incoming::Module(module) => {
                    plugin.module_parsed(&module)?;
                    self.send(&Outgoing::Ack)?;
                }
                Incoming::RenderChunk(chunk) => {
                    let plan = plugin.plan_chunk(&chunk);
                    self.send(&Outgoing::ChunkPlan {
                        banner: plan.banner(),
                        file_name: plan.file_name,
                    })?;
                }
                Incoming::Done { output } => return Ok(BundleOutput { chunks: output }),
                Incoming::Error { message } => bail!("{}", message),
            }
        }
    }

    fn send(&mut self, message: &Outgoing<'_>) -> Result<()> {
        let json = serde_json::to_string(message).context("failed to encode bundler message")?;
        writeln!(self.writer, "{}", json).context("failed to write to bundler")?;
        self.writer.flush().context("failed to write to bundler")?;
        Ok(())
    }
}

/// Runs an external program once per pass.
#[derive(Debug, Clone)]
pub struct ProcessBundler {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl ProcessBundler {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        ProcessBundler {
            program: program.into(),
            args,
            cwd: cwd.into(),
        }
    }

    /// Create the bundler configured in `[bundler]`.
    pub fn from_config(config: &ProjectConfig) -> Result<Self> {
        let Some(command) = &config.bundler.command else {
            bail!(
                "no bundler configured; set `bundler.command` in {}",
                CONFIG_FILE_NAME
            );
        };
        Ok(ProcessBundler::new(
            command.clone(),
            config.bundler.args.clone(),
            config.root(),
        ))
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

impl Bundler for ProcessBundler {
    fn name(&self) -> &str {
        &self.program
    }

    fn bundle(
        &mut self,
        request: &BundleRequest,
        plugin: &mut dyn PassPlugin,
    ) -> Result<BundleOutput> {
        let program = which::which_in(&self.program, std::env::var_os("PATH"), &self.cwd)
            .with_context(|| format!("bundler command `{}` not found", self.program))?;

        tracing::debug!("running `{}` for {}", self.display_command(), request.pass);

        let mut child = Command::new(&program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.display_command()))?;

        let result = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => {
                Session::new(BufReader::new(stdout), stdin).run(request, plugin)
            }
            _ => Err(anyhow::anyhow!("bundler stdio was not captured")),
        };

        if result.is_err() {
            // The program may still be blocked on a pipe nobody reads
            let _ = child.kill();
        }

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for `{}`", self.display_command()))?;

        let output = result?;
        if !status.success() {
            bail!(
                "`{}` failed with exit code {:?}",
                self.display_command(),
                status.code()
            );
        }
        Ok(output)
    }
}
