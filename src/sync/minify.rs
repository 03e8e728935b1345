//! Minification through an external command.
//!
//! Each source file whose extension has a configured command template is
//! turned into one [`MinifyJob`]. Jobs run on the rayon pool; the first
//! failing job aborts the batch.

use rayon::prelude::*;
use regex::RegexSet;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SyncSpec;
use crate::error::{Result, SyncError};
use crate::fs::paths::{extension, is_minified, matches_any, minified_name, relative_to, relocate, walk_tree};
use crate::fs::LocalFs;

/// Placeholder replaced by the source path.
pub const INPUT_PLACEHOLDER: &str = "{in_name}";
/// Placeholder replaced by the output path.
pub const OUTPUT_PLACEHOLDER: &str = "{out_name}";

/// Runs a fully substituted command line and reports its exit code.
pub trait CommandRunner: Send + Sync {
    fn invoke(&self, command_line: &str) -> io::Result<i32>;
}

/// Runs commands through the platform shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn invoke(&self, command_line: &str) -> io::Result<i32> {
        let status = if cfg!(windows) {
            Command::new("cmd").args(["/C", command_line]).status()?
        } else {
            Command::new("sh").args(["-c", command_line]).status()?
        };
        // Killed by a signal
        Ok(status.code().unwrap_or(-1))
    }
}

/// Quote a path as a single word for the platform shell.
pub fn quote_path(path: &Path) -> Result<String> {
    let raw = path.to_string_lossy();
    if cfg!(windows) {
        // `"` cannot appear in a Windows file name
        return Ok(format!("\"{}\"", raw));
    }
    shlex::try_quote(&raw)
        .map(Cow::into_owned)
        .map_err(|_| SyncError::UnquotablePath {
            path: path.to_path_buf(),
        })
}

/// Substitute concrete paths into a command template. Each path is quoted
/// so it reaches the tool as exactly one argument.
pub fn render_command(template: &str, input: &Path, output: &Path) -> Result<String> {
    Ok(template
        .replace(INPUT_PLACEHOLDER, &quote_path(input)?)
        .replace(OUTPUT_PLACEHOLDER, &quote_path(output)?))
}

/// One planned minifier invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifyJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub command: String,
}

/// Plans and runs minifier invocations for a sync.
pub struct MinificationEngine {
    commands: BTreeMap<String, String>,
    runner: Arc<dyn CommandRunner>,
}

impl MinificationEngine {
    pub fn new(commands: BTreeMap<String, String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { commands, runner }
    }

    pub fn from_spec(spec: &SyncSpec, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(spec.minifier_commands(), runner)
    }

    /// Where the minified form of `path` is written.
    pub fn output_path(spec: &SyncSpec, path: &Path) -> PathBuf {
        match &spec.input_directory {
            Some(input) => minified_name(&relocate(input, &spec.root_directory, path)),
            None => minified_name(path),
        }
    }

    /// Walk the source directory and build the job list.
    ///
    /// Ignored files and files without a command for their extension are
    /// left alone. When minifying in place, files that are already
    /// minified outputs are not used as sources.
    pub fn plan(&self, spec: &SyncSpec, ignore: &RegexSet) -> Result<Vec<MinifyJob>> {
        if self.commands.is_empty() {
            return Ok(Vec::new());
        }

        let source = spec.source_directory();
        let in_place = spec.input_directory.is_none();
        let mut outputs = HashSet::new();
        let mut jobs = Vec::new();

        for path in walk_tree(source)? {
            if matches_any(ignore, &relative_to(source, &path)) {
                continue;
            }
            if in_place && is_minified(&path) {
                continue;
            }
            let Some(template) = self.commands.get(&extension(&path)) else {
                continue;
            };

            let output = Self::output_path(spec, &path);
            if !outputs.insert(output.clone()) {
                return Err(SyncError::OutputCollision { output });
            }
            jobs.push(MinifyJob {
                command: render_command(template, &path, &output)?,
                input: path,
                output,
            });
        }

        Ok(jobs)
    }

    /// Run planned jobs. Stops scheduling new jobs after the first failure.
    pub fn run(&self, jobs: &[MinifyJob]) -> Result<()> {
        jobs.par_iter().try_for_each(|job| self.run_job(job))
    }

    /// Plan and run in one step.
    pub fn minify(&self, spec: &SyncSpec, ignore: &RegexSet) -> Result<Vec<MinifyJob>> {
        let jobs = self.plan(spec, ignore)?;
        if !jobs.is_empty() {
            info!(files = jobs.len(), "minifying");
        }
        self.run(&jobs)?;
        Ok(jobs)
    }

    fn run_job(&self, job: &MinifyJob) -> Result<()> {
        LocalFs::ensure_parent(&job.output)?;
        debug!(input = %job.input.display(), output = %job.output.display(), "minify");

        let status = self
            .runner
            .invoke(&job.command)
            .map_err(|source| SyncError::MinifierSpawn {
                command: job.command.clone(),
                source,
            })?;

        if status != 0 {
            return Err(SyncError::Minification {
                command: job.command.clone(),
                input: job.input.clone(),
                status,
            });
        }
        Ok(())
    }
}
