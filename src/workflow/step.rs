//! Workflow step definitions.
//!
//! Each step kind carries its arguments statically, resolves directories
//! against the run context, appends a transcript of what it did to the
//! context's output buffer, and signals failure through [`Error`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::{
    sanitize_name, CommandRunner, Error, ExecutionResult, RepoMetadata, Result, RunContext,
};
use crate::workflow::manifest;

static PAREN_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(.*\)\s*$").unwrap());

/// A single unit of work within a workflow.
///
/// Steps are stateless beyond their arguments; re-running the same step
/// against a fresh context is always safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepSpec {
    /// Run a shell command in a directory.
    Exec {
        /// Directory the command runs in, resolved against the work dir
        dir: String,

        /// Shell command line
        command: String,
    },

    /// Recursively delete a directory tree. Succeeds if it is absent.
    CleanDir {
        /// Directory to remove
        dir: String,
    },

    /// Create a directory and any missing parents. Idempotent.
    EnsureDir {
        /// Directory to create
        dir: String,
    },

    /// Clone a git repository from scratch and record its metadata.
    Clone {
        /// Target directory, also cleaned first
        dir: String,

        /// Git URL to clone from
        url: String,

        /// Branch to check out, when not the default
        branch: Option<String>,
    },

    /// Point manifest dependency entries at locally packed tarballs.
    RewriteDeps {
        /// Directory containing the package.json to rewrite
        dir: String,

        /// Package name to tarball path (relative to the work dir)
        deps: BTreeMap<String, String>,
    },

    /// Set an environment variable for every following command.
    SetEnv {
        /// Variable name
        key: String,

        /// Variable value
        value: String,
    },
}

impl StepSpec {
    /// Step identity for logging: the kind plus serialized arguments.
    pub fn display_name(&self) -> String {
        match self {
            Self::Exec { dir, command } => format!("execute ({dir}: {command})"),
            Self::CleanDir { dir } => format!("clean directory ({dir})"),
            Self::EnsureDir { dir } => format!("ensure directory ({dir})"),
            Self::Clone { dir, url, .. } => format!("clone repository ({dir}: {url})"),
            Self::RewriteDeps { dir, deps } => {
                format!("rewrite dependencies ({dir}: {} packages)", deps.len())
            }
            Self::SetEnv { key, value } => format!("set environment ({key}={value})"),
        }
    }

    /// Log file name for this step at position `index`.
    ///
    /// The parenthesized argument suffix is stripped before sanitizing,
    /// so repeated kinds produce predictable names like `3-execute.log`
    /// distinguished only by the index prefix.
    pub fn log_file_name(&self, index: usize) -> String {
        let display = self.display_name();
        let kind = PAREN_SUFFIX.replace(&display, "");
        format!("{index}-{}.log", sanitize_name(&kind))
    }

    /// Execute the step against `ctx`.
    ///
    /// In dry-run mode the intended effect is printed and nothing is
    /// touched: no filesystem mutation, no subprocess, no context writes.
    pub fn run(&self, ctx: &mut RunContext, runner: &dyn CommandRunner) -> Result<()> {
        if ctx.dry_run {
            println!("{}", format!("[dry-run] {}", self.describe(ctx)).dimmed());
            return Ok(());
        }

        match self {
            Self::Exec { dir, command } => {
                let dir = ctx.resolve_dir(dir);
                run_logged(ctx, runner, &dir, command).map(|_| ())
            }
            Self::CleanDir { dir } => {
                let dir = ctx.resolve_dir(dir);
                clean_dir(ctx, &dir)
            }
            Self::EnsureDir { dir } => {
                let dir = ctx.resolve_dir(dir);
                ensure_dir(ctx, &dir)
            }
            Self::Clone { dir, url, branch } => {
                clone_repo(ctx, runner, dir, url, branch.as_deref())
            }
            Self::RewriteDeps { dir, deps } => rewrite_deps(ctx, dir, deps),
            Self::SetEnv { key, value } => {
                set_env(ctx, key, value);
                Ok(())
            }
        }
    }

    /// One-line description of the intended effect, for dry runs.
    fn describe(&self, ctx: &RunContext) -> String {
        match self {
            Self::Exec { dir, command } => {
                format!("would run `{command}` in {}", ctx.resolve_dir(dir).display())
            }
            Self::CleanDir { dir } => {
                format!("would remove {}", ctx.resolve_dir(dir).display())
            }
            Self::EnsureDir { dir } => {
                format!("would create {}", ctx.resolve_dir(dir).display())
            }
            Self::Clone { dir, url, .. } => {
                format!("would clone {url} into {}", ctx.resolve_dir(dir).display())
            }
            Self::RewriteDeps { dir, deps } => format!(
                "would rewrite {} ({} packages)",
                ctx.resolve_dir(dir).join("package.json").display(),
                deps.len()
            ),
            Self::SetEnv { key, value } => format!("would set {key}={value}"),
        }
    }
}

/// Echo a transcript line to the terminal and the output buffer.
fn echo(ctx: &mut RunContext, line: &str) {
    println!("{}", line.cyan());
    ctx.record(line);
}

/// Run a command through the shell and append the full record to the
/// step output buffer. Captured output is recorded before any failure is
/// signaled, so partial output is never lost.
fn run_logged(
    ctx: &mut RunContext,
    runner: &dyn CommandRunner,
    dir: &Path,
    command: &str,
) -> Result<ExecutionResult> {
    ctx.record(format!("# in {}", dir.display()));
    echo(ctx, &format!("$ {command}"));

    let result = runner.run(command, dir, &ctx.env)?;
    let combined = result.combined();
    if !combined.is_empty() {
        ctx.record(&combined);
    }

    if result.success {
        Ok(result)
    } else {
        Err(Error::CommandFailed { dir: dir.to_path_buf(), code: result.code, output: combined })
    }
}

fn clean_dir(ctx: &mut RunContext, dir: &Path) -> Result<()> {
    echo(ctx, &format!("$ rm -rf {}", dir.display()));
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

fn ensure_dir(ctx: &mut RunContext, dir: &Path) -> Result<()> {
    echo(ctx, &format!("$ mkdir -p {}", dir.display()));
    fs::create_dir_all(dir)?;
    Ok(())
}

fn set_env(ctx: &mut RunContext, key: &str, value: &str) {
    echo(ctx, &format!("$ export {key}={value}"));
    ctx.env.insert(key.to_string(), value.to_string());
}

/// Clean the target, shallow-clone into it, init submodules, then record
/// branch, HEAD commit, and submodule status under the repository URL.
fn clone_repo(
    ctx: &mut RunContext,
    runner: &dyn CommandRunner,
    dir: &str,
    url: &str,
    branch: Option<&str>,
) -> Result<()> {
    let target = ctx.resolve_dir(dir);
    clean_dir(ctx, &target)?;

    let work_dir = ctx.work_dir.clone();
    let branch_arg = branch.map(|b| format!(" -b {b}")).unwrap_or_default();
    let clone_cmd = format!("git clone --depth 1{branch_arg} \"{url}\" \"{}\"", target.display());
    run_logged(ctx, runner, &work_dir, &clone_cmd)?;

    run_logged(ctx, runner, &target, "git submodule update --init --recursive --depth 1")?;

    let head = run_logged(ctx, runner, &target, "git log -1 --format=\"%H %an %s\"")?;
    let last_commit = head.stdout.trim().to_string();

    let submodules = run_logged(ctx, runner, &target, "git submodule status")?;

    ctx.record(format!("# last commit: {last_commit}"));
    ctx.repos.insert(
        url.to_string(),
        RepoMetadata {
            branch: branch.map(String::from),
            last_commit,
            submodules: submodules.stdout.trim().to_string(),
        },
    );

    Ok(())
}

fn rewrite_deps(ctx: &mut RunContext, dir: &str, deps: &BTreeMap<String, String>) -> Result<()> {
    let manifest_path = ctx.resolve_dir(dir).join("package.json");
    echo(ctx, &format!("# rewrite dependencies in {}", manifest_path.display()));

    let applied = manifest::rewrite(&manifest_path, &ctx.work_dir, deps)?;

    if applied.is_empty() {
        ctx.record("#   no matching dependencies");
    }
    for (name, replacement) in &applied {
        ctx.record(format!("#   {name} -> {replacement}"));
    }

    Ok(())
}
