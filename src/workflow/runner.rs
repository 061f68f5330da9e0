//! Workflow execution engine.
//!
//! Runs steps strictly in order, one at a time. After every step state
//! transition the status record is rewritten in full, each step's output
//! is flushed to its own log file, and the first failure stops the run
//! while leaving everything on disk for inspection. Nothing is ever
//! rolled back.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use colored::Colorize;

use crate::core::{CommandRunner, Config, Error, Result, RunContext};
use crate::report::format_duration;
use crate::workflow::status::{RunState, RunStatus};
use crate::workflow::step::StepSpec;
use crate::workflow::Workflow;

/// Name of the compressed bundle of the logs directory.
pub const ARCHIVE_FILE: &str = "logs.tar.bz2";

/// Steps slower than this get a duration notice.
const SLOW_STEP_MS: u64 = 15_000;

/// Outcome of a single workflow run.
#[derive(Debug)]
pub struct RunReport {
    /// Workflow name
    pub name: String,

    /// Final state, `Done` or `Failed`
    pub status: RunState,

    /// Total elapsed milliseconds
    pub duration_ms: u64,

    /// Directory holding the status record and logs; absent in dry runs
    pub run_dir: Option<PathBuf>,

    /// Display name of the step that failed, if any
    pub failed_step: Option<String>,
}

impl RunReport {
    /// Whether the run completed without failure.
    pub fn success(&self) -> bool {
        self.status == RunState::Done
    }
}

/// Sequential executor for workflows.
///
/// Exactly one step runs at a time; each blocks until its subprocess
/// exits. No timeouts are enforced, so a hung command hangs the run.
pub struct WorkflowRunner<'a> {
    runner: &'a dyn CommandRunner,
    work_dir: PathBuf,
    logs_root: PathBuf,
    dry_run: bool,
}

impl<'a> WorkflowRunner<'a> {
    /// Create a runner from resolved configuration.
    pub fn new(runner: &'a dyn CommandRunner, config: &Config) -> Self {
        Self {
            runner,
            work_dir: config.work_dir.clone(),
            logs_root: config.logs_root.clone(),
            dry_run: config.dry_run,
        }
    }

    /// Run every step of `workflow` in order, stopping at the first
    /// failure.
    ///
    /// Step failures are contained: the run is marked failed, forensic
    /// state stays on disk, and the report names the failing step. An
    /// `Err` from this function means the runner could not persist its
    /// own artifacts (status record or log files).
    pub fn run(&self, workflow: &Workflow) -> Result<RunReport> {
        let start = Instant::now();
        let mut ctx =
            RunContext::new(&workflow.name, self.work_dir.clone(), &self.logs_root, self.dry_run);

        // The log-dir step is part of the run so it is logged and fails
        // like any other step.
        let mut steps = Vec::with_capacity(workflow.steps.len() + 1);
        steps.push(StepSpec::EnsureDir { dir: ctx.log_dir.display().to_string() });
        steps.extend(workflow.steps.iter().cloned());

        println!();
        println!("{}", format!("== {} ({} steps)", workflow.name, steps.len()).bold());

        if !self.dry_run {
            fs::create_dir_all(&ctx.work_dir)?;
            fs::create_dir_all(&ctx.run_dir)?;
        }

        let mut status = RunStatus::new(&ctx);

        for (index, step) in steps.iter().enumerate() {
            let name = step.display_name();
            println!("{}", format!("# {index} {name} started").yellow());
            tracing::debug!(step = index, name = %name, "step started");

            status.begin_step(index, &name);
            self.persist(&mut status, &ctx)?;

            let step_start = Instant::now();
            let result = step.run(&mut ctx, self.runner);
            let duration_ms = step_start.elapsed().as_millis() as u64;
            let log_name = step.log_file_name(index);

            match result {
                Ok(()) => {
                    let log_path = self.flush_log(&mut ctx, &log_name)?;
                    status.finish_step(duration_ms, log_path);
                    self.persist(&mut status, &ctx)?;

                    if duration_ms >= SLOW_STEP_MS || name.contains("test") {
                        println!(
                            "{}",
                            format!("# {index} {name} took {}", format_duration(duration_ms))
                                .green()
                        );
                    }
                }
                Err(e) => {
                    // Preserve whatever the step captured, plus the error
                    ctx.record(format!("# step failed: {e}"));
                    let log_path = self.flush_log(&mut ctx, &log_name)?;
                    status.fail_step(duration_ms, log_path);
                    status.duration_ms = Some(start.elapsed().as_millis() as u64);
                    self.persist(&mut status, &ctx)?;

                    println!("{}", format!("# {index} {name} failed: {e}").red().bold());
                    tracing::error!(step = index, name = %name, error = %e, "step failed");

                    self.archive(&ctx);
                    return Ok(RunReport {
                        name: ctx.name.clone(),
                        status: RunState::Failed,
                        duration_ms: start.elapsed().as_millis() as u64,
                        run_dir: self.persisted_run_dir(&ctx),
                        failed_step: Some(name),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        status.finish(duration_ms);
        self.persist(&mut status, &ctx)?;
        self.archive(&ctx);

        println!("{}", format!("== {} done in {}", ctx.name, format_duration(duration_ms)).green());

        Ok(RunReport {
            name: ctx.name.clone(),
            status: RunState::Done,
            duration_ms,
            run_dir: self.persisted_run_dir(&ctx),
            failed_step: None,
        })
    }

    /// Rewrite the full status record, refreshing the context snapshot.
    fn persist(&self, status: &mut RunStatus, ctx: &RunContext) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        status.snapshot_context(ctx);
        status.save(&ctx.run_dir)
    }

    /// Write the buffered step output to its log file and clear the
    /// buffer. Returns the path recorded in the status file, relative to
    /// the run directory.
    fn flush_log(&self, ctx: &mut RunContext, file_name: &str) -> Result<Option<String>> {
        let output = ctx.take_output();
        if self.dry_run {
            return Ok(None);
        }
        fs::write(ctx.log_dir.join(file_name), output)?;
        Ok(Some(format!("logs/{file_name}")))
    }

    /// Compress the logs directory into `logs.tar.bz2` inside the run
    /// directory. Best effort: failure is reported but never changes the
    /// recorded run outcome, and the uncompressed logs stay in place.
    fn archive(&self, ctx: &RunContext) {
        if self.dry_run {
            return;
        }

        let command = format!("tar -cjf {ARCHIVE_FILE} logs");
        let failure = match self.runner.run(&command, &ctx.run_dir, &ctx.env) {
            Ok(result) if result.success => None,
            Ok(result) => Some(result.combined().trim().to_string()),
            Err(e) => Some(e.to_string()),
        };

        if let Some(detail) = failure {
            let err = Error::ArchiveFailed { dir: ctx.run_dir.clone(), detail };
            tracing::warn!(error = %err, "log archival failed");
            eprintln!("{}", format!("warning: {err}").yellow());
        }
    }

    fn persisted_run_dir(&self, ctx: &RunContext) -> Option<PathBuf> {
        if self.dry_run {
            None
        } else {
            Some(ctx.run_dir.clone())
        }
    }
}
