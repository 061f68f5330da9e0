//! Integr - integration test orchestrator for package families.
//!
//! Clones every repository of a workflow, builds and packs each one, rewires
//! their manifests to the freshly built tarballs, then reinstalls and runs
//! every test suite against the cross-linked set.

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use integr::report::format_duration;
use integr::{workflow, Config, ShellRunner, WorkflowRunner};

/// Integration test orchestrator for package families
#[derive(Parser)]
#[command(name = "integr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Workflows to run (all registered workflows if omitted)
    #[arg(value_name = "WORKFLOW")]
    workflows: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Dry run mode - print every step without performing it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Directory repositories are cloned into
    #[arg(long, value_name = "DIR", env = "INTEGR_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Directory run records and logs are written under
    #[arg(long, value_name = "DIR", env = "INTEGR_LOGS_ROOT")]
    logs_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered workflows and their repositories
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        None => {
            cmd_run(&cli.workflows, cli.work_dir.clone(), cli.logs_root.clone(), cli.dry_run)?;
        }
        Some(Commands::List { format }) => {
            cmd_list(&format)?;
        }
        Some(Commands::Completions { shell }) => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

/// Run the requested workflows in order.
fn cmd_run(
    names: &[String],
    work_dir: Option<PathBuf>,
    logs_root: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(dir) = work_dir {
        config.work_dir = dir;
    }
    if let Some(dir) = logs_root {
        config.logs_root = dir;
    }
    if dry_run {
        config.dry_run = true;
    }
    config.normalize()?;

    // Resolve every requested name up front; unknown names are reported but
    // do not block the known ones.
    let mut selected = Vec::new();
    let mut unknown = Vec::new();
    if names.is_empty() {
        selected.extend(workflow::registry());
    } else {
        for name in names {
            match workflow::find(name) {
                Some(wf) => selected.push(wf),
                None => unknown.push(name.as_str()),
            }
        }
    }

    for name in &unknown {
        let err = integr::Error::UnknownWorkflow((*name).to_string());
        eprintln!("{}", err.to_string().red());
    }
    if !unknown.is_empty() {
        let known: Vec<_> = workflow::registry().iter().map(|wf| wf.name.as_str()).collect();
        eprintln!("available workflows: {}", known.join(", "));
    }

    let shell = ShellRunner::new();
    let runner = WorkflowRunner::new(&shell, &config);

    let start = Instant::now();
    let mut reports = Vec::new();
    for wf in &selected {
        reports.push(runner.run(wf)?);
    }

    println!();
    for report in &reports {
        if report.success() {
            println!(
                "{} {} ({})",
                "ok".green().bold(),
                report.name,
                format_duration(report.duration_ms)
            );
        } else {
            let step = report.failed_step.as_deref().unwrap_or("unknown step");
            println!(
                "{} {} at {} ({})",
                "failed".red().bold(),
                report.name,
                step,
                format_duration(report.duration_ms)
            );
        }
    }
    println!("Total: {}", format_duration(start.elapsed().as_millis() as u64));

    if reports.iter().any(|r| !r.success()) || !unknown.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

/// List registered workflows.
fn cmd_list(format: &str) -> Result<()> {
    let workflows = workflow::registry();

    match format {
        "json" => {
            let entries: Vec<_> = workflows
                .iter()
                .map(|wf| {
                    serde_json::json!({
                        "name": wf.name,
                        "steps": wf.steps.len(),
                        "repos": wf.repos.iter().map(|repo| {
                            serde_json::json!({
                                "dir": repo.dir,
                                "package": repo.package,
                                "url": repo.url,
                            })
                        }).collect::<Vec<_>>(),
                    })
                })
                .collect();

            let json = serde_json::to_string_pretty(&entries)?;
            println!("{json}");
        }
        _ => {
            for wf in workflows {
                println!("{} ({} steps)", wf.name.bold(), wf.steps.len());
                for repo in &wf.repos {
                    println!("  {} <- {}", repo.package, repo.url);
                }
                println!();
            }
            println!("Total: {} workflows", workflows.len());
        }
    }

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "integr", &mut io::stdout());
}
