//! # Integr
//!
//! Integration test orchestrator for families of interdependent packages.
//!
//! Integr clones every repository of a package family, builds each one,
//! packs the build outputs into tarballs, rewrites the manifests so the
//! packages depend on each other's local tarballs instead of the registry,
//! then reinstalls and runs every test suite against the linked set.
//!
//! ## Features
//!
//! - **Cross-linking**: `file:` tarball references replace registry versions
//! - **Forensics**: per-step logs plus a status record rewritten after every transition
//! - **Fail fast**: the first failing step stops the run with state left on disk
//! - **Dry runs**: print the plan without touching the filesystem
//! - **Cross-Platform**: Works on Linux, macOS, and Windows
//!
//! ## Quick Start
//!
//! ```bash
//! # Install
//! cargo install integr
//!
//! # See the built-in workflows
//! integr list
//!
//! # Run one
//! integr noble
//! ```

pub mod core;
pub mod report;
pub mod workflow;

// Re-export commonly used types
pub use core::{CommandRunner, Config, Error, ExecutionResult, Result, RunContext, ShellRunner};
pub use workflow::{registry, RunReport, RunState, RunStatus, Workflow, WorkflowRunner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "integr";
