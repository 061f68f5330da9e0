//! Core types and functionality for integr.
//!
//! This module contains the fundamental building blocks shared by every
//! workflow: configuration, the run context, shell execution, and the
//! crate-wide error type.

mod config;
mod context;
mod error;
mod executor;

pub use config::{Config, ENV_DRY_RUN, ENV_LOGS_ROOT, ENV_WORK_DIR};
pub use context::{sanitize_name, RepoMetadata, RunContext, DATE_FORMAT};
pub use error::{Error, Result};
pub use executor::{CommandRunner, ExecutionResult, ShellRunner};
