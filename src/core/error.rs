//! Error types for workflow execution.
//!
//! Step failures are fatal to the workflow that raised them but never to
//! sibling workflows in the same invocation.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while running a workflow.
#[derive(Debug, Error)]
pub enum Error {
    /// A shell command exited unsuccessfully.
    #[error("command failed in {} ({})", .dir.display(), exit_label(.code))]
    CommandFailed {
        /// Directory the command ran in
        dir: PathBuf,

        /// Exit code, if the process exited normally
        code: Option<i32>,

        /// Combined stdout and stderr captured before the failure
        output: String,
    },

    /// The dependency-rewrite step found no manifest to rewrite.
    #[error("no package.json found at {}", .path.display())]
    ManifestMissing {
        /// Expected manifest location
        path: PathBuf,
    },

    /// A manifest exists but is not valid JSON.
    #[error("failed to parse {}: {}", .path.display(), .source)]
    ManifestMalformed {
        /// Manifest location
        path: PathBuf,

        /// Underlying parse error
        source: serde_json::Error,
    },

    /// A requested workflow name is not in the registry.
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),

    /// The end-of-run log archive could not be produced.
    ///
    /// Best effort only: callers report this without changing the
    /// recorded outcome of the run.
    #[error("failed to archive logs in {}: {}", .dir.display(), .detail)]
    ArchiveFailed {
        /// Run directory the archive was meant to land in
        dir: PathBuf,

        /// What the archiver said
        detail: String,
    },

    /// Filesystem or process-spawn error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error while persisting run state.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = Error::CommandFailed {
            dir: PathBuf::from("/work/curves"),
            code: Some(3),
            output: String::new(),
        };
        assert_eq!(err.to_string(), "command failed in /work/curves (exit code 3)");

        let err = Error::CommandFailed {
            dir: PathBuf::from("/work/curves"),
            code: None,
            output: String::new(),
        };
        assert_eq!(err.to_string(), "command failed in /work/curves (terminated by signal)");
    }

    #[test]
    fn test_manifest_missing_display() {
        let err = Error::ManifestMissing { path: PathBuf::from("/work/curves/package.json") };
        assert_eq!(err.to_string(), "no package.json found at /work/curves/package.json");
    }

    #[test]
    fn test_unknown_workflow_display() {
        let err = Error::UnknownWorkflow("nope".to_string());
        assert_eq!(err.to_string(), "unknown workflow: nope");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io);
        assert!(matches!(err, Error::Io(_)));
    }
}
