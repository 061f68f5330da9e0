//! Workflow definitions and the built-in registry.
//!
//! A workflow is a flat, ordered list of steps assembled by phase from a
//! fixed repository table: all clones, then all builds, then all packs,
//! then all manifest rewrites, then all cache strips, then all retests.
//! The phase ordering matters: the rewrite phase needs every tarball from
//! the pack phase to exist, because repositories depend on each other's
//! artifacts.

mod manifest;
mod runner;
mod status;
mod step;

pub use manifest::rewrite;
pub use runner::{RunReport, WorkflowRunner, ARCHIVE_FILE};
pub use status::{RunState, RunStatus, StepRecord, STATUS_FILE};
pub use step::StepSpec;

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

/// A repository participating in a workflow.
#[derive(Debug, Clone, Copy)]
pub struct Repo {
    /// Directory name under the work dir, also the packed tarball stem
    pub dir: &'static str,

    /// Git URL to clone from
    pub url: &'static str,

    /// Published package name, rewritten in sibling manifests
    pub package: &'static str,

    /// Branch to check out, when not the default
    pub branch: Option<&'static str>,
}

/// A named, ordered list of steps over a set of repositories.
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Registry name, as given on the command line
    pub name: String,

    /// Repositories the workflow operates on
    pub repos: Vec<Repo>,

    /// Steps in execution order
    pub steps: Vec<StepSpec>,
}

const HASHES: Repo = Repo {
    dir: "hashes",
    url: "https://github.com/paulmillr/noble-hashes",
    package: "@noble/hashes",
    branch: None,
};

const CURVES: Repo = Repo {
    dir: "curves",
    url: "https://github.com/paulmillr/noble-curves",
    package: "@noble/curves",
    branch: None,
};

const CIPHERS: Repo = Repo {
    dir: "ciphers",
    url: "https://github.com/paulmillr/noble-ciphers",
    package: "@noble/ciphers",
    branch: None,
};

const STARKNET: Repo = Repo {
    dir: "starknet",
    url: "https://github.com/paulmillr/scure-starknet",
    package: "@scure/starknet",
    branch: None,
};

const KEYGEN: Repo = Repo {
    dir: "keygen",
    url: "https://github.com/paulmillr/micro-key-producer",
    package: "micro-key-producer",
    branch: None,
};

static REGISTRY: Lazy<Vec<Workflow>> = Lazy::new(|| {
    vec![
        assemble("noble", &[HASHES, CURVES, CIPHERS]),
        assemble("scure", &[HASHES, CURVES, STARKNET, KEYGEN]),
    ]
});

/// All built-in workflows, in registration order.
pub fn registry() -> &'static [Workflow] {
    &REGISTRY
}

/// Look up a workflow by its registered name.
pub fn find(name: &str) -> Option<&'static Workflow> {
    REGISTRY.iter().find(|workflow| workflow.name == name)
}

/// Build the phase-ordered step list for a set of repositories.
///
/// Test runners in the family honor `MSHOULD_QUIET` and `MSHOULD_FAST`,
/// so those are exported first to keep captured output readable and test
/// runs short.
pub fn assemble(name: &str, repos: &[Repo]) -> Workflow {
    let mut steps = vec![
        StepSpec::SetEnv { key: "MSHOULD_QUIET".into(), value: "1".into() },
        StepSpec::SetEnv { key: "MSHOULD_FAST".into(), value: "1".into() },
    ];

    for repo in repos {
        steps.push(StepSpec::Clone {
            dir: repo.dir.into(),
            url: repo.url.into(),
            branch: repo.branch.map(String::from),
        });
    }

    for repo in repos {
        steps.push(StepSpec::Exec {
            dir: repo.dir.into(),
            command: "npm install && npm run build".into(),
        });
    }

    for repo in repos {
        steps.push(StepSpec::Exec {
            dir: repo.dir.into(),
            command: format!("npm pack && mv *.tgz ../{}.tgz", repo.dir),
        });
    }

    let deps: BTreeMap<String, String> =
        repos.iter().map(|repo| (repo.package.to_string(), format!("{}.tgz", repo.dir))).collect();
    for repo in repos {
        steps.push(StepSpec::RewriteDeps { dir: repo.dir.into(), deps: deps.clone() });
    }

    for repo in repos {
        steps.push(StepSpec::CleanDir { dir: format!("{}/node_modules", repo.dir) });
    }

    for repo in repos {
        steps.push(StepSpec::Exec {
            dir: repo.dir.into(),
            command: "npm install && npm run build && npm run test".into(),
        });
    }

    Workflow { name: name.to_string(), repos: repos.to_vec(), steps }
}
