//! Error taxonomy for reference resolution and the build gate.
//!
//! Every variant is terminal: nothing here is retried or recovered locally.

use thiserror::Error;

/// Invalid or unresolvable target reference.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Both a branch name and a commit id were supplied.
    #[error("both branch '{branch}' and commit '{commit}' were supplied; pass exactly one")]
    Conflicting { branch: String, commit: String },

    /// Neither a branch name nor a commit id was supplied.
    #[error("no branch name or commit id supplied; pass exactly one")]
    Missing,

    /// The named branch could not be turned into a commit id.
    #[error("failed to resolve branch '{branch}' to a commit: {reason}")]
    ResolutionFailed { branch: String, reason: String },
}

/// The expensive acquisition-and-build step failed.
#[derive(Error, Debug)]
#[error("`{command}` failed ({status}): {stderr}")]
pub struct BuildError {
    pub command: String,
    pub status: String,
    pub stderr: String,
}

impl BuildError {
    pub fn new(command: impl Into<String>, status: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum GateError {
    #[error("build for cache key '{key}' failed")]
    BuildFailed {
        key: String,
        #[source]
        source: BuildError,
    },
}
