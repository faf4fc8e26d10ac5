use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The checkout point requested by the user. Exactly one variant is ever populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetReference {
    BranchName(String),
    CommitId(String),
}

impl TargetReference {
    /// Build a reference from the two optional inputs.
    ///
    /// Empty strings count as absent. Supplying both is checked before
    /// supplying neither.
    pub fn new(branch: Option<&str>, commit: Option<&str>) -> Result<Self, ValidationError> {
        let branch = branch.filter(|b| !b.is_empty());
        let commit = commit.filter(|c| !c.is_empty());

        match (branch, commit) {
            (Some(branch), Some(commit)) => Err(ValidationError::Conflicting {
                branch: branch.to_string(),
                commit: commit.to_string(),
            }),
            (None, None) => Err(ValidationError::Missing),
            (Some(branch), None) => Ok(TargetReference::BranchName(branch.to_string())),
            (None, Some(commit)) => Ok(TargetReference::CommitId(commit.to_string())),
        }
    }
}

impl std::fmt::Display for TargetReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetReference::BranchName(b) => write!(f, "branch '{}'", b),
            TargetReference::CommitId(c) => write!(f, "commit {}", c),
        }
    }
}

/// A single immutable commit identifier produced by resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedCommit(String);

impl ResolvedCommit {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResolvedCommit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A previously built artifact keyed by a platform fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    /// Filesystem locations the artifact occupies, in order.
    pub paths: Vec<PathBuf>,
    pub hit: bool,
}

impl CacheEntry {
    pub fn hit(key: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            key: key.into(),
            paths,
            hit: true,
        }
    }

    pub fn miss(key: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            key: key.into(),
            paths,
            hit: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Python,
    Node,
    Rust,
    Java,
}

impl Ecosystem {
    /// Package manager names understood by the analysis tool for this ecosystem.
    pub fn package_managers(&self) -> &'static [&'static str] {
        match self {
            Ecosystem::Python => &["PIP", "Pipenv", "Poetry"],
            Ecosystem::Node => &["NPM", "Yarn", "PNPM"],
            Ecosystem::Rust => &["Cargo"],
            Ecosystem::Java => &["Gradle", "Maven"],
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ecosystem::Python => write!(f, "Python"),
            Ecosystem::Node => write!(f, "Node"),
            Ecosystem::Rust => write!(f, "Rust"),
            Ecosystem::Java => write!(f, "Java"),
        }
    }
}

/// Where an ecosystem's manifests live and where its attribution file goes,
/// both relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemTarget {
    pub ecosystem: Ecosystem,
    pub manifest_dir: PathBuf,
    pub output: PathBuf,
}

impl EcosystemTarget {
    pub fn new(ecosystem: Ecosystem, manifest_dir: &str, output: &str) -> Self {
        Self {
            ecosystem,
            manifest_dir: PathBuf::from(manifest_dir),
            output: PathBuf::from(output),
        }
    }

    /// The four attribution targets produced for the repository.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(Ecosystem::Python, "python", "python/THIRD_PARTY_LICENSES_PYTHON"),
            Self::new(Ecosystem::Node, "node", "node/THIRD_PARTY_LICENSES_NODE"),
            Self::new(Ecosystem::Rust, "glide-core", "glide-core/THIRD_PARTY_LICENSES_RUST"),
            Self::new(Ecosystem::Java, "java", "java/THIRD_PARTY_LICENSES_JAVA"),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionStatus {
    Created,
    Updated,
    Unchanged,
    Skipped,
}

impl std::fmt::Display for AttributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributionStatus::Created => write!(f, "created"),
            AttributionStatus::Updated => write!(f, "updated"),
            AttributionStatus::Unchanged => write!(f, "unchanged"),
            AttributionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributionReport {
    pub ecosystem: Ecosystem,
    pub output: PathBuf,
    pub status: AttributionStatus,
}
