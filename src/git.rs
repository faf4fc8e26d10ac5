//! Thin wrapper around the `git` binary.
//!
//! Commands run through [`GitCommand`], which captures stdout, logs each
//! invocation at debug level, and turns a non-zero exit into an error that
//! carries git's stderr.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::config::ResolveMode;
use crate::resolver::RefSource;

/// Fluent builder for a single `git` invocation.
#[derive(Debug, Default)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    context: Option<String>,
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git as if started in `dir` (`git -C <dir>`).
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Short description used in log lines and error messages.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Execute and return the raw process output, whatever the exit status.
    pub async fn output(self) -> Result<(String, Output)> {
        let mut full_args = Vec::new();
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        let label = self
            .context
            .clone()
            .unwrap_or_else(|| format!("git {}", self.args.join(" ")));
        tracing::debug!(target: "git", "({}) git {}", label, full_args.join(" "));

        let output = Command::new("git")
            .args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to spawn git for: {}", label))?;

        if !output.status.success() {
            tracing::debug!(target: "git", "({}) exited with {:?}", label, output.status.code());
        }
        Ok((label, output))
    }

    /// Execute and return stdout exactly as git printed it.
    pub async fn execute_raw_stdout(self) -> Result<String> {
        let (label, output) = self.output().await?;
        if !output.status.success() {
            bail!(
                "{} failed: {}",
                label,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Execute and return trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        Ok(self.execute_raw_stdout().await?.trim().to_string())
    }

    /// Execute, discarding stdout.
    pub async fn execute_success(self) -> Result<()> {
        self.execute_raw_stdout().await.map(|_| ())
    }
}

/// `git rev-parse --verify --quiet <rev>^{commit}`.
///
/// `Ok(None)` only when git reports the rev as missing (exit 1, no stderr);
/// any other failure is an error.
pub async fn rev_parse(repo: &Path, rev: &str) -> Result<Option<String>> {
    let (label, output) = GitCommand::new()
        .current_dir(repo)
        .args(["rev-parse", "--verify", "--quiet"])
        .arg(format!("{}^{{commit}}", rev))
        .with_context(format!("rev-parse {}", rev))
        .output()
        .await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() {
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return Ok(Some(sha).filter(|sha| !sha.is_empty()));
    }
    if output.status.code() == Some(1) && stderr.trim().is_empty() {
        return Ok(None);
    }
    bail!("{} failed: {}", label, stderr.trim())
}

/// Commit currently checked out in `repo`.
pub async fn head_commit(repo: &Path) -> Result<String> {
    GitCommand::new()
        .current_dir(repo)
        .args(["rev-parse", "HEAD"])
        .with_context("rev-parse HEAD")
        .execute_stdout()
        .await
}

/// Query `remote` for the tip of `refs/heads/<branch>`.
pub async fn ls_remote_branch(repo: &Path, remote: &str, branch: &str) -> Result<Option<String>> {
    let wanted = format!("refs/heads/{}", branch);
    let stdout = GitCommand::new()
        .current_dir(repo)
        .args(["ls-remote", "--heads", remote])
        .arg(wanted.as_str())
        .with_context(format!("ls-remote {} {}", remote, wanted))
        .execute_stdout()
        .await?;

    parse_ls_remote(&stdout, &wanted)
}

/// Pick the sha advertised for exactly `wanted` out of `git ls-remote` output.
fn parse_ls_remote(stdout: &str, wanted: &str) -> Result<Option<String>> {
    let re = Regex::new(r"^([0-9a-f]{40,64})\s+(\S+)$")?;
    Ok(stdout
        .lines()
        .filter_map(|line| re.captures(line.trim()))
        .find(|caps| &caps[2] == wanted)
        .map(|caps| caps[1].to_string()))
}

/// Detach HEAD at `commit`, fetching it from `remote` first when it is not present locally.
pub async fn checkout_detached(repo: &Path, remote: &str, commit: &str) -> Result<()> {
    if rev_parse(repo, commit).await?.is_none() {
        GitCommand::new()
            .current_dir(repo)
            .args(["fetch", "--quiet", remote, commit])
            .with_context(format!("fetch {}", commit))
            .execute_success()
            .await?;
    }

    GitCommand::new()
        .current_dir(repo)
        .args(["checkout", "--quiet", "--detach", commit])
        .with_context(format!("checkout {}", commit))
        .execute_success()
        .await
}

/// Shallow clone of `url` at tag or branch `reference` into `target`.
pub async fn clone_shallow(url: &str, reference: &str, target: &Path) -> Result<()> {
    GitCommand::new()
        .args(["clone", "--quiet", "--depth", "1", "--branch", reference, url])
        .arg(target.display().to_string())
        .with_context(format!("clone {}@{}", url, reference))
        .execute_success()
        .await
}

/// Paths among `paths` whose working-tree content differs from HEAD or that are untracked.
pub async fn changed_paths(repo: &Path, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    let pathspec: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();

    let stdout = GitCommand::new()
        .current_dir(repo)
        .args(["status", "--porcelain", "-z", "--untracked-files=all", "--"])
        .args(pathspec)
        .with_context("status of attribution files")
        .execute_raw_stdout()
        .await?;

    Ok(parse_porcelain_z(&stdout))
}

/// Paths out of `git status --porcelain -z` records (`XY <path>\0`).
///
/// Renames and copies carry the source path as an extra record, which is skipped.
fn parse_porcelain_z(stdout: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut records = stdout.split('\0').filter(|r| !r.is_empty());
    while let Some(record) = records.next() {
        let Some(path) = record.get(3..) else {
            continue;
        };
        let status = &record.as_bytes()[..2];
        if status.contains(&b'R') || status.contains(&b'C') {
            records.next();
        }
        paths.push(PathBuf::from(path));
    }
    paths
}

/// [`RefSource`] backed by the `git` binary operating on a local clone.
pub struct GitRefSource {
    repo: PathBuf,
    remote: String,
    mode: ResolveMode,
}

impl GitRefSource {
    pub fn new(repo: impl Into<PathBuf>, remote: impl Into<String>, mode: ResolveMode) -> Self {
        Self {
            repo: repo.into(),
            remote: remote.into(),
            mode,
        }
    }
}

#[async_trait]
impl RefSource for GitRefSource {
    async fn branch_tip(&self, branch: &str) -> Result<String> {
        match self.mode {
            ResolveMode::Remote => ls_remote_branch(&self.repo, &self.remote, branch)
                .await?
                .with_context(|| format!("branch '{}' not found on remote '{}'", branch, self.remote)),
            ResolveMode::Local => {
                let remote_ref = format!("refs/remotes/{}/{}", self.remote, branch);
                if let Some(sha) = rev_parse(&self.repo, &remote_ref).await? {
                    return Ok(sha);
                }
                rev_parse(&self.repo, &format!("refs/heads/{}", branch))
                    .await?
                    .with_context(|| format!("branch '{}' not found locally", branch))
            }
            ResolveMode::Head => {
                tracing::warn!(
                    "resolve mode 'head' ignores branch '{}' and uses the current checkout",
                    branch
                );
                head_commit(&self.repo).await
            }
        }
    }
}
