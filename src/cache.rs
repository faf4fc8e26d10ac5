//! Artifact cache keyed by a platform fingerprint.
//!
//! [`CacheStore`] is the capability the run depends on. [`FsCacheStore`]
//! keeps entries under a local directory:
//!
//! ```text
//! <root>/<key>/entry.json   key + source paths
//! <root>/<key>/0/ ...       copy of paths[0]
//! <root>/<key>/1/ ...       copy of paths[1]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::models::CacheEntry;

const ENTRY_FILE: &str = "entry.json";

pub trait CacheStore {
    /// Look `key` up; on a hit the stored paths are restored onto disk first.
    fn lookup(&self, key: &str, paths: &[PathBuf]) -> Result<CacheEntry>;

    /// Persist `paths` under `key`, replacing any previous entry.
    fn store(&self, key: &str, paths: &[PathBuf]) -> Result<()>;
}

/// Platform fingerprint for the installed tool: `<os>-<arch>-<tool>-<version>`.
pub fn cache_key(tool: &str, version: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        tool,
        version
    )
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    paths: Vec<PathBuf>,
}

pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_dir(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(sanitize_key(key)?))
    }
}

impl CacheStore for FsCacheStore {
    fn lookup(&self, key: &str, paths: &[PathBuf]) -> Result<CacheEntry> {
        let dir = self.entry_dir(key)?;
        let manifest = dir.join(ENTRY_FILE);
        if !manifest.exists() {
            tracing::debug!("no cache entry at {}", dir.display());
            return Ok(CacheEntry::miss(key, paths.to_vec()));
        }

        let content = fs::read_to_string(&manifest)
            .with_context(|| format!("Failed to read {}", manifest.display()))?;
        let stored: StoredEntry = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt cache entry {}", manifest.display()))?;

        if stored.key != key || stored.paths != paths {
            tracing::info!("cache entry for '{}' was stored for different paths, ignoring", key);
            return Ok(CacheEntry::miss(key, paths.to_vec()));
        }

        for (index, path) in stored.paths.iter().enumerate() {
            let saved = dir.join(index.to_string());
            if saved.exists() {
                copy_tree(&saved, path)?;
            }
        }

        tracing::info!("restored {} cached path(s) for '{}'", stored.paths.len(), key);
        Ok(CacheEntry::hit(key, stored.paths))
    }

    fn store(&self, key: &str, paths: &[PathBuf]) -> Result<()> {
        let dir = self.entry_dir(key)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to clear {}", dir.display()))?;
        }
        fs::create_dir_all(&dir)?;

        for (index, path) in paths.iter().enumerate() {
            if !path.exists() {
                tracing::warn!("cache path {} does not exist, skipping", path.display());
                continue;
            }
            copy_tree(path, &dir.join(index.to_string()))?;
        }

        let stored = StoredEntry {
            key: key.to_string(),
            paths: paths.to_vec(),
        };
        fs::write(dir.join(ENTRY_FILE), serde_json::to_string_pretty(&stored)?)?;
        tracing::info!("stored cache entry '{}' in {}", key, dir.display());
        Ok(())
    }
}

/// Map a key onto a single safe directory name.
fn sanitize_key(key: &str) -> Result<String> {
    let re = Regex::new(r"[^A-Za-z0-9._-]")?;
    let sanitized = re.replace_all(key, "-").trim_matches('.').to_string();
    anyhow::ensure!(!sanitized.is_empty(), "cache key '{}' is empty after sanitizing", key);
    Ok(sanitized)
}

/// Recursively copy a file or directory `from` to `to`, creating parents.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    if from.is_file() {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to)
            .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
        return Ok(());
    }

    for entry in WalkDir::new(from) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}
