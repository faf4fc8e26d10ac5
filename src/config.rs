use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::EcosystemTarget;

/// Root configuration structure, deserialized from `.license-attribution/config.toml`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reference: ReferenceConfig,
    pub tool: ToolConfig,
    pub cache: CacheConfig,
    /// Ecosystems to generate attribution files for, in run order.
    pub ecosystems: Vec<EcosystemTarget>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reference: ReferenceConfig::default(),
            tool: ToolConfig::default(),
            cache: CacheConfig::default(),
            ecosystems: EcosystemTarget::defaults(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Branch used when neither a branch nor a commit is passed.
    pub default_branch: String,
    pub remote: String,
    pub resolve_mode: ResolveMode,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            remote: "origin".to_string(),
            resolve_mode: ResolveMode::Remote,
        }
    }
}

/// How a branch name is turned into a commit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// Ask the remote for the branch tip (`git ls-remote`).
    Remote,
    /// Use the local remote-tracking ref, then the local branch.
    Local,
    /// Use whatever is currently checked out, ignoring the branch name.
    Head,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Short name used in the cache key.
    pub name: String,
    pub repository: String,
    /// Tag or branch of `repository` to build.
    pub version: String,
    /// Where the tool's sources are cloned, relative to the repository root.
    pub source_dir: PathBuf,
    /// Command run inside `source_dir` to build the tool.
    pub build_command: Vec<String>,
    /// Installed tool directory, relative to `source_dir`. Cached.
    pub install_dir: PathBuf,
    /// Executable, relative to `install_dir`.
    pub binary: PathBuf,
    /// Tool configuration file written before analysis.
    pub config_file: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            name: "ort".to_string(),
            repository: "https://github.com/oss-review-toolkit/ort.git".to_string(),
            version: "26.0.0".to_string(),
            source_dir: PathBuf::from("ort"),
            build_command: vec!["./gradlew".to_string(), "installDist".to_string()],
            install_dir: PathBuf::from("cli/build/install/ort"),
            binary: PathBuf::from("bin/ort"),
            config_file: dirs::home_dir().map(|h| h.join(".ort").join("config").join("config.yml")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache store root. Defaults to `~/.cache/license-attribution`.
    pub dir: Option<PathBuf>,
    /// Package-manager caches saved alongside the installed tool.
    pub extra_paths: Vec<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let extra_paths = dirs::home_dir()
            .map(|home| {
                vec![
                    home.join(".gradle").join("caches"),
                    home.join(".gradle").join("wrapper"),
                ]
            })
            .unwrap_or_default();

        Self {
            dir: None,
            extra_paths,
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`, the path passed via `--config`
/// 2. `<repo>/.license-attribution/config.toml`
/// 3. `~/.config/license-attribution/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(repo: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = repo.join(".license-attribution").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("license-attribution")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

/// Everything a run needs, assembled once from the config file and CLI flags.
#[derive(Debug)]
pub struct RunConfig {
    pub repo: PathBuf,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub remote: String,
    pub resolve_mode: ResolveMode,
    pub tool: ToolConfig,
    pub cache_dir: PathBuf,
    pub extra_cache_paths: Vec<PathBuf>,
    pub ecosystems: Vec<EcosystemTarget>,
}

impl RunConfig {
    /// Merge `config` with command-line overrides.
    ///
    /// The default branch only applies when neither reference was passed at
    /// all; explicitly empty values reach the resolver as given.
    pub fn new(
        config: Config,
        repo: PathBuf,
        branch: Option<String>,
        commit: Option<String>,
        resolve_mode: Option<ResolveMode>,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let branch = match (&branch, &commit) {
            (None, None) => Some(config.reference.default_branch.clone()),
            _ => branch,
        };

        let cache_dir = cache_dir
            .or(config.cache.dir)
            .or_else(|| dirs::cache_dir().map(|d| d.join("license-attribution")))
            .context("Could not determine a cache directory; pass --cache-dir")?;

        Ok(Self {
            repo,
            branch,
            commit,
            remote: config.reference.remote,
            resolve_mode: resolve_mode.unwrap_or(config.reference.resolve_mode),
            tool: config.tool,
            cache_dir,
            extra_cache_paths: config.cache.extra_paths,
            ecosystems: config.ecosystems,
        })
    }

    pub fn tool_source_dir(&self) -> PathBuf {
        self.repo.join(&self.tool.source_dir)
    }

    pub fn tool_install_dir(&self) -> PathBuf {
        self.tool_source_dir().join(&self.tool.install_dir)
    }

    pub fn tool_binary(&self) -> PathBuf {
        self.tool_install_dir().join(&self.tool.binary)
    }

    /// Paths saved under the cache key: the installed tool first, then package-manager caches.
    pub fn cache_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.tool_install_dir()];
        paths.extend(self.extra_cache_paths.iter().cloned());
        paths
    }
}
