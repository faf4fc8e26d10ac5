//! `license-attribution`: regenerate third-party license attribution files for a commit.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and load config ([`config::load_config`]).
//! 2. Resolve the branch or commit to one commit id ([`resolver::resolve`]).
//! 3. Check the commit out ([`git::checkout_detached`]).
//! 4. Restore the analysis tool from the cache or build it ([`cache`], [`gate::ensure_built`]).
//! 5. Run the tool per ecosystem and install the notices ([`attribution::generate`]).
//! 6. Report which attribution files changed ([`report`]).
//!
//! Any failure exits `1`; there is no partial result.

mod attribution;
mod cache;
mod cli;
mod config;
mod detector;
mod error;
mod gate;
mod git;
mod logging;
mod models;
mod report;
mod resolver;
mod tool;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use cache::{cache_key, CacheStore, FsCacheStore};
use cli::{Cli, Command, RefArgs, ReportFormat, RunArgs};
use config::{load_config, RunConfig};
use gate::{ensure_built, GateOutcome};
use git::GitRefSource;
use models::{Ecosystem, ResolvedCommit};
use report::RunSummary;
use tool::{OrtTool, ToolInstaller};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::Resolve(args) => resolve_command(args).await,
        Command::Run(args) => run_command(args, cli.quiet).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Build the run configuration from the reference flags plus command-specific overrides.
fn build_config(args: RefArgs, cache_dir: Option<PathBuf>) -> Result<RunConfig> {
    let repo = args
        .repo
        .canonicalize()
        .with_context(|| format!("Repository path {} does not exist", args.repo.display()))?;
    let config = load_config(&repo, args.config.as_deref())?;

    RunConfig::new(
        config,
        repo,
        args.branch_name,
        args.commit_id,
        args.resolve_mode,
        cache_dir,
    )
}

async fn resolve_target(cfg: &RunConfig) -> Result<ResolvedCommit> {
    let refs = GitRefSource::new(&cfg.repo, cfg.remote.clone(), cfg.resolve_mode);
    Ok(resolver::resolve(cfg.branch.as_deref(), cfg.commit.as_deref(), &refs).await?)
}

async fn resolve_command(args: RefArgs) -> Result<()> {
    let cfg = build_config(args, None)?;
    let commit = resolve_target(&cfg).await?;
    println!("{}", commit);
    Ok(())
}

async fn run_command(args: RunArgs, quiet: bool) -> Result<()> {
    let report_format = args.report;
    let no_checkout = args.no_checkout;
    let cfg = build_config(args.target, args.cache_dir)?;

    let commit = resolve_target(&cfg).await?;
    if no_checkout {
        tracing::info!("using current working tree for {}", commit);
    } else {
        git::checkout_detached(&cfg.repo, &cfg.remote, commit.as_str()).await?;
        tracing::info!("checked out {}", commit);
    }

    if let Some(path) = &cfg.tool.config_file {
        let ecosystems: Vec<Ecosystem> = cfg.ecosystems.iter().map(|t| t.ecosystem).collect();
        tool::write_tool_config(path, &ecosystems)?;
    }

    let store = FsCacheStore::new(&cfg.cache_dir);
    let (key, outcome) = prepare_tool(&cfg, &store, quiet).await?;

    let scratch = tempfile::Builder::new()
        .prefix("license-attribution-")
        .tempdir()
        .context("Failed to create a scratch directory for analysis results")?;
    let ort = OrtTool::new(cfg.tool_binary(), scratch.path());
    let attributions = attribution::generate(&cfg.repo, &cfg.ecosystems, &ort).await?;
    drop(scratch);

    let outputs: Vec<PathBuf> = cfg.ecosystems.iter().map(|t| t.output.clone()).collect();
    let changed = git::changed_paths(&cfg.repo, &outputs).await?;

    let summary = RunSummary {
        commit,
        cache_key: key,
        tool: outcome,
        attributions,
        changed,
    };

    match report_format {
        ReportFormat::Terminal => report::terminal::render(&summary, &cfg.repo, quiet)?,
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    Ok(())
}

/// Restore the analysis tool from `store`, or build it and store the result.
async fn prepare_tool(
    cfg: &RunConfig,
    store: &dyn CacheStore,
    quiet: bool,
) -> Result<(String, GateOutcome)> {
    let key = cache_key(&cfg.tool.name, &cfg.tool.version);
    let paths = cfg.cache_paths();
    let entry = store.lookup(&key, &paths)?;

    let installer = ToolInstaller::new(
        cfg.tool.repository.clone(),
        cfg.tool.version.clone(),
        cfg.tool_source_dir(),
        cfg.tool.build_command.clone(),
        cfg.tool_binary(),
    );

    let spinner = if !quiet && !entry.hit {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
        pb.set_message(format!("building {} {}", cfg.tool.name, cfg.tool.version));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = ensure_built(&entry, || installer.install()).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let outcome = result?;

    if outcome == GateOutcome::Built {
        store.store(&entry.key, &entry.paths)?;
    }

    Ok((key, outcome))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::models::CacheEntry;

    /// Records every store call; reports a fixed hit signal.
    struct FakeStore {
        hit: bool,
        stored: RefCell<Vec<String>>,
    }

    impl CacheStore for FakeStore {
        fn lookup(&self, key: &str, paths: &[PathBuf]) -> Result<CacheEntry> {
            Ok(if self.hit {
                CacheEntry::hit(key, paths.to_vec())
            } else {
                CacheEntry::miss(key, paths.to_vec())
            })
        }

        fn store(&self, key: &str, _paths: &[PathBuf]) -> Result<()> {
            self.stored.borrow_mut().push(key.to_string());
            Ok(())
        }
    }

    fn test_config(repo: PathBuf, build_command: &[&str]) -> RunConfig {
        let mut config = config::Config::default();
        config.tool.source_dir = PathBuf::from("tool");
        config.tool.install_dir = PathBuf::from("install");
        config.tool.binary = PathBuf::from("ort");
        config.tool.build_command = build_command.iter().map(|s| s.to_string()).collect();
        config.cache.extra_paths = Vec::new();
        RunConfig::new(config, repo, None, Some("abc123".into()), None, Some(PathBuf::from("/unused"))).unwrap()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_build_and_store() {
        let dir = tempfile::tempdir().unwrap();
        // The build would fail if it ran: there is no tool checkout to build in.
        let cfg = test_config(dir.path().to_path_buf(), &["false"]);
        let store = FakeStore {
            hit: true,
            stored: RefCell::new(Vec::new()),
        };

        let (_, outcome) = prepare_tool(&cfg, &store, true).await.unwrap();
        assert_eq!(outcome, GateOutcome::Reused);
        assert!(store.stored.borrow().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cache_miss_builds_then_stores() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tool/.git")).unwrap();
        let cfg = test_config(
            dir.path().to_path_buf(),
            &["sh", "-c", "mkdir -p install && touch install/ort"],
        );
        let store = FakeStore {
            hit: false,
            stored: RefCell::new(Vec::new()),
        };

        let (key, outcome) = prepare_tool(&cfg, &store, true).await.unwrap();
        assert_eq!(outcome, GateOutcome::Built);
        assert_eq!(*store.stored.borrow(), vec![key]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_build_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tool/.git")).unwrap();
        let cfg = test_config(dir.path().to_path_buf(), &["sh", "-c", "exit 1"]);
        let store = FakeStore {
            hit: false,
            stored: RefCell::new(Vec::new()),
        };

        let err = prepare_tool(&cfg, &store, true).await.unwrap_err();
        assert!(err.downcast_ref::<error::GateError>().is_some());
        assert!(store.stored.borrow().is_empty());
    }
}
