use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ResolveMode;

#[derive(Parser, Debug)]
#[command(
    name = "license-attribution",
    about = "Regenerate third-party license attribution files for a commit",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print warnings and a one-line summary
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the target reference and print the commit id
    Resolve(RefArgs),
    /// Check out the target, prepare the analysis tool, and regenerate attribution files
    Run(RunArgs),
}

/// Target selection shared by every command.
#[derive(Args, Debug)]
pub struct RefArgs {
    /// Branch to resolve [default: configured default branch, when no commit is given]
    #[arg(long, env = "BRANCH_NAME")]
    pub branch_name: Option<String>,

    /// Commit to use as-is
    #[arg(long, env = "COMMIT_ID")]
    pub commit_id: Option<String>,

    /// Repository path
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Config file [default: ./.license-attribution/config.toml, fallback ~/.config/license-attribution/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How a branch name becomes a commit id [default: from config, else remote]
    #[arg(long, value_name = "MODE")]
    pub resolve_mode: Option<ResolveMode>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: RefArgs,

    /// Use the current working tree instead of checking out the resolved commit
    #[arg(long)]
    pub no_checkout: bool,

    /// Cache store directory [default: ~/.cache/license-attribution]
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "license-attribution",
            "run",
            "--commit-id",
            "abc123",
            "--resolve-mode",
            "local",
            "--report",
            "json",
            "-q",
        ])
        .unwrap();

        assert!(cli.quiet);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.target.commit_id.as_deref(), Some("abc123"));
                assert_eq!(args.target.resolve_mode, Some(ResolveMode::Local));
                assert!(matches!(args.report, ReportFormat::Json));
                assert!(!args.no_checkout);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["license-attribution", "-v", "-q", "resolve"]).is_err());
    }
}
