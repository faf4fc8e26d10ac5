//! The external license analysis tool.
//!
//! Everything substantive (dependency graph inspection, license detection,
//! notice rendering) happens inside the tool. This module only installs it,
//! writes its configuration, and drives its command line.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

use crate::error::BuildError;
use crate::git;
use crate::models::{Ecosystem, EcosystemTarget};

/// Runs license analysis for one ecosystem and returns the rendered notice file.
#[async_trait]
pub trait AnalysisTool: Send + Sync {
    async fn run(&self, repo_root: &Path, target: &EcosystemTarget) -> Result<PathBuf>;
}

/// Run `program args..` in `cwd`, mapping a spawn failure or non-zero exit to [`BuildError`].
async fn run_process(program: &Path, args: &[String], cwd: &Path) -> Result<(), BuildError> {
    let command_line = std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!("running `{}` in {}", command_line, cwd.display());

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| BuildError::new(&command_line, "not started", e.to_string()))?;

    if !output.status.success() {
        let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            stderr = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        return Err(BuildError::new(command_line, output.status.to_string(), stderr));
    }
    Ok(())
}

/// Fetches the tool's sources at a pinned version and compiles them.
pub struct ToolInstaller {
    repository: String,
    version: String,
    source_dir: PathBuf,
    build_command: Vec<String>,
    binary: PathBuf,
}

impl ToolInstaller {
    pub fn new(
        repository: impl Into<String>,
        version: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        build_command: Vec<String>,
        binary: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository: repository.into(),
            version: version.into(),
            source_dir: source_dir.into(),
            build_command,
            binary: binary.into(),
        }
    }

    /// Clone (when absent) and build. Blocks until the build finishes; no timeout.
    pub async fn install(&self) -> Result<(), BuildError> {
        if !self.source_dir.join(".git").exists() {
            tracing::info!(
                "cloning {} at {} into {}",
                self.repository,
                self.version,
                self.source_dir.display()
            );
            git::clone_shallow(&self.repository, &self.version, &self.source_dir)
                .await
                .map_err(|e| BuildError::new(format!("git clone {}", self.repository), "failed", format!("{:#}", e)))?;
        }

        let Some((program, args)) = self.build_command.split_first() else {
            return Err(BuildError::new("<empty>", "not started", "build command is empty"));
        };
        let program = if program.contains('/') {
            self.source_dir.join(program)
        } else {
            PathBuf::from(program)
        };
        run_process(&program, args, &self.source_dir).await?;

        if !self.binary.exists() {
            return Err(BuildError::new(
                self.build_command.join(" "),
                "succeeded",
                format!("expected {} after build", self.binary.display()),
            ));
        }
        Ok(())
    }
}

/// The OSS Review Toolkit command line.
///
/// Intermediate results go under `results_root`, never into the analyzed tree.
pub struct OrtTool {
    binary: PathBuf,
    results_root: PathBuf,
}

impl OrtTool {
    pub const NOTICE_FILE: &'static str = "NOTICE_DEFAULT";

    pub fn new(binary: impl Into<PathBuf>, results_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            results_root: results_root.into(),
        }
    }

    /// Results directory for one target, e.g. `<root>/rust-glide-core`.
    fn results_dir(&self, target: &EcosystemTarget) -> PathBuf {
        let dir: String = target
            .manifest_dir
            .display()
            .to_string()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let name = format!("{}-{}", target.ecosystem, dir).to_lowercase();
        self.results_root.join(name)
    }
}

#[async_trait]
impl AnalysisTool for OrtTool {
    async fn run(&self, repo_root: &Path, target: &EcosystemTarget) -> Result<PathBuf> {
        let input = repo_root.join(&target.manifest_dir);
        let results = self.results_dir(target);
        if results.exists() {
            std::fs::remove_dir_all(&results)
                .with_context(|| format!("Failed to clear {}", results.display()))?;
        }

        let analyze: Vec<String> = vec![
            "-P".into(),
            "ort.analyzer.allowDynamicVersions=true".into(),
            "analyze".into(),
            "-i".into(),
            input.display().to_string(),
            "-o".into(),
            results.display().to_string(),
            "-f".into(),
            "JSON".into(),
        ];
        run_process(&self.binary, &analyze, repo_root)
            .await
            .with_context(|| format!("{} analysis failed", target.ecosystem))?;

        let report: Vec<String> = vec![
            "report".into(),
            "-i".into(),
            results.join("analyzer-result.json").display().to_string(),
            "-o".into(),
            results.display().to_string(),
            "-f".into(),
            "PlainTextTemplate".into(),
        ];
        run_process(&self.binary, &report, repo_root)
            .await
            .with_context(|| format!("{} report failed", target.ecosystem))?;

        let notice = results.join(Self::NOTICE_FILE);
        anyhow::ensure!(
            notice.exists(),
            "{} report did not produce {}",
            target.ecosystem,
            notice.display()
        );
        Ok(notice)
    }
}

#[derive(Debug, Serialize)]
struct OrtConfigFile {
    ort: OrtSection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrtSection {
    analyzer: AnalyzerSection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzerSection {
    allow_dynamic_versions: bool,
    enabled_package_managers: Vec<&'static str>,
}

/// Render the tool configuration enabling the package managers of `ecosystems`.
pub fn render_tool_config(ecosystems: &[Ecosystem]) -> Result<String> {
    let mut managers: Vec<&'static str> = Vec::new();
    for ecosystem in ecosystems {
        for manager in ecosystem.package_managers() {
            if !managers.contains(manager) {
                managers.push(manager);
            }
        }
    }

    let file = OrtConfigFile {
        ort: OrtSection {
            analyzer: AnalyzerSection {
                allow_dynamic_versions: true,
                enabled_package_managers: managers,
            },
        },
    };
    Ok(serde_yaml::to_string(&file)?)
}

pub fn write_tool_config(path: &Path, ecosystems: &[Ecosystem]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_tool_config(ecosystems)?)
        .with_context(|| format!("Failed to write tool config {}", path.display()))?;
    tracing::debug!("wrote tool config {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_tool_config_dedups_managers() {
        let yaml = render_tool_config(&[Ecosystem::Rust, Ecosystem::Node, Ecosystem::Rust]).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let analyzer = &value["ort"]["analyzer"];

        assert_eq!(analyzer["allowDynamicVersions"], serde_yaml::Value::Bool(true));
        let managers: Vec<&str> = analyzer["enabledPackageManagers"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(managers, vec!["Cargo", "NPM", "Yarn", "PNPM"]);
    }

    #[tokio::test]
    async fn test_install_fails_on_empty_build_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let installer = ToolInstaller::new("unused", "v1", dir.path(), Vec::new(), dir.path().join("bin"));
        let err = installer.install().await.unwrap_err();
        assert_eq!(err.status, "not started");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_reports_failing_build() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let installer = ToolInstaller::new(
            "unused",
            "v1",
            dir.path(),
            vec!["sh".into(), "-c".into(), "echo broken >&2; exit 3".into()],
            dir.path().join("bin/ort"),
        );
        let err = installer.install().await.unwrap_err();
        assert_eq!(err.stderr, "broken");
        assert!(err.command.starts_with("sh -c"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_requires_binary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let binary = dir.path().join("out/ort");
        let installer = ToolInstaller::new(
            "unused",
            "v1",
            dir.path(),
            vec!["sh".into(), "-c".into(), "mkdir -p out && touch out/ort".into()],
            &binary,
        );
        installer.install().await.unwrap();
        assert!(binary.exists());
    }

    /// Stand-in for `ort` that writes a notice into whatever `-o` names.
    #[cfg(unix)]
    fn fake_ort(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ort");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             out=\"\"\n\
             while [ $# -gt 0 ]; do\n\
               if [ \"$1\" = \"-o\" ]; then out=\"$2\"; shift; fi\n\
               shift\n\
             done\n\
             mkdir -p \"$out\"\n\
             echo notices > \"$out/NOTICE_DEFAULT\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ort_results_stay_out_of_manifest_dir() {
        let bin = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(repo.path().join("glide-core")).unwrap();
        std::fs::write(repo.path().join("glide-core/Cargo.toml"), "[package]\n").unwrap();

        let ort = OrtTool::new(fake_ort(bin.path()), scratch.path());
        let target = EcosystemTarget::new(Ecosystem::Rust, "glide-core", "glide-core/THIRD_PARTY_LICENSES_RUST");
        let notice = ort.run(repo.path(), &target).await.unwrap();

        assert!(notice.starts_with(scratch.path()));
        assert_eq!(std::fs::read_to_string(&notice).unwrap(), "notices\n");
        let left: Vec<_> = std::fs::read_dir(repo.path().join("glide-core"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("Cargo.toml")]);
    }
}
