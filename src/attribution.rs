use std::path::Path;

use anyhow::{Context, Result};

use crate::detector::has_manifests;
use crate::models::{AttributionReport, AttributionStatus, EcosystemTarget};
use crate::tool::AnalysisTool;

/// Regenerate each target's attribution file, one ecosystem at a time.
///
/// Targets without manifests are reported as skipped. The first tool failure
/// aborts the whole run; files already written stay on disk.
pub async fn generate(
    repo: &Path,
    targets: &[EcosystemTarget],
    tool: &dyn AnalysisTool,
) -> Result<Vec<AttributionReport>> {
    let mut reports = Vec::with_capacity(targets.len());

    for target in targets {
        if !has_manifests(repo, target) {
            tracing::warn!(
                "no {} manifests in {}, skipping",
                target.ecosystem,
                target.manifest_dir.display()
            );
            reports.push(AttributionReport {
                ecosystem: target.ecosystem,
                output: target.output.clone(),
                status: AttributionStatus::Skipped,
            });
            continue;
        }

        tracing::info!("analyzing {} dependencies", target.ecosystem);
        let notice = tool.run(repo, target).await?;
        let status = install_notice(&notice, &repo.join(&target.output))?;
        tracing::info!("{} -> {} ({})", target.ecosystem, target.output.display(), status);

        reports.push(AttributionReport {
            ecosystem: target.ecosystem,
            output: target.output.clone(),
            status,
        });
    }

    Ok(reports)
}

/// Copy `notice` to `output`, reporting how the previous file compared.
fn install_notice(notice: &Path, output: &Path) -> Result<AttributionStatus> {
    let fresh = std::fs::read(notice)
        .with_context(|| format!("Failed to read {}", notice.display()))?;

    let status = match std::fs::read(output) {
        Ok(previous) if previous == fresh => return Ok(AttributionStatus::Unchanged),
        Ok(_) => AttributionStatus::Updated,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AttributionStatus::Created,
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", output.display()));
        }
    };

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, fresh)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::Ecosystem;

    /// Writes a fixed notice per ecosystem and records the order of calls.
    struct FakeTool {
        calls: Mutex<Vec<Ecosystem>>,
        fail_on: Option<Ecosystem>,
    }

    impl FakeTool {
        fn new(fail_on: Option<Ecosystem>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl AnalysisTool for FakeTool {
        async fn run(&self, repo_root: &Path, target: &EcosystemTarget) -> Result<PathBuf> {
            self.calls.lock().unwrap().push(target.ecosystem);
            if self.fail_on == Some(target.ecosystem) {
                anyhow::bail!("tool crashed");
            }
            let notice = repo_root.join(&target.manifest_dir).join("NOTICE_DEFAULT");
            std::fs::write(&notice, format!("{} notices\n", target.ecosystem))?;
            Ok(notice)
        }
    }

    fn repo_with(dirs: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (sub, manifest) in dirs {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            std::fs::write(dir.path().join(sub).join(manifest), "").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_statuses() {
        let repo = repo_with(&[
            ("python", "requirements.txt"),
            ("node", "package.json"),
            ("glide-core", "Cargo.toml"),
        ]);
        std::fs::write(repo.path().join("node/THIRD_PARTY_LICENSES_NODE"), "Node notices\n").unwrap();
        std::fs::write(repo.path().join("glide-core/THIRD_PARTY_LICENSES_RUST"), "stale\n").unwrap();

        let tool = FakeTool::new(None);
        let reports = generate(repo.path(), &EcosystemTarget::defaults(), &tool)
            .await
            .unwrap();

        let statuses: Vec<AttributionStatus> = reports.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                AttributionStatus::Created,
                AttributionStatus::Unchanged,
                AttributionStatus::Updated,
                AttributionStatus::Skipped,
            ]
        );
        assert_eq!(
            std::fs::read_to_string(repo.path().join("glide-core/THIRD_PARTY_LICENSES_RUST")).unwrap(),
            "Rust notices\n"
        );
        assert_eq!(
            *tool.calls.lock().unwrap(),
            vec![Ecosystem::Python, Ecosystem::Node, Ecosystem::Rust]
        );
    }

    #[tokio::test]
    async fn test_tool_failure_stops_the_run() {
        let repo = repo_with(&[("python", "requirements.txt"), ("java", "build.gradle")]);
        std::fs::create_dir_all(repo.path().join("node")).unwrap();
        std::fs::write(repo.path().join("node/package.json"), "{}").unwrap();

        let tool = FakeTool::new(Some(Ecosystem::Node));
        let err = generate(repo.path(), &EcosystemTarget::defaults(), &tool)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("tool crashed"));
        assert_eq!(
            *tool.calls.lock().unwrap(),
            vec![Ecosystem::Python, Ecosystem::Node]
        );
    }
}
