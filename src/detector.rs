use std::path::Path;

use crate::models::{Ecosystem, EcosystemTarget};

/// Manifest files that mark an ecosystem as present in a directory.
fn manifests(ecosystem: Ecosystem) -> &'static [&'static str] {
    match ecosystem {
        Ecosystem::Rust => &["Cargo.toml", "Cargo.lock"],
        Ecosystem::Python => &["requirements.txt", "pyproject.toml", "Pipfile.lock", "setup.py"],
        Ecosystem::Java => &["build.gradle", "build.gradle.kts", "settings.gradle", "pom.xml"],
        Ecosystem::Node => &["package.json", "package-lock.json", "yarn.lock"],
    }
}

/// Whether `target`'s manifest directory under `repo` holds a manifest for its ecosystem.
pub fn has_manifests(repo: &Path, target: &EcosystemTarget) -> bool {
    let dir = repo.join(&target.manifest_dir);
    manifests(target.ecosystem)
        .iter()
        .any(|name| dir.join(name).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_manifest_in_target_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("glide-core")).unwrap();
        std::fs::write(dir.path().join("glide-core/Cargo.toml"), "[package]\n").unwrap();
        std::fs::create_dir_all(dir.path().join("node")).unwrap();

        let targets = EcosystemTarget::defaults();
        let present: Vec<Ecosystem> = targets
            .iter()
            .filter(|t| has_manifests(dir.path(), t))
            .map(|t| t.ecosystem)
            .collect();
        assert_eq!(present, vec![Ecosystem::Rust]);
    }
}
