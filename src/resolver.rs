use anyhow::Result;
use async_trait::async_trait;

use crate::error::ValidationError;
use crate::models::{ResolvedCommit, TargetReference};

/// Something that can turn a branch name into the commit it currently points at.
#[async_trait]
pub trait RefSource: Send + Sync {
    async fn branch_tip(&self, branch: &str) -> Result<String>;
}

/// Validate the two reference inputs and reduce them to one commit id.
///
/// A commit id is passed through untouched and `refs` is never consulted.
/// A branch name is resolved through `refs`; a failure there surfaces as
/// [`ValidationError::ResolutionFailed`].
pub async fn resolve(
    branch: Option<&str>,
    commit: Option<&str>,
    refs: &dyn RefSource,
) -> Result<ResolvedCommit, ValidationError> {
    let target = TargetReference::new(branch, commit)?;
    tracing::debug!("resolving {}", target);

    match target {
        TargetReference::CommitId(commit) => Ok(ResolvedCommit::new(commit)),
        TargetReference::BranchName(branch) => {
            let sha = refs
                .branch_tip(&branch)
                .await
                .map_err(|e| ValidationError::ResolutionFailed {
                    branch: branch.clone(),
                    reason: format!("{:#}", e),
                })?;
            tracing::info!("resolved branch '{}' to {}", branch, sha);
            Ok(ResolvedCommit::new(sha))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// In-memory branch table that counts lookups.
    #[derive(Default)]
    struct FakeRefs {
        branches: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl FakeRefs {
        fn with(branch: &str, sha: &str) -> Self {
            let mut branches = HashMap::new();
            branches.insert(branch.to_string(), sha.to_string());
            Self {
                branches,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RefSource for FakeRefs {
        async fn branch_tip(&self, branch: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.branches
                .get(branch)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such branch"))
        }
    }

    #[tokio::test]
    async fn test_branch_resolves_to_remote_tip() {
        let refs = FakeRefs::with("main", "f00dfeed");
        let resolved = resolve(Some("main"), Some(""), &refs).await.unwrap();
        assert_eq!(resolved.as_str(), "f00dfeed");
        assert_eq!(refs.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_commit_passes_through_unchanged() {
        let refs = FakeRefs::default();
        for commit in ["abc123", "ABC123", "not-even-hex", " padded "] {
            let resolved = resolve(Some(""), Some(commit), &refs).await.unwrap();
            assert_eq!(resolved.as_str(), commit);
        }
        assert_eq!(refs.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_branch_and_commit_conflict() {
        let refs = FakeRefs::with("main", "f00dfeed");
        let err = resolve(Some("main"), Some("abc123"), &refs).await.unwrap_err();
        assert!(matches!(err, ValidationError::Conflicting { .. }));
        assert_eq!(refs.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_neither_supplied_is_missing() {
        let refs = FakeRefs::default();
        assert!(matches!(
            resolve(Some(""), Some(""), &refs).await,
            Err(ValidationError::Missing)
        ));
        assert!(matches!(
            resolve(None, None, &refs).await,
            Err(ValidationError::Missing)
        ));
    }

    #[tokio::test]
    async fn test_unknown_branch_is_resolution_failure() {
        let refs = FakeRefs::default();
        let err = resolve(Some("gone"), None, &refs).await.unwrap_err();
        match err {
            ValidationError::ResolutionFailed { branch, reason } => {
                assert_eq!(branch, "gone");
                assert!(reason.contains("no such branch"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
