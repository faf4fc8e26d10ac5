use std::future::Future;

use serde::Serialize;

use crate::error::{BuildError, GateError};
use crate::models::CacheEntry;

/// What [`ensure_built`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateOutcome {
    /// The cached artifact was trusted; `build` never ran.
    Reused,
    /// `build` ran and succeeded.
    Built,
}

/// Run `build` only when `cache` is a miss.
///
/// The gate only branches on the signal. Persisting the freshly built
/// artifact under `cache.key` is the caller's job.
pub async fn ensure_built<F, Fut>(cache: &CacheEntry, build: F) -> Result<GateOutcome, GateError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), BuildError>>,
{
    if cache.hit {
        tracing::info!("cache hit for '{}', skipping build", cache.key);
        return Ok(GateOutcome::Reused);
    }

    tracing::info!("cache miss for '{}', building", cache.key);
    build().await.map_err(|source| GateError::BuildFailed {
        key: cache.key.clone(),
        source,
    })?;

    Ok(GateOutcome::Built)
}
