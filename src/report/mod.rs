//! Report renderers for a finished run.
//!
//! - [`terminal`]: colored header and a table of attribution files; respects `--quiet`.
//! - JSON output is produced directly from [`RunSummary`] with `serde_json`.

use std::path::PathBuf;

use serde::Serialize;

use crate::gate::GateOutcome;
use crate::models::{AttributionReport, ResolvedCommit};

pub mod terminal;

/// Everything a run produced, in the order it happened.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub commit: ResolvedCommit,
    pub cache_key: String,
    pub tool: GateOutcome,
    pub attributions: Vec<AttributionReport>,
    /// Attribution files that differ from the checked-out commit.
    pub changed: Vec<PathBuf>,
}
