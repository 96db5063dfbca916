//! Run reports and summary statistics.

use super::path::BlockPath;
use super::state::BlockState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What made a block fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// `None` when the failure came from a block-level stage.
    pub composition_id: Option<u64>,
    pub stage: String,
    pub message: String,
}

/// Outcome of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    pub path: BlockPath,
    pub state: BlockState,
    /// Compositions whose `post` stage finished.
    pub completed: u64,
    /// Compositions that failed; block-level stage failures only set `failure`.
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// The failed ancestor for `BLOCKED` blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<BlockPath>,
}

impl BlockReport {
    pub fn new(path: BlockPath) -> Self {
        Self {
            path,
            state: BlockState::Unseen,
            completed: 0,
            failed: 0,
            failure: None,
            blocked_by: None,
        }
    }
}

/// Per-block summary carried by `run_complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub state: BlockState,
    pub completed: u64,
    pub failed: u64,
    pub complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Keyed by block path.
    pub blocks: BTreeMap<String, BlockSummary>,
    pub compositions_completed: u64,
    pub complete: usize,
    pub failed: usize,
    pub blocked: usize,
    pub cancelled: usize,
}

impl RunStats {
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a BlockReport>) -> Self {
        let mut stats = Self::default();
        for report in reports {
            stats.compositions_completed += report.completed;
            match report.state {
                BlockState::Complete => stats.complete += 1,
                BlockState::Failed => stats.failed += 1,
                BlockState::Blocked => stats.blocked += 1,
                BlockState::Cancelled => stats.cancelled += 1,
                _ => {}
            }
            stats.blocks.insert(
                report.path.to_string(),
                BlockSummary {
                    state: report.state,
                    completed: report.completed,
                    failed: report.failed,
                    complete: report.state == BlockState::Complete,
                },
            );
        }
        stats
    }
}

/// Everything a run produced, in depth-first block order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub job: String,
    pub blocks: Vec<BlockReport>,
    pub stats: RunStats,
    /// Whether cancellation was observed during the run.
    pub cancelled: bool,
}

impl RunReport {
    pub fn block(&self, path: &str) -> Option<&BlockReport> {
        self.blocks.iter().find(|b| b.path.to_string() == path)
    }

    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }
}
