//! Per-block run state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a block within one run.
///
/// ```text
/// UNSEEN -> ACTIVE -> PARTIAL -> COMPLETE | FAILED | CANCELLED
///        |          \-> COMPLETE | FAILED | CANCELLED
///        \-> BLOCKED | CANCELLED          (never visited)
/// ```
///
/// Transitions only move forward; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockState {
    #[default]
    Unseen,
    /// Visited; own compositions in progress.
    Active,
    /// Own compositions done; children still running.
    Partial,
    Complete,
    Failed,
    /// An ancestor failed, so the block never ran.
    Blocked,
    Cancelled,
}

impl BlockState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BlockState::Complete | BlockState::Failed | BlockState::Blocked | BlockState::Cancelled
        )
    }

    pub fn can_transition_to(self, next: BlockState) -> bool {
        use BlockState::*;
        matches!(
            (self, next),
            (Unseen, Active)
                | (Unseen, Blocked)
                | (Unseen, Cancelled)
                | (Active, Partial)
                | (Active, Complete)
                | (Active, Failed)
                | (Active, Cancelled)
                | (Partial, Complete)
                | (Partial, Failed)
                | (Partial, Cancelled)
        )
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockState::Unseen => "UNSEEN",
            BlockState::Active => "ACTIVE",
            BlockState::Partial => "PARTIAL",
            BlockState::Complete => "COMPLETE",
            BlockState::Failed => "FAILED",
            BlockState::Blocked => "BLOCKED",
            BlockState::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}
