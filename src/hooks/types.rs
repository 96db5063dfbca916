//! Script results and stage outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Status a script reports back to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Success,
    Error,
    Skip,
}

/// What a script returns for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    pub status: HookStatus,

    /// Output made available to later stages.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,

    /// Keys merged into the context for the remaining scripts of the stage.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub modify_context: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HookResult {
    pub fn success() -> Self {
        Self {
            status: HookStatus::Success,
            data: Value::Null,
            modify_context: Map::new(),
            message: None,
        }
    }

    pub fn success_with(data: Value) -> Self {
        Self {
            data,
            ..Self::success()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HookStatus::Error,
            message: Some(message.into()),
            ..Self::success()
        }
    }

    pub fn skip(message: impl Into<String>) -> Self {
        Self {
            status: HookStatus::Skip,
            message: Some(message.into()),
            ..Self::success()
        }
    }

    /// Add a key to merge into the context.
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.modify_context.insert(key.into(), value);
        self
    }
}

/// How a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The script returned `status: error`.
    Returned,
    /// The script raised instead of returning a result.
    Raised,
    /// The script could not be found or started.
    Unavailable,
}

/// A failed stage invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookFailure {
    pub stage: String,
    pub script: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of dispatching one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    /// Every resolved script succeeded (or none were registered).
    Completed,
    /// A script asked to skip the rest of the stage.
    Skipped { script: String, message: Option<String> },
    /// A script failed; the rest of the stage did not run.
    Failed(HookFailure),
}

/// Outcome of [`super::HookPipeline::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: String,
    pub status: StageStatus,
    /// Scripts that ran to completion (successful ones only).
    pub scripts_run: usize,
    pub elapsed: Duration,
}

impl StageOutcome {
    pub fn failure(&self) -> Option<&HookFailure> {
        match &self.status {
            StageStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure().is_some()
    }
}
