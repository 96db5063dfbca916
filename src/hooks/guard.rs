//! Guard predicates for mods and job-level enable/disable resolution.

use super::context::ExecutionContext;
use crate::config::GuardDef;
use crate::error::{PromptfanError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A job's explicit mod choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModSelection {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
}

impl ModSelection {
    /// Whether a mod runs for this job.
    ///
    /// A job-level disable always wins; otherwise a job-level enable turns
    /// the mod on regardless of `auto_run`; otherwise `auto_run` decides.
    pub fn is_enabled(&self, name: &str, auto_run: bool) -> bool {
        if self.disable.iter().any(|n| n == name) {
            return false;
        }
        if self.enable.iter().any(|n| n == name) {
            return true;
        }
        auto_run
    }

    /// Every mod name this selection mentions.
    pub fn mentioned(&self) -> impl Iterator<Item = &str> {
        self.enable.iter().chain(self.disable.iter()).map(String::as_str)
    }
}

/// Compiled guard predicate.
#[derive(Debug, Clone)]
pub struct Guard {
    stages: BTreeSet<String>,
    scope: Option<GlobSet>,
    address_index: BTreeSet<u64>,
    config_index: BTreeSet<usize>,
}

impl Guard {
    pub fn compile(def: &GuardDef) -> Result<Self> {
        let scope = if def.execution_scope.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &def.execution_scope {
                let glob = Glob::new(pattern.trim()).map_err(|e| {
                    PromptfanError::Configuration(format!(
                        "invalid execution_scope pattern '{}': {}",
                        pattern, e
                    ))
                })?;
                builder.add(glob);
            }
            Some(builder.build().map_err(|e| {
                PromptfanError::Configuration(format!("invalid execution_scope: {}", e))
            })?)
        };

        Ok(Self {
            stages: def.stages.iter().cloned().collect(),
            scope,
            address_index: def.address_index.iter().copied().collect(),
            config_index: def.config_index.iter().copied().collect(),
        })
    }

    /// Whether the guarded script joins this stage invocation.
    ///
    /// An `address_index` allow-list never matches a stage fired outside a
    /// composition.
    pub fn matches(&self, stage: &str, ctx: &ExecutionContext) -> bool {
        if !self.stages.contains(stage) {
            return false;
        }

        if let Some(scope) = &self.scope
            && !scope.is_match(&ctx.block_path)
        {
            return false;
        }

        if !self.address_index.is_empty() {
            match ctx.composition_id {
                Some(id) if self.address_index.contains(&id) => {}
                _ => return false,
            }
        }

        self.config_index.is_empty() || self.config_index.contains(&ctx.config_index)
    }
}
