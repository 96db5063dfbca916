//! Stage dispatch.
//!
//! The pipeline resolves the ordered scripts for a stage (unconditional
//! registrations first, then enabled mods whose guard matches) and runs them
//! one after another. Stage names are opaque keys: nothing here depends on
//! which stage is being dispatched.

use super::context::ExecutionContext;
use super::guard::{Guard, ModSelection};
use super::runtime::{ScriptFailure, ScriptRuntime};
use super::types::{FailureKind, HookFailure, HookStatus, StageOutcome, StageStatus};
use crate::config::Config;
use crate::error::{PromptfanError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// One registered script.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEntry {
    pub name: String,
    pub script: String,
    pub params: Value,
}

impl HookEntry {
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone)]
struct GuardedEntry {
    entry: HookEntry,
    guard: Guard,
}

/// Stage name to ordered scripts, plus guarded mods.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    unconditional: HashMap<String, Vec<HookEntry>>,
    guarded: Vec<GuardedEntry>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry for one job.
    ///
    /// Mods the job leaves disabled are not registered at all. A job naming
    /// a mod the config does not define is a configuration error.
    pub fn from_config(config: &Config, selection: &ModSelection) -> Result<Self> {
        if let Some(unknown) = selection.mentioned().find(|n| config.find_mod(n).is_none()) {
            return Err(PromptfanError::Configuration(format!(
                "job references unknown mod '{}'",
                unknown
            )));
        }

        let mut registry = Self::new();
        for (stage, hooks) in &config.hooks {
            for hook in hooks {
                let name = hook.name.clone().unwrap_or_else(|| hook.script.clone());
                registry.register(
                    stage,
                    HookEntry::new(name, &hook.script).with_params(hook.params.clone()),
                );
            }
        }

        for def in &config.mods {
            if !selection.is_enabled(&def.name, def.auto_run) {
                debug!(name = %def.name, "mod disabled for job");
                continue;
            }
            let guard = Guard::compile(&def.guard)?;
            registry.register_guarded(
                HookEntry::new(&def.name, &def.script).with_params(def.params.clone()),
                guard,
            );
        }

        Ok(registry)
    }

    /// Register a script that runs on every invocation of `stage`.
    pub fn register(&mut self, stage: impl Into<String>, entry: HookEntry) {
        self.unconditional
            .entry(stage.into())
            .or_default()
            .push(entry);
    }

    /// Register a script that runs whenever its guard matches.
    pub fn register_guarded(&mut self, entry: HookEntry, guard: Guard) {
        self.guarded.push(GuardedEntry { entry, guard });
    }

    /// Ordered scripts for a stage invocation.
    pub fn resolve(&self, stage: &str, ctx: &ExecutionContext) -> Vec<&HookEntry> {
        let unconditional = self.unconditional.get(stage).into_iter().flatten();
        let guarded = self
            .guarded
            .iter()
            .filter(|g| g.guard.matches(stage, ctx))
            .map(|g| &g.entry);
        unconditional.chain(guarded).collect()
    }
}

/// Resolves and runs scripts for named stages.
pub struct HookPipeline {
    registry: HookRegistry,
    runtime: Box<dyn ScriptRuntime>,
}

impl HookPipeline {
    pub fn new(registry: HookRegistry, runtime: Box<dyn ScriptRuntime>) -> Self {
        Self { registry, runtime }
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Run every script resolved for `stage`, in order.
    ///
    /// On `success` the script's `modify_context` is merged into `ctx` and
    /// non-null `data` is recorded as the stage's output. `skip` ends the
    /// stage quietly; `error`, a raised script, or an unavailable script
    /// ends it with a failure.
    pub fn dispatch(&self, stage: &str, ctx: &mut ExecutionContext) -> StageOutcome {
        let started = Instant::now();
        ctx.stage = stage.to_string();

        let entries: Vec<HookEntry> = self
            .registry
            .resolve(stage, ctx)
            .into_iter()
            .cloned()
            .collect();

        let mut scripts_run = 0;
        let mut status = StageStatus::Completed;

        for entry in &entries {
            debug!(stage, script = %entry.name, path = %ctx.block_path, "invoking script");
            match self.runtime.invoke(&entry.script, ctx, &entry.params) {
                Ok(result) => match result.status {
                    HookStatus::Success => {
                        ctx.merge(&result.modify_context);
                        if !result.data.is_null() {
                            ctx.outputs.insert(stage.to_string(), result.data);
                        }
                        scripts_run += 1;
                    }
                    HookStatus::Skip => {
                        debug!(stage, script = %entry.name, "script skipped rest of stage");
                        status = StageStatus::Skipped {
                            script: entry.name.clone(),
                            message: result.message,
                        };
                        break;
                    }
                    HookStatus::Error => {
                        let message = result
                            .message
                            .unwrap_or_else(|| "script returned an error".to_string());
                        status = StageStatus::Failed(HookFailure {
                            stage: stage.to_string(),
                            script: entry.name.clone(),
                            kind: FailureKind::Returned,
                            message,
                        });
                        break;
                    }
                },
                Err(failure) => {
                    warn!(stage, script = %entry.name, error = %failure, "script failed");
                    let kind = match failure {
                        ScriptFailure::Unavailable { .. } => FailureKind::Unavailable,
                        ScriptFailure::Raised { .. } => FailureKind::Raised,
                    };
                    status = StageStatus::Failed(HookFailure {
                        stage: stage.to_string(),
                        script: entry.name.clone(),
                        kind,
                        message: failure.to_string(),
                    });
                    break;
                }
            }
        }

        StageOutcome {
            stage: stage.to_string(),
            status,
            scripts_run,
            elapsed: started.elapsed(),
        }
    }
}
