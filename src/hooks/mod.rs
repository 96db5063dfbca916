//! Hook pipeline.
//!
//! This module dispatches named lifecycle stages to ordered scripts:
//! - `types`: script results and stage outcomes
//! - `context`: the execution context scripts receive
//! - `guard`: mod guard predicates and job-level enable/disable
//! - `pipeline`: the registry and the stage dispatcher
//! - `runtime`: in-process, command, and layered script runtimes

pub mod context;
pub mod guard;
pub mod pipeline;
pub mod runtime;
pub mod types;


pub use context::ExecutionContext;
pub use guard::{Guard, ModSelection};
pub use pipeline::{HookEntry, HookPipeline, HookRegistry};
pub use runtime::{
    BUILTIN_PREFIX, CommandRuntime, InProcessRuntime, LayeredRuntime, ScriptFailure, ScriptRuntime,
};
pub use types::{FailureKind, HookFailure, HookResult, HookStatus, StageOutcome, StageStatus};
