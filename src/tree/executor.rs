//! Depth-first tree execution.
//!
//! For each block the executor fires `node_start`, resolves the block once,
//! runs `pre -> generate -> post` for every composition in ascending order,
//! then descends into the children in declaration order and finally fires
//! `node_end`. Stage names are plain strings handed to the pipeline; the
//! lifecycle structure alone decides when each one fires.

use super::block::{Block, ResolvedBlock};
use super::cancel::CancelSignal;
use super::path::BlockPath;
use super::plan::BucketPlan;
use super::report::{BlockReport, Failure, RunReport, RunStats};
use super::state::BlockState;
use crate::error::Result;
use crate::events::{EventKind, EventStream, get_actor_string};
use crate::hooks::{ExecutionContext, FailureKind, HookPipeline, StageStatus};
use crate::space::{Operation, WindowPolicy};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const NODE_START: &str = "node_start";
pub const PRE: &str = "pre";
pub const GENERATE: &str = "generate";
pub const POST: &str = "post";
pub const NODE_END: &str = "node_end";
pub const ERROR: &str = "error";

/// Stages run for every composition, in order.
pub const COMPOSITION_STAGES: [&str; 3] = [PRE, GENERATE, POST];

/// Per-run knobs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Buckets to run; blocks without one run their full space.
    pub buckets: BucketPlan,
    pub operation: Option<Operation>,
    pub policy: WindowPolicy,
}

impl RunOptions {
    pub fn new(policy: WindowPolicy) -> Self {
        Self {
            buckets: BucketPlan::default(),
            operation: None,
            policy,
        }
    }

    pub fn with_buckets(mut self, buckets: BucketPlan) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn with_operation(mut self, operation: Option<Operation>) -> Self {
        self.operation = operation;
        self
    }
}

/// Walks a block forest for one run.
///
/// Returned errors are fatal to the whole run (a sink that cannot be
/// written, a bucket outside a block's range). Script failures are not:
/// they end the block that produced them and block its descendants.
pub struct TreeExecutor<'a> {
    job: String,
    pipeline: &'a HookPipeline,
    events: &'a mut EventStream,
    cancel: &'a dyn CancelSignal,
    options: RunOptions,
    reports: BTreeMap<BlockPath, BlockReport>,
    resolved: HashMap<BlockPath, Rc<ResolvedBlock>>,
    cancelled: bool,
}

impl<'a> TreeExecutor<'a> {
    pub fn new(
        job: impl Into<String>,
        pipeline: &'a HookPipeline,
        events: &'a mut EventStream,
        cancel: &'a dyn CancelSignal,
        options: RunOptions,
    ) -> Self {
        Self {
            job: job.into(),
            pipeline,
            events,
            cancel,
            options,
            reports: BTreeMap::new(),
            resolved: HashMap::new(),
            cancelled: false,
        }
    }

    /// Resolved form of a block, built on first use and cached for the run.
    pub fn resolve(&mut self, block: &Block) -> Result<Rc<ResolvedBlock>> {
        if let Some(resolved) = self.resolved.get(&block.path) {
            return Ok(Rc::clone(resolved));
        }
        let resolved = Rc::new(ResolvedBlock::resolve(block, &self.options.policy)?);
        debug!(path = %block.path, total = resolved.pool().total(), "resolved block");
        self.resolved.insert(block.path.clone(), Rc::clone(&resolved));
        Ok(resolved)
    }

    /// Execute every root in order and report the outcome.
    pub fn run(&mut self, roots: &[Block]) -> Result<RunReport> {
        self.reports.clear();
        self.resolved.clear();
        self.cancelled = false;
        for block in roots.iter().flat_map(Block::walk) {
            self.reports
                .insert(block.path.clone(), BlockReport::new(block.path.clone()));
        }

        info!(job = %self.job, roots = roots.len(), "run started");
        self.events.emit(EventKind::Init {
            job: self.job.clone(),
            actor: get_actor_string(),
            roots: roots.len(),
        })?;

        for root in roots {
            self.visit(root, None)?;
        }

        let blocks: Vec<BlockReport> = self.reports.values().cloned().collect();
        let stats = RunStats::from_reports(&blocks);
        self.events.emit(EventKind::RunComplete {
            stats: stats.clone(),
        })?;
        info!(
            job = %self.job,
            complete = stats.complete,
            failed = stats.failed,
            blocked = stats.blocked,
            cancelled = stats.cancelled,
            "run finished"
        );

        Ok(RunReport {
            job: self.job.clone(),
            blocks,
            stats,
            cancelled: self.cancelled,
        })
    }

    fn visit(&mut self, block: &Block, parent_result: Option<Value>) -> Result<BlockState> {
        if self.cancel_requested() {
            self.finish_unvisited(block, BlockState::Cancelled, None)?;
            return Ok(BlockState::Cancelled);
        }

        let path = &block.path;
        // Block-level context; node_start output and vars carry into every composition.
        let mut base = ExecutionContext::for_block(
            &self.job,
            path.to_string(),
            path.root_index(),
            parent_result,
        );

        let started = self.run_stage(NODE_START, &mut base, path)?;
        self.transition(path, BlockState::Active);
        self.events.emit(EventKind::BlockStart { path: path.clone() })?;
        if let Some(failure) = started {
            return self.fail(block, &base, failure);
        }

        let resolved = self.resolve(block)?;
        let bucket = self
            .options
            .buckets
            .bucket_for(path, resolved.bucketer().bucket_total());
        let selection = resolved.selection(bucket, self.options.operation.as_ref())?;

        let mut state = BlockState::Complete;
        let mut last_success = None;
        for local_id in 0..selection.total() {
            if self.cancel_requested() {
                state = BlockState::Cancelled;
                break;
            }

            let composition = selection.composition(resolved.pool(), local_id)?;
            let prompt = resolved.render(&composition.values)?;
            let mut ctx = base.for_composition(composition.id, composition.values, prompt);

            for stage in COMPOSITION_STAGES {
                if let Some(failure) = self.run_stage(stage, &mut ctx, path)? {
                    return self.fail(block, &base, failure);
                }
            }

            self.report_mut(path).completed += 1;
            self.events.emit(EventKind::CompositionComplete {
                path: path.clone(),
                id: composition.id,
            })?;
            last_success = Some(ctx.promoted_result());
        }

        if !block.children.is_empty() {
            if state == BlockState::Complete {
                self.transition(path, BlockState::Partial);
            }
            for child in &block.children {
                if self.visit(child, last_success.clone())? == BlockState::Cancelled {
                    state = BlockState::Cancelled;
                }
            }
        }

        if let Some(failure) = self.run_stage(NODE_END, &mut base.clone(), path)? {
            if state == BlockState::Complete {
                self.record_failure(path, failure)?;
                state = BlockState::Failed;
            } else {
                warn!(path = %path, message = %failure.message, "node_end failed on a {} block", state);
            }
        }

        self.complete(path, state)?;
        Ok(state)
    }

    /// Fail a visited block: record the failure, block its descendants, and
    /// close it out with `node_end`.
    fn fail(
        &mut self,
        block: &Block,
        base: &ExecutionContext,
        failure: Failure,
    ) -> Result<BlockState> {
        let path = &block.path;
        self.record_failure(path, failure)?;
        for child in &block.children {
            self.finish_unvisited(child, BlockState::Blocked, Some(path))?;
        }
        if let Some(end_failure) = self.run_stage(NODE_END, &mut base.clone(), path)? {
            warn!(path = %path, message = %end_failure.message, "node_end failed on a failed block");
        }
        self.complete(path, BlockState::Failed)?;
        Ok(BlockState::Failed)
    }

    fn record_failure(&mut self, path: &BlockPath, failure: Failure) -> Result<()> {
        warn!(
            path = %path,
            id = ?failure.composition_id,
            stage = %failure.stage,
            message = %failure.message,
            "block failed"
        );
        self.events.emit(EventKind::Error {
            path: path.clone(),
            id: failure.composition_id,
            message: failure.message.clone(),
        })?;
        let report = self.report_mut(path);
        if failure.composition_id.is_some() {
            report.failed += 1;
        }
        report.failure = Some(failure);
        Ok(())
    }

    /// Mark a never-visited subtree, children before parents.
    fn finish_unvisited(
        &mut self,
        block: &Block,
        state: BlockState,
        cause: Option<&BlockPath>,
    ) -> Result<()> {
        self.transition(&block.path, state);
        if let Some(cause) = cause {
            self.report_mut(&block.path).blocked_by = Some(cause.clone());
        }
        for child in &block.children {
            self.finish_unvisited(child, state, cause)?;
        }
        self.events.emit(EventKind::BlockComplete {
            path: block.path.clone(),
            state,
        })?;
        Ok(())
    }

    fn complete(&mut self, path: &BlockPath, state: BlockState) -> Result<()> {
        self.transition(path, state);
        self.events.emit(EventKind::BlockComplete {
            path: path.clone(),
            state,
        })?;
        Ok(())
    }

    /// Dispatch one stage and publish its timing.
    ///
    /// A raised script additionally fires the `error` stage with the failure
    /// payload before the failure is returned.
    fn run_stage(
        &mut self,
        stage: &str,
        ctx: &mut ExecutionContext,
        path: &BlockPath,
    ) -> Result<Option<Failure>> {
        let outcome = self.pipeline.dispatch(stage, ctx);
        self.emit_stage(stage, ctx, path, outcome.elapsed.as_millis())?;

        let StageStatus::Failed(hook_failure) = outcome.status else {
            return Ok(None);
        };

        if hook_failure.kind == FailureKind::Raised {
            ctx.error = Some(json!({
                "stage": stage,
                "script": hook_failure.script,
                "message": hook_failure.message,
            }));
            let handled = self.pipeline.dispatch(ERROR, ctx);
            self.emit_stage(ERROR, ctx, path, handled.elapsed.as_millis())?;
            if let Some(nested) = handled.failure() {
                warn!(path = %path, script = %nested.script, "error stage failed: {}", nested.message);
            }
        }

        Ok(Some(Failure {
            composition_id: ctx.composition_id,
            stage: stage.to_string(),
            message: hook_failure.message,
        }))
    }

    fn emit_stage(
        &mut self,
        stage: &str,
        ctx: &ExecutionContext,
        path: &BlockPath,
        elapsed_ms: u128,
    ) -> Result<()> {
        self.events.emit(EventKind::Stage {
            stage: stage.to_string(),
            path: path.clone(),
            id: ctx.composition_id,
            time_ms: u64::try_from(elapsed_ms).unwrap_or(u64::MAX),
        })?;
        Ok(())
    }

    fn cancel_requested(&mut self) -> bool {
        if !self.cancelled && self.cancel.is_cancelled() {
            info!(job = %self.job, "cancellation observed");
            self.cancelled = true;
        }
        self.cancelled
    }

    fn transition(&mut self, path: &BlockPath, next: BlockState) {
        let report = self.report_mut(path);
        if report.state.can_transition_to(next) {
            report.state = next;
        } else {
            warn!(path = %path, from = %report.state, to = %next, "refused state transition");
        }
    }

    fn report_mut(&mut self, path: &BlockPath) -> &mut BlockReport {
        self.reports
            .entry(path.clone())
            .or_insert_with(|| BlockReport::new(path.clone()))
    }
}
