//! Implementation of the `promptfan run` command.

use super::{load_job, load_project};
use crate::cli::RunArgs;
use crate::config::Config;
use crate::context::ProjectContext;
use crate::error::{PromptfanError, Result};
use crate::events::{ConsoleSink, EventStream, NdjsonSink};
use crate::hooks::{HookPipeline, HookRegistry, LayeredRuntime};
use crate::job::Job;
use crate::tree::{
    BlockState, BucketPlan, CancelSignal, RunOptions, RunReport, StopFile, TreeExecutor,
};
use tracing::info;

/// Execute the `promptfan run` command.
///
/// A run with failed blocks still executes every unaffected path; the
/// failure only shows up in the exit code.
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let (project, config) = load_project()?;
    let job = load_job(&project, &config, &args.job)?;
    let buckets = BucketPlan::parse(&args.bucket)?;
    let options = run_options(&job, &config, buckets, args.operation.as_deref())?;

    let stop = StopFile::new(project.stop_file());
    stop.clear().map_err(|e| {
        PromptfanError::UserError(format!(
            "failed to remove stale stop file '{}': {}",
            project.stop_file().display(),
            e
        ))
    })?;

    let mut events = EventStream::new().with_sink(ConsoleSink {
        verbose: args.verbose,
    });
    if config.event_log && !args.no_event_log {
        project.ensure_state_dir()?;
        events = events.with_sink(NdjsonSink::new(project.events_file()));
    }

    let report = execute(&project, &config, &job, options, &mut events, &stop)?;
    summarize(&report)
}

/// Validate run-time selections against the job.
fn run_options(
    job: &Job,
    config: &Config,
    buckets: BucketPlan,
    operation: Option<&str>,
) -> Result<RunOptions> {
    let policy = config.window_policy();
    job.validate_buckets(&buckets, &policy)?;
    let operation = operation.map(|name| job.operation(name).cloned()).transpose()?;
    Ok(RunOptions::new(policy)
        .with_buckets(buckets)
        .with_operation(operation))
}

/// Build the job's pipeline and walk its blocks.
fn execute(
    project: &ProjectContext,
    config: &Config,
    job: &Job,
    options: RunOptions,
    events: &mut EventStream,
    cancel: &dyn CancelSignal,
) -> Result<RunReport> {
    let registry = HookRegistry::from_config(config, &job.mods)?;
    let pipeline = HookPipeline::new(
        registry,
        Box::new(LayeredRuntime::for_project(&project.root)),
    );
    info!(job = %job.id, blocks = job.blocks().len(), "starting run");
    TreeExecutor::new(&job.id, &pipeline, events, cancel, options).run(&job.roots)
}

/// Map a finished run to the command's result.
fn summarize(report: &RunReport) -> Result<()> {
    let failed: Vec<String> = report
        .blocks
        .iter()
        .filter(|b| b.state == BlockState::Failed)
        .map(|b| match &b.failure {
            Some(f) => format!("{} ({}: {})", b.path, f.stage, f.message),
            None => b.path.to_string(),
        })
        .collect();

    if !failed.is_empty() {
        return Err(PromptfanError::Hook(format!(
            "{} block(s) failed: {}",
            failed.len(),
            failed.join("; ")
        )));
    }
    if report.cancelled {
        println!("Run cancelled; {} block(s) not finished", report.stats.cancelled);
    }
    Ok(())
}
