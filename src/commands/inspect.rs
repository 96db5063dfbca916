//! Implementation of `inspect` and the addressing commands.
//!
//! `decode`, `encode`, `window` and `bucket` print JSON so external tools
//! can address compositions and buckets by ID without running anything.

use super::{load_job, load_project};
use crate::cli::{BucketArgs, DecodeArgs, EncodeArgs, JobArgs, WindowArgs};
use crate::error::{PromptfanError, Result};
use crate::job::Job;
use crate::space::WindowPolicy;
use crate::tree::{BlockPath, ResolvedBlock};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Execute the `promptfan inspect` command.
pub fn cmd_inspect(args: JobArgs) -> Result<()> {
    let (project, config) = load_project()?;
    let job = load_job(&project, &config, &args.job)?;
    print!("{}", inspect_job(&job, &config.window_policy())?);
    Ok(())
}

pub fn cmd_decode(args: DecodeArgs) -> Result<()> {
    let (block, path) = load_block(&args.job, &args.path)?;
    print_json(&decode(&block, &path, args.id)?)
}

pub fn cmd_encode(args: EncodeArgs) -> Result<()> {
    let (block, path) = load_block(&args.job, &args.path)?;
    let indices = parse_indices(&args.indices)?;
    print_json(&encode(&block, &path, &indices)?)
}

pub fn cmd_window(args: WindowArgs) -> Result<()> {
    let (block, _) = load_block(&args.job, &args.path)?;
    let window = block.bucketer().resolve_window(&args.dimension, args.index)?;
    print_json(&json!(window))
}

pub fn cmd_bucket(args: BucketArgs) -> Result<()> {
    let (block, path) = load_block(&args.job, &args.path)?;
    print_json(&bucket(&block, &path, args.id)?)
}

fn load_block(job: &str, path: &str) -> Result<(ResolvedBlock, BlockPath)> {
    let (project, config) = load_project()?;
    let job = load_job(&project, &config, job)?;
    let path: BlockPath = path.parse()?;
    let block = job.resolve_block(&path, &config.window_policy())?;
    Ok((block, path))
}

fn print_json(value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| PromptfanError::UserError(format!("failed to serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

/// Human-readable per-block summary.
fn inspect_job(job: &Job, policy: &WindowPolicy) -> Result<String> {
    let mut out = format!("Job: {}\n", job.id);
    for block in job.blocks() {
        let resolved = ResolvedBlock::resolve(block, policy)?;
        let bucketer = resolved.bucketer();
        out.push_str(&format!(
            "\n[{}] {}\n  compositions: {}  buckets: {}\n",
            block.path,
            block.template,
            resolved.pool().total(),
            bucketer.bucket_total()
        ));
        for dim in resolved.pool().dimensions() {
            out.push_str(&format!(
                "  {:<16} {:>4} value(s)  {:>3} window(s) of {:<4} {}\n",
                dim.name,
                dim.len(),
                bucketer.window_count(&dim.name)?,
                bucketer.window_size(&dim.name)?,
                dim.origin
            ));
        }
    }
    Ok(out)
}

fn decode(block: &ResolvedBlock, path: &BlockPath, id: u64) -> Result<Value> {
    let pool = block.pool();
    let indices = pool.decode(id)?;
    let values = pool.composition(id)?;
    Ok(json!({
        "path": path,
        "id": id,
        "indices": indices,
        "values": values,
        "prompt": block.render(&values)?,
    }))
}

fn encode(block: &ResolvedBlock, path: &BlockPath, indices: &BTreeMap<String, usize>) -> Result<Value> {
    let id = block.pool().encode(indices)?;
    Ok(json!({ "path": path, "id": id }))
}

fn bucket(block: &ResolvedBlock, path: &BlockPath, id: u64) -> Result<Value> {
    let bucketer = block.bucketer();
    Ok(json!({
        "path": path,
        "bucket": id,
        "window_indices": bucketer.bucket_decode(id)?,
        "windows": bucketer.windows(id)?,
    }))
}

/// Parse `name=index` arguments.
fn parse_indices(args: &[String]) -> Result<BTreeMap<String, usize>> {
    let mut indices = BTreeMap::new();
    for arg in args {
        let (name, index) = arg.split_once('=').ok_or_else(|| {
            PromptfanError::UserError(format!("expected name=index, got '{}'", arg))
        })?;
        let index: usize = index.trim().parse().map_err(|_| {
            PromptfanError::UserError(format!("invalid index '{}' for dimension '{}'", index, name))
        })?;
        if indices.insert(name.trim().to_string(), index).is_some() {
            return Err(PromptfanError::UserError(format!(
                "dimension '{}' given more than once",
                name
            )));
        }
    }
    Ok(indices)
}
