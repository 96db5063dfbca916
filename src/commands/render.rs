//! Implementation of the `promptfan render` command.

use super::{load_job, load_project};
use crate::cli::RenderArgs;
use crate::error::Result;
use crate::job::Job;
use crate::space::{Operation, WindowPolicy};
use crate::tree::{BlockPath, BucketPlan, ResolvedBlock};

/// Prompts produced by one block.
#[derive(Debug, Clone, PartialEq)]
struct RenderedBlock {
    path: BlockPath,
    /// Compositions in the block's full space.
    total: u64,
    /// `(composition id, prompt)` in ascending id order.
    prompts: Vec<(u64, String)>,
}

/// Execute the `promptfan render` command.
pub fn cmd_render(args: RenderArgs) -> Result<()> {
    let (project, config) = load_project()?;
    let job = load_job(&project, &config, &args.job)?;
    let operation = args
        .operation
        .as_deref()
        .map(|name| job.operation(name))
        .transpose()?;

    let buckets = BucketPlan::parse(&args.bucket)?;
    let rendered = render_job(&job, &config.window_policy(), &buckets, operation)?;
    for block in rendered {
        println!(
            "[{}] {} of {} composition(s)",
            block.path,
            block.prompts.len(),
            block.total
        );
        for (id, prompt) in block.prompts {
            println!("  #{:<6} {}", id, prompt);
        }
    }
    Ok(())
}

/// Render every block for build-time output.
///
/// Blocks the plan gives no bucket are capped to their first bucket.
fn render_job(
    job: &Job,
    policy: &WindowPolicy,
    buckets: &BucketPlan,
    operation: Option<&Operation>,
) -> Result<Vec<RenderedBlock>> {
    job.validate_buckets(buckets, policy)?;

    let mut out = Vec::new();
    for block in job.blocks() {
        let resolved = ResolvedBlock::resolve(block, policy)?;
        let bucket = buckets.bucket_for(&block.path, resolved.bucketer().bucket_total());
        let selection = resolved.build_selection(bucket, operation)?;
        let mut prompts = Vec::with_capacity(selection.total().min(1024) as usize);
        for local_id in 0..selection.total() {
            let composition = selection.composition(resolved.pool(), local_id)?;
            prompts.push((composition.id, resolved.render(&composition.values)?));
        }
        out.push(RenderedBlock {
            path: block.path.clone(),
            total: resolved.pool().total(),
            prompts,
        });
    }
    Ok(out)
}
