//! CLI argument parsing for promptfan.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};

/// Promptfan: expand prompt templates into every combination of their
/// wildcards and run a scripted lifecycle over each one.
///
/// A job is a tree of prompt blocks. Each block's wildcards span a
/// combination space that is addressed by integer ID and can be cut into
/// windowed buckets.
#[derive(Parser, Debug)]
#[command(name = "promptfan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for promptfan.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a promptfan project in the current directory.
    ///
    /// Writes `promptfan.yaml`, a `themes/` directory with an example theme
    /// and `jobs/example.yaml`. Existing files are left untouched.
    Init,

    /// Run a job's hook lifecycle over its blocks.
    Run(RunArgs),

    /// Ask a running job to stop before its next composition.
    Stop,

    /// Print the prompts a job would produce, without running hooks.
    ///
    /// Each dimension is capped to its first window unless a bucket is given.
    Render(RenderArgs),

    /// Show each block's dimensions, composition total and bucket total.
    Inspect(JobArgs),

    /// Show the values selected by a composition ID.
    Decode(DecodeArgs),

    /// Compute the composition ID for per-dimension value indices.
    Encode(EncodeArgs),

    /// Show the values in one window of a dimension.
    Window(WindowArgs),

    /// Show the windows selected by a bucket ID.
    Bucket(BucketArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Job id (file name under the jobs directory) or path to a job file.
    pub job: String,

    /// Bucket to run: `ID` for every block that has it, or `PATH=ID` for one
    /// block. Repeatable; blocks without a bucket run their full space.
    #[arg(long, value_name = "[PATH=]ID")]
    pub bucket: Vec<String>,

    /// Apply a named operation from the job before rendering prompts.
    #[arg(long)]
    pub operation: Option<String>,

    /// Do not append events to `.promptfan/events.ndjson`.
    #[arg(long)]
    pub no_event_log: bool,

    /// Also print stage and composition events.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the `render` command.
#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Job id or path to a job file.
    pub job: String,

    /// Bucket to render, as `ID` or `PATH=ID` (defaults to the first).
    #[arg(long, value_name = "[PATH=]ID")]
    pub bucket: Vec<String>,

    /// Apply a named operation from the job.
    #[arg(long)]
    pub operation: Option<String>,
}

/// A job argument on its own.
#[derive(Parser, Debug)]
pub struct JobArgs {
    /// Job id or path to a job file.
    pub job: String,
}

/// Arguments for the `decode` command.
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Job id or path to a job file.
    pub job: String,

    /// Block path (e.g., 0.1).
    pub path: String,

    /// Composition ID.
    pub id: u64,
}

/// Arguments for the `encode` command.
#[derive(Parser, Debug)]
pub struct EncodeArgs {
    /// Job id or path to a job file.
    pub job: String,

    /// Block path (e.g., 0.1).
    pub path: String,

    /// Value index per dimension, as `name=index`.
    #[arg(required = true)]
    pub indices: Vec<String>,
}

/// Arguments for the `window` command.
#[derive(Parser, Debug)]
pub struct WindowArgs {
    /// Job id or path to a job file.
    pub job: String,

    /// Block path (e.g., 0.1).
    pub path: String,

    /// Dimension name.
    pub dimension: String,

    /// Window index.
    pub index: usize,
}

/// Arguments for the `bucket` command.
#[derive(Parser, Debug)]
pub struct BucketArgs {
    /// Job id or path to a job file.
    pub job: String,

    /// Block path (e.g., 0.1).
    pub path: String,

    /// Bucket ID.
    pub id: u64,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
