//! Command implementations for promptfan.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the project and job loading every command shares.

mod init;
mod inspect;
mod render;
mod run;
mod stop;

use crate::cli::Command;
use crate::config::Config;
use crate::context::ProjectContext;
use crate::error::Result;
use crate::job::Job;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Init => init::cmd_init(),
        Command::Run(args) => run::cmd_run(args),
        Command::Stop => stop::cmd_stop(),
        Command::Render(args) => render::cmd_render(args),
        Command::Inspect(args) => inspect::cmd_inspect(args),
        Command::Decode(args) => inspect::cmd_decode(args),
        Command::Encode(args) => inspect::cmd_encode(args),
        Command::Window(args) => inspect::cmd_window(args),
        Command::Bucket(args) => inspect::cmd_bucket(args),
    }
}

/// Resolve the project from the current directory and load its config.
fn load_project() -> Result<(ProjectContext, Config)> {
    let project = ProjectContext::resolve()?;
    let config = project.load_config()?;
    Ok((project, config))
}

/// Load a job and resolve every block so configuration errors surface early.
fn load_job(project: &ProjectContext, config: &Config, job: &str) -> Result<Job> {
    let job = Job::load(project, config, job)?;
    job.validate(&config.window_policy())?;
    Ok(job)
}
