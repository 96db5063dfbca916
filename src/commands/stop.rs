//! Implementation of the `promptfan stop` command.

use crate::context::ProjectContext;
use crate::error::{PromptfanError, Result};

/// Execute the `promptfan stop` command.
///
/// Creates the stop file; a running job notices it before its next
/// composition and ends with its unfinished blocks `CANCELLED`.
pub fn cmd_stop() -> Result<()> {
    let project = ProjectContext::resolve()?;
    request_stop(&project)?;
    println!(
        "Stop requested; the running job will cancel before its next composition ({})",
        project.stop_file().display()
    );
    Ok(())
}

fn request_stop(project: &ProjectContext) -> Result<()> {
    project.ensure_state_dir()?;
    let path = project.stop_file();
    std::fs::write(&path, chrono::Utc::now().to_rfc3339()).map_err(|e| {
        PromptfanError::UserError(format!(
            "failed to write stop file '{}': {}",
            path.display(),
            e
        ))
    })
}
