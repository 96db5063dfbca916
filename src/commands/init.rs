//! Implementation of the `promptfan init` command.
//!
//! Scaffolds a project in the current directory:
//! 1. `promptfan.yaml` with the default windowing and an echo hook
//! 2. `themes/example.yaml`
//! 3. `jobs/example.yaml` using that theme
//!
//! Running it again never overwrites existing files.

use crate::config::Config;
use crate::context::{CONFIG_FILE, ProjectContext};
use crate::error::{PromptfanError, Result};
use std::env;
use std::fs;
use std::path::Path;

const CONFIG_TEMPLATE: &str = r#"# Window size for every dimension without an override.
max_window: 100

# Per-dimension window sizes.
# window_overrides:
#   subject: 10

# Dimensions never split into windows.
# unbucketed: [style]

themes_dir: themes
jobs_dir: jobs
event_log: true

# Unconditional scripts per stage. Stages: node_start, pre, generate, post,
# node_end, error. A script is `builtin:<name>` or a command line that reads
# {"context", "params"} JSON on stdin and prints a result object.
hooks:
  generate:
    - script: "builtin:echo"

# Guarded scripts, enabled per job with `mods: {enable, disable}`.
# mods:
#   - name: upscale
#     script: "python3 scripts/upscale.py"
#     auto_run: false
#     guard:
#       stages: [post]
#       execution_scope: ["0.*"]
"#;

const THEME_TEMPLATE: &str = r#"wildcards:
  lighting: [dawn, noon, dusk]
  style: [watercolor, photo]
"#;

const JOB_TEMPLATE: &str = r#"themes: [example]

operations:
  night:
    lighting:
      dusk: midnight

prompts:
  - text: "A {style} of a lighthouse at {lighting}"
    children:
      - text: "Close-up of the {detail}"
        wildcards:
          detail: [lamp, door]
"#;

/// Execute the `promptfan init` command.
pub fn cmd_init() -> Result<()> {
    let cwd = env::current_dir().map_err(|e| {
        PromptfanError::UserError(format!("failed to get current working directory: {}", e))
    })?;
    let project = ProjectContext::at(cwd);
    let created = scaffold(&project)?;

    if created.is_empty() {
        println!("Project already initialized at {}", project.root.display());
    } else {
        println!("Initialized promptfan project at {}", project.root.display());
        for path in created {
            println!("  created {}", path);
        }
    }
    Ok(())
}

/// Write the project files that do not exist yet; returns what was created.
fn scaffold(project: &ProjectContext) -> Result<Vec<String>> {
    let config = Config::from_yaml(CONFIG_TEMPLATE)?;
    let mut created = Vec::new();

    let files = [
        (CONFIG_FILE.to_string(), CONFIG_TEMPLATE),
        (format!("{}/example.yaml", config.themes_dir), THEME_TEMPLATE),
        (format!("{}/example.yaml", config.jobs_dir), JOB_TEMPLATE),
    ];
    for (relative, content) in files {
        if write_if_missing(&project.root.join(&relative), content)? {
            created.push(relative);
        }
    }
    Ok(created)
}

fn write_if_missing(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            PromptfanError::UserError(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }
    fs::write(path, content).map_err(|e| {
        PromptfanError::UserError(format!("failed to write '{}': {}", path.display(), e))
    })?;
    Ok(true)
}
