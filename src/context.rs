//! Project context resolution for promptfan.
//!
//! Finds the project root (the nearest ancestor directory holding
//! `promptfan.yaml`) from any working directory and resolves the paths every
//! command needs: config, themes, jobs, and the `.promptfan/` state directory
//! with its event log and stop file.

use crate::config::Config;
use crate::error::{PromptfanError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Project config file name.
pub const CONFIG_FILE: &str = "promptfan.yaml";

/// Run state directory name, relative to the project root.
pub const STATE_DIR: &str = ".promptfan";

/// Resolved paths for a promptfan project. All paths are absolute.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Directory containing `promptfan.yaml`.
    pub root: PathBuf,

    /// Run state directory (`{root}/.promptfan/`).
    pub state_dir: PathBuf,
}

impl ProjectContext {
    /// Resolve the project from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            PromptfanError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd)
    }

    /// Resolve the project by walking upward from `start`.
    pub fn resolve_from<P: AsRef<Path>>(start: P) -> Result<Self> {
        let start = start.as_ref();
        let start = start.canonicalize().map_err(|e| {
            PromptfanError::UserError(format!(
                "failed to resolve directory '{}': {}",
                start.display(),
                e
            ))
        })?;

        let root = start
            .ancestors()
            .find(|dir| dir.join(CONFIG_FILE).is_file())
            .ok_or_else(|| {
                PromptfanError::UserError(format!(
                    "no {} found in '{}' or any parent directory.\n\n\
                     Run `promptfan init` to create a project here.",
                    CONFIG_FILE,
                    start.display()
                ))
            })?
            .to_path_buf();

        Ok(Self::at(root))
    }

    /// Build a context rooted at `root` without checking for a config file.
    ///
    /// Used by `init`, where the project does not exist yet.
    pub fn at<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        let state_dir = root.join(STATE_DIR);
        Self { root, state_dir }
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Load the project config.
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config_path())
    }

    /// Get the directory holding theme files.
    pub fn themes_dir(&self, config: &Config) -> PathBuf {
        self.root.join(&config.themes_dir)
    }

    /// Get the directory holding job files.
    pub fn jobs_dir(&self, config: &Config) -> PathBuf {
        self.root.join(&config.jobs_dir)
    }

    /// Get the path to a job file.
    ///
    /// An argument that already points at an existing file is used as-is.
    pub fn job_path(&self, config: &Config, job: &str) -> PathBuf {
        let direct = PathBuf::from(job);
        if direct.is_file() {
            return direct;
        }
        let file = if job.ends_with(".yaml") || job.ends_with(".yml") {
            job.to_string()
        } else {
            format!("{}.yaml", job)
        };
        self.jobs_dir(config).join(file)
    }

    /// Get the path to the run event log.
    pub fn events_file(&self) -> PathBuf {
        self.state_dir.join("events.ndjson")
    }

    /// Get the path to the stop file that cancels a running job.
    pub fn stop_file(&self) -> PathBuf {
        self.state_dir.join("STOP")
    }

    /// Create the state directory if it does not exist yet.
    pub fn ensure_state_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir).map_err(|e| {
            PromptfanError::UserError(format!(
                "failed to create state directory '{}': {}",
                self.state_dir.display(),
                e
            ))
        })
    }
}
