//! Theme loading and block-tree construction.

use super::model::{JobFile, PromptDef, ThemeFile};
use crate::config::Config;
use crate::context::ProjectContext;
use crate::error::{PromptfanError, Result};
use crate::hooks::ModSelection;
use crate::space::{Dimension, Operation, Origin, WindowPolicy};
use crate::tree::{Block, BlockPath, BucketPlan, ResolvedBlock};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Theme names map straight to file names, so no separators or leading dots.
static THEME_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("Invalid theme name regex"));

/// Loads `themes/<name>.yaml` on demand and keeps each file once.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    dir: PathBuf,
    cache: HashMap<String, ThemeFile>,
}

impl ThemeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Make a theme available without touching disk.
    pub fn insert(&mut self, name: impl Into<String>, theme: ThemeFile) {
        self.cache.insert(name.into(), theme);
    }

    pub fn get(&mut self, name: &str) -> Result<&ThemeFile> {
        if !self.cache.contains_key(name) {
            let theme = self.load(name)?;
            self.cache.insert(name.to_string(), theme);
        }
        self.cache.get(name).ok_or_else(|| {
            PromptfanError::Configuration(format!("theme '{}' could not be loaded", name))
        })
    }

    /// The theme's wildcards as dimensions tagged with the theme's origin.
    pub fn dimensions(&mut self, name: &str) -> Result<Vec<Dimension>> {
        let theme = self.get(name)?;
        Ok(theme
            .wildcards
            .iter()
            .map(|(dim, values)| {
                Dimension::new(dim.clone(), values.clone(), Origin::Theme(name.to_string()))
            })
            .collect())
    }

    fn load(&self, name: &str) -> Result<ThemeFile> {
        if !THEME_NAME_REGEX.is_match(name) {
            return Err(PromptfanError::Configuration(format!(
                "invalid theme name '{}'",
                name
            )));
        }
        let path = self.dir.join(format!("{}.yaml", name));
        let content = std::fs::read_to_string(&path).map_err(|e| {
            PromptfanError::Configuration(format!(
                "theme '{}' not found at '{}': {}",
                name,
                path.display(),
                e
            ))
        })?;
        debug!(theme = name, path = %path.display(), "loaded theme");
        if content.trim().is_empty() {
            return Ok(ThemeFile::default());
        }
        serde_yaml::from_str(&content).map_err(|e| {
            PromptfanError::Configuration(format!(
                "failed to parse theme '{}' ({}): {}",
                name,
                path.display(),
                e
            ))
        })
    }
}

/// A loaded job: its block forest plus per-job selections.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub roots: Vec<Block>,
    pub operations: BTreeMap<String, Operation>,
    pub mods: ModSelection,
}

impl Job {
    /// Load a job by id or path from a project.
    pub fn load(project: &ProjectContext, config: &Config, job: &str) -> Result<Self> {
        let path = project.job_path(config, job);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            PromptfanError::UserError(format!(
                "failed to read job file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut themes = ThemeStore::new(project.themes_dir(config));
        Self::from_yaml(job_id(&path), &content, &mut themes)
    }

    /// Parse a job and build its block tree.
    pub fn from_yaml(id: impl Into<String>, yaml: &str, themes: &mut ThemeStore) -> Result<Self> {
        let id = id.into();
        let file: JobFile = if yaml.trim().is_empty() {
            JobFile::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                PromptfanError::UserError(format!("failed to parse job '{}': {}", id, e))
            })?
        };
        Self::build(id, file, themes)
    }

    pub fn build(id: String, file: JobFile, themes: &mut ThemeStore) -> Result<Self> {
        if file.prompts.is_empty() {
            return Err(PromptfanError::Configuration(format!(
                "job '{}' defines no prompts",
                id
            )));
        }

        let mut roots = Vec::with_capacity(file.prompts.len());
        for (index, def) in file.prompts.iter().enumerate() {
            let root_themes = def.themes.as_deref().unwrap_or(&file.themes);
            roots.push(build_block(def, BlockPath::root(index), root_themes, themes)?);
        }

        Ok(Self {
            id,
            roots,
            operations: file.operations,
            mods: file.mods,
        })
    }

    /// Every block in depth-first order.
    pub fn blocks(&self) -> Vec<&Block> {
        self.roots.iter().flat_map(Block::walk).collect()
    }

    pub fn block(&self, path: &BlockPath) -> Result<&Block> {
        Block::find(&self.roots, path).ok_or_else(|| {
            PromptfanError::UserError(format!("job '{}' has no block at path {}", self.id, path))
        })
    }

    /// Resolve one block outside of a run.
    pub fn resolve_block(&self, path: &BlockPath, policy: &WindowPolicy) -> Result<ResolvedBlock> {
        ResolvedBlock::resolve(self.block(path)?, policy)
    }

    /// Resolve every block once so configuration errors surface before a run.
    pub fn validate(&self, policy: &WindowPolicy) -> Result<()> {
        for block in self.blocks() {
            ResolvedBlock::resolve(block, policy)?;
        }
        Ok(())
    }

    /// Check a bucket plan against the job's blocks.
    ///
    /// A pinned bucket must exist in its block. A run-wide bucket must exist
    /// in at least one block; blocks with fewer buckets run their default
    /// selection.
    pub fn validate_buckets(&self, plan: &BucketPlan, policy: &WindowPolicy) -> Result<()> {
        for (path, bucket) in &plan.per_block {
            let total = self.resolve_block(path, policy)?.bucketer().bucket_total();
            if *bucket >= total {
                return Err(PromptfanError::Range(format!(
                    "bucket {} is outside block {} (which has {} bucket(s))",
                    bucket, path, total
                )));
            }
        }

        if let Some(bucket) = plan.all {
            let mut largest = 0;
            for block in self.blocks() {
                let total = ResolvedBlock::resolve(block, policy)?.bucketer().bucket_total();
                largest = largest.max(total);
            }
            if bucket >= largest {
                return Err(PromptfanError::Range(format!(
                    "bucket {} is outside every block of job '{}' (largest has {} bucket(s))",
                    bucket, self.id, largest
                )));
            }
        }
        Ok(())
    }

    pub fn operation(&self, name: &str) -> Result<&Operation> {
        self.operations.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.operations.keys().map(String::as_str).collect();
            PromptfanError::UserError(format!(
                "job '{}' has no operation '{}' (available: {})",
                self.id,
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })
    }
}

fn build_block(
    def: &PromptDef,
    path: BlockPath,
    theme_names: &[String],
    themes: &mut ThemeStore,
) -> Result<Block> {
    let mut block = Block::new(path, def.text.clone());
    block.local = def
        .wildcards
        .iter()
        .map(|(name, values)| Dimension::local(name.clone(), values.clone()))
        .collect();
    for theme in theme_names {
        block.themed.extend(themes.dimensions(theme)?);
    }

    for (index, child) in def.children.iter().enumerate() {
        let child_themes = child.themes.as_deref().unwrap_or(&[]);
        let child_path = block.path.child(index);
        block
            .children
            .push(build_block(child, child_path, child_themes, themes)?);
    }
    Ok(block)
}

fn job_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
