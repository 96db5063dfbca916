//! On-disk shapes of theme and job files.

use crate::hooks::ModSelection;
use crate::space::Operation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `themes/<name>.yaml`: named wildcard lists shared across jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeFile {
    pub wildcards: BTreeMap<String, Vec<String>>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// `jobs/<id>.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobFile {
    /// Themes applied to root prompts that list none of their own.
    pub themes: Vec<String>,

    /// Mods switched on or off for this job.
    pub mods: ModSelection,

    /// Named value remaps selectable at run time.
    pub operations: BTreeMap<String, Operation>,

    /// Root blocks, in order.
    pub prompts: Vec<PromptDef>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One block of a job file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptDef {
    pub text: String,

    /// Local dimensions.
    pub wildcards: BTreeMap<String, Vec<String>>,

    /// Themes for this block; `None` on a root falls back to the job's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub themes: Option<Vec<String>>,

    pub children: Vec<PromptDef>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}
