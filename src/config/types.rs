//! Configuration types and defaults for promptfan.
//!
//! This module defines hook and mod registrations and the default value
//! functions used by the Config struct.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Default value functions for serde
pub(crate) fn default_max_window() -> usize {
    100
}
pub(crate) fn default_themes_dir() -> String {
    "themes".to_string()
}
pub(crate) fn default_jobs_dir() -> String {
    "jobs".to_string()
}
pub(crate) fn default_true() -> bool {
    true
}

/// An unconditional script registration for one stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookDef {
    /// Display name used in events and logs (defaults to the script).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Script reference (`builtin:<name>` or a command line).
    pub script: String,

    /// Parameters passed to the script alongside the context.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A guarded script registration.
///
/// Whether a mod is enabled for a job is resolved as: job-level disable,
/// then job-level enable, then the global `auto_run` default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModDef {
    /// Unique mod name; jobs enable and disable mods by this name.
    pub name: String,

    /// Script reference (`builtin:<name>` or a command line).
    pub script: String,

    /// Parameters passed to the script alongside the context.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,

    /// Whether the mod runs when a job neither enables nor disables it.
    pub auto_run: bool,

    /// Predicate deciding which stage invocations the mod joins.
    pub guard: GuardDef,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Guard predicate fields. Every non-empty list must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardDef {
    /// Stage names the mod runs in.
    pub stages: Vec<String>,

    /// Block-path glob patterns (e.g. `0.*`); empty matches every block.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub execution_scope: Vec<String>,

    /// Composition IDs the mod runs for; empty allows all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub address_index: Vec<u64>,

    /// Root prompt indices the mod runs for; empty allows all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_index: Vec<usize>,
}
