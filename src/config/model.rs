//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a promptfan project.
///
/// This struct represents the contents of `promptfan.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Windowing
    // =========================================================================
    /// Window size applied to every dimension without an override.
    #[serde(default = "default_max_window")]
    pub max_window: usize,

    /// Per-dimension window sizes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub window_overrides: BTreeMap<String, usize>,

    /// Dimensions that are never split into windows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unbucketed: Vec<String>,

    // =========================================================================
    // Layout
    // =========================================================================
    /// Directory holding theme files, relative to the project root.
    #[serde(default = "default_themes_dir")]
    pub themes_dir: String,

    /// Directory holding job files, relative to the project root.
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: String,

    /// Whether runs append events to `.promptfan/events.ndjson`.
    #[serde(default = "default_true")]
    pub event_log: bool,

    // =========================================================================
    // Scripts
    // =========================================================================
    /// Unconditional registrations, keyed by stage name.
    #[serde(default)]
    pub hooks: BTreeMap<String, Vec<HookDef>>,

    /// Guarded registrations, in resolution order.
    #[serde(default)]
    pub mods: Vec<ModDef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_window: default_max_window(),
            window_overrides: BTreeMap::new(),
            unbucketed: Vec::new(),
            themes_dir: default_themes_dir(),
            jobs_dir: default_jobs_dir(),
            event_log: default_true(),
            hooks: BTreeMap::new(),
            mods: Vec::new(),
        }
    }
}
