//! Value remapping inside resolved windows.

use super::bucket::{Window, WindowMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-dimension `{source value -> replacement}` remaps.
///
/// Values not listed pass through untouched, and so do dimensions the
/// operation does not mention. Window shape never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation {
    pub remaps: BTreeMap<String, BTreeMap<String, String>>,
}

impl Operation {
    pub fn new(remaps: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self { remaps }
    }

    pub fn is_empty(&self) -> bool {
        self.remaps.values().all(BTreeMap::is_empty)
    }

    /// Apply the remaps to a single window.
    pub fn apply_window(&self, window: &Window) -> Window {
        let Some(mapping) = self.remaps.get(&window.dimension) else {
            return window.clone();
        };
        Window {
            values: window
                .values
                .iter()
                .map(|v| mapping.get(v).cloned().unwrap_or_else(|| v.clone()))
                .collect(),
            ..window.clone()
        }
    }

    /// Apply the remaps to every window of a selection.
    pub fn apply(&self, windows: &WindowMap) -> WindowMap {
        windows
            .iter()
            .map(|(name, window)| (name.clone(), self.apply_window(window)))
            .collect()
    }
}
