//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{PromptfanError, Result};
use crate::space::WindowPolicy;
use globset::Glob;
use std::collections::BTreeSet;
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            PromptfanError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| PromptfanError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            PromptfanError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `max_window` and every `window_overrides` entry must be positive
    /// - hook and mod scripts must be non-empty
    /// - mod names must be non-empty and unique
    /// - `execution_scope` entries must be valid glob patterns
    pub fn validate(&self) -> Result<()> {
        if self.max_window == 0 {
            return Err(PromptfanError::Configuration(
                "config validation failed: max_window must be greater than 0".to_string(),
            ));
        }

        for (name, size) in &self.window_overrides {
            if *size == 0 {
                return Err(PromptfanError::Configuration(format!(
                    "config validation failed: window_overrides.{} must be greater than 0",
                    name
                )));
            }
        }

        for (stage, hooks) in &self.hooks {
            if stage.trim().is_empty() {
                return Err(PromptfanError::Configuration(
                    "config validation failed: hook stage names must be non-empty".to_string(),
                ));
            }
            if hooks.iter().any(|h| h.script.trim().is_empty()) {
                return Err(PromptfanError::Configuration(format!(
                    "config validation failed: a hook for stage '{}' has an empty script",
                    stage
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for m in &self.mods {
            if m.name.trim().is_empty() {
                return Err(PromptfanError::Configuration(
                    "config validation failed: every mod needs a name".to_string(),
                ));
            }
            if !seen.insert(m.name.as_str()) {
                return Err(PromptfanError::Configuration(format!(
                    "config validation failed: mod '{}' is defined more than once",
                    m.name
                )));
            }
            if m.script.trim().is_empty() {
                return Err(PromptfanError::Configuration(format!(
                    "config validation failed: mod '{}' has an empty script",
                    m.name
                )));
            }
            if m.guard.stages.is_empty() {
                return Err(PromptfanError::Configuration(format!(
                    "config validation failed: mod '{}' must list at least one stage in guard.stages",
                    m.name
                )));
            }
            for pattern in &m.guard.execution_scope {
                Glob::new(pattern).map_err(|e| {
                    PromptfanError::Configuration(format!(
                        "config validation failed: mod '{}' has invalid execution_scope '{}': {}",
                        m.name, pattern, e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Window sizing rules derived from this config.
    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            default_max: self.max_window,
            overrides: self.window_overrides.clone(),
            excluded: self.unbucketed.iter().cloned().collect(),
        }
    }

    /// Look up a mod definition by name.
    pub fn find_mod(&self, name: &str) -> Option<&super::ModDef> {
        self.mods.iter().find(|m| m.name == name)
    }
}
