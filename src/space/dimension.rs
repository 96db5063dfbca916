//! Dimensions and the per-block dimension pool.
//!
//! A pool merges local and theme-sourced dimensions into one list sorted by
//! name, rejects empty or colliding dimensions, and addresses compositions
//! through an [`Odometer`] whose last position is the alphabetically last
//! dimension.

use super::odometer::Odometer;
use crate::error::{PromptfanError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static DIMENSION_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]*$").expect("Invalid dimension name regex")
});

/// Where a dimension was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Declared inline on the block.
    Local,
    /// Pulled from the named theme file.
    Theme(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::Theme(name) => write!(f, "theme:{}", name),
        }
    }
}

/// A named, ordered list of values contributing one axis to the space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub values: Vec<String>,
    pub origin: Origin,
}

impl Dimension {
    pub fn new<I, S>(name: impl Into<String>, values: I, origin: Origin) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            origin,
        }
    }

    pub fn local<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, values, Origin::Local)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Validate a dimension name.
pub fn validate_dimension_name(name: &str) -> Result<()> {
    if !DIMENSION_NAME_REGEX.is_match(name) {
        return Err(PromptfanError::Configuration(format!(
            "invalid dimension name '{}': use letters, digits, '_' or '-' (not leading '-')",
            name
        )));
    }
    Ok(())
}

/// The canonical, uniquely named set of dimensions for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionPool {
    dimensions: Vec<Dimension>,
    odometer: Odometer,
}

impl DimensionPool {
    /// Merge local and theme dimensions into one pool.
    pub fn merge(local: Vec<Dimension>, theme: Vec<Dimension>) -> Result<Self> {
        let mut all = local;
        all.extend(theme);
        Self::new(all)
    }

    /// Build a pool from dimensions of any origin.
    ///
    /// Fails with a configuration error when a dimension has no values, has
    /// an invalid name, or shares its name with another dimension.
    pub fn new(mut dimensions: Vec<Dimension>) -> Result<Self> {
        for dim in &dimensions {
            validate_dimension_name(&dim.name)?;
            if dim.is_empty() {
                return Err(PromptfanError::Configuration(format!(
                    "dimension '{}' ({}) has no values",
                    dim.name, dim.origin
                )));
            }
        }

        // Stable sort keeps declaration order among equal names for the message below.
        dimensions.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in dimensions.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(PromptfanError::Configuration(format!(
                    "dimension '{}' is declared by both {} and {}",
                    pair[0].name, pair[0].origin, pair[1].origin
                )));
            }
        }

        let odometer = Odometer::new(dimensions.iter().map(Dimension::len).collect())?;
        Ok(Self {
            dimensions,
            odometer,
        })
    }

    /// Dimensions in canonical (name-sorted) order.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Dimension> {
        self.position(name).map(|i| &self.dimensions[i])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.dimensions
            .binary_search_by(|d| d.name.as_str().cmp(name))
            .ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Number of compositions: the product of every dimension's length.
    pub fn total(&self) -> u64 {
        self.odometer.total()
    }

    /// Map a composition ID to a value index per dimension.
    pub fn decode(&self, id: u64) -> Result<BTreeMap<String, usize>> {
        let digits = self.odometer.decode(id).map_err(|_| self.range_error(id))?;
        Ok(self
            .dimensions
            .iter()
            .zip(digits)
            .map(|(d, i)| (d.name.clone(), i))
            .collect())
    }

    /// Map a value index per dimension back to its composition ID.
    pub fn encode(&self, indices: &BTreeMap<String, usize>) -> Result<u64> {
        let digits = self.digits_for(indices)?;
        self.odometer.encode(&digits)
    }

    /// Encode from digits already in canonical order.
    pub(crate) fn encode_digits(&self, digits: &[usize]) -> Result<u64> {
        self.odometer.encode(digits)
    }

    /// Resolve a composition ID to the selected value per dimension.
    pub fn composition(&self, id: u64) -> Result<BTreeMap<String, String>> {
        let indices = self.decode(id)?;
        Ok(indices
            .into_iter()
            .map(|(name, index)| {
                let value = self
                    .get(&name)
                    .map(|d| d.values[index].clone())
                    .unwrap_or_default();
                (name, value)
            })
            .collect())
    }

    fn digits_for(&self, indices: &BTreeMap<String, usize>) -> Result<Vec<usize>> {
        if let Some(unknown) = indices.keys().find(|k| !self.contains(k)) {
            return Err(PromptfanError::Range(format!(
                "unknown dimension '{}' (known: {})",
                unknown,
                self.names().collect::<Vec<_>>().join(", ")
            )));
        }
        self.dimensions
            .iter()
            .map(|d| {
                let index = *indices.get(&d.name).ok_or_else(|| {
                    PromptfanError::Range(format!("missing index for dimension '{}'", d.name))
                })?;
                if index >= d.len() {
                    return Err(PromptfanError::Range(format!(
                        "index {} for dimension '{}' is outside [0, {}]",
                        index,
                        d.name,
                        d.len() - 1
                    )));
                }
                Ok(index)
            })
            .collect()
    }

    fn range_error(&self, id: u64) -> PromptfanError {
        PromptfanError::Range(format!(
            "composition {} is outside [0, {}]",
            id,
            self.total() - 1
        ))
    }
}
