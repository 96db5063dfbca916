//! Windowing of dimensions into fixed-size buckets.
//!
//! Each dimension is cut into contiguous windows of at most `max` values
//! (the last one may be shorter). A bucket-composition picks one window per
//! dimension and is addressed with the same mixed-radix scheme as a
//! composition, but over window counts.

use super::dimension::DimensionPool;
use super::odometer::Odometer;
use crate::error::{PromptfanError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Window sizing rules for a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Window size for dimensions without an override.
    pub default_max: usize,
    /// Per-dimension window sizes.
    pub overrides: BTreeMap<String, usize>,
    /// Dimensions that always form a single window covering every value.
    pub excluded: BTreeSet<String>,
}

impl WindowPolicy {
    pub fn uniform(max: usize) -> Self {
        Self {
            default_max: max,
            overrides: BTreeMap::new(),
            excluded: BTreeSet::new(),
        }
    }

    /// Window size for `name`, or `None` when the dimension is excluded.
    pub fn max_for(&self, name: &str) -> Option<usize> {
        if self.excluded.contains(name) {
            return None;
        }
        Some(self.overrides.get(name).copied().unwrap_or(self.default_max))
    }
}

/// A contiguous slice `[start, end)` of one dimension's values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Window {
    pub dimension: String,
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub values: Vec<String>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One window per dimension, keyed by dimension name.
pub type WindowMap = BTreeMap<String, Window>;

/// Window arithmetic over a resolved pool.
#[derive(Debug, Clone)]
pub struct Bucketer {
    pool: DimensionPool,
    sizes: Vec<usize>,
    odometer: Odometer,
}

impl Bucketer {
    pub fn new(pool: DimensionPool, policy: &WindowPolicy) -> Result<Self> {
        let mut sizes = Vec::with_capacity(pool.dimensions().len());
        for dim in pool.dimensions() {
            let size = match policy.max_for(&dim.name) {
                Some(0) => {
                    return Err(PromptfanError::Configuration(format!(
                        "window size for dimension '{}' must be greater than 0",
                        dim.name
                    )));
                }
                Some(max) => max.min(dim.len()),
                None => dim.len(),
            };
            sizes.push(size);
        }
        let counts = pool
            .dimensions()
            .iter()
            .zip(&sizes)
            .map(|(d, &size)| d.len().div_ceil(size))
            .collect();
        let odometer = Odometer::new(counts)?;
        Ok(Self {
            pool,
            sizes,
            odometer,
        })
    }

    pub fn pool(&self) -> &DimensionPool {
        &self.pool
    }

    /// Number of windows `ceil(len / max)` for a dimension.
    pub fn window_count(&self, name: &str) -> Result<usize> {
        let position = self.position(name)?;
        Ok(self.odometer.radices()[position])
    }

    /// Effective window size for a dimension.
    pub fn window_size(&self, name: &str) -> Result<usize> {
        Ok(self.sizes[self.position(name)?])
    }

    /// Number of bucket-compositions: the product of every window count.
    pub fn bucket_total(&self) -> u64 {
        self.odometer.total()
    }

    /// Map a bucket ID to a window index per dimension.
    pub fn bucket_decode(&self, bucket_id: u64) -> Result<BTreeMap<String, usize>> {
        let digits = self.odometer.decode(bucket_id).map_err(|_| {
            PromptfanError::Range(format!(
                "bucket {} is outside [0, {}]",
                bucket_id,
                self.bucket_total() - 1
            ))
        })?;
        Ok(self
            .pool
            .names()
            .map(str::to_string)
            .zip(digits)
            .collect())
    }

    /// Map a window index per dimension back to its bucket ID.
    pub fn bucket_encode(&self, windows: &BTreeMap<String, usize>) -> Result<u64> {
        if let Some(unknown) = windows.keys().find(|k| !self.pool.contains(k)) {
            return Err(PromptfanError::Range(format!(
                "unknown dimension '{}'",
                unknown
            )));
        }
        let digits = self
            .pool
            .names()
            .map(|name| {
                windows.get(name).copied().ok_or_else(|| {
                    PromptfanError::Range(format!("missing window index for dimension '{}'", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.odometer.encode(&digits)
    }

    /// The ordered values `[index*max, min(len, (index+1)*max))` of a dimension.
    pub fn resolve_window(&self, name: &str, index: usize) -> Result<Window> {
        let position = self.position(name)?;
        let count = self.odometer.radices()[position];
        if index >= count {
            return Err(PromptfanError::Range(format!(
                "window {} of dimension '{}' is outside [0, {}]",
                index,
                name,
                count - 1
            )));
        }
        let dim = &self.pool.dimensions()[position];
        let size = self.sizes[position];
        let start = index * size;
        let end = dim.len().min(start + size);
        Ok(Window {
            dimension: dim.name.clone(),
            index,
            start,
            end,
            values: dim.values[start..end].to_vec(),
        })
    }

    /// Resolve every dimension's window for a bucket ID.
    pub fn windows(&self, bucket_id: u64) -> Result<WindowMap> {
        self.bucket_decode(bucket_id)?
            .into_iter()
            .map(|(name, index)| {
                let window = self.resolve_window(&name, index)?;
                Ok((name, window))
            })
            .collect()
    }

    /// Windows for build-time output.
    ///
    /// Without an explicit bucket every dimension is capped to its first
    /// window, which is bucket 0.
    pub fn build_selection(&self, bucket_id: Option<u64>) -> Result<WindowMap> {
        self.windows(bucket_id.unwrap_or(0))
    }

    /// A single window per dimension covering all of its values.
    pub fn full_selection(&self) -> WindowMap {
        self.pool
            .dimensions()
            .iter()
            .map(|d| {
                (
                    d.name.clone(),
                    Window {
                        dimension: d.name.clone(),
                        index: 0,
                        start: 0,
                        end: d.len(),
                        values: d.values.clone(),
                    },
                )
            })
            .collect()
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.pool
            .position(name)
            .ok_or_else(|| PromptfanError::Range(format!("unknown dimension '{}'", name)))
    }
}

/// One composition inside a window selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedComposition {
    /// Position inside the selection, `0..selection.total()`.
    pub local_id: u64,
    /// Address of the same composition in the block's full space.
    pub id: u64,
    /// Selected value per dimension.
    pub values: BTreeMap<String, String>,
}

/// The sub-space spanned by one window per dimension.
///
/// Iterating local IDs in ascending order visits global composition IDs in
/// ascending order too.
#[derive(Debug, Clone)]
pub struct Selection {
    windows: WindowMap,
    odometer: Odometer,
}

impl Selection {
    /// Build a selection; `windows` must cover exactly the pool's dimensions.
    pub fn new(pool: &DimensionPool, windows: WindowMap) -> Result<Self> {
        if windows.len() != pool.dimensions().len() || pool.names().any(|n| !windows.contains_key(n))
        {
            return Err(PromptfanError::Range(
                "window selection does not match the block's dimensions".to_string(),
            ));
        }
        let odometer = Odometer::new(windows.values().map(Window::len).collect())?;
        Ok(Self { windows, odometer })
    }

    pub fn windows(&self) -> &WindowMap {
        &self.windows
    }

    pub fn total(&self) -> u64 {
        self.odometer.total()
    }

    pub fn composition(&self, pool: &DimensionPool, local_id: u64) -> Result<SelectedComposition> {
        let digits = self.odometer.decode(local_id)?;
        let mut global = Vec::with_capacity(digits.len());
        let mut values = BTreeMap::new();
        for (window, digit) in self.windows.values().zip(digits) {
            global.push(window.start + digit);
            values.insert(window.dimension.clone(), window.values[digit].clone());
        }
        let id = pool.encode_digits(&global)?;
        Ok(SelectedComposition {
            local_id,
            id,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::Dimension;

    fn five_value_pool() -> DimensionPool {
        DimensionPool::new(vec![Dimension::local("d", ["v0", "v1", "v2", "v3", "v4"])]).unwrap()
    }

    #[test]
    fn test_window_count_and_lengths() {
        let bucketer = Bucketer::new(five_value_pool(), &WindowPolicy::uniform(3)).unwrap();
        assert_eq!(bucketer.window_count("d").unwrap(), 2);
        assert_eq!(bucketer.resolve_window("d", 0).unwrap().len(), 3);
        assert_eq!(bucketer.resolve_window("d", 1).unwrap().len(), 2);
        assert_eq!(
            bucketer.resolve_window("d", 1).unwrap().values,
            vec!["v3", "v4"]
        );
    }

    #[test]
    fn test_every_window_length_within_bounds() {
        let pool = DimensionPool::new(vec![
            Dimension::local("a", (0..7).map(|i| i.to_string())),
            Dimension::local("b", (0..4).map(|i| i.to_string())),
        ])
        .unwrap();
        for max in 1..=8 {
            let bucketer = Bucketer::new(pool.clone(), &WindowPolicy::uniform(max)).unwrap();
            for name in ["a", "b"] {
                for index in 0..bucketer.window_count(name).unwrap() {
                    let len = bucketer.resolve_window(name, index).unwrap().len();
                    assert!(len >= 1 && len <= max, "max={} len={}", max, len);
                }
            }
        }
    }

    #[test]
    fn test_resolve_window_out_of_range() {
        let bucketer = Bucketer::new(five_value_pool(), &WindowPolicy::uniform(3)).unwrap();
        assert!(matches!(
            bucketer.resolve_window("d", 2),
            Err(PromptfanError::Range(_))
        ));
        assert!(matches!(
            bucketer.resolve_window("missing", 0),
            Err(PromptfanError::Range(_))
        ));
    }

    #[test]
    fn test_bucket_total_and_decode_follow_odometer_order() {
        let pool = DimensionPool::new(vec![
            Dimension::local("role", (0..4).map(|i| i.to_string())),
            Dimension::local("tone", (0..5).map(|i| i.to_string())),
        ])
        .unwrap();
        let bucketer = Bucketer::new(pool, &WindowPolicy::uniform(2)).unwrap();
        // role: 2 windows, tone: 3 windows
        assert_eq!(bucketer.bucket_total(), 6);
        let b1 = bucketer.bucket_decode(1).unwrap();
        assert_eq!(b1["role"], 0);
        assert_eq!(b1["tone"], 1);
        for id in 0..bucketer.bucket_total() {
            let decoded = bucketer.bucket_decode(id).unwrap();
            assert_eq!(bucketer.bucket_encode(&decoded).unwrap(), id);
        }
        assert!(matches!(
            bucketer.bucket_decode(6),
            Err(PromptfanError::Range(_))
        ));
    }

    #[test]
    fn test_excluded_dimension_has_single_full_window() {
        let mut policy = WindowPolicy::uniform(2);
        policy.excluded.insert("d".to_string());
        let bucketer = Bucketer::new(five_value_pool(), &policy).unwrap();
        assert_eq!(bucketer.window_count("d").unwrap(), 1);
        assert_eq!(bucketer.resolve_window("d", 0).unwrap().len(), 5);
    }

    #[test]
    fn test_override_applies_per_dimension() {
        let pool = DimensionPool::new(vec![
            Dimension::local("a", (0..6).map(|i| i.to_string())),
            Dimension::local("b", (0..6).map(|i| i.to_string())),
        ])
        .unwrap();
        let mut policy = WindowPolicy::uniform(3);
        policy.overrides.insert("b".to_string(), 4);
        let bucketer = Bucketer::new(pool, &policy).unwrap();
        assert_eq!(bucketer.window_count("a").unwrap(), 2);
        assert_eq!(bucketer.window_count("b").unwrap(), 2);
        assert_eq!(bucketer.window_size("b").unwrap(), 4);
    }

    #[test]
    fn test_zero_window_size_is_configuration_error() {
        let err = Bucketer::new(five_value_pool(), &WindowPolicy::uniform(0)).unwrap_err();
        assert!(matches!(err, PromptfanError::Configuration(_)));
    }

    #[test]
    fn test_build_selection_caps_to_first_window() {
        let bucketer = Bucketer::new(five_value_pool(), &WindowPolicy::uniform(3)).unwrap();
        let capped = bucketer.build_selection(None).unwrap();
        assert_eq!(capped["d"].values, vec!["v0", "v1", "v2"]);
        let second = bucketer.build_selection(Some(1)).unwrap();
        assert_eq!(second["d"].values, vec!["v3", "v4"]);
    }

    #[test]
    fn test_selection_maps_local_ids_to_global_ids() {
        let pool = DimensionPool::new(vec![
            Dimension::local("a", ["a0", "a1", "a2", "a3"]),
            Dimension::local("b", ["b0", "b1", "b2"]),
        ])
        .unwrap();
        let bucketer = Bucketer::new(pool.clone(), &WindowPolicy::uniform(2)).unwrap();
        // bucket (a=1, b=1): a in [2,4), b in [2,3)
        let bucket = bucketer
            .bucket_encode(&BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 1)]))
            .unwrap();
        let selection = Selection::new(&pool, bucketer.windows(bucket).unwrap()).unwrap();
        assert_eq!(selection.total(), 2);

        let first = selection.composition(&pool, 0).unwrap();
        assert_eq!(first.values["a"], "a2");
        assert_eq!(first.values["b"], "b2");
        assert_eq!(pool.composition(first.id).unwrap(), first.values);

        let second = selection.composition(&pool, 1).unwrap();
        assert!(second.id > first.id);
        assert_eq!(second.values["a"], "a3");
    }

    #[test]
    fn test_full_selection_spans_whole_pool() {
        let pool = DimensionPool::new(vec![
            Dimension::local("a", ["1", "2", "3"]),
            Dimension::local("b", ["1", "2"]),
        ])
        .unwrap();
        let bucketer = Bucketer::new(pool.clone(), &WindowPolicy::uniform(1)).unwrap();
        let selection = Selection::new(&pool, bucketer.full_selection()).unwrap();
        assert_eq!(selection.total(), pool.total());
        for local in 0..selection.total() {
            assert_eq!(selection.composition(&pool, local).unwrap().id, local);
        }
    }
}
