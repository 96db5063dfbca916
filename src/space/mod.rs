//! Combinatorial space of a block.
//!
//! - `dimension`: dimensions and the merged, sorted dimension pool
//! - `odometer`: the mixed-radix bijection between IDs and digit vectors
//! - `bucket`: windowing of dimensions and bucket-composition addressing
//! - `operation`: value remapping inside resolved windows

pub mod bucket;
pub mod dimension;
pub mod odometer;
pub mod operation;

pub use bucket::{Bucketer, SelectedComposition, Selection, Window, WindowMap, WindowPolicy};
pub use dimension::{Dimension, DimensionPool, Origin, validate_dimension_name};
pub use odometer::Odometer;
pub use operation::Operation;
