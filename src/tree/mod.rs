//! Block tree execution.
//!
//! This module walks a tree of blocks and runs the hook lifecycle per
//! composition:
//! - `path`: dot-separated block addresses
//! - `block`: blocks and their once-per-run resolved form
//! - `state`: the per-block state machine
//! - `cancel`: cancellation signals
//! - `plan`: which bucket each block runs
//! - `report`: per-block reports and run statistics
//! - `executor`: the depth-first walk itself

pub mod block;
pub mod cancel;
pub mod executor;
pub mod path;
pub mod plan;
pub mod report;
pub mod state;

#[cfg(test)]
mod tests;

pub use block::{Block, ResolvedBlock};
pub use cancel::{CancelFlag, CancelSignal, NeverCancel, StopFile};
pub use executor::{RunOptions, TreeExecutor};
pub use path::BlockPath;
pub use plan::BucketPlan;
pub use report::{BlockReport, BlockSummary, Failure, RunReport, RunStats};
pub use state::BlockState;
