//! Exit code constants for the promptfan CLI.
//!
//! - 0: Success (including a cleanly cancelled run)
//! - 1: User error (bad args, unreadable files, invalid state)
//! - 2: Configuration error (empty dimension, duplicate dimension name)
//! - 3: Range error (composition or bucket ID outside its domain)
//! - 4: Run failure (at least one block ended FAILED)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, missing files, or malformed YAML.
pub const USER_ERROR: i32 = 1;

/// Configuration error detected before any run started.
pub const CONFIGURATION_ERROR: i32 = 2;

/// An ID or index was outside its valid domain.
pub const RANGE_ERROR: i32 = 3;

/// A run completed but one or more blocks failed.
pub const RUN_FAILURE: i32 = 4;
