//! Error types for promptfan.
//!
//! Uses thiserror for derive macros. Variants follow the run taxonomy:
//! configuration and range errors are fatal before or outside a run, hook
//! and script infrastructure errors are contained to the block that raised
//! them and only surface here when the driver summarizes a run.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for promptfan operations.
#[derive(Error, Debug)]
pub enum PromptfanError {
    /// Invalid dimension pool, job, theme or config contents.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A composition ID, bucket ID or index is outside its domain.
    #[error("out of range: {0}")]
    Range(String),

    /// A script returned `error` or raised.
    #[error("hook failed: {0}")]
    Hook(String),

    /// A script could not be found or loaded.
    #[error("script unavailable: {0}")]
    ScriptInfrastructure(String),

    /// User provided invalid arguments or the project is in an invalid state.
    #[error("{0}")]
    UserError(String),
}

impl PromptfanError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PromptfanError::Configuration(_) => exit_codes::CONFIGURATION_ERROR,
            PromptfanError::Range(_) => exit_codes::RANGE_ERROR,
            PromptfanError::Hook(_) => exit_codes::RUN_FAILURE,
            PromptfanError::ScriptInfrastructure(_) => exit_codes::RUN_FAILURE,
            PromptfanError::UserError(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for promptfan operations.
pub type Result<T> = std::result::Result<T, PromptfanError>;
