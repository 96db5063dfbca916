//! Job and theme loading.
//!
//! Turns `jobs/<id>.yaml` plus the themes it references into a block forest
//! with assigned paths and merged dimensions:
//! - `model`: serde shapes of job and theme files
//! - `loader`: the theme store and job construction and validation

pub mod loader;
pub mod model;


pub use loader::{Job, ThemeStore};
pub use model::{JobFile, PromptDef, ThemeFile};
