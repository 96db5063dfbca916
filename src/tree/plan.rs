//! Bucket selection for a run.
//!
//! `--bucket` takes either a bare ID, applied to every block that has that
//! many buckets, or `PATH=ID` for one block. Blocks without a bucket run
//! their default selection.

use super::path::BlockPath;
use crate::error::{PromptfanError, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketPlan {
    /// Bucket for every block whose bucket total covers it.
    pub all: Option<u64>,
    /// Buckets pinned to one block; these win over `all`.
    pub per_block: BTreeMap<BlockPath, u64>,
}

impl BucketPlan {
    pub fn all(bucket: u64) -> Self {
        Self {
            all: Some(bucket),
            per_block: BTreeMap::new(),
        }
    }

    pub fn with_block(mut self, path: BlockPath, bucket: u64) -> Self {
        self.per_block.insert(path, bucket);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_none() && self.per_block.is_empty()
    }

    /// Parse `--bucket` arguments (`ID` or `PATH=ID`).
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut plan = Self::default();
        for arg in args {
            match arg.split_once('=') {
                Some((path, id)) => {
                    let path: BlockPath = path.parse()?;
                    let id = parse_id(id, arg)?;
                    if plan.per_block.insert(path.clone(), id).is_some() {
                        return Err(PromptfanError::UserError(format!(
                            "bucket for block {} given more than once",
                            path
                        )));
                    }
                }
                None => {
                    let id = parse_id(arg, arg)?;
                    if plan.all.replace(id).is_some() {
                        return Err(PromptfanError::UserError(
                            "run-wide bucket given more than once".to_string(),
                        ));
                    }
                }
            }
        }
        Ok(plan)
    }

    /// Bucket for a block with `bucket_total` buckets, if any applies.
    pub fn bucket_for(&self, path: &BlockPath, bucket_total: u64) -> Option<u64> {
        if let Some(id) = self.per_block.get(path) {
            return Some(*id);
        }
        self.all.filter(|id| *id < bucket_total)
    }
}

fn parse_id(id: &str, arg: &str) -> Result<u64> {
    id.trim().parse().map_err(|_| {
        PromptfanError::UserError(format!(
            "invalid bucket '{}': expected ID or PATH=ID",
            arg
        ))
    })
}
