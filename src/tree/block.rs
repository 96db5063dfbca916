//! Blocks and their resolved (cached) form.

use super::path::BlockPath;
use crate::error::{PromptfanError, Result};
use crate::space::{Bucketer, Dimension, DimensionPool, Operation, Selection, WindowMap, WindowPolicy};
use crate::template::CompiledTemplate;
use std::collections::BTreeMap;

/// A node in the template tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub path: BlockPath,
    pub template: String,
    /// Dimensions declared on the block itself.
    pub local: Vec<Dimension>,
    /// Dimensions pulled in from themes.
    pub themed: Vec<Dimension>,
    pub children: Vec<Block>,
}

impl Block {
    pub fn new(path: BlockPath, template: impl Into<String>) -> Self {
        Self {
            path,
            template: template.into(),
            local: Vec::new(),
            themed: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.local.push(dimension);
        self
    }

    pub fn with_child(mut self, child: Block) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first pre-order walk over this block and its descendants.
    pub fn walk(&self) -> Vec<&Block> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    /// Find a block in a forest by path.
    pub fn find<'a>(roots: &'a [Block], path: &BlockPath) -> Option<&'a Block> {
        let mut candidates = roots;
        let mut found = None;
        for &index in path.segments() {
            let block = candidates.get(index)?;
            candidates = &block.children;
            found = Some(block);
        }
        found
    }
}

/// A block's dimension pool and compiled template, built once per run.
#[derive(Debug, Clone)]
pub struct ResolvedBlock {
    bucketer: Bucketer,
    template: CompiledTemplate,
}

impl ResolvedBlock {
    /// Merge the block's dimensions and compile its template.
    ///
    /// Every placeholder must name one of the block's dimensions.
    pub fn resolve(block: &Block, policy: &WindowPolicy) -> Result<Self> {
        let in_block = |e: PromptfanError| match e {
            PromptfanError::Configuration(msg) => {
                PromptfanError::Configuration(format!("block {}: {}", block.path, msg))
            }
            other => other,
        };

        let pool = DimensionPool::merge(block.local.clone(), block.themed.clone()).map_err(in_block)?;
        let template = CompiledTemplate::compile(&block.template).map_err(|e| {
            PromptfanError::Configuration(format!("block {}: {}", block.path, e))
        })?;

        let unknown: Vec<&str> = template
            .placeholders()
            .into_iter()
            .filter(|name| !pool.contains(name))
            .collect();
        if !unknown.is_empty() {
            return Err(PromptfanError::Configuration(format!(
                "block {}: template references undefined dimension(s): {}",
                block.path,
                unknown.join(", ")
            )));
        }

        let bucketer = Bucketer::new(pool, policy).map_err(in_block)?;
        Ok(Self { bucketer, template })
    }

    pub fn pool(&self) -> &DimensionPool {
        self.bucketer.pool()
    }

    pub fn bucketer(&self) -> &Bucketer {
        &self.bucketer
    }

    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }

    /// Compositions for a run: one bucket when given, otherwise the full space.
    pub fn selection(&self, bucket: Option<u64>, operation: Option<&Operation>) -> Result<Selection> {
        let windows = match bucket {
            Some(id) => self.bucketer.windows(id)?,
            None => self.bucketer.full_selection(),
        };
        self.select(windows, operation)
    }

    /// Compositions for build-time output: bucket 0 unless another is given.
    pub fn build_selection(
        &self,
        bucket: Option<u64>,
        operation: Option<&Operation>,
    ) -> Result<Selection> {
        let windows = self.bucketer.build_selection(bucket)?;
        self.select(windows, operation)
    }

    /// Render the block's template for one set of values.
    pub fn render(&self, values: &BTreeMap<String, String>) -> Result<String> {
        self.template
            .render(values)
            .map_err(|e| PromptfanError::Configuration(e.to_string()))
    }

    fn select(&self, windows: WindowMap, operation: Option<&Operation>) -> Result<Selection> {
        let windows = match operation {
            Some(op) => op.apply(&windows),
            None => windows,
        };
        Selection::new(self.pool(), windows)
    }
}
