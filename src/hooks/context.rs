//! Execution context handed to every script.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// State visible to scripts during one stage invocation.
///
/// A block-level context carries `node_start` results; each composition
/// starts from a copy of it and is dropped when its stages finish. Only
/// [`ExecutionContext::promoted_result`] survives, as the children's
/// `parent_result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionContext {
    pub job: String,
    /// Stage currently being dispatched; set by the pipeline.
    pub stage: String,
    pub block_path: String,
    /// Index of the root prompt this block descends from.
    pub config_index: usize,
    /// `None` for stages fired outside any composition.
    pub composition_id: Option<u64>,
    pub values: BTreeMap<String, String>,
    pub prompt: Option<String>,
    /// Promoted result of the parent block's last successful composition.
    pub parent_result: Option<Value>,
    /// Last non-null `data` per stage.
    pub outputs: BTreeMap<String, Value>,
    /// Keys merged from scripts' `modify_context`.
    pub vars: Map<String, Value>,
    /// Failure payload while the `error` stage runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ExecutionContext {
    pub fn for_block(
        job: impl Into<String>,
        block_path: impl Into<String>,
        config_index: usize,
        parent_result: Option<Value>,
    ) -> Self {
        Self {
            job: job.into(),
            stage: String::new(),
            block_path: block_path.into(),
            config_index,
            composition_id: None,
            values: BTreeMap::new(),
            prompt: None,
            parent_result,
            outputs: BTreeMap::new(),
            vars: Map::new(),
            error: None,
        }
    }

    /// Context for one composition of the same block.
    ///
    /// Block-level `outputs` and `vars` carry over; what one composition adds
    /// is not seen by the next.
    pub fn for_composition(
        &self,
        composition_id: u64,
        values: BTreeMap<String, String>,
        prompt: String,
    ) -> Self {
        Self {
            composition_id: Some(composition_id),
            values,
            prompt: Some(prompt),
            error: None,
            ..self.clone()
        }
    }

    /// Merge a script's `modify_context` into the shared vars.
    pub fn merge(&mut self, modify: &Map<String, Value>) {
        for (key, value) in modify {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    /// The fields promoted into the children's `parent_result`.
    pub fn promoted_result(&self) -> Value {
        json!({
            "block_path": self.block_path,
            "composition_id": self.composition_id,
            "prompt": self.prompt,
            "values": self.values,
            "outputs": self.outputs,
            "vars": self.vars,
        })
    }
}
