use crate::value::Value;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of a serialized block program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BlockNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, BlockNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub statements: BTreeMap<String, Vec<BlockNode>>,
}

impl BlockNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), ..Default::default() }
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn input(mut self, name: &str, node: BlockNode) -> Self {
        self.inputs.insert(name.to_string(), node);
        self
    }

    pub fn statement(mut self, name: &str, body: Vec<BlockNode>) -> Self {
        self.statements.insert(name.to_string(), body);
        self
    }

    pub fn field_text(&self, name: &str) -> Option<String> {
        self.fields.get(name).map(Value::as_text)
    }

    pub fn statement_body(&self, name: &str) -> &[BlockNode] {
        self.statements.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first visit of this node and every nested input and statement.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a BlockNode)) {
        visit(self);
        for child in self.inputs.values() {
            child.walk(visit);
        }
        for body in self.statements.values() {
            for child in body {
                child.walk(visit);
            }
        }
    }

    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut BlockNode)) {
        visit(self);
        for child in self.inputs.values_mut() {
            child.walk_mut(visit);
        }
        for body in self.statements.values_mut() {
            for child in body {
                child.walk_mut(visit);
            }
        }
    }
}

/// Ordered forest of top-level blocks belonging to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct BlockProgram {
    pub blocks: Vec<BlockNode>,
}

impl BlockProgram {
    pub fn new(blocks: Vec<BlockNode>) -> Self {
        Self { blocks }
    }

    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("Failed to parse block program")
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a BlockNode)) {
        for block in &self.blocks {
            block.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut BlockNode)) {
        for block in &mut self.blocks {
            block.walk_mut(visit);
        }
    }
}
