use super::catalog::{reference_field, BlockKind, ReferenceKind};
use super::target::{is_reserved_token, COMPONENT_PREFIX};
use super::tree::{BlockNode, BlockProgram};
use crate::value::Value;
use std::collections::HashMap;

/// Old id -> new id tables applied when programs are cloned, imported or copied
/// between contexts.
#[derive(Debug, Clone, Default)]
pub struct RemapTables {
    pub entities: HashMap<String, String>,
    pub variables: HashMap<String, String>,
    pub sounds: HashMap<String, String>,
    pub components: HashMap<String, String>,
}

impl RemapTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, from: &str, to: &str) -> Self {
        self.entities.insert(from.to_string(), to.to_string());
        self
    }

    pub fn variable(mut self, from: &str, to: &str) -> Self {
        self.variables.insert(from.to_string(), to.to_string());
        self
    }

    pub fn sound(mut self, from: &str, to: &str) -> Self {
        self.sounds.insert(from.to_string(), to.to_string());
        self
    }

    pub fn component(mut self, from: &str, to: &str) -> Self {
        self.components.insert(from.to_string(), to.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.variables.is_empty() && self.sounds.is_empty() && self.components.is_empty()
    }

    fn remap(&self, kind: ReferenceKind, literal: &str) -> Option<String> {
        if is_reserved_token(literal) {
            return None;
        }
        match kind {
            ReferenceKind::Entity => self.entities.get(literal).cloned(),
            ReferenceKind::SensingTarget => match literal.strip_prefix(COMPONENT_PREFIX) {
                Some(component) => {
                    self.components.get(component).map(|mapped| format!("{COMPONENT_PREFIX}{mapped}"))
                }
                None => self.entities.get(literal).cloned(),
            },
            ReferenceKind::Variable => self.variables.get(literal).cloned(),
            ReferenceKind::Sound => self.sounds.get(literal).cloned(),
            ReferenceKind::Costume => None,
        }
    }
}

/// Rewrites every dropdown reference found in `tables` and returns how many fields
/// changed. Reserved tokens, unknown block types and ids missing from the tables keep
/// their literal value.
pub fn remap_references(program: &mut BlockProgram, tables: &RemapTables) -> usize {
    if tables.is_empty() {
        return 0;
    }
    let mut rewritten = 0;
    program.walk_mut(&mut |node| rewritten += remap_node(node, tables));
    rewritten
}

fn remap_node(node: &mut BlockNode, tables: &RemapTables) -> usize {
    let Some(entry) = BlockKind::parse(&node.kind).and_then(reference_field) else {
        return 0;
    };
    let Some(current) = node.fields.get(entry.field) else {
        return 0;
    };
    let literal = current.as_text();
    match tables.remap(entry.kind, &literal) {
        Some(mapped) if mapped != literal => {
            node.fields.insert(entry.field.to_string(), Value::Text(mapped));
            1
        }
        _ => 0,
    }
}
