use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Integer,
    #[default]
    Float,
    String,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    #[default]
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: VariableType,
    #[serde(default)]
    pub scope: VariableScope,
    #[serde(default)]
    pub default: Value,
}

impl VariableDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: VariableType, scope: VariableScope) -> Self {
        Self { id: id.into(), name: name.into(), kind, scope, default: Value::Null }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Coerces a value to the declared type. Integer writes truncate toward zero.
    pub fn coerce(&self, value: &Value) -> Value {
        match self.kind {
            VariableType::Integer => Value::Number(value.as_number().trunc()),
            VariableType::Float => Value::Number(value.as_number()),
            VariableType::String => Value::Text(value.as_text()),
            VariableType::Boolean => Value::Bool(value.as_bool()),
        }
    }

    pub fn default_value(&self) -> Value {
        match (&self.default, self.kind) {
            (Value::Null, VariableType::String) => Value::Text(String::new()),
            (Value::Null, VariableType::Boolean) => Value::Bool(false),
            (Value::Null, _) => Value::Number(0.0),
            (value, _) => self.coerce(value),
        }
    }
}

/// Two-tier store: one global map plus one local map per live entity. Values are keyed
/// by variable id; legacy programs that reference variables by name are resolved through
/// the name index.
#[derive(Debug, Default, Clone)]
pub struct VariableStore {
    definitions: HashMap<String, VariableDefinition>,
    names: HashMap<String, String>,
    globals: HashMap<String, Value>,
    locals: HashMap<String, HashMap<String, Value>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, definition: VariableDefinition) {
        self.names.insert(definition.name.clone(), definition.id.clone());
        self.definitions.insert(definition.id.clone(), definition);
    }

    pub fn define_all(&mut self, definitions: impl IntoIterator<Item = VariableDefinition>) {
        for definition in definitions {
            self.define(definition);
        }
    }

    pub fn definition(&self, key: &str) -> Option<&VariableDefinition> {
        self.resolve_id(key).and_then(|id| self.definitions.get(id))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.definitions.values()
    }

    fn resolve_id<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if self.definitions.contains_key(key) {
            Some(key)
        } else {
            self.names.get(key).map(String::as_str)
        }
    }

    pub fn register_entity(&mut self, entity: &str) {
        self.locals.entry(entity.to_string()).or_default();
    }

    pub fn remove_entity(&mut self, entity: &str) -> bool {
        self.locals.remove(entity).is_some()
    }

    /// Deep-copies the local map of `source` into a fresh map for `target`.
    pub fn copy_locals(&mut self, source: &str, target: &str) {
        let copied = self.locals.get(source).cloned().unwrap_or_default();
        self.locals.insert(target.to_string(), copied);
    }

    /// Returns `None` when the key resolves to no definition.
    pub fn try_get(&self, entity: &str, key: &str) -> Option<Value> {
        let definition = self.definition(key)?;
        let stored = match definition.scope {
            VariableScope::Global => self.globals.get(&definition.id),
            VariableScope::Local => self.locals.get(entity).and_then(|map| map.get(&definition.id)),
        };
        Some(stored.cloned().unwrap_or_else(|| definition.default_value()))
    }

    /// Unresolved variables read as 0.
    pub fn get(&self, entity: &str, key: &str) -> Value {
        self.try_get(entity, key).unwrap_or(Value::Number(0.0))
    }

    /// Stores `value` coerced to the declared type. Returns false when the key
    /// does not resolve or a local write targets an unregistered entity.
    pub fn set(&mut self, entity: &str, key: &str, value: &Value) -> bool {
        let Some(definition) = self.definition(key) else {
            return false;
        };
        let id = definition.id.clone();
        let coerced = definition.coerce(value);
        match definition.scope {
            VariableScope::Global => {
                self.globals.insert(id, coerced);
                true
            }
            VariableScope::Local => match self.locals.get_mut(entity) {
                Some(map) => {
                    map.insert(id, coerced);
                    true
                }
                None => false,
            },
        }
    }

    pub fn change_by(&mut self, entity: &str, key: &str, delta: f64) -> bool {
        let Some(current) = self.try_get(entity, key) else {
            return false;
        };
        self.set(entity, key, &Value::Number(current.as_number() + delta))
    }

    pub fn clear_entities(&mut self) {
        self.locals.clear();
    }

    pub fn reset_values(&mut self) {
        self.globals.clear();
        for map in self.locals.values_mut() {
            map.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VariableStore {
        let mut store = VariableStore::new();
        store.define(VariableDefinition::new("v-score", "score", VariableType::Integer, VariableScope::Global));
        store.define(
            VariableDefinition::new("v-hp", "health", VariableType::Float, VariableScope::Local).with_default(10.0),
        );
        store.register_entity("hero");
        store
    }

    #[test]
    fn legacy_name_lookup_resolves_to_id() {
        let mut store = store();
        assert!(store.set("hero", "score", &Value::Number(3.0)));
        assert_eq!(store.get("hero", "v-score"), Value::Number(3.0));
    }

    #[test]
    fn local_write_requires_registered_entity() {
        let mut store = store();
        assert!(!store.set("ghost", "v-hp", &Value::Number(1.0)));
        assert_eq!(store.get("ghost", "v-hp"), Value::Number(10.0));
    }

    #[test]
    fn copied_locals_are_independent() {
        let mut store = store();
        store.set("hero", "v-hp", &Value::Number(4.0));
        store.copy_locals("hero", "hero__clone_1");
        store.set("hero__clone_1", "v-hp", &Value::Number(7.0));
        assert_eq!(store.get("hero", "v-hp"), Value::Number(4.0));
        assert_eq!(store.get("hero__clone_1", "v-hp"), Value::Number(7.0));
    }

    #[test]
    fn change_by_respects_integer_type() {
        let mut store = store();
        assert!(store.change_by("hero", "v-score", 1.9));
        assert_eq!(store.get("hero", "v-score"), Value::Number(1.0));
    }
}
