//! Node type registry.

use super::{NodeTypeSchema, SchemaError};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registered schemas keyed by node type name.
///
/// Schemas are immutable once registered and handed out as shared handles.
#[derive(Debug, Default)]
pub struct NodeTypeRegistry {
    entries: BTreeMap<String, Arc<NodeTypeSchema>>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one schema; names must be unique.
    pub fn register(&mut self, schema: NodeTypeSchema) -> Result<Arc<NodeTypeSchema>, SchemaError> {
        let name = schema.name().to_string();
        if self.entries.contains_key(name.as_str()) {
            return Err(SchemaError::DuplicateNodeType(name));
        }
        let schema = Arc::new(schema);
        self.entries.insert(name.clone(), Arc::clone(&schema));
        debug!(
            "event=node_type_register module=schema status=ok node_type={name} fields={}",
            schema.fields().len()
        );
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Arc<NodeTypeSchema>> {
        self.entries.get(name).cloned()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}
