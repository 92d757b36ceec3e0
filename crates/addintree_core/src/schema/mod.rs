//! Node type schemas and attribute binding.
//!
//! # Responsibility
//! - Declare, per extension point, how raw string attributes bind to typed
//!   node fields.
//! - Provide the one binder used by every node type.
//!
//! # Invariants
//! - Attribute names are unique within one field set.
//! - Attributes without a binding are ignored.
//! - A schema is immutable after `build()`; binding never writes to it.

mod binder;
mod field;
mod node_type;
mod registry;

pub use binder::{bind_object, split_text_list, Attribute, BindingError};
pub use field::{FieldBinding, FieldKind, FieldSet, FieldSpec};
pub use node_type::{NodeTypeBuilder, NodeTypeSchema, PayloadBinding, PayloadSpec};
pub use registry::NodeTypeRegistry;

pub(crate) use binder::{bind_fields, needs_localizer};

/// Schema declaration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("node type name is invalid: `{0}`")]
    InvalidName(String),
    #[error("attribute name `{field}` is invalid in schema `{schema}`")]
    InvalidFieldName { schema: String, field: String },
    #[error("attribute `{field}` is declared twice in schema `{schema}`")]
    DuplicateField { schema: String, field: String },
    #[error("node type already registered: {0}")]
    DuplicateNodeType(String),
}

/// Names are non-empty and contain no whitespace.
pub(crate) fn is_valid_name(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}
