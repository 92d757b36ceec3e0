//! Backing tree contracts.
//!
//! # Responsibility
//! - Describe the raw, externally-owned node hierarchy the extension tree
//!   projects from.
//! - Keep condition evaluation and attachment behind one trait so the
//!   projection never depends on a concrete storage shape.
//!
//! # Invariants
//! - A backing node id is unique among its siblings.
//! - Paths are `/`-joined ids from the root; the root path is empty.
//!
//! # See also
//! - `crate::tree` for the typed projection.

mod arena;

pub use arena::ArenaTree;

use crate::tree::NodeId;
use crate::BoxError;
use std::fmt::{Display, Formatter};

/// Prefix used for generated ids of anonymous backing nodes.
pub const AUTO_ID_PREFIX: &str = "__nid_";

/// Path separator between backing node ids.
pub const PATH_SEPARATOR: char = '/';

/// Stable index of one node inside a backing tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackingNodeId(pub(crate) usize);

impl BackingNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for BackingNodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "backing#{}", self.0)
    }
}

/// Runtime visibility condition attached to a backing node.
///
/// Evaluation may consult arbitrary host state and may fail; callers treat a
/// failure as "skip this node" rather than aborting a traversal.
pub trait Condition {
    fn evaluate(&self) -> Result<bool, BoxError>;
}

impl<F> Condition for F
where
    F: Fn() -> Result<bool, BoxError>,
{
    fn evaluate(&self) -> Result<bool, BoxError> {
        self()
    }
}

/// Errors raised by backing tree queries and mutations.
#[derive(Debug, thiserror::Error)]
pub enum BackingTreeError {
    /// Backing node index does not exist or was removed.
    #[error("backing node not found: {0}")]
    NodeNotFound(BackingNodeId),
    /// Node id is empty or contains the path separator.
    #[error("backing node id is invalid: `{0}`")]
    InvalidId(String),
    /// The root node cannot be removed.
    #[error("the root backing node cannot be removed")]
    RootNotRemovable,
    /// A sibling with the same id already exists.
    #[error("backing node id `{id}` already exists under `{parent_path}`")]
    DuplicateId { parent_path: String, id: String },
    /// Visibility condition evaluation failed.
    #[error("condition evaluation failed for `{path}`")]
    Condition {
        path: String,
        #[source]
        source: BoxError,
    },
    /// Children could not be enumerated.
    #[error("children query failed for `{path}`")]
    Children {
        path: String,
        #[source]
        source: BoxError,
    },
}

/// Interface the extension tree consumes from the tree-management side.
pub trait BackingTree {
    /// Ordered children of one node.
    fn children(&self, node: BackingNodeId) -> Result<Vec<BackingNodeId>, BackingTreeError>;
    /// Whether the node is currently visible (its condition holds).
    fn is_enabled(&self, node: BackingNodeId) -> Result<bool, BackingTreeError>;
    /// Full path of the node, `None` when the node is unknown.
    fn path(&self, node: BackingNodeId) -> Option<String>;
    /// Sibling-unique id of the node, `None` when the node is unknown.
    fn node_id(&self, node: BackingNodeId) -> Option<&str>;
    /// Parent node, `None` for the root, detached or unknown nodes.
    fn parent(&self, node: BackingNodeId) -> Option<BackingNodeId>;
    /// Typed extension node attached to this backing node, if any.
    fn attached_typed_node(&self, node: BackingNodeId)
        -> Result<Option<NodeId>, BackingTreeError>;
    /// Attaches (or clears) the typed extension node of a backing node.
    fn attach_typed_node(
        &mut self,
        node: BackingNodeId,
        typed: Option<NodeId>,
    ) -> Result<(), BackingTreeError>;
}

/// Returns whether `value` is acceptable as a backing node id.
pub fn is_valid_node_id(value: &str) -> bool {
    !value.trim().is_empty() && !value.contains(PATH_SEPARATOR)
}
