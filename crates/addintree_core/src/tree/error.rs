//! Errors surfaced by point operations on the extension tree.

use super::NodeId;
use crate::addin::UnavailableAddinError;
use crate::backing::BackingTreeError;
use crate::schema::BindingError;
use crate::BoxError;

/// Requested payload type is incompatible with what the node produces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("extension node at `{path}` provides {actual}, not {requested}")]
pub struct TypeMismatchError {
    pub path: String,
    pub requested: &'static str,
    pub actual: &'static str,
}

/// Failure of one operation on one extension node.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// Node id is unknown or the node was released.
    #[error("extension node not found: {0}")]
    NodeNotFound(NodeId),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    UnavailableAddin(#[from] UnavailableAddinError),
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),
    /// Node type has no instantiation capability.
    #[error("extension node at `{path}` cannot produce objects")]
    NotInstantiable { path: String },
    /// The instance factory failed.
    #[error("failed to construct object for extension node at `{path}`")]
    Construction {
        path: String,
        #[source]
        source: BoxError,
    },
    #[error(transparent)]
    Backing(#[from] BackingTreeError),
}
