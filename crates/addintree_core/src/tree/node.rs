//! Extension node storage.

use super::events::ObserverRegistry;
use super::children::ChildCache;
use super::Object;
use crate::addin::RuntimeAddin;
use crate::backing::{BackingNodeId, BackingTree};
use crate::schema::NodeTypeSchema;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Stable index of one typed extension node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Which add-in (and module) contributed a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOrigin {
    /// `None` for nodes the host declares itself.
    pub addin_id: Option<String>,
    pub module: Option<String>,
}

impl NodeOrigin {
    /// Node without an owning add-in.
    pub fn host() -> Self {
        Self::default()
    }

    pub fn addin(addin_id: impl Into<String>) -> Self {
        Self {
            addin_id: Some(addin_id.into()),
            module: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// One arena slot: the typed view of a backing node.
pub(crate) struct ExtensionNode<B: BackingTree> {
    pub(crate) backing: Option<BackingNodeId>,
    /// Backing id captured at creation; reconciliation keys on it.
    pub(crate) id: String,
    pub(crate) origin: NodeOrigin,
    pub(crate) schema: Option<Arc<NodeTypeSchema>>,
    pub(crate) data: Box<dyn Any>,
    /// `None` until materialized.
    pub(crate) children: Option<ChildCache>,
    pub(crate) observers: ObserverRegistry<B>,
    pub(crate) addin: Option<Arc<RuntimeAddin>>,
    pub(crate) cached_instance: Option<Object>,
}

impl<B: BackingTree> ExtensionNode<B> {
    pub(crate) fn new(
        backing: Option<BackingNodeId>,
        id: String,
        origin: NodeOrigin,
        schema: Option<Arc<NodeTypeSchema>>,
    ) -> Self {
        let data = match &schema {
            Some(schema) => schema.new_data(),
            None => Box::new(()),
        };
        Self {
            backing,
            id,
            origin,
            schema,
            data,
            children: None,
            observers: ObserverRegistry::default(),
            addin: None,
            cached_instance: None,
        }
    }

    pub(crate) fn data_type_name(&self) -> &'static str {
        self.schema
            .as_ref()
            .map(|schema| schema.data_type_name())
            .unwrap_or("()")
    }
}
