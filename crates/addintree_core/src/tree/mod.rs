//! Typed extension tree projected from a backing tree.
//!
//! # Responsibility
//! - Own the arena of typed extension nodes and the collaborators they use
//!   (backing tree, add-in resolver, error sink).
//! - Provide point operations on single nodes: identity, attribute binding,
//!   add-in resolution, lifecycle hooks, typed data access.
//!
//! # Invariants
//! - Single logical owner; no internal locking.
//! - Point operations return their error. Structural operations
//!   (`children`, `events`, bulk `instance` retrieval) report per-item
//!   failures to the [`ErrorSink`] and continue.
//! - Released nodes answer every query with `NodeNotFound`.
//!
//! # See also
//! - `crate::schema` for binding rules.

mod children;
mod error;
mod events;
mod instance;
mod node;

pub use children::ExtensionNodeList;
pub use error::{ExtensionError, TypeMismatchError};
pub use events::{ExtensionChange, ExtensionNodeEvent, Observer, SubscriptionId};
pub use instance::{ChildObjects, InstanceContext, InstanceFactory, NodeFailure, Object};
pub use node::{NodeId, NodeOrigin};

use crate::addin::{AddinResolver, RuntimeAddin, UnavailableAddinError};
use crate::backing::{ArenaTree, BackingNodeId, BackingTree, BackingTreeError};
use crate::config::TreeConfig;
use crate::report::{ErrorReport, ErrorSink, LogErrorSink};
use crate::schema::{bind_fields, needs_localizer, Attribute, BindingError, NodeTypeSchema};
use log::{debug, info};
use node::ExtensionNode;
use std::any::type_name;
use std::error::Error;
use std::sync::Arc;

/// Materialized, typed view over a backing tree.
///
/// Node ids index an append-only arena and are never reused. A released
/// node keeps its slot as an empty hole, so a stale [`NodeId`] always
/// answers `NodeNotFound` instead of aliasing a newer node.
pub struct ExtensionTree<B: BackingTree = ArenaTree> {
    backing: B,
    nodes: Vec<Option<ExtensionNode<B>>>,
    resolver: Arc<dyn AddinResolver>,
    sink: Arc<dyn ErrorSink>,
    config: TreeConfig,
    next_subscription: u64,
}

impl<B: BackingTree> ExtensionTree<B> {
    /// Creates a tree that logs swallowed errors and uses default config.
    pub fn new(backing: B, resolver: Arc<dyn AddinResolver>) -> Self {
        Self {
            backing,
            nodes: Vec::new(),
            resolver,
            sink: Arc::new(LogErrorSink),
            config: TreeConfig::default(),
            next_subscription: 0,
        }
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    /// Mutable access for the tree-management side. Call
    /// [`notify_child_changed`](Self::notify_child_changed) afterwards on
    /// every affected parent.
    pub fn backing_mut(&mut self) -> &mut B {
        &mut self.backing
    }

    /// Creates a typed node for `backing` without attaching it.
    ///
    /// Node data starts at the schema's default value.
    pub fn create_node(
        &mut self,
        backing: Option<BackingNodeId>,
        origin: NodeOrigin,
        schema: Option<Arc<NodeTypeSchema>>,
    ) -> Result<NodeId, ExtensionError> {
        let id = match backing {
            Some(backing) => self
                .backing
                .node_id(backing)
                .ok_or(BackingTreeError::NodeNotFound(backing))?
                .to_string(),
            None => String::new(),
        };
        let node = NodeId(self.nodes.len());
        self.nodes
            .push(Some(ExtensionNode::new(backing, id, origin, schema)));
        Ok(node)
    }

    /// Binds raw attributes into the node's data through its schema.
    ///
    /// A node without schema ignores attributes. The owning add-in is only
    /// resolved when a localizable field is actually bound; host nodes keep
    /// localizable text verbatim.
    pub fn read_attributes(
        &mut self,
        node: NodeId,
        attributes: &[Attribute],
    ) -> Result<(), ExtensionError> {
        let slot = self.slot(node)?;
        let Some(schema) = slot.schema.clone() else {
            return Ok(());
        };
        let owned = slot.origin.addin_id.is_some();

        let localize = needs_localizer(attributes, schema.fields())
            || schema
                .payload()
                .is_some_and(|payload| needs_localizer(attributes, payload.fields()));
        let addin = if localize && owned {
            Some(self.addin(node)?)
        } else {
            None
        };
        let localizer = addin.as_deref().map(RuntimeAddin::localizer);

        let slot = self.slot_mut(node)?;
        bind_fields(slot.data.as_mut(), attributes, schema.fields(), localizer)?;

        if let Some(payload) = schema.payload() {
            let mut value = payload.construct();
            bind_fields(value.as_mut(), attributes, payload.fields(), localizer)?;
            if !payload.assign(slot.data.as_mut(), value) {
                return Err(BindingError::TargetMismatch {
                    attribute: payload.member().to_string(),
                    expected: schema.data_type_name(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Creates a node, binds its attributes and attaches it to `backing`.
    ///
    /// Nothing is attached when binding fails.
    pub fn attach(
        &mut self,
        backing: BackingNodeId,
        origin: NodeOrigin,
        schema: Option<Arc<NodeTypeSchema>>,
        attributes: &[Attribute],
    ) -> Result<NodeId, ExtensionError> {
        let node = self.create_node(Some(backing), origin, schema)?;
        if let Err(err) = self.read_attributes(node, attributes) {
            self.nodes[node.0] = None;
            debug!(
                "event=node_attach module=tree status=error backing={backing} error=\"{err}\""
            );
            return Err(err);
        }
        self.backing.attach_typed_node(backing, Some(node))?;
        Ok(node)
    }

    /// Tears a node down: unload hook, cache drop, detach, slot freed.
    pub fn release_node(&mut self, node: NodeId) -> Result<(), ExtensionError> {
        self.notify_addin_unloaded(node)?;
        let slot = self.nodes[node.0].take().ok_or(ExtensionError::NodeNotFound(node))?;
        if let Some(backing) = slot.backing {
            if let Ok(Some(attached)) = self.backing.attached_typed_node(backing) {
                if attached == node {
                    self.backing.attach_typed_node(backing, None)?;
                }
            }
        }
        debug!("event=node_release module=tree status=ok node={node}");
        Ok(())
    }

    /// Sibling-unique id, empty for unattached nodes.
    pub fn id(&self, node: NodeId) -> Result<&str, ExtensionError> {
        Ok(self.slot(node)?.id.as_str())
    }

    /// Whether the id was given explicitly rather than generated.
    pub fn has_id(&self, node: NodeId) -> Result<bool, ExtensionError> {
        Ok(!self.id(node)?.starts_with(&self.config.auto_id_prefix))
    }

    /// Full path, empty when unattached or when the backing node is gone.
    pub fn path(&self, node: NodeId) -> Result<String, ExtensionError> {
        Ok(self.slot_path(self.slot(node)?))
    }

    /// Typed node attached to the backing parent, if any.
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, ExtensionError> {
        let parent = self
            .slot(node)?
            .backing
            .and_then(|backing| self.backing.parent(backing))
            .and_then(|parent| self.backing.attached_typed_node(parent).ok().flatten());
        Ok(parent)
    }

    pub fn addin_id(&self, node: NodeId) -> Result<Option<&str>, ExtensionError> {
        Ok(self.slot(node)?.origin.addin_id.as_deref())
    }

    pub fn schema(&self, node: NodeId) -> Result<Option<Arc<NodeTypeSchema>>, ExtensionError> {
        Ok(self.slot(node)?.schema.clone())
    }

    /// Typed node data.
    pub fn data<T: 'static>(&self, node: NodeId) -> Result<&T, ExtensionError> {
        let slot = self.slot(node)?;
        slot.data.downcast_ref::<T>().ok_or_else(|| {
            TypeMismatchError {
                path: self.slot_path(slot),
                requested: type_name::<T>(),
                actual: slot.data_type_name(),
            }
            .into()
        })
    }

    pub fn data_mut<T: 'static>(&mut self, node: NodeId) -> Result<&mut T, ExtensionError> {
        let path = self.path(node)?;
        let slot = self.slot_mut(node)?;
        let actual = slot.data_type_name();
        slot.data
            .downcast_mut::<T>()
            .ok_or_else(|| {
                TypeMismatchError {
                    path,
                    requested: type_name::<T>(),
                    actual,
                }
                .into()
            })
    }

    /// Owning runtime add-in, resolved and cached on first access.
    ///
    /// An unloaded add-in is loaded through the resolver first (unless
    /// disabled in [`TreeConfig`]).
    pub fn addin(&mut self, node: NodeId) -> Result<Arc<RuntimeAddin>, ExtensionError> {
        let slot = self.slot(node)?;
        if let Some(addin) = &slot.addin {
            return Ok(Arc::clone(addin));
        }
        let Some(addin_id) = slot.origin.addin_id.clone() else {
            return Err(UnavailableAddinError::NoOwner {
                path: self.slot_path(slot),
            }
            .into());
        };
        let module = slot.origin.module.clone();

        let resolver = Arc::clone(&self.resolver);
        if self.config.load_addins_on_demand && !resolver.is_loaded(&addin_id) {
            resolver
                .load(&addin_id)
                .map_err(|source| UnavailableAddinError::LoadFailed {
                    addin_id: addin_id.clone(),
                    source,
                })?;
        }
        let addin = resolver
            .resolve(&addin_id, module.as_deref())
            .ok_or_else(|| UnavailableAddinError::NotResolved {
                addin_id: addin_id.clone(),
            })?;

        self.slot_mut(node)?.addin = Some(Arc::clone(&addin));
        debug!("event=addin_resolve module=tree status=ok node={node} addin_id={addin_id}");
        Ok(addin)
    }

    /// Lifecycle hook: the owning add-in was loaded.
    pub fn notify_addin_loaded(&mut self, node: NodeId) -> Result<(), ExtensionError> {
        let slot = self.slot_mut(node)?;
        if let Some(schema) = slot.schema.clone() {
            if let Some(hook) = schema.on_addin_loaded() {
                hook(slot.data.as_mut());
            }
        }
        Ok(())
    }

    /// Lifecycle hook: the owning add-in is being unloaded.
    ///
    /// Drops the cached add-in handle and the cached instance.
    pub fn notify_addin_unloaded(&mut self, node: NodeId) -> Result<(), ExtensionError> {
        let slot = self.slot_mut(node)?;
        if let Some(schema) = slot.schema.clone() {
            if let Some(hook) = schema.on_addin_unloaded() {
                hook(slot.data.as_mut());
            }
        }
        slot.addin = None;
        slot.cached_instance = None;
        info!("event=addin_unloaded module=tree status=ok node={node}");
        Ok(())
    }

    pub(crate) fn slot(&self, node: NodeId) -> Result<&ExtensionNode<B>, ExtensionError> {
        self.nodes
            .get(node.0)
            .and_then(Option::as_ref)
            .ok_or(ExtensionError::NodeNotFound(node))
    }

    pub(crate) fn slot_mut(
        &mut self,
        node: NodeId,
    ) -> Result<&mut ExtensionNode<B>, ExtensionError> {
        self.nodes
            .get_mut(node.0)
            .and_then(Option::as_mut)
            .ok_or(ExtensionError::NodeNotFound(node))
    }

    pub(crate) fn slot_path(&self, slot: &ExtensionNode<B>) -> String {
        slot.backing
            .and_then(|backing| self.backing.path(backing))
            .unwrap_or_default()
    }

    /// Reports a recovered failure; always non-fatal.
    pub(crate) fn report(
        &self,
        context: Option<&str>,
        addin_id: Option<&str>,
        error: Option<&(dyn Error + 'static)>,
    ) {
        self.sink.report(ErrorReport {
            context,
            addin_id,
            error,
            fatal: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{ExtensionError, ExtensionTree, NodeOrigin};
    use crate::addin::StaticAddinResolver;
    use crate::backing::{ArenaTree, BackingTree};
    use std::sync::Arc;

    #[test]
    fn unattached_node_has_empty_identity() {
        let mut tree = ExtensionTree::new(ArenaTree::new(), Arc::new(StaticAddinResolver::new()));
        let node = tree.create_node(None, NodeOrigin::host(), None).unwrap();

        assert_eq!(tree.id(node).unwrap(), "");
        assert_eq!(tree.path(node).unwrap(), "");
        assert_eq!(tree.parent(node).unwrap(), None);
        assert!(tree.has_id(node).unwrap());
        assert!(tree.data::<()>(node).is_ok());
    }

    #[test]
    fn released_node_is_not_found() {
        let mut tree = ExtensionTree::new(ArenaTree::new(), Arc::new(StaticAddinResolver::new()));
        let root = tree.backing().root();
        let backing = tree.backing_mut().add_child(root, "Item").unwrap();
        let node = tree.attach(backing, NodeOrigin::host(), None, &[]).unwrap();

        tree.release_node(node).unwrap();
        assert!(matches!(tree.id(node), Err(ExtensionError::NodeNotFound(id)) if id == node));
        assert!(matches!(
            tree.release_node(node),
            Err(ExtensionError::NodeNotFound(_))
        ));
        assert_eq!(tree.backing().attached_typed_node(backing).unwrap(), None);

        let replacement = tree.attach(backing, NodeOrigin::host(), None, &[]).unwrap();
        assert_ne!(replacement, node);
        assert!(matches!(tree.id(node), Err(ExtensionError::NodeNotFound(_))));
        assert_eq!(tree.id(replacement).unwrap(), "Item");
    }
}
