//! Lazy child materialization and reconciliation.
//!
//! # Invariants
//! - A node's child cache is replaced whole; no caller observes a partially
//!   built list.
//! - Per-child failures are reported and the child is skipped.
//! - Reconciliation compares children by the id they had when
//!   materialized, never by node handle.

use super::events::{ExtensionChange, ExtensionNodeEvent};
use super::{ExtensionError, ExtensionTree, NodeId};
use crate::backing::{BackingNodeId, BackingTree, BackingTreeError};
use log::debug;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Ordered, cheaply clonable snapshot of a node's visible children.
///
/// The empty list carries no allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionNodeList(Option<Rc<[NodeId]>>);

impl ExtensionNodeList {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.as_slice().get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.as_slice().iter().copied()
    }

    pub fn as_slice(&self) -> &[NodeId] {
        self.0.as_deref().unwrap_or(&[])
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.as_slice().contains(&node)
    }
}

impl From<Vec<NodeId>> for ExtensionNodeList {
    fn from(nodes: Vec<NodeId>) -> Self {
        if nodes.is_empty() {
            Self::empty()
        } else {
            Self(Some(nodes.into()))
        }
    }
}

/// Materialized children with the ids they had when materialized.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChildCache {
    nodes: ExtensionNodeList,
    ids: Vec<String>,
}

impl ChildCache {
    fn keyed(&self) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.nodes.iter().zip(self.ids.iter().map(String::as_str))
    }
}

impl<B: BackingTree> ExtensionTree<B> {
    /// Currently visible children, materialized on first access and cached
    /// until [`notify_child_changed`](Self::notify_child_changed).
    pub fn child_nodes(&mut self, node: NodeId) -> Result<ExtensionNodeList, ExtensionError> {
        Ok(self.child_cache(node)?.nodes.clone())
    }

    /// Visible child with the given id.
    pub fn child_by_id(
        &mut self,
        node: NodeId,
        id: &str,
    ) -> Result<Option<NodeId>, ExtensionError> {
        Ok(self
            .child_cache(node)?
            .keyed()
            .find(|(_, child_id)| *child_id == id)
            .map(|(child, _)| child))
    }

    /// Re-materializes the children of `node` and notifies observers of the
    /// difference.
    ///
    /// Returns whether anything was added or removed. A node whose children
    /// were never materialized has nothing to reconcile.
    pub fn notify_child_changed(&mut self, node: NodeId) -> Result<bool, ExtensionError> {
        let Some(old) = self.slot_mut(node)?.children.take() else {
            return Ok(false);
        };
        let new = self.child_cache(node)?.clone();

        let old_ids: BTreeSet<&str> = old.ids.iter().map(String::as_str).collect();
        let new_ids: BTreeSet<&str> = new.ids.iter().map(String::as_str).collect();
        let removed: Vec<NodeId> = old
            .keyed()
            .filter(|(_, id)| !new_ids.contains(id))
            .map(|(child, _)| child)
            .collect();
        let added: Vec<NodeId> = new
            .keyed()
            .filter(|(_, id)| !old_ids.contains(id))
            .map(|(child, _)| child)
            .collect();

        let changed = !removed.is_empty() || !added.is_empty();
        for child in &removed {
            self.dispatch(node, &ExtensionNodeEvent::new(node, ExtensionChange::Removed(*child)));
        }
        for child in &added {
            self.dispatch(node, &ExtensionNodeEvent::new(node, ExtensionChange::Added(*child)));
        }
        if changed {
            self.dispatch(node, &ExtensionNodeEvent::new(node, ExtensionChange::ChildrenChanged));
        }

        debug!(
            "event=children_reconcile module=tree status=ok node={node} removed={} added={} changed={changed}",
            removed.len(),
            added.len()
        );
        Ok(changed)
    }

    fn child_cache(&mut self, node: NodeId) -> Result<&ChildCache, ExtensionError> {
        let slot = self.slot(node)?;
        if slot.children.is_none() {
            let cache = match slot.backing {
                Some(backing) => self.materialize(backing, slot.origin.addin_id.as_deref()),
                None => ChildCache::default(),
            };
            self.slot_mut(node)?.children = Some(cache);
        }
        Ok(self.slot_mut(node)?.children.get_or_insert_with(ChildCache::default))
    }

    fn materialize(&self, backing: BackingNodeId, addin_id: Option<&str>) -> ChildCache {
        let candidates = match self.backing.children(backing) {
            Ok(candidates) => candidates,
            Err(err) => {
                let context = format!(
                    "Error while getting child nodes of '{}'",
                    self.backing.path(backing).unwrap_or_default()
                );
                self.report(Some(&context), addin_id, Some(&err));
                return ChildCache::default();
            }
        };
        if candidates.is_empty() {
            return ChildCache::default();
        }

        let mut nodes = Vec::with_capacity(candidates.len());
        let mut ids = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.visible_child(candidate) {
                Ok(Some((child, id))) => {
                    nodes.push(child);
                    ids.push(id);
                }
                Ok(None) => {}
                Err(err) => {
                    let context = format!(
                        "Error while checking visibility of extension node '{}'",
                        self.backing.path(candidate).unwrap_or_default()
                    );
                    self.report(Some(&context), addin_id, Some(&err));
                }
            }
        }
        ChildCache {
            nodes: ExtensionNodeList::from(nodes),
            ids,
        }
    }

    fn visible_child(
        &self,
        candidate: BackingNodeId,
    ) -> Result<Option<(NodeId, String)>, ExtensionError> {
        let Some(child) = self.backing.attached_typed_node(candidate)? else {
            return Ok(None);
        };
        if !self.backing.is_enabled(candidate)? {
            return Ok(None);
        }
        match self.slot(child) {
            Ok(slot) => Ok(Some((child, slot.id.clone()))),
            Err(_) => Err(BackingTreeError::NodeNotFound(candidate).into()),
        }
    }
}
