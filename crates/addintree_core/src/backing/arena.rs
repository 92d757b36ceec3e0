//! In-memory arena implementation of the backing tree.

use super::{
    is_valid_node_id, BackingNodeId, BackingTree, BackingTreeError, Condition, AUTO_ID_PREFIX,
    PATH_SEPARATOR,
};
use crate::tree::NodeId;
use log::debug;
use std::fmt::{Debug, Formatter};

struct ArenaNode {
    id: String,
    parent: Option<BackingNodeId>,
    children: Vec<BackingNodeId>,
    enabled: bool,
    condition: Option<Box<dyn Condition>>,
    typed: Option<NodeId>,
    removed: bool,
}

impl ArenaNode {
    fn new(id: String, parent: Option<BackingNodeId>) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            enabled: true,
            condition: None,
            typed: None,
            removed: false,
        }
    }
}

/// Arena-backed mutable tree addressed by [`BackingNodeId`].
///
/// Removed nodes keep their slot so indices are never reused; they simply
/// stop answering queries.
pub struct ArenaTree {
    nodes: Vec<ArenaNode>,
    auto_id_prefix: String,
    next_auto_id: u64,
}

impl Default for ArenaTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ArenaTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaTree")
            .field("nodes", &self.nodes.iter().filter(|n| !n.removed).count())
            .field("auto_id_prefix", &self.auto_id_prefix)
            .finish()
    }
}

impl ArenaTree {
    /// Creates a tree holding only the root node.
    pub fn new() -> Self {
        Self::with_auto_id_prefix(AUTO_ID_PREFIX)
    }

    /// Creates a tree whose anonymous children use `prefix` for generated ids.
    pub fn with_auto_id_prefix(prefix: impl Into<String>) -> Self {
        Self {
            nodes: vec![ArenaNode::new(String::new(), None)],
            auto_id_prefix: prefix.into(),
            next_auto_id: 0,
        }
    }

    pub fn root(&self) -> BackingNodeId {
        BackingNodeId(0)
    }

    /// Appends one child with an explicit id.
    pub fn add_child(
        &mut self,
        parent: BackingNodeId,
        id: impl Into<String>,
    ) -> Result<BackingNodeId, BackingTreeError> {
        let id = id.into();
        if !is_valid_node_id(&id) {
            return Err(BackingTreeError::InvalidId(id));
        }
        let parent_node = self.live(parent)?;
        if parent_node
            .children
            .iter()
            .any(|child| self.nodes[child.0].id == id)
        {
            return Err(BackingTreeError::DuplicateId {
                parent_path: self.path_of(parent),
                id,
            });
        }
        Ok(self.push_child(parent, id))
    }

    /// Appends one child with a generated, sibling-unique id.
    pub fn add_anonymous_child(
        &mut self,
        parent: BackingNodeId,
    ) -> Result<BackingNodeId, BackingTreeError> {
        self.live(parent)?;
        loop {
            let candidate = format!("{}{}", self.auto_id_prefix, self.next_auto_id);
            self.next_auto_id += 1;
            let taken = self.nodes[parent.0]
                .children
                .iter()
                .any(|child| self.nodes[child.0].id == candidate);
            if !taken {
                return Ok(self.push_child(parent, candidate));
            }
        }
    }

    /// Detaches `node` and its subtree.
    ///
    /// Returns the typed nodes that were attached inside the removed subtree
    /// so the caller can tear them down.
    pub fn remove(&mut self, node: BackingNodeId) -> Result<Vec<NodeId>, BackingTreeError> {
        if node == self.root() {
            return Err(BackingTreeError::RootNotRemovable);
        }
        let parent = self.live(node)?.parent;
        if let Some(parent) = parent {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }

        let mut typed = Vec::new();
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            let entry = &mut self.nodes[current.0];
            entry.removed = true;
            entry.parent = None;
            if let Some(typed_node) = entry.typed {
                typed.push(typed_node);
            }
            pending.extend(entry.children.iter().copied());
        }
        debug!(
            "event=backing_remove module=backing status=ok node={} typed_nodes={}",
            node,
            typed.len()
        );
        Ok(typed)
    }

    /// Sets the static enable flag of a node.
    pub fn set_enabled(
        &mut self,
        node: BackingNodeId,
        enabled: bool,
    ) -> Result<(), BackingTreeError> {
        self.live_mut(node)?.enabled = enabled;
        Ok(())
    }

    /// Installs a runtime visibility condition, replacing any previous one.
    pub fn set_condition(
        &mut self,
        node: BackingNodeId,
        condition: impl Condition + 'static,
    ) -> Result<(), BackingTreeError> {
        self.live_mut(node)?.condition = Some(Box::new(condition));
        Ok(())
    }

    pub fn clear_condition(&mut self, node: BackingNodeId) -> Result<(), BackingTreeError> {
        self.live_mut(node)?.condition = None;
        Ok(())
    }

    /// Resolves a `/`-separated path to a live node.
    pub fn find(&self, path: &str) -> Option<BackingNodeId> {
        let mut current = self.root();
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            current = self.nodes[current.0]
                .children
                .iter()
                .copied()
                .find(|child| self.nodes[child.0].id == segment)?;
        }
        Some(current)
    }

    fn push_child(&mut self, parent: BackingNodeId, id: String) -> BackingNodeId {
        let child = BackingNodeId(self.nodes.len());
        self.nodes.push(ArenaNode::new(id, Some(parent)));
        self.nodes[parent.0].children.push(child);
        child
    }

    fn live(&self, node: BackingNodeId) -> Result<&ArenaNode, BackingTreeError> {
        match self.nodes.get(node.0) {
            Some(entry) if !entry.removed => Ok(entry),
            _ => Err(BackingTreeError::NodeNotFound(node)),
        }
    }

    fn live_mut(&mut self, node: BackingNodeId) -> Result<&mut ArenaNode, BackingTreeError> {
        match self.nodes.get_mut(node.0) {
            Some(entry) if !entry.removed => Ok(entry),
            _ => Err(BackingTreeError::NodeNotFound(node)),
        }
    }

    fn path_of(&self, node: BackingNodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let entry = &self.nodes[id.0];
            if entry.parent.is_some() {
                segments.push(entry.id.as_str());
            }
            current = entry.parent;
        }
        segments
            .iter()
            .rev()
            .fold(String::new(), |mut path, segment| {
                path.push(PATH_SEPARATOR);
                path.push_str(segment);
                path
            })
    }
}

impl BackingTree for ArenaTree {
    fn children(&self, node: BackingNodeId) -> Result<Vec<BackingNodeId>, BackingTreeError> {
        Ok(self.live(node)?.children.clone())
    }

    fn is_enabled(&self, node: BackingNodeId) -> Result<bool, BackingTreeError> {
        let entry = self.live(node)?;
        if !entry.enabled {
            return Ok(false);
        }
        match &entry.condition {
            None => Ok(true),
            Some(condition) => condition
                .evaluate()
                .map_err(|source| BackingTreeError::Condition {
                    path: self.path_of(node),
                    source,
                }),
        }
    }

    fn path(&self, node: BackingNodeId) -> Option<String> {
        self.live(node).ok()?;
        Some(self.path_of(node))
    }

    fn node_id(&self, node: BackingNodeId) -> Option<&str> {
        self.live(node).ok().map(|entry| entry.id.as_str())
    }

    fn parent(&self, node: BackingNodeId) -> Option<BackingNodeId> {
        self.live(node).ok()?.parent
    }

    fn attached_typed_node(
        &self,
        node: BackingNodeId,
    ) -> Result<Option<NodeId>, BackingTreeError> {
        Ok(self.live(node)?.typed)
    }

    fn attach_typed_node(
        &mut self,
        node: BackingNodeId,
        typed: Option<NodeId>,
    ) -> Result<(), BackingTreeError> {
        self.live_mut(node)?.typed = typed;
        Ok(())
    }
}
