use addintree_core::{
    ArenaTree, BackingNodeId, BackingTree, BackingTreeError, BoxError, CollectingErrorSink,
    ExtensionChange, ExtensionTree, NodeId, NodeOrigin, StaticAddinResolver,
};
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

struct Fixture {
    tree: ExtensionTree,
    sink: Arc<CollectingErrorSink>,
    menu_backing: BackingNodeId,
    menu: NodeId,
}

fn fixture() -> Fixture {
    let sink = Arc::new(CollectingErrorSink::new());
    let mut tree = ExtensionTree::new(ArenaTree::new(), Arc::new(StaticAddinResolver::new()))
        .with_error_sink(sink.clone());
    let root = tree.backing().root();
    let menu_backing = tree.backing_mut().add_child(root, "MainMenu").unwrap();
    let menu = tree
        .attach(menu_backing, NodeOrigin::host(), None, &[])
        .unwrap();
    Fixture {
        tree,
        sink,
        menu_backing,
        menu,
    }
}

impl Fixture {
    fn add(&mut self, id: &str) -> (BackingNodeId, NodeId) {
        let backing = self
            .tree
            .backing_mut()
            .add_child(self.menu_backing, id)
            .unwrap();
        let node = self
            .tree
            .attach(backing, NodeOrigin::addin("demo.editor"), None, &[])
            .unwrap();
        (backing, node)
    }

    fn child_ids(&mut self) -> Vec<String> {
        let children = self.tree.child_nodes(self.menu).unwrap();
        children
            .iter()
            .map(|child| self.tree.id(child).unwrap().to_string())
            .collect()
    }

    fn record_events(&mut self) -> Rc<RefCell<Vec<ExtensionChange>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&events);
        self.tree
            .subscribe(self.menu, move |_, event| {
                log.borrow_mut().push(event.change);
                Ok(())
            })
            .unwrap();
        events
    }
}

/// Backing tree whose children query fails for one node.
struct UnreachableChildren {
    inner: ArenaTree,
    failing: Option<BackingNodeId>,
    queries: Cell<usize>,
}

impl BackingTree for UnreachableChildren {
    fn children(&self, node: BackingNodeId) -> Result<Vec<BackingNodeId>, BackingTreeError> {
        self.queries.set(self.queries.get() + 1);
        if self.failing == Some(node) {
            return Err(BackingTreeError::Children {
                path: self.inner.path(node).unwrap_or_default(),
                source: "extension registry offline".into(),
            });
        }
        self.inner.children(node)
    }

    fn is_enabled(&self, node: BackingNodeId) -> Result<bool, BackingTreeError> {
        self.inner.is_enabled(node)
    }

    fn path(&self, node: BackingNodeId) -> Option<String> {
        self.inner.path(node)
    }

    fn node_id(&self, node: BackingNodeId) -> Option<&str> {
        self.inner.node_id(node)
    }

    fn parent(&self, node: BackingNodeId) -> Option<BackingNodeId> {
        self.inner.parent(node)
    }

    fn attached_typed_node(&self, node: BackingNodeId) -> Result<Option<NodeId>, BackingTreeError> {
        self.inner.attached_typed_node(node)
    }

    fn attach_typed_node(
        &mut self,
        node: BackingNodeId,
        typed: Option<NodeId>,
    ) -> Result<(), BackingTreeError> {
        self.inner.attach_typed_node(node, typed)
    }
}

#[test]
fn failing_children_query_is_reported_and_cached_empty() {
    let mut inner = ArenaTree::new();
    let root = inner.root();
    let menu_backing = inner.add_child(root, "MainMenu").unwrap();
    let open_backing = inner.add_child(menu_backing, "Open").unwrap();
    let backing = UnreachableChildren {
        inner,
        failing: Some(menu_backing),
        queries: Cell::new(0),
    };

    let sink = Arc::new(CollectingErrorSink::new());
    let mut tree = ExtensionTree::new(backing, Arc::new(StaticAddinResolver::new()))
        .with_error_sink(sink.clone());
    let menu = tree
        .attach(menu_backing, NodeOrigin::host(), None, &[])
        .unwrap();
    tree.attach(open_backing, NodeOrigin::addin("demo.editor"), None, &[])
        .unwrap();

    assert!(tree.child_nodes(menu).unwrap().is_empty());
    assert_eq!(tree.backing().queries.get(), 1);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    let context = records[0].context.as_deref().unwrap();
    assert!(context.contains("/MainMenu"), "{context}");
    assert!(records[0]
        .error
        .as_deref()
        .unwrap()
        .contains("extension registry offline"));
    assert!(!records[0].fatal);

    assert!(tree.child_nodes(menu).unwrap().is_empty());
    assert_eq!(tree.backing().queries.get(), 1);
    assert_eq!(sink.len(), 1);
}

#[test]
fn zero_children_yield_cached_empty_list() {
    let mut fx = fixture();
    assert!(fx.tree.child_nodes(fx.menu).unwrap().is_empty());

    fx.add("Open");
    assert!(
        fx.tree.child_nodes(fx.menu).unwrap().is_empty(),
        "cached list must not be re-traversed"
    );

    assert!(fx.tree.notify_child_changed(fx.menu).unwrap());
    assert_eq!(fx.child_ids(), vec!["Open"]);
}

#[test]
fn excludes_untyped_and_disabled_children() {
    let mut fx = fixture();
    fx.add("Open");
    let (save, _) = fx.add("Save");
    fx.tree
        .backing_mut()
        .add_child(fx.menu_backing, "Untyped")
        .unwrap();
    fx.tree.backing_mut().set_enabled(save, false).unwrap();
    let (close, _) = fx.add("Close");
    fx.tree
        .backing_mut()
        .set_condition(close, || -> Result<bool, BoxError> { Ok(false) })
        .unwrap();
    fx.add("Quit");

    assert_eq!(fx.child_ids(), vec!["Open", "Quit"]);
    assert!(fx.sink.is_empty());
}

#[test]
fn failing_condition_is_reported_and_skipped() {
    let mut fx = fixture();
    fx.add("Open");
    let (broken, _) = fx.add("Broken");
    fx.tree
        .backing_mut()
        .set_condition(broken, || -> Result<bool, BoxError> {
            Err("condition host unavailable".into())
        })
        .unwrap();
    fx.add("Quit");

    assert_eq!(fx.child_ids(), vec!["Open", "Quit"]);
    let records = fx.sink.records();
    assert_eq!(records.len(), 1);
    let context = records[0].context.as_deref().unwrap();
    assert!(context.contains("/MainMenu/Broken"), "{context}");
    assert!(records[0]
        .error
        .as_deref()
        .unwrap()
        .contains("condition host unavailable"));
    assert!(!records[0].fatal);
}

#[test]
fn reconciliation_reports_removed_before_added() {
    let mut fx = fixture();
    let (_, a) = fx.add("A");
    let (b_backing, b) = fx.add("B");
    let (_, c) = fx.add("C");
    assert_eq!(fx.child_ids(), vec!["A", "B", "C"]);

    let events = fx.record_events();
    assert_eq!(
        *events.borrow(),
        vec![
            ExtensionChange::Added(a),
            ExtensionChange::Added(b),
            ExtensionChange::Added(c)
        ]
    );
    events.borrow_mut().clear();

    fx.tree.backing_mut().set_enabled(b_backing, false).unwrap();
    let (_, d) = fx.add("D");

    assert!(fx.tree.notify_child_changed(fx.menu).unwrap());
    assert_eq!(
        *events.borrow(),
        vec![
            ExtensionChange::Removed(b),
            ExtensionChange::Added(d),
            ExtensionChange::ChildrenChanged
        ]
    );
    assert_eq!(fx.child_ids(), vec!["A", "C", "D"]);
}

#[test]
fn unchanged_children_produce_no_events() {
    let mut fx = fixture();
    fx.add("A");
    fx.add("B");
    fx.child_ids();
    let events = fx.record_events();
    events.borrow_mut().clear();

    assert!(!fx.tree.notify_child_changed(fx.menu).unwrap());
    assert!(events.borrow().is_empty());
}

#[test]
fn never_materialized_node_has_nothing_to_reconcile() {
    let mut fx = fixture();
    fx.add("A");
    assert!(!fx.tree.notify_child_changed(fx.menu).unwrap());
    assert_eq!(fx.child_ids(), vec!["A"]);
}

#[test]
fn removed_subtree_is_reported_as_removal() {
    let mut fx = fixture();
    fx.add("A");
    let (b_backing, b) = fx.add("B");
    fx.child_ids();
    let events = fx.record_events();
    events.borrow_mut().clear();

    let torn_down = fx.tree.backing_mut().remove(b_backing).unwrap();
    assert_eq!(torn_down, vec![b]);
    for node in torn_down {
        fx.tree.release_node(node).unwrap();
    }

    assert!(fx.tree.notify_child_changed(fx.menu).unwrap());
    assert_eq!(
        *events.borrow(),
        vec![ExtensionChange::Removed(b), ExtensionChange::ChildrenChanged]
    );
    assert_eq!(fx.child_ids(), vec!["A"]);
}

#[test]
fn replaced_node_with_same_id_is_not_reported() {
    let mut fx = fixture();
    let (a_backing, a) = fx.add("A");
    fx.child_ids();
    let events = fx.record_events();
    events.borrow_mut().clear();

    fx.tree.release_node(a).unwrap();
    let replacement = fx
        .tree
        .attach(a_backing, NodeOrigin::addin("demo.other"), None, &[])
        .unwrap();

    assert!(!fx.tree.notify_child_changed(fx.menu).unwrap());
    assert!(events.borrow().is_empty());
    let children = fx.tree.child_nodes(fx.menu).unwrap();
    assert_eq!(children.as_slice(), &[replacement]);
}

#[test]
fn reconciliation_matches_set_difference_over_mutations() {
    let mut fx = fixture();
    let ids = ["A", "B", "C", "D", "E", "F"];
    let mut backing = Vec::new();
    for id in ids {
        backing.push(fx.add(id).0);
    }
    fx.child_ids();

    let events = fx.record_events();
    // (index, enabled) toggles applied between reconciliations.
    let rounds: [&[(usize, bool)]; 4] = [
        &[(1, false), (3, false)],
        &[(1, true), (5, false)],
        &[(0, false), (2, false), (3, true)],
        &[(0, true), (2, true), (5, true), (4, false)],
    ];

    for round in rounds {
        let before: BTreeSet<String> = fx.child_ids().into_iter().collect();
        events.borrow_mut().clear();
        for &(index, enabled) in round {
            fx.tree
                .backing_mut()
                .set_enabled(backing[index], enabled)
                .unwrap();
        }
        fx.tree.notify_child_changed(fx.menu).unwrap();
        let after: BTreeSet<String> = fx.child_ids().into_iter().collect();

        let mut added = BTreeSet::new();
        let mut removed = BTreeSet::new();
        for change in events.borrow().iter() {
            match change {
                ExtensionChange::Added(node) => {
                    added.insert(fx.tree.id(*node).unwrap().to_string());
                }
                ExtensionChange::Removed(node) => {
                    removed.insert(fx.tree.id(*node).unwrap().to_string());
                }
                ExtensionChange::ChildrenChanged => {}
            }
        }

        let expected: BTreeSet<String> = before
            .union(&added)
            .filter(|id| !removed.contains(*id))
            .cloned()
            .collect();
        assert_eq!(after, expected);
        assert!(removed.is_subset(&before));
        assert!(added.is_disjoint(&before));
    }
}

#[test]
fn identity_queries_follow_backing_tree() {
    let mut fx = fixture();
    let (_, open) = fx.add("Open");
    let anonymous_backing = fx
        .tree
        .backing_mut()
        .add_anonymous_child(fx.menu_backing)
        .unwrap();
    let anonymous = fx
        .tree
        .attach(anonymous_backing, NodeOrigin::host(), None, &[])
        .unwrap();

    assert_eq!(fx.tree.path(open).unwrap(), "/MainMenu/Open");
    assert_eq!(fx.tree.parent(open).unwrap(), Some(fx.menu));
    assert_eq!(fx.tree.parent(fx.menu).unwrap(), None);
    assert_eq!(fx.tree.addin_id(open).unwrap(), Some("demo.editor"));
    assert_eq!(fx.tree.addin_id(fx.menu).unwrap(), None);
    assert!(fx.tree.has_id(open).unwrap());
    assert!(!fx.tree.has_id(anonymous).unwrap());

    assert_eq!(fx.tree.child_by_id(fx.menu, "Open").unwrap(), Some(open));
    assert_eq!(fx.tree.child_by_id(fx.menu, "Missing").unwrap(), None);
    assert_eq!(
        fx.tree.backing().attached_typed_node(anonymous_backing).unwrap(),
        Some(anonymous)
    );
}
