//! Child change notifications.
//!
//! # Responsibility
//! - Keep per-node observer registrations.
//! - Bring late subscribers up to date by replaying current children.
//!
//! # Invariants
//! - Events fire only from replay or from a reconciliation that found a
//!   change.
//! - An observer error is reported and never stops delivery to the rest.
//! - An observer is never re-entered while it is running. Events raised for
//!   it meanwhile are queued and delivered in order once it returns.

use super::{ExtensionError, ExtensionTree, NodeId};
use crate::backing::BackingTree;
use crate::BoxError;
use log::debug;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Kind of structural change under one parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionChange {
    Added(NodeId),
    Removed(NodeId),
    /// Emitted once after the individual events of a reconciliation.
    ChildrenChanged,
}

/// One notification delivered to observers of `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionNodeEvent {
    pub parent: NodeId,
    pub change: ExtensionChange,
}

impl ExtensionNodeEvent {
    pub fn new(parent: NodeId, change: ExtensionChange) -> Self {
        Self { parent, change }
    }

    /// Child the event is about; `None` for the aggregate event.
    pub fn child(&self) -> Option<NodeId> {
        match self.change {
            ExtensionChange::Added(child) | ExtensionChange::Removed(child) => Some(child),
            ExtensionChange::ChildrenChanged => None,
        }
    }
}

/// Handle returned by [`ExtensionTree::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Change callback. It may query and reconcile the tree it observes.
pub type Observer<B> =
    Box<dyn FnMut(&mut ExtensionTree<B>, &ExtensionNodeEvent) -> Result<(), BoxError>>;

struct Subscription<B: BackingTree> {
    callback: RefCell<Observer<B>>,
    /// Events raised while the callback was running.
    pending: RefCell<VecDeque<ExtensionNodeEvent>>,
}

impl<B: BackingTree> Subscription<B> {
    fn new(callback: Observer<B>) -> Self {
        Self {
            callback: RefCell::new(callback),
            pending: RefCell::new(VecDeque::new()),
        }
    }
}

pub(crate) struct ObserverRegistry<B: BackingTree> {
    entries: Vec<(SubscriptionId, Rc<Subscription<B>>)>,
}

impl<B: BackingTree> Default for ObserverRegistry<B> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<B: BackingTree> ObserverRegistry<B> {
    fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<B: BackingTree> ExtensionTree<B> {
    /// Registers an observer of `node`'s children.
    ///
    /// The observer first receives one `Added` event per currently visible
    /// child, in child order, then live events. It is registered before the
    /// replay, so changes it causes while replaying reach it afterwards.
    pub fn subscribe<F>(
        &mut self,
        node: NodeId,
        observer: F,
    ) -> Result<SubscriptionId, ExtensionError>
    where
        F: FnMut(&mut ExtensionTree<B>, &ExtensionNodeEvent) -> Result<(), BoxError> + 'static,
    {
        let children = self.child_nodes(node)?;
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        let subscription: Rc<Subscription<B>> = Rc::new(Subscription::new(Box::new(observer)));
        self.slot_mut(node)?
            .observers
            .entries
            .push((id, Rc::clone(&subscription)));

        let mut callback = subscription.callback.borrow_mut();
        for child in children.iter() {
            let event = ExtensionNodeEvent::new(node, ExtensionChange::Added(child));
            self.deliver(&mut callback, &event);
        }
        self.drain_pending(node, id, &subscription, &mut callback);
        debug!(
            "event=observer_subscribe module=tree status=ok node={node} subscription={id} replayed={}",
            children.len()
        );
        Ok(id)
    }

    /// Stops delivery to one observer. Returns whether it was registered.
    pub fn unsubscribe(
        &mut self,
        node: NodeId,
        id: SubscriptionId,
    ) -> Result<bool, ExtensionError> {
        let observers = &mut self.slot_mut(node)?.observers;
        let before = observers.entries.len();
        observers.entries.retain(|(entry, _)| *entry != id);
        Ok(observers.entries.len() != before)
    }

    /// Number of observers registered on `node`.
    pub fn observer_count(&self, node: NodeId) -> Result<usize, ExtensionError> {
        Ok(self.slot(node)?.observers.len())
    }

    pub(crate) fn dispatch(&mut self, node: NodeId, event: &ExtensionNodeEvent) {
        let snapshot: Vec<(SubscriptionId, Rc<Subscription<B>>)> = match self.slot(node) {
            Ok(slot) => slot
                .observers
                .entries
                .iter()
                .map(|(id, subscription)| (*id, Rc::clone(subscription)))
                .collect(),
            Err(_) => return,
        };

        for (id, subscription) in snapshot {
            if !self.is_subscribed(node, id) {
                continue;
            }
            let Ok(mut callback) = subscription.callback.try_borrow_mut() else {
                subscription.pending.borrow_mut().push_back(*event);
                debug!(
                    "event=observer_dispatch module=tree status=queued node={node} subscription={id} reason=reentrant"
                );
                continue;
            };
            self.deliver(&mut callback, event);
            self.drain_pending(node, id, &subscription, &mut callback);
        }
    }

    fn is_subscribed(&self, node: NodeId, id: SubscriptionId) -> bool {
        self.slot(node).is_ok_and(|slot| slot.observers.contains(id))
    }

    fn deliver(&mut self, callback: &mut Observer<B>, event: &ExtensionNodeEvent) {
        if let Err(err) = callback(self, event) {
            self.report_observer_error(event, &*err);
        }
    }

    /// Delivers queued events until the queue stays empty.
    fn drain_pending(
        &mut self,
        node: NodeId,
        id: SubscriptionId,
        subscription: &Subscription<B>,
        callback: &mut Observer<B>,
    ) {
        loop {
            let next = subscription.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            if !self.is_subscribed(node, id) {
                subscription.pending.borrow_mut().clear();
                break;
            }
            self.deliver(callback, &event);
        }
    }

    fn report_observer_error(&self, event: &ExtensionNodeEvent, err: &(dyn Error + 'static)) {
        let subject = event.child().unwrap_or(event.parent);
        let (path, addin_id) = match self.slot(subject) {
            Ok(slot) => (self.slot_path(slot), slot.origin.addin_id.clone()),
            Err(_) => (String::new(), None),
        };
        let context = format!("Error while notifying change of extension node '{path}'");
        self.report(Some(&context), addin_id.as_deref(), Some(err));
    }
}
