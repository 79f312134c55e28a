//! Mutation records
//!
//! While observing, structural and attribute changes to connected nodes are
//! queued as records. The notify hook fires once when the first record of a
//! delivery is queued; the observer owner then calls [`Dom::take_records`].

use crate::document::Dom;
use crate::node::NodeId;
use indexmap::{IndexMap, IndexSet};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
}

#[derive(Default)]
pub(crate) struct ObserverState {
    notify: Option<Rc<dyn Fn()>>,
    records: Vec<MutationRecord>,
    delivery_pending: bool,
}

impl Dom {
    /// Start queuing mutation records; `notify` runs when a delivery becomes pending
    pub fn observe(&self, notify: impl Fn() + 'static) {
        let mut observer = self.inner.observer.borrow_mut();
        observer.notify = Some(Rc::new(notify));
        observer.delivery_pending = false;
    }

    /// Stop observing. Records not yet taken are discarded.
    pub fn disconnect(&self) {
        let mut observer = self.inner.observer.borrow_mut();
        observer.notify = None;
        observer.records.clear();
        observer.delivery_pending = false;
    }

    /// Resume with the hook from a previous `observe` after a disconnect
    pub fn reconnect(&self, notify: Rc<dyn Fn()>) {
        let mut observer = self.inner.observer.borrow_mut();
        observer.notify = Some(notify);
        observer.delivery_pending = false;
    }

    pub fn observer_hook(&self) -> Option<Rc<dyn Fn()>> {
        self.inner.observer.borrow().notify.clone()
    }

    pub fn is_observing(&self) -> bool {
        self.inner.observer.borrow().notify.is_some()
    }

    /// Drain queued records and clear the pending delivery
    pub fn take_records(&self) -> Vec<MutationRecord> {
        let mut observer = self.inner.observer.borrow_mut();
        observer.delivery_pending = false;
        std::mem::take(&mut observer.records)
    }

    pub(crate) fn record(&self, record: MutationRecord) {
        let notify = {
            let mut observer = self.inner.observer.borrow_mut();
            let Some(notify) = observer.notify.clone() else {
                return;
            };
            observer.records.push(record);
            if observer.delivery_pending {
                return;
            }
            observer.delivery_pending = true;
            notify
        };
        notify();
    }
}

/// One processed delivery of mutation records.
///
/// Only element nodes are considered. A node removed and re-added in the same
/// delivery (a move) appears in neither set. Removed nodes inside an added
/// subtree are dropped, as are added nodes that are no longer connected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationBatch {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    /// element -> (name, current value) for added or changed attributes
    pub added_attributes: IndexMap<NodeId, Vec<(String, String)>>,
    /// element -> names of removed or changed attributes
    pub removed_attributes: IndexMap<NodeId, Vec<String>>,
}

impl MutationBatch {
    /// `skip_target` excludes records whose target is ignored by the observer owner
    pub fn from_records(dom: &Dom, records: &[MutationRecord], skip_target: impl Fn(NodeId) -> bool) -> Self {
        let mut added: Vec<NodeId> = Vec::new();
        let mut removed: IndexSet<NodeId> = IndexSet::new();
        let mut batch = MutationBatch::default();

        for record in records {
            match record {
                MutationRecord::ChildList {
                    target,
                    added: added_nodes,
                    removed: removed_nodes,
                } => {
                    if skip_target(*target) {
                        continue;
                    }
                    for node in removed_nodes {
                        if dom.is_element(*node) {
                            removed.insert(*node);
                        }
                    }
                    for node in added_nodes {
                        if !dom.is_element(*node) {
                            continue;
                        }
                        if removed.shift_remove(node) {
                            continue;
                        }
                        if !added.contains(node) {
                            added.push(*node);
                        }
                    }
                }
                MutationRecord::Attributes { target, name, old_value } => {
                    if skip_target(*target) {
                        continue;
                    }
                    let current = dom.get_attribute(*target, name);
                    match (current, old_value) {
                        (Some(value), None) => {
                            batch.added_attributes.entry(*target).or_default().push((name.clone(), value));
                        }
                        (Some(value), Some(_)) => {
                            batch.removed_attributes.entry(*target).or_default().push(name.clone());
                            batch.added_attributes.entry(*target).or_default().push((name.clone(), value));
                        }
                        (None, _) => {
                            batch.removed_attributes.entry(*target).or_default().push(name.clone());
                        }
                    }
                }
            }
        }

        batch.removed = removed
            .into_iter()
            .filter(|node| !added.iter().any(|root| dom.contains(*root, *node)))
            .collect();
        batch.added = added.into_iter().filter(|node| dom.is_connected(*node)).collect();
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.added_attributes.is_empty()
            && self.removed_attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn observed() -> (Dom, Rc<Cell<usize>>) {
        let dom = Dom::new();
        let notified = Rc::new(Cell::new(0));
        let counter = notified.clone();
        dom.observe(move || counter.set(counter.get() + 1));
        (dom, notified)
    }

    #[test]
    fn test_notify_once_per_delivery() {
        let (dom, notified) = observed();
        let a = dom.create_element("div");
        let b = dom.create_element("div");
        dom.append_child(dom.body(), a).unwrap();
        dom.append_child(dom.body(), b).unwrap();
        assert_eq!(notified.get(), 1);

        assert_eq!(dom.take_records().len(), 2);
        dom.set_attribute(a, "id", "x");
        assert_eq!(notified.get(), 2);
    }

    #[test]
    fn test_detached_changes_are_not_recorded() {
        let (dom, notified) = observed();
        let div = dom.create_element("div");
        let child = dom.create_element("span");
        dom.append_child(div, child).unwrap();
        dom.set_attribute(div, "class", "a");
        assert_eq!(notified.get(), 0);
        assert!(dom.take_records().is_empty());
    }

    #[test]
    fn test_move_is_neither_added_nor_removed() {
        let (dom, _) = observed();
        let first = dom.create_element("div");
        let second = dom.create_element("div");
        dom.append_child(dom.body(), first).unwrap();
        dom.append_child(dom.body(), second).unwrap();
        dom.take_records();

        dom.insert_before(dom.body(), second, Some(first)).unwrap();
        let batch = MutationBatch::from_records(&dom, &dom.take_records(), |_| false);
        assert!(batch.added.is_empty());
        assert!(batch.removed.is_empty());
    }

    #[test]
    fn test_attribute_change_is_remove_then_add() {
        let (dom, _) = observed();
        let div = dom.create_element("div");
        dom.append_child(dom.body(), div).unwrap();
        dom.set_attribute(div, "x-show", "a");
        dom.take_records();

        dom.set_attribute(div, "x-show", "b");
        dom.remove_attribute(div, "title");
        let batch = MutationBatch::from_records(&dom, &dom.take_records(), |_| false);
        assert_eq!(batch.removed_attributes[&div], vec!["x-show".to_string()]);
        assert_eq!(batch.added_attributes[&div], vec![("x-show".to_string(), "b".to_string())]);
    }

    #[test]
    fn test_removed_inside_added_subtree_is_dropped() {
        let (dom, _) = observed();
        let wrapper = dom.create_element("div");
        let inner = dom.create_element("p");
        dom.append_child(dom.body(), inner).unwrap();
        dom.take_records();

        dom.append_child(wrapper, inner).unwrap();
        dom.append_child(dom.body(), wrapper).unwrap();
        let batch = MutationBatch::from_records(&dom, &dom.take_records(), |_| false);
        assert_eq!(batch.added, vec![wrapper]);
        assert!(batch.removed.is_empty());
    }
}
