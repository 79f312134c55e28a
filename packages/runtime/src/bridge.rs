//! Mutation bridge
//!
//! Once started, the runtime watches the document. A delivery of records is
//! processed on a microtask: attribute removals run their directive
//! cleanups, attribute additions bind new directives, removed elements are
//! destroyed and added elements inside a component are initialized.
//!
//! The runtime's own writes go through [`Tendril::mutate_dom`], which pauses
//! observation so they never loop back as records.

use crate::runtime::Tendril;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tendril_dom::{MutationBatch, MutationRecord, NodeId};
use tracing::{debug, trace};

#[derive(Default)]
pub(crate) struct BridgeState {
    hook: RefCell<Option<Rc<dyn Fn()>>>,
    paused: Cell<usize>,
    /// Records taken just before a pause, delivered on the next microtask
    queued: RefCell<Vec<MutationRecord>>,
    deferring: Cell<usize>,
    deferred: RefCell<Vec<MutationRecord>>,
}

impl Tendril {
    pub(crate) fn observe_mutations(&self) {
        let weak = self.downgrade();
        let event_loop = self.event_loop().clone();
        let hook: Rc<dyn Fn()> = Rc::new(move || {
            let weak = weak.clone();
            event_loop.queue_microtask(move || {
                if let Some(tendril) = weak.upgrade() {
                    tendril.deliver_records();
                }
            });
        });
        *self.inner.bridge.hook.borrow_mut() = Some(hook.clone());
        self.dom().reconnect(hook);
    }

    /// True while the runtime reacts to document mutations
    pub fn is_observing(&self) -> bool {
        self.inner.bridge.hook.borrow().is_some() && self.inner.bridge.paused.get() == 0
    }

    fn deliver_records(&self) {
        let records = self.dom().take_records();
        if !records.is_empty() {
            self.on_mutate(records);
        }
    }

    /// Run `f` with observation paused so its writes produce no records.
    /// Records already pending are kept and delivered on the next microtask.
    pub fn mutate_dom<R>(&self, f: impl FnOnce() -> R) -> R {
        let hook = self.inner.bridge.hook.borrow().clone();
        let Some(hook) = hook else {
            return f();
        };
        if self.inner.bridge.paused.get() > 0 {
            return f();
        }

        let pending = self.dom().take_records();
        if !pending.is_empty() {
            self.queue_records(pending);
        }
        self.dom().disconnect();
        self.inner.bridge.paused.set(1);
        let result = f();
        self.inner.bridge.paused.set(0);
        self.dom().reconnect(hook);
        result
    }

    fn queue_records(&self, records: Vec<MutationRecord>) {
        let first = {
            let mut queued = self.inner.bridge.queued.borrow_mut();
            let first = queued.is_empty();
            queued.extend(records);
            first
        };
        if !first {
            return;
        }
        let weak = self.downgrade();
        self.event_loop().queue_microtask(move || {
            if let Some(tendril) = weak.upgrade() {
                let records = std::mem::take(&mut *tendril.inner.bridge.queued.borrow_mut());
                tendril.on_mutate(records);
            }
        });
    }

    /// Collect the records produced while `f` runs (and any delivered
    /// meanwhile) and process them as one batch when the outermost call ends
    pub fn defer_batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let bridge = &self.inner.bridge;
        bridge.deferring.set(bridge.deferring.get() + 1);
        let result = f();
        if self.is_observing() {
            let pending = self.dom().take_records();
            bridge.deferred.borrow_mut().extend(pending);
        }
        bridge.deferring.set(bridge.deferring.get() - 1);
        if bridge.deferring.get() == 0 {
            let records = std::mem::take(&mut *bridge.deferred.borrow_mut());
            if !records.is_empty() {
                self.on_mutate(records);
            }
        }
        result
    }

    fn on_mutate(&self, records: Vec<MutationRecord>) {
        if self.inner.bridge.deferring.get() > 0 {
            self.inner.bridge.deferred.borrow_mut().extend(records);
            return;
        }
        let batch = MutationBatch::from_records(self.dom(), &records, |target| self.within_ignored(target));
        if batch.is_empty() {
            return;
        }
        debug!(
            added = batch.added.len(),
            removed = batch.removed.len(),
            attributes = batch.added_attributes.len() + batch.removed_attributes.len(),
            "Processing mutations"
        );

        for (el, names) in &batch.removed_attributes {
            self.cleanup_attributes(*el, names);
        }
        for (el, attributes) in batch.added_attributes {
            if batch.added.contains(&el) || !self.is_managed(el) {
                continue;
            }
            self.apply_attributes(el, attributes);
        }
        for el in &batch.removed {
            trace!(?el, "Destroying removed subtree");
            self.destroy_tree(*el);
        }
        for el in batch.added {
            if !self.dom().is_connected(el) || !self.is_managed(el) {
                continue;
            }
            self.initialize_tree(el);
        }
    }

    /// Inside a component, or a component itself
    fn is_managed(&self, el: NodeId) -> bool {
        self.closest_root(el, true).is_some()
    }
}
