//! Per-element runtime state, kept beside the DOM arena rather than on the nodes

use crate::transition::{InFlight, PendingHide, TransitionConfig};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tendril_dom::{Dom, NodeId};
use tendril_evaluator::{Binding, ScopeChain};
use tendril_reactivity::{FunctionRef, ObjectRef};

pub type Cleanup = Box<dyn FnOnce()>;

/// Cleanups collected by one directive (or one element), run once in order
#[derive(Clone, Default)]
pub struct Cleanups(Rc<RefCell<Vec<Cleanup>>>);

impl Cleanups {
    pub fn push(&self, cleanup: impl FnOnce() + 'static) {
        self.0.borrow_mut().push(Box::new(cleanup));
    }

    pub fn run(&self) {
        loop {
            let next = {
                let mut cleanups = self.0.borrow_mut();
                if cleanups.is_empty() {
                    break;
                }
                cleanups.remove(0)
            };
            next();
        }
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Getter/setter pair a `modelable` parent binds to
#[derive(Clone)]
pub struct ModelAccess {
    pub get: FunctionRef,
    pub set: FunctionRef,
}

#[derive(Default)]
pub struct NodeState {
    pub scope: Option<ScopeChain>,
    pub attribute_cleanups: IndexMap<String, Vec<Cleanups>>,
    pub cleanups: Cleanups,
    /// Set once the element's directives have been initialized
    pub marker: Option<u64>,
    pub ignore: bool,
    pub ignore_self: bool,
    pub refs: IndexMap<String, NodeId>,
    pub key_expression: Option<Binding>,
    /// Clone rendered by an `if` template
    pub current_if: Option<NodeId>,
    pub teleport_clone: Option<NodeId>,
    pub teleport_back: Option<NodeId>,
    pub ids: IndexMap<String, u64>,
    pub id_cache: IndexMap<String, String>,
    pub transition: Option<Rc<RefCell<TransitionConfig>>>,
    pub transitioning: Option<Rc<InFlight>>,
    pub pending_hide: Option<PendingHide>,
    pub hide_children: Vec<NodeId>,
    pub model: Option<ModelAccess>,
    /// Detaches the listener `model` installed
    pub remove_model_listener: Option<Cleanup>,
    /// Last visibility applied by `show`
    pub shown: Option<bool>,
    /// Event names a teleported template re-dispatches from its clone
    pub forward_events: Vec<String>,
}

#[derive(Default)]
pub struct NodeStore {
    nodes: RefCell<HashMap<NodeId, NodeState>>,
}

impl NodeStore {
    /// Read state; never call back into the runtime from `f`
    pub fn with<R>(&self, id: NodeId, f: impl FnOnce(&NodeState) -> R) -> Option<R> {
        self.nodes.borrow().get(&id).map(f)
    }

    /// Mutate state, creating it on first use; never call back into the runtime from `f`
    pub fn update<R>(&self, id: NodeId, f: impl FnOnce(&mut NodeState) -> R) -> R {
        f(self.nodes.borrow_mut().entry(id).or_default())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.borrow().contains_key(&id)
    }

    pub fn forget(&self, id: NodeId) -> Option<NodeState> {
        self.nodes.borrow_mut().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn is_initialized(&self, id: NodeId) -> bool {
        self.with(id, |state| state.marker.is_some()).unwrap_or(false)
    }

    pub fn is_ignored(&self, id: NodeId) -> bool {
        self.with(id, |state| state.ignore).unwrap_or(false)
    }

    /// Scope chain of the nearest element (itself included) that defines one
    pub fn closest_chain(&self, dom: &Dom, id: NodeId) -> ScopeChain {
        std::iter::once(id)
            .chain(dom.ancestors(id))
            .find_map(|node| self.with(node, |state| state.scope.clone()).flatten())
            .unwrap_or_default()
    }

    /// Give `id` its own chain: `data` in front of the chain of `reference`
    /// (or of `id` itself)
    pub fn add_scope(&self, dom: &Dom, id: NodeId, data: ObjectRef, reference: Option<NodeId>) -> ScopeChain {
        let chain = self.closest_chain(dom, reference.unwrap_or(id)).with_scope(data);
        self.update(id, |state| state.scope = Some(chain.clone()));
        chain
    }

    /// Drop `data` from the element's own chain
    pub fn remove_scope(&self, id: NodeId, data: &ObjectRef) {
        self.update(id, |state| {
            if let Some(chain) = state.scope.take() {
                let rest: Vec<ObjectRef> = chain.scopes().iter().filter(|scope| !scope.ptr_eq(data)).cloned().collect();
                state.scope = Some(ScopeChain::from_scopes(rest));
            }
        })
    }

    pub fn attribute_cleanups(&self, id: NodeId, attribute: &str) -> Cleanups {
        let cleanups = Cleanups::default();
        self.update(id, |state| {
            state
                .attribute_cleanups
                .entry(attribute.to_string())
                .or_default()
                .push(cleanups.clone())
        });
        cleanups
    }

    /// Take the cleanups registered for `names` (every attribute when `None`)
    pub fn take_attribute_cleanups(&self, id: NodeId, names: Option<&[String]>) -> Vec<Cleanups> {
        self.update(id, |state| match names {
            None => std::mem::take(&mut state.attribute_cleanups)
                .into_values()
                .flatten()
                .collect(),
            Some(names) => names
                .iter()
                .filter_map(|name| state.attribute_cleanups.shift_remove(name))
                .flatten()
                .collect(),
        })
    }

    pub fn element_cleanups(&self, id: NodeId) -> Cleanups {
        self.update(id, |state| state.cleanups.clone())
    }
}
