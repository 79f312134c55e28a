//! Dependency graph
//!
//! Tracks which effects read which (target, key) pairs during their last run.
//! Forward edges live on each effect (for cleanup before a rerun or on release),
//! reverse edges live in `deps` (for triggering on write).

use indexmap::IndexSet;
use slotmap::{new_key_type, SlotMap};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

new_key_type! {
    /// Identity of an effect in the graph
    pub struct EffectId;
}

/// Identity of an observed container (object, array or tracked cell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

thread_local! {
    static NEXT_TARGET: Cell<u64> = const { Cell::new(1) };
    static GRAPH: RefCell<Graph> = RefCell::new(Graph::default());
}

impl TargetId {
    pub fn fresh() -> Self {
        NEXT_TARGET.with(|next| {
            let id = next.get();
            next.set(id + 1);
            TargetId(id)
        })
    }
}

/// The property of a target an effect depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Prop(Rc<str>),
    Index(usize),
    Length,
    /// Pseudo-key read by whole-container iteration (keys, entries, snapshots)
    Iterate,
    /// The single value of a tracked cell
    Value,
}

pub(crate) type Dep = (TargetId, Key);

pub(crate) type EffectFn = Rc<dyn Fn()>;
pub(crate) type SchedulerFn = Rc<dyn Fn(crate::effect::EffectHandle)>;

pub(crate) struct EffectSlot {
    pub run: EffectFn,
    pub scheduler: Option<SchedulerFn>,
    pub deps: Vec<Dep>,
}

#[derive(Default)]
pub(crate) struct Graph {
    pub effects: SlotMap<EffectId, EffectSlot>,
    pub deps: HashMap<Dep, IndexSet<EffectId>>,
    /// Keys with a live entry in `deps`, per target
    pub keys: HashMap<TargetId, IndexSet<Key>>,
    /// Effects currently running, innermost last
    pub stack: Vec<EffectId>,
    /// Nonzero while inside `untracked`
    pub paused: usize,
}

/// Borrow the thread's graph. Never call user code inside `f`.
pub(crate) fn with_graph<R>(f: impl FnOnce(&mut Graph) -> R) -> R {
    GRAPH.with(|graph| f(&mut graph.borrow_mut()))
}

impl Graph {
    /// Remove `effect` from every dependency entry it belongs to
    pub fn cleanup(&mut self, effect: EffectId) {
        let Some(slot) = self.effects.get_mut(effect) else {
            return;
        };
        for dep in std::mem::take(&mut slot.deps) {
            if let Some(set) = self.deps.get_mut(&dep) {
                set.shift_remove(&effect);
                if set.is_empty() {
                    self.deps.remove(&dep);
                    self.unindex(&dep);
                }
            }
        }
    }

    fn unindex(&mut self, (target, key): &Dep) {
        if let Some(keys) = self.keys.get_mut(target) {
            keys.shift_remove(key);
            if keys.is_empty() {
                self.keys.remove(target);
            }
        }
    }
}

/// Record a read of `(target, key)` by the innermost running effect
pub fn track(target: TargetId, key: Key) {
    with_graph(|graph| {
        if graph.paused > 0 {
            return;
        }
        let Some(&active) = graph.stack.last() else {
            return;
        };
        // A released effect may still be finishing its last run
        if !graph.effects.contains_key(active) {
            return;
        }

        let dep = (target, key);
        if !graph.deps.contains_key(&dep) {
            graph.keys.entry(target).or_default().insert(dep.1.clone());
        }
        let inserted = graph.deps.entry(dep.clone()).or_default().insert(active);
        if inserted {
            if let Some(slot) = graph.effects.get_mut(active) {
                slot.deps.push(dep);
            }
        }
    })
}

/// Effects depending on any of `keys` of `target`, in first-registration order
pub(crate) fn collect(target: TargetId, keys: &[Key]) -> IndexSet<EffectId> {
    with_graph(|graph| {
        let mut effects = IndexSet::new();
        for key in keys {
            if let Some(set) = graph.deps.get(&(target, key.clone())) {
                effects.extend(set.iter().copied());
            }
        }
        effects
    })
}

/// Effects depending on keys of `target` selected by `filter`
pub(crate) fn collect_where(target: TargetId, filter: impl Fn(&Key) -> bool) -> IndexSet<EffectId> {
    with_graph(|graph| {
        let Some(keys) = graph.keys.get(&target) else {
            return IndexSet::new();
        };
        let mut matching: Vec<(&Key, &IndexSet<EffectId>)> = keys
            .iter()
            .filter(|key| filter(key))
            .filter_map(|key| graph.deps.get(&(target, key.clone())).map(|set| (key, set)))
            .collect();
        // Keep index keys ascending so reruns are stable
        matching.sort_by_key(|(key, _)| match key {
            Key::Index(i) => *i,
            _ => usize::MAX,
        });

        let mut effects = IndexSet::new();
        for (_, set) in matching {
            effects.extend(set.iter().copied());
        }
        effects
    })
}

/// Snapshot of graph size, for leak assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphStats {
    /// Live (unreleased) effects
    pub effects: usize,
    /// Non-empty (target, key) dependency entries
    pub entries: usize,
    /// Total effect memberships across all entries
    pub edges: usize,
}

pub fn graph_stats() -> GraphStats {
    with_graph(|graph| GraphStats {
        effects: graph.effects.len(),
        entries: graph.deps.len(),
        edges: graph.deps.values().map(IndexSet::len).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect, release};

    fn indexed_keys(target: TargetId) -> usize {
        with_graph(|graph| graph.keys.get(&target).map_or(0, IndexSet::len))
    }

    #[test]
    fn test_key_index_follows_dependency_entries() {
        let target = TargetId::fresh();
        let other = TargetId::fresh();
        let first = effect(move || {
            track(target, Key::Index(0));
            track(target, Key::Length);
            track(other, Key::Length);
        });
        let second = effect(move || track(target, Key::Length));
        assert_eq!(indexed_keys(target), 2);
        assert_eq!(collect_where(target, |_| true).len(), 2);
        assert_eq!(collect_where(target, |key| matches!(key, Key::Index(_))).len(), 1);

        release(first);
        assert_eq!(indexed_keys(target), 1);
        assert_eq!(indexed_keys(other), 0);
        release(second);
        assert_eq!(indexed_keys(target), 0);
        assert!(collect_where(target, |_| true).is_empty());
    }
}
