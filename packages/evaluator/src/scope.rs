//! Scope chains
//!
//! A chain is an immutable, shared list of scope objects, innermost first.
//! Nodes without their own scope share their parent's chain by reference;
//! defining a scope creates a new chain for that node and its descendants.

use indexmap::IndexSet;
use std::rc::Rc;
use tendril_reactivity::{ObjectRef, Value};

#[derive(Clone, Default)]
pub struct ScopeChain {
    scopes: Rc<Vec<ObjectRef>>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scopes(scopes: Vec<ObjectRef>) -> Self {
        Self {
            scopes: Rc::new(scopes),
        }
    }

    /// A new chain with `scope` in front of this one
    pub fn with_scope(&self, scope: ObjectRef) -> Self {
        let mut scopes = Vec::with_capacity(self.scopes.len() + 1);
        scopes.push(scope);
        scopes.extend(self.scopes.iter().cloned());
        Self::from_scopes(scopes)
    }

    pub fn scopes(&self) -> &[ObjectRef] {
        &self.scopes
    }

    pub fn innermost(&self) -> Option<&ObjectRef> {
        self.scopes.first()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn ptr_eq(&self, other: &ScopeChain) -> bool {
        Rc::ptr_eq(&self.scopes, &other.scopes)
    }

    /// Innermost scope that owns `key`
    pub fn owner(&self, key: &str) -> Option<&ObjectRef> {
        self.scopes.iter().find(|scope| scope.has(key))
    }

    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.owner(key).map(|scope| scope.get(key))
    }

    /// Write to the owning scope, or the outermost when no scope owns `key`.
    /// Returns false on an empty chain.
    pub fn assign(&self, key: &str, value: Value) -> bool {
        match self.owner(key).or_else(|| self.scopes.last()) {
            Some(scope) => {
                scope.set(key, value);
                true
            }
            None => false,
        }
    }

    /// Visible keys, innermost definitions first, without duplicates
    pub fn keys(&self) -> Vec<Rc<str>> {
        let mut keys: IndexSet<Rc<str>> = IndexSet::new();
        for scope in self.scopes.iter() {
            keys.extend(scope.keys());
        }
        keys.into_iter().collect()
    }

    /// Flatten into one plain object (outer definitions shadowed by inner ones)
    pub fn snapshot(&self) -> ObjectRef {
        let merged = ObjectRef::new();
        for scope in self.scopes.iter().rev() {
            for (key, value) in scope.entries() {
                merged.set(&key, value);
            }
        }
        merged
    }
}

impl std::fmt::Debug for ScopeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeChain").field("depth", &self.scopes.len()).finish()
    }
}
