//! Reactive objects
//!
//! Every `ObjectRef` is observed: reads inside an effect subscribe to the
//! (object, key) pair, writes of unequal values notify. Handles are cheap clones
//! of one shared container, so any number of them hit the same dependency entry.

use crate::effect::{trigger, trigger_all, trigger_keys};
use crate::function::FunctionRef;
use crate::graph::{track, Key, TargetId};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

#[derive(Clone)]
enum Slot {
    Data(Value),
    /// Computed property, called with `this` bound to the object
    Getter(FunctionRef),
}

struct ObjectInner {
    id: TargetId,
    props: RefCell<IndexMap<Rc<str>, Slot>>,
}

#[derive(Clone)]
pub struct ObjectRef {
    inner: Rc<ObjectInner>,
    readonly: bool,
}

impl ObjectRef {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: TargetId::fresh(),
                props: RefCell::new(IndexMap::new()),
            }),
            readonly: false,
        }
    }

    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let object = Self::new();
        {
            let mut props = object.inner.props.borrow_mut();
            for (key, value) in entries {
                props.insert(key.into(), Slot::Data(value.into()));
            }
        }
        object
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A view over the same object whose writes warn and do nothing
    pub fn readonly(&self) -> ObjectRef {
        Self {
            inner: self.inner.clone(),
            readonly: true,
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Read a property, subscribing the running effect. References stored as
    /// values are unwrapped one level; getters are invoked.
    pub fn get(&self, key: &str) -> Value {
        track(self.inner.id, Key::Prop(Rc::from(key)));
        let slot = self.inner.props.borrow().get(key).cloned();
        match slot {
            None => Value::Undefined,
            Some(Slot::Data(value)) => value.unwrap_ref(),
            Some(Slot::Getter(getter)) => match getter.call(Value::Object(self.clone()), Vec::new()) {
                Ok(value) => value,
                Err(err) => {
                    warn!(property = key, error = %err, "Getter failed");
                    Value::Undefined
                }
            },
        }
    }

    /// Stored value without tracking or unwrapping (getters are not invoked)
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        match self.inner.props.borrow().get(key) {
            Some(Slot::Data(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        track(self.inner.id, Key::Prop(Rc::from(key)));
        self.inner.props.borrow().contains_key(key)
    }

    /// Own key lookup without subscribing
    pub fn has_untracked(&self, key: &str) -> bool {
        self.inner.props.borrow().contains_key(key)
    }

    /// Write a property. Adding a new key also notifies iteration readers.
    /// Returns false if the write was rejected.
    pub fn set(&self, key: &str, value: Value) -> bool {
        if self.readonly {
            warn!(property = key, "Set operation on readonly object failed");
            return false;
        }

        let key: Rc<str> = Rc::from(key);
        let existing = self.inner.props.borrow().get(&key).cloned();
        match existing {
            Some(Slot::Getter(_)) => {
                warn!(property = %key, "Cannot assign to a getter-only property");
                false
            }
            // Writing a plain value over a reference writes through it
            Some(Slot::Data(Value::Ref(cell))) if !matches!(value, Value::Ref(_)) => {
                cell.set(value);
                true
            }
            Some(Slot::Data(old)) => {
                if old == value {
                    return true;
                }
                self.inner.props.borrow_mut().insert(key.clone(), Slot::Data(value));
                trigger(self.inner.id, Key::Prop(key));
                true
            }
            None => {
                self.inner.props.borrow_mut().insert(key.clone(), Slot::Data(value));
                trigger_keys(self.inner.id, &[Key::Prop(key), Key::Iterate]);
                true
            }
        }
    }

    /// Install a computed property
    pub fn define_getter(&self, key: &str, getter: FunctionRef) {
        let key: Rc<str> = Rc::from(key);
        let is_new = self
            .inner
            .props
            .borrow_mut()
            .insert(key.clone(), Slot::Getter(getter))
            .is_none();
        if is_new {
            trigger_keys(self.inner.id, &[Key::Prop(key), Key::Iterate]);
        } else {
            trigger(self.inner.id, Key::Prop(key));
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        if self.readonly {
            warn!(property = key, "Delete operation on readonly object failed");
            return false;
        }
        let removed = self.inner.props.borrow_mut().shift_remove(key).is_some();
        if removed {
            trigger_keys(self.inner.id, &[Key::Prop(Rc::from(key)), Key::Iterate]);
        }
        removed
    }

    /// Remove every property, notifying every reader of this object
    pub fn clear(&self) {
        if self.readonly {
            warn!("Clear operation on readonly object failed");
            return;
        }
        let had_any = {
            let mut props = self.inner.props.borrow_mut();
            let had_any = !props.is_empty();
            props.clear();
            had_any
        };
        if had_any {
            trigger_all(self.inner.id);
        }
    }

    /// Own keys in insertion order; subscribes to key additions and removals
    pub fn keys(&self) -> Vec<Rc<str>> {
        track(self.inner.id, Key::Iterate);
        self.inner.props.borrow().keys().cloned().collect()
    }

    pub fn keys_untracked(&self) -> Vec<Rc<str>> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(&key);
                (key, value)
            })
            .collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    pub fn len(&self) -> usize {
        track(self.inner.id, Key::Iterate);
        self.inner.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy every own property of `source` onto this object (getters included)
    pub fn assign(&self, source: &ObjectRef) {
        let slots: Vec<(Rc<str>, Slot)> = source
            .inner
            .props
            .borrow()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect();
        for (key, slot) in slots {
            match slot {
                Slot::Data(value) => {
                    self.set(&key, value);
                }
                Slot::Getter(getter) => self.define_getter(&key, getter),
            }
        }
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props = match self.inner.props.try_borrow() {
            Ok(props) => props,
            Err(_) => return write!(f, "Object#{:?}", self.inner.id),
        };
        let mut map = f.debug_map();
        for (key, slot) in props.iter() {
            match slot {
                Slot::Data(Value::Object(nested)) if nested.ptr_eq(self) => map.entry(key, &"[Circular]"),
                Slot::Data(value) => map.entry(key, value),
                Slot::Getter(_) => map.entry(key, &"[Getter]"),
            };
        }
        map.finish()
    }
}
