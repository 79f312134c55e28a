use crate::effect::{trigger_from_index, trigger_keys};
use crate::error::{CallError, CallResult};
use crate::graph::{track, Key, TargetId};
use crate::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Largest `length` an array can report
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Arrays are stored densely; growing past this is a range error
pub const MAX_DENSE_LENGTH: usize = 1 << 24;

/// Validate a requested array length
pub fn checked_length(len: f64) -> CallResult<usize> {
    if !(len >= 0.0 && len.fract() == 0.0 && len <= MAX_ARRAY_LENGTH as f64) {
        return Err(CallError::range_error("Invalid array length"));
    }
    let len = len as usize;
    if len > MAX_DENSE_LENGTH {
        return Err(CallError::range_error(format!(
            "Array length {} exceeds the limit of {}",
            len, MAX_DENSE_LENGTH
        )));
    }
    Ok(len)
}

struct ArrayInner {
    id: TargetId,
    items: RefCell<Vec<Value>>,
}

/// Reactive array. Index reads return stored values as-is (references are not
/// unwrapped); `length` and whole-array reads subscribe to structural changes.
#[derive(Clone)]
pub struct ArrayRef {
    inner: Rc<ArrayInner>,
}

impl ArrayRef {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                id: TargetId::fresh(),
                items: RefCell::new(items),
            }),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn get(&self, index: usize) -> Value {
        track(self.inner.id, Key::Index(index));
        self.inner.items.borrow().get(index).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        track(self.inner.id, Key::Length);
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the items, subscribing to any change of the array
    pub fn snapshot(&self) -> Vec<Value> {
        track(self.inner.id, Key::Iterate);
        track(self.inner.id, Key::Length);
        self.inner.items.borrow().clone()
    }

    pub fn snapshot_untracked(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    pub fn set(&self, index: usize, value: Value) -> CallResult<()> {
        if index >= MAX_DENSE_LENGTH {
            return Err(CallError::range_error(format!(
                "Array index {} exceeds the limit of {}",
                index, MAX_DENSE_LENGTH
            )));
        }
        let old_len = {
            let mut items = self.inner.items.borrow_mut();
            let old_len = items.len();
            if index < old_len {
                if items[index] == value {
                    return Ok(());
                }
                items[index] = value;
            } else {
                items.resize(index, Value::Undefined);
                items.push(value);
            }
            old_len
        };

        if index < old_len {
            trigger_keys(self.inner.id, &[Key::Index(index), Key::Iterate]);
        } else {
            trigger_keys(self.inner.id, &[Key::Index(index), Key::Length, Key::Iterate]);
        }
        Ok(())
    }

    /// Change `length`: shrinking notifies readers of every removed index
    pub fn set_len(&self, len: usize) -> CallResult<()> {
        if len > MAX_DENSE_LENGTH {
            return Err(CallError::range_error("Invalid array length"));
        }
        let old_len = self.inner.items.borrow().len();
        if len == old_len {
            return Ok(());
        }
        self.inner.items.borrow_mut().resize(len, Value::Undefined);
        trigger_from_index(self.inner.id, len.min(old_len));
        Ok(())
    }

    pub fn push(&self, value: Value) -> usize {
        let index = {
            let mut items = self.inner.items.borrow_mut();
            items.push(value);
            items.len() - 1
        };
        trigger_keys(self.inner.id, &[Key::Index(index), Key::Length, Key::Iterate]);
        index + 1
    }

    pub fn pop(&self) -> Value {
        let popped = self.inner.items.borrow_mut().pop();
        match popped {
            Some(value) => {
                let len = self.inner.items.borrow().len();
                trigger_from_index(self.inner.id, len);
                value
            }
            None => Value::Undefined,
        }
    }

    pub fn insert(&self, index: usize, value: Value) {
        let index = {
            let mut items = self.inner.items.borrow_mut();
            let index = index.min(items.len());
            items.insert(index, value);
            index
        };
        trigger_from_index(self.inner.id, index);
    }

    pub fn remove(&self, index: usize) -> Value {
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            (index < items.len()).then(|| items.remove(index))
        };
        match removed {
            Some(value) => {
                trigger_from_index(self.inner.id, index);
                value
            }
            None => Value::Undefined,
        }
    }

    /// Remove `delete_count` items at `start` and insert `items` in their place
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        let (start, removed, changed) = {
            let mut current = self.inner.items.borrow_mut();
            let start = start.min(current.len());
            let end = start.saturating_add(delete_count).min(current.len());
            let changed = end > start || !items.is_empty();
            let removed: Vec<Value> = current.splice(start..end, items).collect();
            (start, removed, changed)
        };
        if changed {
            trigger_from_index(self.inner.id, start);
        }
        removed
    }

    /// Replace all items, notifying every reader
    pub fn replace(&self, items: Vec<Value>) {
        *self.inner.items.borrow_mut() = items;
        trigger_from_index(self.inner.id, 0);
    }

    pub fn clear(&self) {
        if self.inner.items.borrow().is_empty() {
            return;
        }
        self.inner.items.borrow_mut().clear();
        trigger_from_index(self.inner.id, 0);
    }
}

impl Default for ArrayRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.items.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => write!(f, "Array#{:?}", self.inner.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect, release};
    use std::cell::Cell;

    fn watch(array: &ArrayRef, read: fn(&ArrayRef)) -> (crate::effect::EffectHandle, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let (array, runs_clone) = (array.clone(), runs.clone());
        let handle = effect(move || {
            read(&array);
            runs_clone.set(runs_clone.get() + 1);
        });
        (handle, runs)
    }

    #[test]
    fn test_truncating_length_notifies_dropped_indices() {
        let array = ArrayRef::from_vec(vec![Value::from(1), Value::from(2), Value::from(3)]);
        let (tail, tail_runs) = watch(&array, |a| {
            a.get(2);
        });
        let (head, head_runs) = watch(&array, |a| {
            a.get(0);
        });

        array.set_len(1).unwrap();
        assert_eq!(tail_runs.get(), 2);
        assert_eq!(head_runs.get(), 1);
        release(tail);
        release(head);
    }

    #[test]
    fn test_push_notifies_length_readers() {
        let array = ArrayRef::new();
        let (handle, runs) = watch(&array, |a| {
            a.len();
        });

        array.push(Value::from("x"));
        assert_eq!(runs.get(), 2);
        assert_eq!(array.snapshot_untracked(), vec![Value::from("x")]);
        release(handle);
    }

    #[test]
    fn test_index_reads_keep_references() {
        let cell = Value::new_ref(Value::from(1));
        let array = ArrayRef::from_vec(vec![cell.clone()]);
        assert_eq!(array.get(0), cell);
    }

    #[test]
    fn test_splice_returns_removed_items() {
        let array = ArrayRef::from_vec((0..5).map(Value::from).collect());
        let removed = array.splice(1, 2, vec![Value::from("a")]);
        assert_eq!(removed, vec![Value::from(1), Value::from(2)]);
        assert_eq!(array.snapshot_untracked().len(), 4);
    }

    #[test]
    fn test_same_value_write_is_silent() {
        let array = ArrayRef::from_vec(vec![Value::from(1)]);
        let (handle, runs) = watch(&array, |a| {
            a.snapshot();
        });

        array.set(0, Value::from(1)).unwrap();
        assert_eq!(runs.get(), 1);
        array.set(0, Value::from(2)).unwrap();
        assert_eq!(runs.get(), 2);
        release(handle);
    }

    #[test]
    fn test_oversized_length_is_a_range_error() {
        let array = ArrayRef::from_vec(vec![Value::from(1)]);
        assert!(matches!(array.set_len(MAX_DENSE_LENGTH + 1), Err(CallError::RangeError { .. })));
        assert!(matches!(array.set(MAX_DENSE_LENGTH, Value::Null), Err(CallError::RangeError { .. })));
        assert!(matches!(checked_length(1e13), Err(CallError::RangeError { .. })));
        assert!(matches!(checked_length(-1.0), Err(CallError::RangeError { .. })));
        assert_eq!(checked_length(3.0), Ok(3));
        assert_eq!(array.snapshot_untracked(), vec![Value::from(1)]);
    }
}
