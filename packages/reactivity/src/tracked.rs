use crate::effect::trigger;
use crate::graph::{track, Key, TargetId};
use std::cell::RefCell;
use std::fmt;

/// A single observed value for Rust-side state.
///
/// Reads inside an effect subscribe it; writes of an unequal value rerun subscribers.
pub struct Tracked<T> {
    id: TargetId,
    value: RefCell<T>,
}

impl<T> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            id: TargetId::fresh(),
            value: RefCell::new(value),
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Borrow the value, subscribing the running effect
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        track(self.id, Key::Value);
        f(&self.value.borrow())
    }

    /// Mutate in place and notify unconditionally
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.borrow_mut());
        trigger(self.id, Key::Value);
    }
}

impl<T: Clone> Tracked<T> {
    pub fn get(&self) -> T {
        track(self.id, Key::Value);
        self.value.borrow().clone()
    }

    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }
}

impl<T: PartialEq> Tracked<T> {
    /// Store `value`; returns whether it differed from the previous one
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        trigger(self.id, Key::Value);
        true
    }
}

impl<T: Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("id", &self.id)
            .field("value", &self.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{effect, release};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_set_same_value_does_not_rerun() {
        let cell = Rc::new(Tracked::new(0.0_f64));
        let runs = Rc::new(Cell::new(0));

        let (cell_clone, runs_clone) = (cell.clone(), runs.clone());
        let handle = effect(move || {
            let _ = cell_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        });

        assert!(cell.set(1.0));
        assert!(!cell.set(1.0));
        assert_eq!(runs.get(), 2);
        release(handle);
    }

    #[test]
    fn test_update_always_notifies() {
        let cell = Rc::new(Tracked::new(vec![1]));
        let total = Rc::new(Cell::new(0));

        let (cell_clone, total_clone) = (cell.clone(), total.clone());
        let handle = effect(move || total_clone.set(cell_clone.with(|v| v.iter().sum::<i32>())));

        cell.update(|v| v.push(2));
        assert_eq!(total.get(), 3);
        release(handle);
    }
}
