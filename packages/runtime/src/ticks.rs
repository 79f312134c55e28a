//! `nextTick`: callbacks run after the current round of DOM updates settles

use crate::runtime::Tendril;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use tendril_reactivity::{PromiseValue, Value};

#[derive(Default)]
pub(crate) struct NextTicks {
    queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    holding: Cell<bool>,
}

impl Tendril {
    /// Run `f` after pending effects have flushed and, while a transition is
    /// starting, only once it reaches its end phase
    pub fn next_tick(&self, f: impl FnOnce() + 'static) -> PromiseValue {
        let (promise, resolver) = PromiseValue::deferred();
        self.inner.ticks.queue.borrow_mut().push_back(Box::new(move || {
            f();
            resolver.resolve(Value::Undefined);
        }));

        let weak = self.downgrade();
        let event_loop = self.event_loop().clone();
        self.event_loop().queue_microtask(move || {
            let Some(tendril) = weak.upgrade() else {
                return;
            };
            if tendril.inner.ticks.holding.get() {
                return;
            }
            let weak = tendril.downgrade();
            event_loop.set_timeout(
                move || {
                    if let Some(tendril) = weak.upgrade() {
                        tendril.release_next_ticks();
                    }
                },
                0,
            );
        });
        promise
    }

    pub(crate) fn hold_next_ticks(&self) {
        self.inner.ticks.holding.set(true);
    }

    pub(crate) fn release_next_ticks(&self) {
        self.inner.ticks.holding.set(false);
        loop {
            let next = self.inner.ticks.queue.borrow_mut().pop_front();
            match next {
                Some(tick) => tick(),
                None => break,
            }
        }
    }
}
