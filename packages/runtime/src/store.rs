//! Global named stores, readable from any expression through `$store`

use crate::runtime::Tendril;
use tendril_reactivity::{make_reactive, ObjectRef, Value};
use tracing::debug;

impl Tendril {
    pub fn stores(&self) -> ObjectRef {
        self.inner.stores.clone()
    }

    pub fn store(&self, name: &str) -> Value {
        self.inner.stores.get(name)
    }

    /// Register (or replace) a store. An `init` method on the value is called
    /// with the store as `this`.
    pub fn set_store(&self, name: &str, value: impl Into<Value>) {
        let value = make_reactive(value);
        debug!(store = name, "Store registered");
        self.inner.stores.set(name, value.clone());

        let init = match &value {
            Value::Object(object) => object.get_raw("init").and_then(|init| init.as_function().cloned()),
            _ => None,
        };
        if let Some(init) = init {
            if let Err(err) = init.call(value, Vec::new()) {
                self.report(None, crate::error::TendrilError::Eval(err.into()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Tendril;
    use std::cell::Cell;
    use std::rc::Rc;
    use tendril_common::EventLoop;
    use tendril_dom::Dom;
    use tendril_reactivity::{FunctionRef, ObjectRef, Value};

    #[test]
    fn test_store_init_runs_with_store_as_this() {
        let tendril = Tendril::new(Dom::new(), EventLoop::new());
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let store = ObjectRef::from_entries([("ready", false)]);
        store.set(
            "init",
            Value::Function(FunctionRef::native(move |this, _| {
                seen.set(seen.get() + 1);
                this.set("ready", Value::from(true));
                Ok(Value::Undefined)
            })),
        );

        tendril.set_store("session", store);
        assert_eq!(calls.get(), 1);
        assert_eq!(tendril.store("session").get("ready"), Value::from(true));
        assert!(tendril.store("missing").is_undefined());
    }
}
