use crate::value::Value;
use std::any::Any;
use std::rc::Rc;

/// A value owned by the embedding environment (DOM nodes, events, magic helpers)
/// exposed to expressions through property access.
pub trait HostObject {
    fn type_name(&self) -> &str;

    fn get(&self, key: &str) -> Value;

    /// Returns false when the property is read-only
    fn set(&self, _key: &str, _value: Value) -> bool {
        false
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn display(&self) -> String {
        format!("[object {}]", self.type_name())
    }

    /// Stable identity for hosts that are re-wrapped on every access
    fn host_id(&self) -> Option<u64> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

pub type HostRef = Rc<dyn HostObject>;

pub(crate) fn same_host(a: &HostRef, b: &HostRef) -> bool {
    match (a.host_id(), b.host_id()) {
        (Some(x), Some(y)) => x == y && a.type_name() == b.type_name(),
        _ => std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ()),
    }
}
