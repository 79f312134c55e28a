//! `ref` and `id`: names an element registers on its component

use crate::context::DirectiveContext;
use crate::registry::DirectiveHandler;
use crate::runtime::Tendril;
use tendril_reactivity::Value;
use tracing::trace;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("ref", Ref);
    tendril.register_directive("id", id);
}

/// Registers the element under its name on the closest component root. The
/// registration happens inline so `$refs` works from any handler of the walk.
struct Ref;

impl DirectiveHandler for Ref {
    fn inline(&self, cx: &DirectiveContext) {
        let tendril = cx.tendril();
        let el = cx.el();
        let name = cx.directive().source().trim().to_string();
        if name.is_empty() {
            return;
        }
        let root = tendril.closest_root(el, false).unwrap_or(el);
        trace!(?el, ?root, name = %name, "Registering ref");
        tendril.nodes().update(root, |state| state.refs.insert(name.clone(), el));

        let weak = tendril.downgrade();
        cx.cleanup(move || {
            if let Some(tendril) = weak.upgrade() {
                tendril.nodes().update(root, |state| {
                    if state.refs.get(&name) == Some(&el) {
                        state.refs.shift_remove(&name);
                    }
                });
            }
        });
    }

    fn handle(&self, _cx: &DirectiveContext) {}
}

/// Reserve a fresh number for each listed name so `$id` calls beneath the
/// element share it
fn id(cx: &DirectiveContext) {
    let tendril = cx.tendril();
    let names = match cx.evaluate() {
        Value::Array(names) => names.snapshot(),
        Value::Undefined | Value::Null => Vec::new(),
        name => vec![name],
    };
    for name in names {
        let name = name.to_display_string();
        let reserved = tendril.nodes().with(cx.el(), |state| state.ids.contains_key(&name)).unwrap_or(false);
        if !reserved {
            let number = tendril.next_id(&name);
            tendril.nodes().update(cx.el(), |state| state.ids.insert(name, number));
        }
    }
}
