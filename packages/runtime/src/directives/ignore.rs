//! `ignore` keeps the runtime out of a subtree, `cloak` is removed once the
//! element has been initialized

use crate::context::DirectiveContext;
use crate::registry::DirectiveHandler;
use crate::runtime::Tendril;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("ignore", Ignore);
    tendril.register_directive("cloak", cloak);
}

struct Ignore;

impl DirectiveHandler for Ignore {
    /// Flags the element before the walk descends, so neither its remaining
    /// directives nor (without `.self`) its children are bound
    fn inline(&self, cx: &DirectiveContext) {
        let el = cx.el();
        let only_self = cx.has_modifier("self");
        cx.tendril().nodes().update(el, |state| {
            if only_self {
                state.ignore_self = true;
            } else {
                state.ignore = true;
            }
        });

        let weak = cx.tendril().downgrade();
        cx.cleanup(move || {
            if let Some(tendril) = weak.upgrade() {
                tendril.nodes().update(el, |state| {
                    if only_self {
                        state.ignore_self = false;
                    } else {
                        state.ignore = false;
                    }
                });
            }
        });
    }

    fn handle(&self, _cx: &DirectiveContext) {}
}

fn cloak(cx: &DirectiveContext) {
    let el = cx.el();
    let weak = cx.tendril().downgrade();
    cx.tendril().event_loop().queue_microtask(move || {
        if let Some(tendril) = weak.upgrade() {
            let attribute = tendril.attribute_name("cloak");
            tendril.mutate_dom(|| tendril.dom().remove_attribute(el, &attribute));
        }
    });
}
