//! `show`: toggle `display: none`, through transitions after the first run

use crate::context::DirectiveContext;
use crate::runtime::Tendril;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tendril_reactivity::Value;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("show", show);
}

fn show(cx: &DirectiveContext) {
    let el = cx.el();
    let important = cx.has_modifier("important");
    let immediate = cx.has_modifier("immediate");

    let weak = cx.tendril().downgrade();
    let do_hide: Rc<dyn Fn()> = Rc::new(move || {
        let Some(tendril) = weak.upgrade() else {
            return;
        };
        let display = if important { "none !important" } else { "none" };
        tendril.mutate_dom(|| tendril.dom().set_style_property(el, "display", display));
        tendril.nodes().update(el, |state| state.shown = Some(false));
    });
    let weak = cx.tendril().downgrade();
    let do_show: Rc<dyn Fn()> = Rc::new(move || {
        let Some(tendril) = weak.upgrade() else {
            return;
        };
        tendril.mutate_dom(|| tendril.dom().remove_style_property(el, "display"));
        tendril.nodes().update(el, |state| state.shown = Some(true));
    });

    let evaluation = cx.evaluate_later();
    let weak = cx.tendril().downgrade();
    let toggled = Rc::new(Cell::new(false));
    let previous: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
    cx.effect(move || {
        let weak = weak.clone();
        let do_show = do_show.clone();
        let do_hide = do_hide.clone();
        let toggled = toggled.clone();
        let previous = previous.clone();
        evaluation.run(move |value| {
            let Some(tendril) = weak.upgrade() else {
                return;
            };
            if previous.borrow().as_ref().is_some_and(|old| old.strict_equals(&value)) {
                return;
            }
            let visible = value.is_truthy();
            if immediate {
                if visible {
                    let do_show = do_show.clone();
                    tendril.event_loop().set_timeout(move || do_show(), 0);
                } else {
                    do_hide();
                }
            }
            if toggled.replace(true) {
                tendril.toggle_and_cascade(el, visible, do_show, do_hide);
            } else if visible {
                do_show();
            } else {
                do_hide();
            }
            *previous.borrow_mut() = Some(value);
        });
    });
}
