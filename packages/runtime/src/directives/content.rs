//! `text` and `html`: keep an element's content in sync with an expression

use crate::context::DirectiveContext;
use crate::runtime::Tendril;
use tendril_reactivity::untracked;
use tracing::trace;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("text", text);
    tendril.register_directive("html", html);
}

fn text(cx: &DirectiveContext) {
    let el = cx.el();
    let evaluation = cx.evaluate_later();
    let weak = cx.tendril().downgrade();
    cx.effect(move || {
        let weak = weak.clone();
        evaluation.run(move |value| {
            if let Some(tendril) = weak.upgrade() {
                let text = value.to_display_string();
                tendril.mutate_dom(|| tendril.dom().set_text_content(el, &text));
            }
        });
    });
}

/// Replaces the children with parsed markup and initializes the new subtree
fn html(cx: &DirectiveContext) {
    let el = cx.el();
    let evaluation = cx.evaluate_later();
    let weak = cx.tendril().downgrade();
    cx.effect(move || {
        let weak = weak.clone();
        evaluation.run(move |value| {
            let Some(tendril) = weak.upgrade() else {
                return;
            };
            let markup = value.to_display_string();
            tendril.mutate_dom(|| {
                for child in tendril.dom().children(el) {
                    tendril.discard_tree(child);
                    tendril.dom().dispose(child);
                }
                match tendril.dom().set_inner_html(el, &markup) {
                    Ok(nodes) => {
                        trace!(?el, nodes = nodes.len(), "Replaced inner markup");
                        untracked(|| tendril.initialize_tree(el));
                    }
                    Err(err) => tendril.report(Some(el), err.into()),
                }
            });
        });
    });
}
