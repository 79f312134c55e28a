//! `if`: render a template's content only while an expression is truthy

use crate::context::DirectiveContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::TendrilError;
use crate::runtime::{Tendril, WeakTendril};
use crate::transition::Direction;
use std::cell::Cell;
use std::rc::Rc;
use tendril_dom::NodeId;
use tendril_reactivity::{untracked, ObjectRef};
use tracing::debug;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("if", conditional);
}

fn conditional(cx: &DirectiveContext) {
    let template = cx.el();
    if !cx.dom().is_template(template) {
        cx.tendril().warn(
            DiagnosticKind::Misuse,
            TendrilError::not_a_template(cx.tendril().attribute_name("if")).to_string(),
            Some(template),
        );
        return;
    }

    let evaluation = cx.evaluate_later();
    let weak = cx.tendril().downgrade();
    let rendered_once = Rc::new(Cell::new(false));
    cx.effect(move || {
        let weak = weak.clone();
        let rendered_once = rendered_once.clone();
        evaluation.run(move |value| {
            let Some(tendril) = weak.upgrade() else {
                return;
            };
            if value.is_truthy() {
                let animate = rendered_once.replace(true);
                show(&tendril, template, animate);
            } else {
                hide(&tendril, template);
            }
        });
    });

    let weak = cx.tendril().downgrade();
    cx.cleanup(move || {
        if let Some(tendril) = weak.upgrade() {
            remove_current(&tendril, template, false);
        }
    });
}

fn show(tendril: &Tendril, template: NodeId, animate: bool) {
    if tendril.nodes().with(template, |state| state.current_if.is_some()).unwrap_or(false) {
        return;
    }
    let clone = match tendril.dom().import_template(template) {
        Ok(clone) => clone,
        Err(err) => {
            tendril.report(Some(template), err.into());
            return;
        }
    };
    tendril.nodes().add_scope(tendril.dom(), clone, ObjectRef::new(), Some(template));
    tendril.mutate_dom(|| {
        if let Err(err) = tendril.dom().insert_after(template, clone) {
            tendril.report(Some(template), err.into());
            return;
        }
        untracked(|| tendril.initialize_tree(clone));
    });
    tendril.nodes().update(template, |state| state.current_if = Some(clone));
    debug!(?template, ?clone, "Rendered conditional content");

    let enters = tendril
        .transition_config(clone)
        .is_some_and(|config| !config.phases(Direction::Enter).is_empty());
    if animate && enters {
        tendril.transition_direction(clone, Direction::Enter, || {}, || {});
    }
}

fn hide(tendril: &Tendril, template: NodeId) {
    remove_current(tendril, template, true);
}

/// Take the rendered clone out, after its leave transition when `animate`
fn remove_current(tendril: &Tendril, template: NodeId, animate: bool) {
    let Some(clone) = tendril.nodes().update(template, |state| state.current_if.take()) else {
        return;
    };
    let leaves = tendril
        .transition_config(clone)
        .is_some_and(|config| !config.phases(Direction::Leave).is_empty());
    if animate && leaves {
        let weak: WeakTendril = tendril.downgrade();
        tendril.transition_direction(clone, Direction::Leave, || {}, move || {
            if let Some(tendril) = weak.upgrade() {
                discard(&tendril, clone);
            }
        });
    } else {
        discard(tendril, clone);
    }
}

fn discard(tendril: &Tendril, clone: NodeId) {
    debug!(?clone, "Removing conditional content");
    tendril.mutate_dom(|| {
        tendril.discard_tree(clone);
        tendril.dom().dispose(clone);
    });
}
