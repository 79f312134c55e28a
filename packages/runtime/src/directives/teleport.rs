//! `teleport`: render a template's content somewhere else in the document
//! while it keeps the template's scope

use crate::context::DirectiveContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::TendrilError;
use crate::runtime::Tendril;
use tendril_dom::{DomResult, Event, ListenerOptions, NodeId};
use tendril_reactivity::{untracked, ObjectRef};
use tracing::debug;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("teleport", teleport);
}

fn teleport(cx: &DirectiveContext) {
    let tendril = cx.tendril();
    let dom = cx.dom();
    let template = cx.el();
    if !dom.is_template(template) {
        tendril.warn(
            DiagnosticKind::Misuse,
            TendrilError::not_a_template(tendril.attribute_name("teleport")).to_string(),
            Some(template),
        );
        return;
    }

    let selector = cx.directive().source().trim().to_string();
    let target = resolve_target(tendril, &selector, template);
    let clone = match dom.import_template(template) {
        Ok(clone) => clone,
        Err(err) => {
            tendril.report(Some(template), err.into());
            return;
        }
    };
    tendril.nodes().update(template, |state| state.teleport_clone = Some(clone));
    tendril.nodes().update(clone, |state| state.teleport_back = Some(template));
    dom.set_attribute(template, "data-teleport-template", "true");
    dom.set_attribute(clone, "data-teleport-target", "true");

    let forwarded = tendril.nodes().with(template, |state| state.forward_events.clone()).unwrap_or_default();
    for event_type in forwarded {
        let forward_dom = dom.clone();
        dom.add_event_listener(clone, &event_type, ListenerOptions::default(), move |e| {
            e.stop_propagation();
            forward_dom.dispatch_event(template, &redispatched(e));
        });
    }

    tendril.nodes().add_scope(dom, clone, ObjectRef::new(), Some(template));
    let modifiers = cx.directive().modifiers.clone();
    tendril.mutate_dom(|| {
        if let Err(err) = place(tendril, clone, target, &modifiers) {
            tendril.report(Some(template), err.into());
            return;
        }
        untracked(|| tendril.initialize_tree(clone));
    });
    debug!(?template, ?clone, selector = %selector, "Teleported template content");

    let weak = tendril.downgrade();
    cx.cleanup(move || {
        let Some(tendril) = weak.upgrade() else {
            return;
        };
        tendril.mutate_dom(|| {
            tendril.discard_tree(clone);
            tendril.dom().dispose(clone);
        });
        tendril.nodes().update(template, |state| state.teleport_clone = None);
    });
}

/// The element matching `selector`, or the detached scratch container when
/// nothing matches
fn resolve_target(tendril: &Tendril, selector: &str, template: NodeId) -> NodeId {
    let dom = tendril.dom();
    match dom.query_selector(dom.document(), selector) {
        Ok(Some(target)) => target,
        Ok(None) => {
            tendril.report(
                Some(template),
                TendrilError::TeleportTarget {
                    selector: selector.to_string(),
                },
            );
            tendril.inner.scratch
        }
        Err(err) => {
            tendril.report(Some(template), err.into());
            tendril.inner.scratch
        }
    }
}

fn place(tendril: &Tendril, clone: NodeId, target: NodeId, modifiers: &[String]) -> DomResult<()> {
    let dom = tendril.dom();
    let has = |name: &str| modifiers.iter().any(|modifier| modifier == name);
    match dom.parent(target) {
        Some(parent) if has("prepend") => dom.insert_before(parent, clone, Some(target)),
        Some(_) if has("append") => dom.insert_after(target, clone),
        _ => dom.append_child(target, clone),
    }
}

/// A fresh copy of `event` for dispatch from the template
fn redispatched(event: &Event) -> Event {
    if let Some(key) = event.key() {
        Event::keyboard(event.event_type(), key, event.modifiers())
    } else if let Some(detail) = event.detail() {
        Event::custom(event.event_type(), Some(detail))
    } else {
        Event::new(event.event_type())
    }
}
