//! Built-in `$` properties

use crate::context::MagicContext;
use crate::diagnostics::DiagnosticKind;
use crate::error::TendrilError;
use crate::host::ElementHost;
use crate::runtime::Tendril;
use std::rc::Rc;
use tendril_dom::{Event, NodeId};
use tendril_reactivity::{release, to_json, FunctionRef, ObjectRef, Value};
use tracing::trace;

pub(crate) fn register_builtins(tendril: &Tendril) {
    tendril.register_magic("el", |cx| ElementHost::value(cx.dom(), cx.el()));
    tendril.register_magic("root", |cx| {
        cx.tendril()
            .closest_root(cx.el(), false)
            .map(|root| ElementHost::value(cx.dom(), root))
            .unwrap_or(Value::Null)
    });
    tendril.register_magic("data", |cx| cx.tendril().data(cx.el()));
    tendril.register_magic("store", |cx| Value::Object(cx.tendril().stores()));
    tendril.register_magic("refs", refs);
    tendril.register_magic("dispatch", dispatch);
    tendril.register_magic("nextTick", next_tick);
    tendril.register_magic("watch", watch);
    tendril.register_magic("id", id);

    if tendril.config().warn_missing_plugins {
        for name in tendril.config().plugin_magics.clone() {
            let magic = name.clone();
            tendril.register_magic(&name, move |cx| {
                cx.tendril().warn(
                    DiagnosticKind::MissingPlugin,
                    format!("You can't use [${magic}] without first installing the \"{magic}\" plugin"),
                    Some(cx.el()),
                );
                Value::Undefined
            });
        }
    }
}

/// Refs registered on the element's component roots, nearest first
fn refs(cx: &MagicContext) -> Value {
    let tendril = cx.tendril();
    let mut owners: Vec<NodeId> = Vec::new();
    tendril.find_closest(cx.el(), |node| {
        if tendril.nodes().with(node, |state| !state.refs.is_empty()).unwrap_or(false) {
            owners.push(node);
        }
        false
    });
    let merged = ObjectRef::new();
    for owner in owners.into_iter().rev() {
        let refs = tendril.nodes().with(owner, |state| state.refs.clone()).unwrap_or_default();
        for (name, el) in refs {
            merged.set(&name, ElementHost::value(cx.dom(), el));
        }
    }
    Value::Object(merged)
}

fn dispatch(cx: &MagicContext) -> Value {
    let dom = cx.dom().clone();
    let el = cx.el();
    Value::Function(FunctionRef::named("$dispatch", move |_, args| {
        let name = args.first().map(Value::to_display_string).unwrap_or_default();
        let detail = args.get(1).cloned().unwrap_or_else(|| Value::Object(ObjectRef::new()));
        trace!(event = %name, "Dispatching custom event");
        let event = Event::custom(name, Tendril::event_detail(detail));
        Ok(Value::from(dom.dispatch_event(el, &event)))
    }))
}

fn next_tick(cx: &MagicContext) -> Value {
    let weak = cx.tendril().downgrade();
    Value::Function(FunctionRef::named("$nextTick", move |_, args| {
        let Some(tendril) = weak.upgrade() else {
            return Ok(Value::Undefined);
        };
        let callback = args.first().and_then(Value::as_function).cloned();
        let reporter = tendril.downgrade();
        let promise = tendril.next_tick(move || {
            if let Some(callback) = callback {
                if let Err(err) = callback.call(Value::Undefined, Vec::new()) {
                    if let Some(tendril) = reporter.upgrade() {
                        tendril.report(None, TendrilError::Eval(err.into()));
                    }
                }
            }
        });
        Ok(Value::Promise(promise))
    }))
}

/// `$watch(expression, callback)`: call back with the new and previous value
/// whenever anything the expression reads changes, deeply
fn watch(cx: &MagicContext) -> Value {
    let weak = cx.tendril().downgrade();
    let el = cx.el();
    Value::Function(FunctionRef::named("$watch", move |_, args| {
        let Some(tendril) = weak.upgrade() else {
            return Ok(Value::Undefined);
        };
        let key = args.first().map(Value::to_display_string).unwrap_or_default();
        let Some(callback) = args.get(1).and_then(Value::as_function).cloned() else {
            return Ok(Value::Undefined);
        };
        let evaluation = tendril.evaluate_later(el, key.as_str());
        let this = tendril.data(el);
        let event_loop = tendril.event_loop().clone();
        let reporter = tendril.downgrade();
        let previous = Rc::new(std::cell::RefCell::new(None::<Value>));

        let handle = tendril.scheduler().effect(move || {
            let value = evaluation.value();
            // Serializing reads every nested property, so nested writes rerun this
            let _ = to_json(&value);
            let old = previous.borrow_mut().replace(value.clone());
            if let Some(old) = old {
                let callback = callback.clone();
                let this = this.clone();
                let reporter = reporter.clone();
                event_loop.queue_microtask(move || {
                    if let Err(err) = callback.call(this, vec![value, old]) {
                        if let Some(tendril) = reporter.upgrade() {
                            tendril.report(Some(el), TendrilError::Eval(err.into()));
                        }
                    }
                });
            }
        });
        tendril.nodes().element_cleanups(el).push(move || release(handle));
        Ok(Value::Undefined)
    }))
}

/// `$id(name, key?)`: ids stable per element, scoped by the nearest `id` root
fn id(cx: &MagicContext) -> Value {
    let weak = cx.tendril().downgrade();
    let el = cx.el();
    Value::Function(FunctionRef::named("$id", move |_, args| {
        let Some(tendril) = weak.upgrade() else {
            return Ok(Value::Undefined);
        };
        let name = args.first().map(Value::to_display_string).unwrap_or_default();
        let key = args
            .get(1)
            .filter(|key| key.is_truthy())
            .map(Value::to_display_string);
        let cache_key = match &key {
            Some(key) => format!("{name}-{key}"),
            None => name.clone(),
        };
        if let Some(cached) = tendril.nodes().with(el, |state| state.id_cache.get(&cache_key).cloned()).flatten() {
            return Ok(Value::from(cached));
        }

        let scoped = tendril
            .find_closest(el, |node| {
                tendril.nodes().with(node, |state| state.ids.contains_key(&name)).unwrap_or(false)
            })
            .and_then(|root| tendril.nodes().with(root, |state| state.ids.get(&name).copied()).flatten());
        let number = scoped.unwrap_or_else(|| tendril.next_id(&name));
        let output = match key {
            Some(key) => format!("{name}-{number}-{key}"),
            None => format!("{name}-{number}"),
        };
        tendril.nodes().update(el, |state| state.id_cache.insert(cache_key.clone(), output.clone()));
        tendril
            .nodes()
            .element_cleanups(el)
            .push({
                let weak = tendril.downgrade();
                move || {
                    if let Some(tendril) = weak.upgrade() {
                        tendril.nodes().update(el, |state| state.id_cache.shift_remove(&cache_key));
                    }
                }
            });
        Ok(Value::from(output))
    }))
}

impl Tendril {
    /// Next number for an id name, shared by the whole page
    pub(crate) fn next_id(&self, name: &str) -> u64 {
        let mut counters = self.inner.id_counters.borrow_mut();
        let counter = counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}
