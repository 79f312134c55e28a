//! `model` and `modelable`: two-way bindings between form controls (or
//! child components) and data

use super::bind::{bind_value, safe_parse_boolean};
use super::on::listen;
use crate::context::{DirectiveContext, Evaluation};
use crate::error::TendrilError;
use crate::nodes::ModelAccess;
use crate::runtime::{Tendril, WeakTendril};
use std::cell::Cell;
use std::rc::Rc;
use tendril_dom::{Dom, NodeId};
use tendril_evaluator::builtins::parse_float_str;
use tendril_evaluator::Binding;
use tendril_reactivity::{from_json, release, to_json, ArrayRef, FunctionRef, Value};
use tracing::trace;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("model", model);
    tendril.register_directive("modelable", modelable);
}

/// Reads and writes the bound expression, honoring `{ get, set }` objects
#[derive(Clone)]
struct ModelTarget {
    tendril: WeakTendril,
    scope_el: NodeId,
    read: Evaluation,
    path: Option<String>,
}

impl ModelTarget {
    fn get(&self) -> Value {
        let result = self.read.value();
        match accessors(&result) {
            Some((getter, _)) => self.call(&getter, result, Vec::new()),
            None => result,
        }
    }

    fn set(&self, value: Value) {
        let Some(tendril) = self.tendril.upgrade() else {
            return;
        };
        let result = self.read.value();
        if let Some((_, setter)) = accessors(&result) {
            self.call(&setter, result, vec![value]);
            return;
        }
        let Some(path) = &self.path else {
            return;
        };
        trace!(path = %path, "Writing model value");
        if let Err(err) = tendril.assign(self.scope_el, path, value) {
            tendril.report(Some(self.scope_el), err);
        }
    }

    fn call(&self, function: &FunctionRef, this: Value, args: Vec<Value>) -> Value {
        match function.call(this, args) {
            Ok(value) => value,
            Err(err) => {
                if let Some(tendril) = self.tendril.upgrade() {
                    tendril.report(Some(self.scope_el), TendrilError::Eval(err.into()));
                }
                Value::Undefined
            }
        }
    }
}

/// `get` and `set` of a getter/setter object
fn accessors(value: &Value) -> Option<(FunctionRef, FunctionRef)> {
    let object = value.as_object()?;
    let getter = object.get("get").as_function()?.clone();
    let setter = object.get("set").as_function()?.clone();
    Some((getter, setter))
}

fn model(cx: &DirectiveContext) {
    let tendril = cx.tendril();
    let dom = cx.dom().clone();
    let el = cx.el();
    let modifiers = cx.directive().modifiers.clone();
    let scope_el = if cx.has_modifier("parent") {
        dom.parent_element(el).unwrap_or(el)
    } else {
        el
    };

    let path = match &cx.directive().expression {
        Binding::Source(source) => Some(source.to_string()),
        Binding::Function(function) => function
            .call(Value::Undefined, Vec::new())
            .ok()
            .and_then(|value| value.as_str().map(str::to_string)),
    };
    let target = ModelTarget {
        tendril: tendril.downgrade(),
        scope_el,
        read: tendril.evaluate_later(scope_el, cx.directive().expression.clone()),
        path,
    };

    let input_type = dom.input_type(el);
    if input_type.as_deref() == Some("radio") {
        if let Binding::Source(source) = &cx.directive().expression {
            tendril.mutate_dom(|| {
                if !dom.has_attribute(el, "name") {
                    dom.set_attribute(el, "name", source);
                }
            });
        }
    }

    let is_select = dom.tag_name(el).as_deref() == Some("select");
    let event = if is_select || matches!(input_type.as_deref(), Some("checkbox" | "radio")) || cx.has_modifier("lazy") {
        "change"
    } else {
        "input"
    };

    let listener = {
        let target = target.clone();
        let dom = dom.clone();
        let modifiers = modifiers.clone();
        let weak = tendril.downgrade();
        listen(tendril, el, event, &cx.directive().modifiers, move |e| {
            let Some(tendril) = weak.upgrade() else {
                return;
            };
            let origin = e.target_node().unwrap_or(el);
            let detail = crate::host::event_detail(e);
            let current = target.get();
            let value = tendril.mutate_dom(|| input_value(&dom, el, &modifiers, origin, detail, &current));
            target.set(value);
        })
    };

    if cx.has_modifier("fill") {
        let current = target.get();
        let empty = match &current {
            Value::Undefined | Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        let checkbox_array = input_type.as_deref() == Some("checkbox") && current.as_array().is_some();
        if empty || checkbox_array || dom.is_multiple_select(el) {
            let value = tendril.mutate_dom(|| input_value(&dom, el, &modifiers, el, None, &current));
            target.set(value);
        }
    }

    let listener = Rc::new(listener);
    tendril.nodes().update(el, |state| {
        let listener = listener.clone();
        state.remove_model_listener = Some(Box::new(move || listener.remove()));
    });
    cx.cleanup({
        let weak = tendril.downgrade();
        move || {
            if let Some(tendril) = weak.upgrade() {
                let remove = tendril.nodes().update(el, |state| state.remove_model_listener.take());
                if let Some(remove) = remove {
                    remove();
                }
            }
            listener.remove();
        }
    });

    if let Ok(Some(form)) = dom.closest(el, "form") {
        let target = target.clone();
        let dom = dom.clone();
        let modifiers = modifiers.clone();
        let weak = tendril.downgrade();
        let reset = listen(tendril, form, "reset", &[], move |_| {
            let Some(tendril) = weak.upgrade() else {
                return;
            };
            let target = target.clone();
            let dom = dom.clone();
            let modifiers = modifiers.clone();
            tendril.next_tick(move || {
                let current = target.get();
                target.set(input_value(&dom, el, &modifiers, el, None, &current));
            });
        });
        cx.cleanup(move || reset.remove());
    }

    let access = ModelAccess {
        get: {
            let target = target.clone();
            FunctionRef::named("get", move |_, _| Ok(target.get()))
        },
        set: {
            let target = target.clone();
            FunctionRef::named("set", move |_, args| {
                target.set(args.into_iter().next().unwrap_or(Value::Undefined));
                Ok(Value::Undefined)
            })
        },
    };
    tendril.nodes().update(el, |state| state.model = Some(access));

    let nested_path = cx.directive().source().contains('.');
    let unintrusive = cx.has_modifier("unintrusive");
    let weak = tendril.downgrade();
    cx.effect(move || {
        let mut value = target.get();
        let Some(tendril) = weak.upgrade() else {
            return;
        };
        if unintrusive && tendril.dom().has_focus_within(el) {
            return;
        }
        if value.is_undefined() && nested_path {
            value = Value::from("");
        }
        tendril.mutate_dom(|| bind_value(tendril.dom(), el, &value, true));
    });
}

/// The value a control holds after an input event, coerced per modifiers
fn input_value(dom: &Dom, el: NodeId, modifiers: &[String], origin: NodeId, detail: Option<Value>, current: &Value) -> Value {
    let has = |name: &str| modifiers.iter().any(|modifier| modifier == name);
    if let Some(detail) = detail.filter(|detail| !detail.is_undefined()) {
        return if detail.is_nullish() { Value::from(dom.value(origin)) } else { detail };
    }

    let coerce = |raw: String| -> Value {
        if has("number") {
            safe_parse_number(&raw)
        } else if has("boolean") {
            safe_parse_boolean(&Value::from(raw))
        } else {
            Value::from(raw)
        }
    };

    let input_type = dom.input_type(el);
    if input_type.as_deref() == Some("checkbox") {
        let Some(items) = current.as_array() else {
            return Value::Bool(dom.checked(origin));
        };
        let value = coerce(dom.value(origin));
        let items = items.snapshot();
        let next: Vec<Value> = if dom.checked(origin) {
            if items.iter().any(|item| item.strict_equals(&value)) {
                return current.clone();
            }
            items.into_iter().chain(std::iter::once(value)).collect()
        } else {
            items.into_iter().filter(|item| !item.loose_equals(&value)).collect()
        };
        return Value::Array(ArrayRef::from_vec(next));
    }

    if dom.is_multiple_select(el) {
        let selected: Vec<Value> = dom.selected_values(origin).into_iter().map(coerce).collect();
        return Value::Array(ArrayRef::from_vec(selected));
    }

    let raw = if input_type.as_deref() == Some("radio") {
        if !dom.checked(origin) {
            return current.clone();
        }
        dom.value(origin)
    } else {
        dom.value(origin)
    };
    if has("number") {
        safe_parse_number(&raw)
    } else if has("boolean") {
        safe_parse_boolean(&Value::from(raw))
    } else if has("trim") {
        Value::from(raw.trim())
    } else {
        Value::from(raw)
    }
}

/// Leading numeric prefix as a number, `null` for an empty field, and the
/// raw text when nothing numeric is there
fn safe_parse_number(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    let number = parse_float_str(raw);
    if number.is_nan() {
        Value::from(raw)
    } else {
        Value::Number(number)
    }
}

/// Expose an inner property so a parent's `model` on the same element binds
/// to it
fn modelable(cx: &DirectiveContext) {
    let tendril = cx.tendril();
    let el = cx.el();
    let inner_get = cx.evaluate_later();
    let source = cx.directive().source().to_string();
    let weak = tendril.downgrade();
    let inner_set = Rc::new(move |value: Value| {
        if let Some(tendril) = weak.upgrade() {
            if let Err(err) = tendril.assign(el, &source, value) {
                tendril.report(Some(el), err);
            }
        }
    });
    inner_set(inner_get.value());

    let weak = tendril.downgrade();
    let cleanups = cx.cleanups().clone();
    tendril.event_loop().queue_microtask(move || {
        let Some(tendril) = weak.upgrade() else {
            return;
        };
        let Some(outer) = tendril.nodes().with(el, |state| state.model.clone()).flatten() else {
            return;
        };
        let remove = tendril.nodes().update(el, |state| state.remove_model_listener.take());
        if let Some(remove) = remove {
            remove();
        }
        trace!(?el, "Entangling model with inner property");
        let release_entanglement = entangle(&tendril, outer, inner_get, inner_set);
        cleanups.push(release_entanglement);
    });
}

/// Keep two accessor pairs in sync. The outer side wins on the first run and
/// whenever it changed since the last sync.
fn entangle(
    tendril: &Tendril,
    outer: ModelAccess,
    inner_get: Evaluation,
    inner_set: Rc<dyn Fn(Value)>,
) -> impl FnOnce() {
    let first_run = Cell::new(true);
    let outer_hash = std::cell::RefCell::new(None::<String>);
    let call = |function: &FunctionRef, args: Vec<Value>| function.call(Value::Undefined, args).unwrap_or(Value::Undefined);

    let handle = tendril.scheduler().effect(move || {
        let outer_value = call(&outer.get, Vec::new());
        let inner_value = inner_get.value();
        if first_run.replace(false) {
            inner_set(clone_if_object(&outer_value));
        } else {
            let outer_latest = hash(&outer_value);
            let inner_latest = hash(&inner_value);
            if outer_latest != *outer_hash.borrow() {
                inner_set(clone_if_object(&outer_value));
            } else if outer_latest != inner_latest {
                call(&outer.set, vec![clone_if_object(&inner_value)]);
            }
        }
        *outer_hash.borrow_mut() = hash(&call(&outer.get, Vec::new()));
        // Serializing tracks the inner value deeply
        hash(&inner_get.value());
    });
    move || release(handle)
}

fn hash(value: &Value) -> Option<String> {
    to_json(value).ok().map(|json| json.to_string())
}

fn clone_if_object(value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => to_json(value).map(|json| from_json(&json)).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_safe_parse_number() {
        assert_eq!(safe_parse_number("42"), Value::Number(42.0));
        assert_eq!(safe_parse_number("3.5px"), Value::Number(3.5));
        assert_eq!(safe_parse_number("abc"), Value::from("abc"));
        assert_eq!(safe_parse_number(""), Value::Null);
    }

    #[test]
    fn test_checkbox_array_membership() {
        let dom = Dom::new();
        let el = dom.create_element("input");
        dom.append_child(dom.body(), el).unwrap();
        dom.set_attribute(el, "type", "checkbox");
        dom.set_attribute(el, "value", "b");
        let current = Value::from(vec!["a"]);

        dom.set_checked(el, true);
        let added = input_value(&dom, el, &[], el, None, &current);
        assert_eq!(added.as_array().unwrap().snapshot(), vec![Value::from("a"), Value::from("b")]);

        dom.set_checked(el, false);
        let removed = input_value(&dom, el, &[], el, None, &added);
        assert_eq!(removed.as_array().unwrap().snapshot(), vec![Value::from("a")]);
    }

    #[test]
    fn test_text_modifiers() {
        let dom = Dom::new();
        let el = dom.create_element("input");
        dom.set_value(el, "  7 ");
        assert_eq!(input_value(&dom, el, &strings(&["trim"]), el, None, &Value::Undefined), Value::from("7"));
        assert_eq!(input_value(&dom, el, &strings(&["number"]), el, None, &Value::Undefined), Value::Number(7.0));
        let detail = Some(Value::from(3.0));
        assert_eq!(input_value(&dom, el, &[], el, detail, &Value::Undefined), Value::Number(3.0));
    }
}
