//! `bind`: keep an attribute, class list, style or form value in sync with
//! an expression. Without an attribute name it applies a whole object of
//! attributes and directives at once.

use crate::context::DirectiveContext;
use crate::directive::{parse_directive, sort_by_priority};
use crate::runtime::Tendril;
use std::cell::RefCell;
use std::rc::Rc;
use tendril_dom::{Dom, NodeId};
use tendril_evaluator::Binding;
use tendril_reactivity::{FunctionRef, ObjectRef, Value};
use tracing::trace;

const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "disabled", "checked", "required", "readonly", "open", "selected", "autofocus", "itemscope", "multiple",
    "novalidate", "allowfullscreen", "allowpaymentrequest", "formnovalidate", "autoplay", "controls", "loop",
    "muted", "playsinline", "default", "ismap", "reversed", "async", "defer", "nomodule", "hidden", "inert",
];

/// Attributes that keep a `false` value instead of being removed
const PRESERVED_WHEN_FALSY: &[&str] = &["aria-pressed", "aria-checked", "aria-expanded", "aria-selected"];

type Restore = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("bind", bind);
}

fn bind(cx: &DirectiveContext) {
    let Some(name) = cx.directive().value.clone() else {
        bind_object(cx);
        return;
    };
    if name == "key" {
        let expression = cx.directive().expression.clone();
        cx.tendril().nodes().update(cx.el(), |state| state.key_expression = Some(expression));
        return;
    }

    let name = if cx.has_modifier("camel") { camel_case(&name) } else { name };
    let restore: Restore = Rc::new(RefCell::new(None));
    let evaluation = cx.evaluate_later();
    let source = cx.directive().source().to_string();
    let weak = cx.tendril().downgrade();
    let el = cx.el();

    let effect_restore = restore.clone();
    cx.effect(move || {
        let weak = weak.clone();
        let name = name.clone();
        let source = source.clone();
        let restore = effect_restore.clone();
        evaluation.run(move |mut value| {
            let Some(tendril) = weak.upgrade() else {
                return;
            };
            // A missing nested property renders as empty rather than "undefined"
            if value.is_undefined() && source.contains('.') {
                value = Value::from("");
            }
            tendril.mutate_dom(|| bind_property(tendril.dom(), el, &name, &value, &restore));
        });
    });

    cx.cleanup(move || {
        let undo = restore.borrow_mut().take();
        if let Some(undo) = undo {
            undo();
        }
    });
}

fn bind_property(dom: &Dom, el: NodeId, name: &str, value: &Value, restore: &Restore) {
    trace!(?el, name, "Binding");
    match name {
        "value" => bind_value(dom, el, value, false),
        "class" => {
            let previous = restore.borrow_mut().take();
            if let Some(previous) = previous {
                previous();
            }
            *restore.borrow_mut() = Some(set_classes(dom, el, value));
        }
        "style" => {
            let previous = restore.borrow_mut().take();
            if let Some(previous) = previous {
                previous();
            }
            *restore.borrow_mut() = Some(set_styles(dom, el, value));
        }
        "checked" => {
            bind_attribute(dom, el, name, value);
            if dom.checked(el) != value.is_truthy() {
                dom.set_checked(el, value.is_truthy());
            }
        }
        "selected" => {
            bind_attribute(dom, el, name, value);
            if dom.selected(el) != value.is_truthy() {
                dom.set_selected(el, value.is_truthy());
            }
        }
        _ => bind_attribute(dom, el, name, value),
    }
}

/// Set, normalize or remove a plain attribute for a bound value
pub fn bind_attribute(dom: &Dom, el: NodeId, name: &str, value: &Value) {
    let falsy = matches!(value, Value::Undefined | Value::Null | Value::Bool(false));
    if falsy && !PRESERVED_WHEN_FALSY.contains(&name) {
        dom.remove_attribute(el, name);
        return;
    }
    let text = if BOOLEAN_ATTRIBUTES.contains(&name) {
        name.to_string()
    } else {
        value.to_display_string()
    };
    if dom.get_attribute(el, name).as_deref() != Some(text.as_str()) {
        dom.set_attribute(el, name, &text);
    }
}

/// Write a bound value into a form control. `from_model` also syncs the
/// checked state of radios.
pub fn bind_value(dom: &Dom, el: NodeId, value: &Value, from_model: bool) {
    let input_type = dom.input_type(el);
    match input_type.as_deref() {
        Some("radio") => {
            if !dom.has_attribute(el, "value") {
                dom.set_value(el, &value.to_display_string());
            }
            if from_model {
                let own = Value::from(dom.value(el));
                let checked = match value {
                    Value::Bool(wanted) => safe_parse_boolean(&own) == Value::Bool(*wanted),
                    other => own.loose_equals(other),
                };
                dom.set_checked(el, checked);
            }
        }
        Some("checkbox") => match value {
            Value::Number(n) if n.fract() == 0.0 => dom.set_value(el, &value.to_display_string()),
            Value::Array(items) => {
                let own = Value::from(dom.value(el));
                let checked = items.snapshot().iter().any(|item| item.loose_equals(&own));
                dom.set_checked(el, checked);
            }
            Value::Bool(_) | Value::Undefined | Value::Null => dom.set_checked(el, value.is_truthy()),
            other => dom.set_value(el, &other.to_display_string()),
        },
        _ if dom.tag_name(el).as_deref() == Some("select") => {
            let wanted: Vec<String> = match value {
                Value::Array(items) => items.snapshot().iter().map(Value::to_display_string).collect(),
                other => vec![other.to_display_string()],
            };
            dom.set_selected_values(el, &wanted);
        }
        _ => {
            let text = if value.is_nullish() {
                String::new()
            } else {
                value.to_display_string()
            };
            if dom.value(el) != text {
                dom.set_value(el, &text);
            }
        }
    }
}

/// `true`-ish and `false`-ish form strings become booleans; anything else
/// keeps its value
pub(super) fn safe_parse_boolean(raw: &Value) -> Value {
    let text = match raw {
        Value::Bool(b) => return Value::Bool(*b),
        Value::Number(n) if *n == 1.0 => return Value::Bool(true),
        Value::Number(n) if *n == 0.0 => return Value::Bool(false),
        Value::String(s) => s.to_string(),
        other if other.is_truthy() => return Value::Bool(true),
        _ => return Value::Null,
    };
    match text.as_str() {
        "1" | "true" | "on" | "yes" => Value::Bool(true),
        "0" | "false" | "off" | "no" => Value::Bool(false),
        "" => Value::Null,
        _ => Value::Bool(true),
    }
}

fn split_classes(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Apply a class binding and return how to take it back
fn set_classes(dom: &Dom, el: NodeId, value: &Value) -> Box<dyn FnOnce()> {
    match value {
        Value::Object(object) => set_classes_from_object(dom, el, object),
        Value::Array(items) => {
            let joined: Vec<String> = items.snapshot().iter().map(Value::to_display_string).collect();
            set_classes_from_string(dom, el, &joined.join(" "))
        }
        Value::String(text) => set_classes_from_string(dom, el, text),
        Value::Number(_) => set_classes_from_string(dom, el, &value.to_display_string()),
        _ => set_classes_from_string(dom, el, ""),
    }
}

fn set_classes_from_string(dom: &Dom, el: NodeId, text: &str) -> Box<dyn FnOnce()> {
    let missing: Vec<String> = split_classes(text).into_iter().filter(|class| !dom.has_class(el, class)).collect();
    let refs: Vec<&str> = missing.iter().map(String::as_str).collect();
    dom.add_classes(el, &refs);
    let dom = dom.clone();
    Box::new(move || {
        let refs: Vec<&str> = missing.iter().map(String::as_str).collect();
        dom.remove_classes(el, &refs);
    })
}

fn set_classes_from_object(dom: &Dom, el: NodeId, object: &ObjectRef) -> Box<dyn FnOnce()> {
    let entries = object.entries();
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for (classes, enabled) in &entries {
        if enabled.is_truthy() {
            continue;
        }
        for class in split_classes(classes) {
            if dom.has_class(el, &class) {
                dom.remove_class(el, &class);
                removed.push(class);
            }
        }
    }
    for (classes, enabled) in &entries {
        if !enabled.is_truthy() {
            continue;
        }
        for class in split_classes(classes) {
            if !dom.has_class(el, &class) {
                dom.add_class(el, &class);
                added.push(class);
            }
        }
    }
    let dom = dom.clone();
    Box::new(move || {
        for class in &removed {
            dom.add_class(el, class);
        }
        for class in &added {
            dom.remove_class(el, class);
        }
    })
}

fn set_styles(dom: &Dom, el: NodeId, value: &Value) -> Box<dyn FnOnce()> {
    let dom = dom.clone();
    match value {
        Value::Object(object) => {
            let mut previous = Vec::new();
            for (key, value) in object.entries() {
                let name = if key.starts_with("--") { key.to_string() } else { kebab_case(&key) };
                previous.push((name.clone(), dom.style_property(el, &name)));
                dom.set_style_property(el, &name, &value.to_display_string());
            }
            Box::new(move || {
                for (name, value) in previous.into_iter().rev() {
                    match value {
                        Some(value) => dom.set_style_property(el, &name, &value),
                        None => dom.remove_style_property(el, &name),
                    }
                }
            })
        }
        other => {
            let cached = dom.get_attribute(el, "style");
            let text = if other.is_nullish() { String::new() } else { other.to_display_string() };
            dom.set_attribute(el, "style", &text);
            Box::new(move || match cached {
                Some(cached) => dom.set_attribute(el, "style", &cached),
                None => dom.remove_attribute(el, "style"),
            })
        }
    }
}

/// Apply a bindings object: directive keys bind as directives, anything else
/// binds as a literal attribute value
fn bind_object(cx: &DirectiveContext) {
    let tendril = cx.tendril();
    let el = cx.el();
    let providers = tendril.inner.registry.borrow().bindings();
    let extras: Vec<(String, Value)> = providers
        .into_iter()
        .map(|(name, provider)| {
            let function = FunctionRef::named(&name, move |_, args| Ok(provider(el, args)));
            (name, Value::Function(function))
        })
        .collect();
    let value = cx
        .evaluate_later()
        .value_with(extras.iter().map(|(name, value)| (name.as_str(), value.clone())).collect());
    let Value::Object(object) = value else {
        return;
    };
    apply_bindings(tendril, el, &object, &cx.directive().original);
}

pub(crate) fn apply_bindings(tendril: &Tendril, el: NodeId, object: &ObjectRef, original: &str) {
    let prefix = tendril.config().prefix.clone();
    let mut directives = Vec::new();
    for (name, value) in object.entries() {
        let expression = match &value {
            Value::Function(function) => Binding::Function(function.clone()),
            other => Binding::from(other.to_display_string().as_str()),
        };
        if let Some(directive) = parse_directive(&name, expression, &prefix, Some(original)) {
            directives.push(directive);
            continue;
        }
        let literal = match value {
            Value::Function(function) => Binding::Function(function),
            other => {
                let quoted = serde_json::to_string(&other.to_display_string()).unwrap_or_default();
                Binding::from(quoted.as_str())
            }
        };
        if let Some(directive) = parse_directive(&format!("{prefix}bind:{name}"), literal, &prefix, Some(original)) {
            directives.push(directive);
        }
    }
    let order = tendril.inner.registry.borrow().order().to_vec();
    sort_by_priority(&mut directives, &order);
    for directive in directives {
        tendril.run_directive(el, directive);
    }
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.to_ascii_lowercase().chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() && previous_lower {
            out.push('-');
        }
        previous_lower = c.is_ascii_lowercase();
        out.push(c.to_ascii_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(dom: &Dom, tag: &str) -> NodeId {
        let el = dom.create_element(tag);
        dom.append_child(dom.body(), el).unwrap();
        el
    }

    #[test]
    fn test_falsy_attributes_are_removed() {
        let dom = Dom::new();
        let el = element(&dom, "button");
        bind_attribute(&dom, el, "disabled", &Value::from(true));
        assert_eq!(dom.get_attribute(el, "disabled").as_deref(), Some("disabled"));
        bind_attribute(&dom, el, "disabled", &Value::from(false));
        assert!(!dom.has_attribute(el, "disabled"));

        bind_attribute(&dom, el, "aria-expanded", &Value::from(false));
        assert_eq!(dom.get_attribute(el, "aria-expanded").as_deref(), Some("false"));
    }

    #[test]
    fn test_class_object_undo() {
        let dom = Dom::new();
        let el = element(&dom, "div");
        dom.set_attribute(el, "class", "base hidden");
        let object = ObjectRef::from_entries([("active bold", true), ("hidden", false)]);
        let undo = set_classes(&dom, el, &Value::Object(object));
        assert_eq!(dom.class_list(el), vec!["base", "active", "bold"]);
        undo();
        assert!(dom.has_class(el, "hidden"));
        assert!(!dom.has_class(el, "active"));
    }

    #[test]
    fn test_style_object_uses_kebab_names() {
        let dom = Dom::new();
        let el = element(&dom, "div");
        let object = ObjectRef::from_entries([("backgroundColor", "red"), ("--gap", "4px")]);
        let undo = set_styles(&dom, el, &Value::Object(object));
        assert_eq!(dom.style_property(el, "background-color").as_deref(), Some("red"));
        assert_eq!(dom.style_property(el, "--gap").as_deref(), Some("4px"));
        undo();
        assert!(!dom.has_attribute(el, "style"));
    }

    #[test]
    fn test_checkbox_value_from_array() {
        let dom = Dom::new();
        let el = element(&dom, "input");
        dom.set_attribute(el, "type", "checkbox");
        dom.set_attribute(el, "value", "b");
        bind_value(&dom, el, &Value::from(vec!["a", "b"]), true);
        assert!(dom.checked(el));
        bind_value(&dom, el, &Value::from(vec!["a"]), true);
        assert!(!dom.checked(el));
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(camel_case("foo-bar-baz"), "fooBarBaz");
        assert_eq!(kebab_case("backgroundColor"), "background-color");
        assert_eq!(kebab_case("ArrowUp"), "arrow-up");
    }
}
