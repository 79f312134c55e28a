//! Host values exposing elements and events to expressions

use slotmap::Key;
use std::any::Any;
use std::rc::Rc;
use tendril_dom::{Dom, Event, EventTarget, NodeId};
use tendril_reactivity::{FunctionRef, HostObject, Value};

pub struct ElementHost {
    dom: Dom,
    id: NodeId,
}

impl ElementHost {
    pub fn value(dom: &Dom, id: NodeId) -> Value {
        Value::Host(Rc::new(ElementHost { dom: dom.clone(), id }))
    }

    pub fn node(&self) -> NodeId {
        self.id
    }

    fn method(&self, name: &str, f: impl Fn(&Dom, NodeId, Vec<Value>) -> Value + 'static) -> Value {
        let dom = self.dom.clone();
        let id = self.id;
        Value::Function(FunctionRef::named(name, move |_, args| Ok(f(&dom, id, args))))
    }
}

/// The element behind a value produced by [`ElementHost::value`]
pub fn element_of(value: &Value) -> Option<NodeId> {
    let host = value.as_host()?;
    host.as_any().downcast_ref::<ElementHost>().map(ElementHost::node)
}

fn arg_string(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_display_string).unwrap_or_default()
}

impl HostObject for ElementHost {
    fn type_name(&self) -> &str {
        "HTMLElement"
    }

    fn get(&self, key: &str) -> Value {
        let dom = &self.dom;
        let id = self.id;
        match key {
            "tagName" => dom.tag_name(id).map(|tag| Value::string(tag.to_ascii_uppercase())).unwrap_or_default(),
            "id" => Value::from(dom.get_attribute(id, "id").unwrap_or_default()),
            "className" => Value::from(dom.get_attribute(id, "class").unwrap_or_default()),
            "value" => Value::from(dom.value(id)),
            "checked" => Value::from(dom.checked(id)),
            "textContent" | "innerText" => Value::from(dom.text_content(id)),
            "innerHTML" => Value::from(dom.inner_html(id)),
            "isConnected" => Value::from(dom.is_connected(id)),
            "parentElement" => dom
                .parent_element(id)
                .map(|parent| ElementHost::value(dom, parent))
                .unwrap_or(Value::Null),
            "getAttribute" => self.method(key, |dom, id, args| {
                dom.get_attribute(id, &arg_string(&args, 0)).map(Value::from).unwrap_or(Value::Null)
            }),
            "setAttribute" => self.method(key, |dom, id, args| {
                dom.set_attribute(id, &arg_string(&args, 0), &arg_string(&args, 1));
                Value::Undefined
            }),
            "removeAttribute" => self.method(key, |dom, id, args| {
                dom.remove_attribute(id, &arg_string(&args, 0));
                Value::Undefined
            }),
            "hasAttribute" => self.method(key, |dom, id, args| Value::from(dom.has_attribute(id, &arg_string(&args, 0)))),
            "focus" => self.method(key, |dom, id, _| {
                dom.focus(id);
                Value::Undefined
            }),
            "blur" => self.method(key, |dom, id, _| {
                dom.blur(id);
                Value::Undefined
            }),
            "click" => self.method(key, |dom, id, _| {
                dom.click(id);
                Value::Undefined
            }),
            _ => Value::Undefined,
        }
    }

    fn set(&self, key: &str, value: Value) -> bool {
        let dom = &self.dom;
        let text = value.to_display_string();
        match key {
            "value" => dom.set_value(self.id, &text),
            "checked" => dom.set_checked(self.id, value.is_truthy()),
            "textContent" | "innerText" => dom.set_text_content(self.id, &text),
            "innerHTML" => return dom.set_inner_html(self.id, &text).is_ok(),
            "id" => dom.set_attribute(self.id, "id", &text),
            "className" => dom.set_attribute(self.id, "class", &text),
            _ => return false,
        }
        true
    }

    fn host_id(&self) -> Option<u64> {
        Some(self.id.data().as_ffi())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `$event`
pub struct EventHost {
    dom: Dom,
    event: Event,
}

impl EventHost {
    pub fn value(dom: &Dom, event: &Event) -> Value {
        Value::Host(Rc::new(EventHost {
            dom: dom.clone(),
            event: event.clone(),
        }))
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    fn target_value(&self, target: Option<EventTarget>) -> Value {
        match target {
            Some(EventTarget::Node(id)) => ElementHost::value(&self.dom, id),
            Some(EventTarget::Document) => Value::from("document"),
            Some(EventTarget::Window) => Value::from("window"),
            None => Value::Null,
        }
    }
}

/// The payload of a custom event, if it carries a [`Value`]
pub fn event_detail(event: &Event) -> Option<Value> {
    let detail = event.detail()?;
    detail.downcast_ref::<Value>().cloned()
}

impl HostObject for EventHost {
    fn type_name(&self) -> &str {
        "Event"
    }

    fn get(&self, key: &str) -> Value {
        let modifiers = self.event.modifiers();
        match key {
            "type" => Value::from(self.event.event_type()),
            "key" => self.event.key().map(Value::from).unwrap_or_default(),
            "detail" => event_detail(&self.event).unwrap_or(Value::Null),
            "target" => self.target_value(self.event.target()),
            "currentTarget" => self.target_value(self.event.current_target()),
            "defaultPrevented" => Value::from(self.event.default_prevented()),
            "ctrlKey" => Value::from(modifiers.ctrl),
            "shiftKey" => Value::from(modifiers.shift),
            "altKey" => Value::from(modifiers.alt),
            "metaKey" => Value::from(modifiers.meta),
            "preventDefault" => {
                let event = self.event.clone();
                Value::Function(FunctionRef::named(key, move |_, _| {
                    event.prevent_default();
                    Ok(Value::Undefined)
                }))
            }
            "stopPropagation" => {
                let event = self.event.clone();
                Value::Function(FunctionRef::named(key, move |_, _| {
                    event.stop_propagation();
                    Ok(Value::Undefined)
                }))
            }
            _ => Value::Undefined,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_host_reads_and_writes() {
        let dom = Dom::new();
        let input = dom.create_element("input");
        dom.append_child(dom.body(), input).unwrap();
        let host = ElementHost::value(&dom, input);

        assert_eq!(host.get("tagName"), Value::from("INPUT"));
        assert!(host.set("value", Value::from("hi")));
        assert_eq!(dom.value(input), "hi");
        assert_eq!(element_of(&host), Some(input));
        assert!(host.strict_equals(&ElementHost::value(&dom, input)));
    }

    #[test]
    fn test_event_host_exposes_detail() {
        let dom = Dom::new();
        let event = Event::custom("notify", Some(Rc::new(Value::from(7.0))));
        let host = EventHost::value(&dom, &event);
        assert_eq!(host.get("type"), Value::from("notify"));
        assert_eq!(host.get("detail"), Value::from(7.0));

        host.get("preventDefault").as_function().unwrap().call(Value::Undefined, vec![]).unwrap();
        assert!(event.default_prevented());
    }
}
