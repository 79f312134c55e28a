//! Event listeners and dispatch
//!
//! Dispatch follows the usual three phases over the propagation path
//! `node ancestors -> document -> window`: capture listeners top-down, all
//! listeners on the target, then bubbling listeners bottom-up. Listeners are
//! snapshotted per target so callbacks may add or remove listeners freely.

use crate::document::Dom;
use crate::node::NodeId;
use indexmap::IndexMap;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Node(NodeId),
    Document,
    Window,
}

impl From<NodeId> for EventTarget {
    fn from(id: NodeId) -> Self {
        EventTarget::Node(id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Rc<dyn Fn(&Event)>;

/// System keys held while an event was produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyModifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

struct EventInner {
    event_type: String,
    bubbles: bool,
    cancelable: bool,
    key: Option<String>,
    modifiers: KeyModifiers,
    detail: Option<Rc<dyn Any>>,
    target: Cell<Option<EventTarget>>,
    current_target: Cell<Option<EventTarget>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_stopped: Cell<bool>,
    in_passive_listener: Cell<bool>,
}

/// A dispatched event. Clones share state, so flags set by one listener are
/// visible to the dispatcher.
#[derive(Clone)]
pub struct Event {
    inner: Rc<EventInner>,
}

impl Event {
    /// A bubbling, cancelable event
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::build(event_type.into(), true, None, KeyModifiers::default(), None)
    }

    pub fn non_bubbling(event_type: impl Into<String>) -> Self {
        Self::build(event_type.into(), false, None, KeyModifiers::default(), None)
    }

    pub fn keyboard(event_type: impl Into<String>, key: impl Into<String>, modifiers: KeyModifiers) -> Self {
        Self::build(event_type.into(), true, Some(key.into()), modifiers, None)
    }

    pub fn custom(event_type: impl Into<String>, detail: Option<Rc<dyn Any>>) -> Self {
        Self::build(event_type.into(), true, None, KeyModifiers::default(), detail)
    }

    fn build(
        event_type: String,
        bubbles: bool,
        key: Option<String>,
        modifiers: KeyModifiers,
        detail: Option<Rc<dyn Any>>,
    ) -> Self {
        Self {
            inner: Rc::new(EventInner {
                event_type,
                bubbles,
                cancelable: true,
                key,
                modifiers,
                detail,
                target: Cell::new(None),
                current_target: Cell::new(None),
                default_prevented: Cell::new(false),
                propagation_stopped: Cell::new(false),
                immediate_stopped: Cell::new(false),
                in_passive_listener: Cell::new(false),
            }),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.inner.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.inner.bubbles
    }

    pub fn key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    pub fn modifiers(&self) -> KeyModifiers {
        self.inner.modifiers
    }

    pub fn detail(&self) -> Option<Rc<dyn Any>> {
        self.inner.detail.clone()
    }

    pub fn target(&self) -> Option<EventTarget> {
        self.inner.target.get()
    }

    /// Target node, if the event was dispatched at a node
    pub fn target_node(&self) -> Option<NodeId> {
        match self.inner.target.get() {
            Some(EventTarget::Node(id)) => Some(id),
            _ => None,
        }
    }

    pub fn current_target(&self) -> Option<EventTarget> {
        self.inner.current_target.get()
    }

    pub fn prevent_default(&self) {
        if self.inner.cancelable && !self.inner.in_passive_listener.get() {
            self.inner.default_prevented.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.inner.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.inner.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.inner.propagation_stopped.set(true);
        self.inner.immediate_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.inner.propagation_stopped.get()
    }

    pub fn ptr_eq(&self, other: &Event) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.inner.event_type)
            .field("target", &self.inner.target.get())
            .field("key", &self.inner.key)
            .finish()
    }
}

struct Registered {
    id: ListenerId,
    event_type: String,
    options: ListenerOptions,
    callback: Listener,
}

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    by_target: IndexMap<EventTarget, Vec<Registered>>,
}

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Capturing,
    AtTarget,
    Bubbling,
}

impl Dom {
    fn normalize_target(&self, target: EventTarget) -> EventTarget {
        match target {
            EventTarget::Node(id) if id == self.document() => EventTarget::Document,
            other => other,
        }
    }

    pub fn add_event_listener(
        &self,
        target: impl Into<EventTarget>,
        event_type: &str,
        options: ListenerOptions,
        callback: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        let target = self.normalize_target(target.into());
        let mut listeners = self.inner.listeners.borrow_mut();
        listeners.next_id += 1;
        let id = ListenerId(listeners.next_id);
        listeners.by_target.entry(target).or_default().push(Registered {
            id,
            event_type: event_type.to_string(),
            options,
            callback: Rc::new(callback),
        });
        id
    }

    /// Remove a listener; returns false if it was already gone
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let Some((target, index)) = listeners.by_target.iter().find_map(|(target, entries)| {
            entries.iter().position(|entry| entry.id == id).map(|index| (*target, index))
        }) else {
            return false;
        };
        if let Some(entries) = listeners.by_target.get_mut(&target) {
            entries.remove(index);
            if entries.is_empty() {
                listeners.by_target.shift_remove(&target);
            }
        }
        true
    }

    /// Drop every listener registered on the given nodes
    pub(crate) fn forget_listeners(&self, nodes: &[NodeId]) {
        self.inner
            .listeners
            .borrow_mut()
            .by_target
            .retain(|target, _| !matches!(target, EventTarget::Node(id) if nodes.contains(id)));
    }

    pub fn listener_count(&self, target: impl Into<EventTarget>) -> usize {
        let target = self.normalize_target(target.into());
        self.inner
            .listeners
            .borrow()
            .by_target
            .get(&target)
            .map_or(0, Vec::len)
    }

    /// Path from the target outwards. Detached nodes never reach document or window.
    fn propagation_path(&self, target: EventTarget) -> Vec<EventTarget> {
        match target {
            EventTarget::Window => vec![EventTarget::Window],
            EventTarget::Document => vec![EventTarget::Document, EventTarget::Window],
            EventTarget::Node(id) => {
                let mut path = vec![EventTarget::Node(id)];
                let document = self.document();
                for ancestor in self.ancestors(id) {
                    if ancestor == document {
                        path.push(EventTarget::Document);
                        path.push(EventTarget::Window);
                    } else {
                        path.push(EventTarget::Node(ancestor));
                    }
                }
                path
            }
        }
    }

    /// Dispatch `event` at `target`; returns false if the default was prevented
    pub fn dispatch_event(&self, target: impl Into<EventTarget>, event: &Event) -> bool {
        let target = self.normalize_target(target.into());
        event.inner.target.set(Some(target));
        let path = self.propagation_path(target);
        trace!(event = event.event_type(), ?target, "dispatch");

        for current in path.iter().skip(1).rev() {
            self.invoke(*current, event, Phase::Capturing);
            if event.propagation_stopped() {
                return self.finish_dispatch(event);
            }
        }

        self.invoke(target, event, Phase::AtTarget);

        if event.bubbles() {
            for current in path.iter().skip(1) {
                if event.propagation_stopped() {
                    break;
                }
                self.invoke(*current, event, Phase::Bubbling);
            }
        }
        self.finish_dispatch(event)
    }

    fn finish_dispatch(&self, event: &Event) -> bool {
        event.inner.current_target.set(None);
        !event.default_prevented()
    }

    fn invoke(&self, current: EventTarget, event: &Event, phase: Phase) {
        if event.propagation_stopped() {
            return;
        }
        let snapshot: Vec<(ListenerId, ListenerOptions, Listener)> = {
            let listeners = self.inner.listeners.borrow();
            let Some(entries) = listeners.by_target.get(&current) else {
                return;
            };
            entries
                .iter()
                .filter(|entry| entry.event_type == event.event_type())
                .filter(|entry| match phase {
                    Phase::Capturing => entry.options.capture,
                    Phase::AtTarget => true,
                    Phase::Bubbling => !entry.options.capture,
                })
                .map(|entry| (entry.id, entry.options, entry.callback.clone()))
                .collect()
        };

        event.inner.current_target.set(Some(current));
        for (id, options, callback) in snapshot {
            if !self.listener_registered(id) {
                continue;
            }
            if options.once {
                self.remove_event_listener(id);
            }
            event.inner.in_passive_listener.set(options.passive);
            callback(event);
            event.inner.in_passive_listener.set(false);
            if event.inner.immediate_stopped.get() {
                break;
            }
        }
    }

    fn listener_registered(&self, id: ListenerId) -> bool {
        self.inner
            .listeners
            .borrow()
            .by_target
            .values()
            .any(|entries| entries.iter().any(|entry| entry.id == id))
    }

    // User input helpers

    /// Simulate a click. Checkboxes toggle and radios check before dispatch;
    /// a prevented click reverts them, otherwise `input` and `change` follow.
    pub fn click(&self, id: NodeId) -> bool {
        let kind = self.input_type(id);
        let toggles = matches!(kind.as_deref(), Some("checkbox") | Some("radio"));
        let was_checked = self.checked(id);
        if toggles {
            let next = kind.as_deref() == Some("radio") || !was_checked;
            self.set_checked(id, next);
        }

        let not_prevented = self.dispatch_event(id, &Event::new("click"));
        if toggles {
            if not_prevented {
                if self.checked(id) != was_checked {
                    self.dispatch_event(id, &Event::new("input"));
                    self.dispatch_event(id, &Event::new("change"));
                }
            } else {
                self.set_checked(id, was_checked);
            }
        }
        not_prevented
    }

    /// Replace the live value as if typed, then fire `input`
    pub fn input(&self, id: NodeId, value: &str) -> bool {
        self.set_value(id, value);
        self.dispatch_event(id, &Event::new("input"))
    }

    pub fn change(&self, id: NodeId) -> bool {
        self.dispatch_event(id, &Event::new("change"))
    }

    pub fn keydown(&self, id: NodeId, key: &str, modifiers: KeyModifiers) -> bool {
        self.dispatch_event(id, &Event::keyboard("keydown", key, modifiers))
    }

    pub fn keyup(&self, id: NodeId, key: &str, modifiers: KeyModifiers) -> bool {
        self.dispatch_event(id, &Event::keyboard("keyup", key, modifiers))
    }

    pub fn dispatch_custom(&self, target: impl Into<EventTarget>, name: &str, detail: Option<Rc<dyn Any>>) -> bool {
        self.dispatch_event(target, &Event::custom(name, detail))
    }

    // Focus

    pub fn active_element(&self) -> Option<NodeId> {
        self.inner.focused.get()
    }

    /// True when `id` or one of its descendants has focus
    pub fn has_focus_within(&self, id: NodeId) -> bool {
        self.inner
            .focused
            .get()
            .is_some_and(|focused| self.contains(id, focused))
    }

    pub fn focus(&self, id: NodeId) {
        if !self.is_element(id) || !self.is_connected(id) || self.inner.focused.get() == Some(id) {
            return;
        }
        if let Some(previous) = self.inner.focused.get() {
            self.blur(previous);
        }
        self.inner.focused.set(Some(id));
        self.dispatch_event(id, &Event::non_bubbling("focus"));
        self.dispatch_event(id, &Event::new("focusin"));
    }

    pub fn blur(&self, id: NodeId) {
        if self.inner.focused.get() != Some(id) {
            return;
        }
        self.inner.focused.set(None);
        self.dispatch_event(id, &Event::non_bubbling("blur"));
        self.dispatch_event(id, &Event::new("focusout"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn tree() -> (Dom, NodeId, NodeId) {
        let dom = Dom::new();
        let outer = dom.create_element("div");
        let button = dom.create_element("button");
        dom.append_child(outer, button).unwrap();
        dom.append_child(dom.body(), outer).unwrap();
        (dom, outer, button)
    }

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Box<dyn Fn(&Event)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |label: &'static str| {
            let sink = sink.clone();
            Box::new(move |_: &Event| sink.borrow_mut().push(label.to_string())) as Box<dyn Fn(&Event)>
        };
        (log, make)
    }

    #[test]
    fn test_capture_target_bubble_order() {
        let (dom, outer, button) = tree();
        let (log, make) = recorder();
        let capture = ListenerOptions {
            capture: true,
            ..Default::default()
        };
        dom.add_event_listener(EventTarget::Window, "click", ListenerOptions::default(), make("window"));
        dom.add_event_listener(EventTarget::Document, "click", capture, make("document-capture"));
        dom.add_event_listener(outer, "click", capture, make("outer-capture"));
        dom.add_event_listener(outer, "click", ListenerOptions::default(), make("outer"));
        dom.add_event_listener(button, "click", ListenerOptions::default(), make("button"));

        dom.click(button);
        assert_eq!(
            *log.borrow(),
            vec!["document-capture", "outer-capture", "button", "outer", "window"]
        );
    }

    #[test]
    fn test_stop_propagation_and_once() {
        let (dom, outer, button) = tree();
        let (log, make) = recorder();
        dom.add_event_listener(outer, "click", ListenerOptions::default(), make("outer"));
        dom.add_event_listener(button, "click", ListenerOptions::default(), |event: &Event| {
            event.stop_propagation()
        });
        let once = ListenerOptions {
            once: true,
            ..Default::default()
        };
        dom.add_event_listener(button, "click", once, make("once"));

        dom.click(button);
        dom.click(button);
        assert_eq!(*log.borrow(), vec!["once"]);
    }

    #[test]
    fn test_passive_listener_cannot_prevent() {
        let (dom, _, button) = tree();
        let passive = ListenerOptions {
            passive: true,
            ..Default::default()
        };
        dom.add_event_listener(button, "wheel", passive, |event: &Event| event.prevent_default());
        assert!(dom.dispatch_event(button, &Event::new("wheel")));

        dom.add_event_listener(button, "submit", ListenerOptions::default(), |event: &Event| {
            event.prevent_default()
        });
        assert!(!dom.dispatch_event(button, &Event::new("submit")));
    }

    #[test]
    fn test_checkbox_click_toggles_and_fires_change() {
        let dom = Dom::new();
        let checkbox = dom.create_element("input");
        dom.set_attribute(checkbox, "type", "checkbox");
        dom.append_child(dom.body(), checkbox).unwrap();
        let (log, make) = recorder();
        dom.add_event_listener(checkbox, "change", ListenerOptions::default(), make("change"));

        dom.click(checkbox);
        assert!(dom.checked(checkbox));
        assert_eq!(*log.borrow(), vec!["change"]);
    }

    #[test]
    fn test_focus_moves_between_elements() {
        let (dom, outer, button) = tree();
        let input = dom.create_element("input");
        dom.append_child(outer, input).unwrap();
        let (log, make) = recorder();
        dom.add_event_listener(button, "blur", ListenerOptions::default(), make("blur"));

        dom.focus(button);
        assert!(dom.has_focus_within(outer));
        dom.focus(input);
        assert_eq!(dom.active_element(), Some(input));
        assert_eq!(*log.borrow(), vec!["blur"]);

        dom.remove(input);
        assert_eq!(dom.active_element(), None);
    }
}
