//! `on`: run an expression when an event fires, shaped by modifiers
//!
//! [`listen`] is public so plugins can attach listeners with the same
//! modifier grammar.

use crate::context::DirectiveContext;
use crate::host::EventHost;
use crate::runtime::Tendril;
use std::cell::Cell;
use std::rc::Rc;
use tendril_common::TimerId;
use tendril_dom::{Dom, Event, EventTarget, ListenerId, ListenerOptions, NodeId};
use tracing::trace;

type Handler = Rc<dyn Fn(&Event)>;

const DEFAULT_WAIT_MS: u64 = 250;

/// Modifiers that never name a key
const NON_KEY_MODIFIERS: &[&str] = &[
    "window", "document", "prevent", "stop", "once", "capture", "self", "away", "outside", "passive",
];

const SYSTEM_KEY_MODIFIERS: &[&str] = &["ctrl", "shift", "alt", "meta", "cmd", "super"];

/// Modifier aliases for key names, compared after kebab-casing the key
const KEY_ALIASES: &[(&str, &str)] = &[
    ("ctrl", "control"),
    ("slash", "/"),
    ("space", " "),
    ("spacebar", " "),
    ("cmd", "meta"),
    ("esc", "escape"),
    ("up", "arrow-up"),
    ("down", "arrow-down"),
    ("left", "arrow-left"),
    ("right", "arrow-right"),
    ("period", "."),
    ("comma", ","),
    ("equal", "="),
    ("minus", "-"),
    ("underscore", "_"),
];

pub(super) fn register(tendril: &Tendril) {
    tendril.register_directive("on", on);
}

fn on(cx: &DirectiveContext) {
    let el = cx.el();
    let event = cx.value().to_string();
    if cx.dom().is_template(el) {
        cx.tendril().nodes().update(el, |state| {
            if !state.forward_events.contains(&event) {
                state.forward_events.push(event.clone());
            }
        });
    }

    let evaluation = cx.evaluate_later();
    let dom = cx.dom().clone();
    let listener = listen(cx.tendril(), el, &event, &cx.directive().modifiers, move |e| {
        let host = EventHost::value(&dom, e);
        evaluation.run_with(vec![("$event", host.clone())], vec![host], |_| {});
    });
    cx.cleanup(move || listener.remove());
}

/// A live listener attached by [`listen`]
pub struct Listen {
    dom: Dom,
    id: Rc<Cell<Option<ListenerId>>>,
}

impl Listen {
    pub fn remove(&self) {
        if let Some(id) = self.id.take() {
            self.dom.remove_event_listener(id);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.id.get().is_some()
    }
}

/// Attach `callback` for `event` on `el`, honoring the `on` modifiers
/// (`prevent`, `stop`, `once`, `outside`, `self`, `window`, `document`,
/// `debounce`, `throttle`, `passive`, `capture`, `camel`, `dot` and key names)
pub fn listen(
    tendril: &Tendril,
    el: NodeId,
    event: &str,
    modifiers: &[String],
    callback: impl Fn(&Event) + 'static,
) -> Listen {
    let has = |name: &str| modifiers.iter().any(|modifier| modifier == name);
    let dom = tendril.dom().clone();
    let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

    let mut event = event.to_string();
    if has("dot") {
        event = event.replace('-', ".");
    }
    if has("camel") {
        event = camel_case(&event);
    }
    let options = ListenerOptions {
        passive: has("passive"),
        capture: has("capture"),
        ..ListenerOptions::default()
    };
    let mut target = EventTarget::Node(el);
    if has("window") {
        target = EventTarget::Window;
    }
    if has("document") {
        target = EventTarget::Document;
    }

    let mut handler: Handler = Rc::new(callback);
    if has("debounce") {
        handler = debounce(tendril, wait_after(modifiers, "debounce"), handler);
    }
    if has("throttle") {
        handler = throttle(tendril, wait_after(modifiers, "throttle"), handler);
    }
    if has("prevent") {
        let next = handler;
        handler = Rc::new(move |e| {
            e.prevent_default();
            next(e);
        });
    }
    if has("stop") {
        let next = handler;
        handler = Rc::new(move |e| {
            e.stop_propagation();
            next(e);
        });
    }
    if has("once") {
        let next = handler;
        let dom = dom.clone();
        let slot = slot.clone();
        handler = Rc::new(move |e| {
            next(e);
            if let Some(id) = slot.take() {
                dom.remove_event_listener(id);
            }
        });
    }
    if has("away") || has("outside") {
        target = EventTarget::Document;
        let next = handler;
        let dom = dom.clone();
        let weak = tendril.downgrade();
        handler = Rc::new(move |e| {
            let Some(origin) = e.target_node() else {
                return;
            };
            if dom.contains(el, origin) || !dom.is_connected(origin) || !dom.is_displayed(el) {
                return;
            }
            let hidden = weak
                .upgrade()
                .and_then(|tendril| tendril.nodes().with(el, |state| state.shown).flatten())
                == Some(false);
            if hidden {
                return;
            }
            next(e);
        });
    }
    if has("self") {
        let next = handler;
        handler = Rc::new(move |e| {
            if e.target_node() == Some(el) {
                next(e);
            }
        });
    }
    if is_key_event(&event) || is_click_event(&event) {
        let next = handler;
        let modifiers = modifiers.to_vec();
        handler = Rc::new(move |e| {
            if !waiting_for_other_key(e, &modifiers) {
                next(e);
            }
        });
    }

    trace!(?el, event = %event, ?target, "Listening");
    let id = dom.add_event_listener(target, &event, options, move |e| handler(e));
    slot.set(Some(id));
    Listen { dom, id: slot }
}

/// Wait in ms from a modifier like `500ms` following `name`
fn wait_after(modifiers: &[String], name: &str) -> u64 {
    modifiers
        .iter()
        .position(|modifier| modifier == name)
        .and_then(|index| modifiers.get(index + 1))
        .and_then(|next| parse_wait(next))
        .unwrap_or(DEFAULT_WAIT_MS)
}

fn parse_wait(modifier: &str) -> Option<u64> {
    let number = modifier.split("ms").next()?;
    number.parse::<f64>().ok().filter(|ms| *ms >= 0.0).map(|ms| ms as u64)
}

fn debounce(tendril: &Tendril, wait: u64, next: Handler) -> Handler {
    let event_loop = tendril.event_loop().clone();
    let pending: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));
    Rc::new(move |e| {
        if let Some(timer) = pending.take() {
            event_loop.clear_timeout(timer);
        }
        let next = next.clone();
        let e = e.clone();
        let slot = pending.clone();
        let timer = event_loop.set_timeout(
            move || {
                slot.set(None);
                next(&e);
            },
            wait,
        );
        pending.set(Some(timer));
    })
}

fn throttle(tendril: &Tendril, wait: u64, next: Handler) -> Handler {
    let event_loop = tendril.event_loop().clone();
    let throttled = Rc::new(Cell::new(false));
    Rc::new(move |e| {
        if throttled.get() {
            return;
        }
        next(e);
        throttled.set(true);
        let throttled = throttled.clone();
        event_loop.set_timeout(move || throttled.set(false), wait);
    })
}

fn is_key_event(event: &str) -> bool {
    matches!(event, "keydown" | "keyup")
}

fn is_click_event(event: &str) -> bool {
    ["contextmenu", "click", "mouse"].iter().any(|kind| event.contains(kind))
}

/// True when the modifiers name a key or system-key combination the event
/// does not match
fn waiting_for_other_key(e: &Event, modifiers: &[String]) -> bool {
    let mut keys: Vec<&str> = modifiers
        .iter()
        .map(String::as_str)
        .filter(|modifier| !NON_KEY_MODIFIERS.contains(modifier))
        .collect();
    for timing in ["debounce", "throttle"] {
        if let Some(index) = keys.iter().position(|modifier| *modifier == timing) {
            let with_wait = keys.get(index + 1).and_then(|next| parse_wait(next)).is_some();
            keys.drain(index..(index + if with_wait { 2 } else { 1 }));
        }
    }
    if keys.is_empty() {
        return false;
    }
    let pressed = key_to_modifiers(e.key());
    if keys.len() == 1 && pressed.iter().any(|modifier| modifier == keys[0]) {
        return false;
    }

    let system: Vec<&str> = SYSTEM_KEY_MODIFIERS
        .iter()
        .copied()
        .filter(|modifier| keys.contains(modifier))
        .collect();
    keys.retain(|modifier| !system.contains(modifier));
    if !system.is_empty() {
        let held = e.modifiers();
        let all_held = system.iter().all(|modifier| match *modifier {
            "ctrl" => held.ctrl,
            "shift" => held.shift,
            "alt" => held.alt,
            _ => held.meta,
        });
        if all_held {
            if is_click_event(e.event_type()) {
                return false;
            }
            if keys.first().is_some_and(|key| pressed.iter().any(|modifier| modifier == key)) {
                return false;
            }
        }
    }
    true
}

/// Every modifier name that refers to `key`
fn key_to_modifiers(key: Option<&str>) -> Vec<String> {
    let Some(key) = key.filter(|key| !key.is_empty()) else {
        return Vec::new();
    };
    let key = key_kebab_case(key);
    let mut names: Vec<String> = KEY_ALIASES
        .iter()
        .filter(|(_, name)| *name == key)
        .map(|(modifier, _)| modifier.to_string())
        .collect();
    if !KEY_ALIASES.iter().any(|(modifier, _)| *modifier == key) {
        names.push(key);
    }
    names
}

fn key_kebab_case(key: &str) -> String {
    if key == " " || key == "_" {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len() + 2);
    let mut previous_lower = false;
    let mut replaced = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() && previous_lower {
            out.push('-');
        }
        previous_lower = c.is_ascii_lowercase();
        if !replaced && (c == '_' || c.is_whitespace()) {
            replaced = true;
            out.push('-');
        } else {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let lower = name.to_lowercase();
    let mut chars = lower.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(next) if c == '-' && (next.is_ascii_alphanumeric() || *next == '_') => {
                let upper = next.to_ascii_uppercase();
                chars.next();
                out.push(upper);
            }
            _ => out.push(c),
        }
    }
    out
}
