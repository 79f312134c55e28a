//! # Transitions
//!
//! A transition walks an element through three stage sets. On start the
//! `start` and `during` sets are applied in one DOM batch. On the next frame
//! the `before` hook runs and `start` is swapped for `end`. On the frame
//! after that the element's computed duration and delay are measured and
//! the finish is scheduled. Finishing runs `after` and removes every stage.
//!
//! Starting a transition on an element that is still transitioning cancels
//! the running one: its before-cancel callbacks run, then it finishes at
//! once, skipping straight to its end state.
//!
//! Hiding with `show` goes through [`Tendril::toggle_and_cascade`], which
//! lets a parent that is itself leaving wait for its children's leave
//! transitions before hiding.

use crate::runtime::Tendril;
use futures::future::{join_all, LocalBoxFuture};
use futures::FutureExt;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tendril_dom::{parse_time_list, Dom, NodeId};
use tendril_reactivity::{format_number, ObjectRef, PromiseValue, Resolver, Value};
use tracing::{debug, trace};

const CANCELLED_MARKER: &str = "isFromCancelledTransition";
const HELPER_EASING: &str = "cubic-bezier(0.4, 0.0, 0.2, 1)";

/// Classes and inline styles applied for one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageSet {
    pub classes: Vec<String>,
    pub styles: IndexMap<String, String>,
}

impl StageSet {
    pub fn from_classes(classes: &str) -> Self {
        Self {
            classes: classes.split_whitespace().map(str::to_string).collect(),
            styles: IndexMap::new(),
        }
    }

    pub fn from_styles<'a>(styles: impl IntoIterator<Item = (&'a str, String)>) -> Self {
        Self {
            classes: Vec::new(),
            styles: styles.into_iter().map(|(name, value)| (name.to_string(), value)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.styles.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phases {
    pub during: StageSet,
    pub start: StageSet,
    pub end: StageSet,
}

impl Phases {
    pub fn is_empty(&self) -> bool {
        self.during.is_empty() && self.start.is_empty() && self.end.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Enter,
    Leave,
}

/// Enter and leave phases declared on an element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionConfig {
    pub enter: Phases,
    pub leave: Phases,
}

impl TransitionConfig {
    pub fn phases(&self, direction: Direction) -> &Phases {
        match direction {
            Direction::Enter => &self.enter,
            Direction::Leave => &self.leave,
        }
    }

    fn phases_mut(&mut self, direction: Direction) -> &mut Phases {
        match direction {
            Direction::Enter => &mut self.enter,
            Direction::Leave => &mut self.leave,
        }
    }

    /// Store a class string under a named stage such as `enter-start` or `leave`
    pub fn set_stage_classes(&mut self, stage: &str, classes: &str) -> bool {
        let (direction, slot) = match stage.split_once('-') {
            Some((direction, slot)) => (direction, slot),
            None => (stage, "during"),
        };
        let direction = match direction {
            "enter" => Direction::Enter,
            "leave" => Direction::Leave,
            _ => return false,
        };
        let phases = self.phases_mut(direction);
        let set = StageSet::from_classes(classes);
        match slot {
            "during" => phases.during = set,
            "start" => phases.start = set,
            "end" => phases.end = set,
            _ => return false,
        }
        true
    }

    /// Opacity/scale presets driven by modifiers, optionally limited to one stage
    pub fn apply_helper(&mut self, modifiers: &[String], stage: Option<&str>) {
        let has = |name: &str| modifiers.iter().any(|m| m == name);
        let unspecified = !has("in") && !has("out") && stage.is_none();
        let entering = unspecified || has("in") || stage == Some("enter");
        let leaving = unspecified || has("out") || stage == Some("leave");

        let out_at = modifiers.iter().position(|m| m == "out");
        let scoped: Vec<String> = if unspecified {
            modifiers.to_vec()
        } else if has("in") {
            modifiers[..out_at.unwrap_or(modifiers.len())].to_vec()
        } else if let Some(out_at) = out_at {
            modifiers[out_at + 1..].to_vec()
        } else {
            modifiers.to_vec()
        };
        let has_scoped = |name: &str| scoped.iter().any(|m| m == name);

        let wants_all = !has_scoped("opacity") && !has_scoped("scale");
        let opacity = if wants_all || has_scoped("opacity") { 0.0 } else { 1.0 };
        let scale = if wants_all || has_scoped("scale") {
            modifier_number(&scoped, "scale", 95.0) / 100.0
        } else {
            1.0
        };
        let delay = modifier_number(&scoped, "delay", 0.0) / 1000.0;
        let origin = modifier_origin(&scoped);

        let during = |duration: f64| {
            StageSet::from_styles([
                ("transform-origin", origin.clone()),
                ("transition-delay", format!("{}s", format_number(delay))),
                ("transition-property", "opacity, transform".to_string()),
                ("transition-duration", format!("{}s", format_number(duration))),
                ("transition-timing-function", HELPER_EASING.to_string()),
            ])
        };
        let shown = || StageSet::from_styles([("opacity", "1".to_string()), ("transform", "scale(1)".to_string())]);
        let hidden = || {
            StageSet::from_styles([
                ("opacity", format_number(opacity)),
                ("transform", format!("scale({})", format_number(scale))),
            ])
        };

        if entering {
            self.enter = Phases {
                during: during(modifier_number(&scoped, "duration", 150.0) / 1000.0),
                start: hidden(),
                end: shown(),
            };
        }
        if leaving {
            self.leave = Phases {
                during: during(modifier_number(&scoped, "duration", 75.0) / 1000.0),
                start: shown(),
                end: hidden(),
            };
        }
    }
}

/// Numeric value following `key` (`duration.300ms`, `scale.80`), else `fallback`
fn modifier_number(modifiers: &[String], key: &str, fallback: f64) -> f64 {
    let Some(index) = modifiers.iter().position(|m| m == key) else {
        return fallback;
    };
    let Some(raw) = modifiers.get(index + 1) else {
        return fallback;
    };
    let raw = raw.strip_suffix("ms").unwrap_or(raw);
    raw.parse::<f64>().unwrap_or(fallback)
}

fn modifier_origin(modifiers: &[String]) -> String {
    const SIDES: [&str; 5] = ["top", "right", "left", "center", "bottom"];
    let Some(index) = modifiers.iter().position(|m| m == "origin") else {
        return "center".to_string();
    };
    match (modifiers.get(index + 1), modifiers.get(index + 2)) {
        (Some(first), Some(second)) if SIDES.contains(&second.as_str()) => format!("{first} {second}"),
        (Some(first), _) => first.clone(),
        (None, _) => "center".to_string(),
    }
}

/// What applying a stage changed, so it can be put back
#[derive(Default)]
struct Undo {
    added_classes: Vec<String>,
    previous_styles: Vec<(String, Option<String>)>,
}

fn apply_stage(dom: &Dom, el: NodeId, set: &StageSet) -> Undo {
    let added_classes: Vec<String> = set.classes.iter().filter(|class| !dom.has_class(el, class)).cloned().collect();
    let refs: Vec<&str> = added_classes.iter().map(String::as_str).collect();
    dom.add_classes(el, &refs);

    let mut previous_styles = Vec::new();
    for (name, value) in &set.styles {
        previous_styles.push((name.clone(), dom.style_property(el, name)));
        dom.set_style_property(el, name, value);
    }
    Undo {
        added_classes,
        previous_styles,
    }
}

fn undo_stage(dom: &Dom, el: NodeId, undo: Undo) {
    let refs: Vec<&str> = undo.added_classes.iter().map(String::as_str).collect();
    dom.remove_classes(el, &refs);
    for (name, previous) in undo.previous_styles.into_iter().rev() {
        match previous {
            Some(value) => dom.set_style_property(el, &name, &value),
            None => dom.remove_style_property(el, &name),
        }
    }
}

/// A running transition, as seen by whoever wants to interrupt it
pub struct InFlight {
    before_cancels: RefCell<Vec<Box<dyn FnOnce()>>>,
    finish: RefCell<Option<Box<dyn FnOnce()>>>,
    cancelled: Cell<bool>,
}

impl InFlight {
    fn new(finish: impl FnOnce() + 'static) -> Self {
        Self {
            before_cancels: RefCell::new(Vec::new()),
            finish: RefCell::new(Some(Box::new(finish))),
            cancelled: Cell::new(false),
        }
    }

    /// Run `f` if this transition is cancelled before it finishes
    pub fn before_cancel(&self, f: impl FnOnce() + 'static) {
        self.before_cancels.borrow_mut().push(Box::new(f));
    }

    pub fn cancel(&self) {
        if self.cancelled.replace(true) || self.is_finished() {
            return;
        }
        let callbacks = std::mem::take(&mut *self.before_cancels.borrow_mut());
        for callback in callbacks {
            callback();
        }
        self.finish();
    }

    /// Jump to the end state; later calls do nothing
    pub fn finish(&self) {
        let finish = self.finish.borrow_mut().take();
        if let Some(finish) = finish {
            finish();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish.borrow().is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// A `show` hide waiting on its leave transition
#[derive(Clone)]
pub struct PendingHide {
    promise: PromiseValue,
    hide: Rc<dyn Fn()>,
}

struct Run {
    el: NodeId,
    phases: Phases,
    undo_start: RefCell<Option<Undo>>,
    undo_during: RefCell<Option<Undo>>,
    undo_end: RefCell<Option<Undo>>,
    before: RefCell<Option<Box<dyn FnOnce()>>>,
    after: RefCell<Option<Box<dyn FnOnce()>>>,
    interrupted: Cell<bool>,
    reached_before: Cell<bool>,
    reached_end: Cell<bool>,
}

impl Run {
    fn start(&self, dom: &Dom) {
        *self.undo_start.borrow_mut() = Some(apply_stage(dom, self.el, &self.phases.start));
        *self.undo_during.borrow_mut() = Some(apply_stage(dom, self.el, &self.phases.during));
    }

    fn before(&self) {
        self.reached_before.set(true);
        let before = self.before.borrow_mut().take();
        if let Some(before) = before {
            before();
        }
    }

    fn end(&self, dom: &Dom) {
        self.reached_end.set(true);
        if let Some(undo) = self.undo_start.borrow_mut().take() {
            undo_stage(dom, self.el, undo);
        }
        *self.undo_end.borrow_mut() = Some(apply_stage(dom, self.el, &self.phases.end));
    }

    fn after(&self) {
        let after = self.after.borrow_mut().take();
        if let Some(after) = after {
            after();
        }
    }

    fn cleanup(&self, dom: &Dom) {
        for undo in [self.undo_end.borrow_mut().take(), self.undo_during.borrow_mut().take()]
            .into_iter()
            .flatten()
        {
            undo_stage(dom, self.el, undo);
        }
    }
}

fn is_cancellation(reason: &Value) -> bool {
    reason.get(CANCELLED_MARKER).is_truthy()
}

fn cancellation() -> Value {
    Value::Object(ObjectRef::from_entries([(CANCELLED_MARKER, true)]))
}

type SharedResolver = Rc<RefCell<Option<Resolver>>>;

fn settle(resolver: &SharedResolver, outcome: Result<(), Value>) {
    let resolver = resolver.borrow_mut().take();
    if let Some(resolver) = resolver {
        match outcome {
            Ok(()) => resolver.resolve(Value::Undefined),
            Err(reason) => resolver.reject(reason),
        }
    }
}

impl Tendril {
    pub fn transition_config(&self, el: NodeId) -> Option<TransitionConfig> {
        self.nodes()
            .with(el, |state| state.transition.as_ref().map(|config| config.borrow().clone()))
            .flatten()
    }

    /// Edit the element's transition configuration, creating it if needed
    pub fn configure_transition(&self, el: NodeId, f: impl FnOnce(&mut TransitionConfig)) {
        let config = self.nodes().update(el, |state| {
            state
                .transition
                .get_or_insert_with(|| Rc::new(RefCell::new(TransitionConfig::default())))
                .clone()
        });
        f(&mut config.borrow_mut());
    }

    pub fn transitioning(&self, el: NodeId) -> Option<Rc<InFlight>> {
        self.nodes().with(el, |state| state.transitioning.clone()).flatten()
    }

    /// Run the element's configured enter or leave phases around `before`/`after`
    pub fn transition_direction(
        &self,
        el: NodeId,
        direction: Direction,
        before: impl FnOnce() + 'static,
        after: impl FnOnce() + 'static,
    ) {
        let phases = self
            .transition_config(el)
            .map(|config| config.phases(direction).clone())
            .unwrap_or_default();
        self.transition(el, phases, before, after);
    }

    /// Transition `el` through `phases`. Empty phases run both hooks at once.
    pub fn transition(&self, el: NodeId, phases: Phases, before: impl FnOnce() + 'static, after: impl FnOnce() + 'static) {
        if let Some(previous) = self.transitioning(el) {
            trace!(?el, "Cancelling running transition");
            previous.cancel();
        }
        if phases.is_empty() {
            before();
            after();
            return;
        }

        let run = Rc::new(Run {
            el,
            phases,
            undo_start: RefCell::new(None),
            undo_during: RefCell::new(None),
            undo_end: RefCell::new(None),
            before: RefCell::new(Some(Box::new(before))),
            after: RefCell::new(Some(Box::new(after))),
            interrupted: Cell::new(false),
            reached_before: Cell::new(false),
            reached_end: Cell::new(false),
        });

        let in_flight = {
            let tendril = self.clone();
            let run = run.clone();
            Rc::new(InFlight::new(move || tendril.finish_transition(&run)))
        };
        self.nodes().update(el, |state| state.transitioning = Some(in_flight.clone()));

        self.mutate_dom(|| run.start(self.dom()));
        self.hold_next_ticks();

        let tendril = self.clone();
        self.event_loop().request_animation_frame(move || {
            if run.interrupted.get() {
                return;
            }
            tendril.mutate_dom(|| {
                run.before();
                run.end(tendril.dom());
            });
            tendril.release_next_ticks();

            let measure = tendril.clone();
            tendril.event_loop().request_animation_frame(move || {
                if run.interrupted.get() {
                    return;
                }
                let wait = measure.transition_time(run.el);
                trace!(el = ?run.el, wait, "Transition scheduled to finish");
                measure.event_loop().set_timeout(move || in_flight.finish(), wait);
            });
        });
    }

    fn finish_transition(&self, run: &Run) {
        let skipped_end = !run.reached_end.get();
        self.mutate_dom(|| {
            run.interrupted.set(true);
            if !run.reached_before.get() {
                run.before();
            }
            if !run.reached_end.get() {
                run.end(self.dom());
            }
            run.after();
            if self.dom().is_connected(run.el) {
                run.cleanup(self.dom());
            }
        });
        if skipped_end {
            self.release_next_ticks();
        }
        self.nodes().update(run.el, |state| {
            if state.transitioning.as_ref().is_some_and(|in_flight| in_flight.is_finished()) {
                state.transitioning = None;
            }
        });
    }

    /// Duration plus delay of the live styles, in milliseconds
    fn transition_time(&self, el: NodeId) -> u64 {
        let first = |name: &str| {
            self.dom()
                .computed_style(el, name)
                .and_then(|value| parse_time_list(&value).first().copied())
                .unwrap_or(0.0)
        };
        let mut duration = first("transition-duration");
        if duration == 0.0 {
            duration = first("animation-duration");
        }
        (duration + first("transition-delay")).max(0.0).round() as u64
    }

    /// Show or hide `el`, running its transitions. Hiding waits for nested
    /// elements that are leaving at the same time.
    pub fn toggle_and_cascade(&self, el: NodeId, value: bool, show: Rc<dyn Fn()>, hide: Rc<dyn Fn()>) {
        let config = self.transition_config(el);
        if value {
            match config.filter(|config| !config.enter.is_empty()) {
                Some(_) => self.transition_direction(el, Direction::Enter, move || show(), || {}),
                None => {
                    self.event_loop().request_animation_frame(move || show());
                }
            }
            return;
        }

        let (promise, resolver) = PromiseValue::deferred();
        let resolver: SharedResolver = Rc::new(RefCell::new(Some(resolver)));
        match config {
            Some(config) => {
                let on_done = resolver.clone();
                self.transition(el, config.leave, || {}, move || settle(&on_done, Ok(())));
                if let Some(in_flight) = self.transitioning(el) {
                    let on_cancel = resolver.clone();
                    in_flight.before_cancel(move || settle(&on_cancel, Err(cancellation())));
                }
            }
            None => settle(&resolver, Ok(())),
        }
        self.nodes()
            .update(el, |state| state.pending_hide = Some(PendingHide { promise, hide }));

        let weak = self.downgrade();
        self.event_loop().queue_microtask(move || {
            let Some(tendril) = weak.upgrade() else {
                return;
            };
            let parent_hiding = tendril
                .dom()
                .ancestors(el)
                .into_iter()
                .find(|node| tendril.nodes().with(*node, |state| state.pending_hide.is_some()).unwrap_or(false));
            match parent_hiding {
                Some(parent) => tendril.nodes().update(parent, |state| state.hide_children.push(el)),
                None => {
                    let cascade = tendril.clone();
                    tendril.event_loop().request_animation_frame(move || cascade.run_hide_cascade(el));
                }
            }
        });
    }

    fn run_hide_cascade(&self, el: NodeId) {
        let carry = self.hide_after_children(el);
        let weak = self.downgrade();
        self.event_loop().spawn_local(async move {
            if let Err(reason) = carry.await {
                if is_cancellation(&reason) {
                    debug!(?el, "Hide cancelled by a newer transition");
                } else if let Some(tendril) = weak.upgrade() {
                    tendril.warn(
                        crate::diagnostics::DiagnosticKind::Misuse,
                        format!("Hide failed: {}", reason.to_display_string()),
                        Some(el),
                    );
                }
            }
        });
    }

    /// Resolves once `el` and every child waiting on it have hidden
    fn hide_after_children(&self, el: NodeId) -> LocalBoxFuture<'static, Result<(), Value>> {
        let (pending, children) = self.nodes().update(el, |state| {
            (state.pending_hide.take(), std::mem::take(&mut state.hide_children))
        });
        let children: Vec<_> = children.into_iter().map(|child| self.hide_after_children(child)).collect();
        async move {
            let own = match &pending {
                Some(pending) => pending.promise.settled().await.map(|_| ()),
                None => Ok(()),
            };
            let children = join_all(children).await;
            own?;
            children.into_iter().collect::<Result<Vec<()>, Value>>()?;
            if let Some(pending) = pending {
                (pending.hide)();
            }
            Ok(())
        }
        .boxed_local()
    }
}
