use crate::{Direction, Phases, StageSet, Tendril};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tendril_common::EventLoop;
use tendril_dom::{Dom, NodeId};

fn mount(html: &str) -> (Tendril, Dom, EventLoop) {
    let dom = Dom::new();
    let event_loop = EventLoop::new();
    dom.set_inner_html(dom.body(), html).unwrap();
    let tendril = Tendril::new(dom.clone(), event_loop.clone());
    tendril.start();
    event_loop.run_until_idle();
    (tendril, dom, event_loop)
}

fn find(dom: &Dom, selector: &str) -> NodeId {
    dom.query_selector(dom.document(), selector).unwrap().unwrap()
}

fn fade() -> Phases {
    Phases {
        during: StageSet::from_styles([("transition-duration", "0.1s".to_string())]),
        start: StageSet::from_styles([("opacity", "0".to_string())]),
        end: StageSet::from_styles([("opacity", "1".to_string())]),
    }
}

#[test]
fn test_directive_collects_stage_classes() {
    let (tendril, dom, _event_loop) = mount(
        r#"<div x-data="{ open: true }">
            <p x-show="open"
               x-transition:enter="fade"
               x-transition:enter-start="o-0"
               x-transition:enter-end="o-100"
               x-transition:leave.duration.200ms></p>
        </div>"#,
    );
    let config = tendril.transition_config(find(&dom, "p")).unwrap();
    assert_eq!(config.enter.during.classes, vec!["fade"]);
    assert_eq!(config.enter.start.classes, vec!["o-0"]);
    assert_eq!(config.enter.end.classes, vec!["o-100"]);
    assert_eq!(config.leave.during.styles["transition-duration"], "0.2s");
}

#[test]
fn test_class_string_without_stage_warns() {
    let (tendril, dom, _event_loop) = mount(r#"<div x-data><p x-transition="fade"></p></div>"#);
    assert!(tendril.transition_config(find(&dom, "p")).is_none());
    assert_eq!(tendril.diagnostics().count(crate::DiagnosticKind::Misuse), 1);
}

#[test]
fn test_show_runs_enter_stages_frame_by_frame() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ open: false }">
            <p x-show="open"
               x-transition:enter="fade"
               x-transition:enter-start="o-0"
               x-transition:enter-end="o-100"></p>
            <button @click="open = true"></button>
        </div>"#,
    );
    let p = find(&dom, "p");
    assert!(!dom.is_displayed(p));

    dom.click(find(&dom, "button"));
    event_loop.run_microtasks();
    assert!(dom.has_class(p, "fade"));
    assert!(dom.has_class(p, "o-0"));

    event_loop.next_frame();
    assert!(dom.is_displayed(p));
    assert!(!dom.has_class(p, "o-0"));
    assert!(dom.has_class(p, "o-100"));

    event_loop.run_until_idle();
    assert!(dom.is_displayed(p));
    assert!(!dom.has_class(p, "fade"));
    assert!(!dom.has_class(p, "o-100"));
}

#[test]
fn test_show_leave_hides_after_transition() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ open: true }">
            <p x-show="open" x-transition></p>
            <button @click="open = false"></button>
        </div>"#,
    );
    let p = find(&dom, "p");
    dom.click(find(&dom, "button"));
    event_loop.run_microtasks();
    assert!(dom.is_displayed(p));
    assert_eq!(dom.style_property(p, "opacity").as_deref(), Some("1"));

    event_loop.run_until_idle();
    assert!(!dom.is_displayed(p));
    assert!(dom.style_property(p, "opacity").is_none());
    assert!(dom.style_property(p, "transition-duration").is_none());
}

#[test]
fn test_reshow_cancels_pending_hide() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ open: true }">
            <p x-show="open" x-transition></p>
            <button @click="open = !open"></button>
        </div>"#,
    );
    let p = find(&dom, "p");
    let button = find(&dom, "button");
    dom.click(button);
    event_loop.run_microtasks();
    dom.click(button);
    event_loop.run_until_idle();

    assert!(dom.is_displayed(p));
    assert!(dom.style_property(p, "opacity").is_none());
    assert!(dom.style_property(p, "transform").is_none());
    assert!(dom.style_property(p, "transition-duration").is_none());
}

#[test]
fn test_new_transition_cancels_running_one() {
    let (tendril, dom, event_loop) = mount(r#"<div x-data><p></p></div>"#);
    let p = find(&dom, "p");
    let cancels = Rc::new(Cell::new(0));
    let afters = Rc::new(RefCell::new(Vec::new()));

    let log = afters.clone();
    tendril.transition(p, fade(), || {}, move || log.borrow_mut().push("first"));
    let first = tendril.transitioning(p).unwrap();
    let counter = cancels.clone();
    first.before_cancel(move || counter.set(counter.get() + 1));

    let log = afters.clone();
    tendril.transition(p, fade(), || {}, move || log.borrow_mut().push("second"));
    assert_eq!(cancels.get(), 1);
    assert!(first.is_cancelled());
    assert!(first.is_finished());
    assert_eq!(*afters.borrow(), vec!["first"]);

    event_loop.run_until_idle();
    assert_eq!(cancels.get(), 1);
    assert_eq!(*afters.borrow(), vec!["first", "second"]);
    assert!(tendril.transitioning(p).is_none());
    assert!(!dom.has_attribute(p, "style"));
}

#[test]
fn test_empty_phases_run_hooks_at_once() {
    let (tendril, dom, _event_loop) = mount(r#"<div x-data><p></p></div>"#);
    let p = find(&dom, "p");
    let calls = Rc::new(RefCell::new(Vec::new()));
    let before = calls.clone();
    let after = calls.clone();
    tendril.transition_direction(
        p,
        Direction::Leave,
        move || before.borrow_mut().push("before"),
        move || after.borrow_mut().push("after"),
    );
    assert_eq!(*calls.borrow(), vec!["before", "after"]);
}

#[test]
fn test_transition_waits_for_measured_duration() {
    let (tendril, dom, event_loop) = mount(r#"<div x-data><p></p></div>"#);
    let p = find(&dom, "p");
    let done = Rc::new(Cell::new(false));
    let flag = done.clone();
    tendril.transition(p, fade(), || {}, move || flag.set(true));

    event_loop.next_frame();
    event_loop.next_frame();
    assert!(!done.get());
    event_loop.advance_time(99);
    assert!(!done.get());
    event_loop.advance_time(1);
    assert!(done.get());
}

#[test]
fn test_next_tick_held_until_transition_end_phase() {
    let (tendril, dom, event_loop) = mount(r#"<div x-data><p></p></div>"#);
    let p = find(&dom, "p");
    tendril.transition(p, fade(), || {}, || {});

    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    tendril.next_tick(move || flag.set(true));
    event_loop.run_microtasks();
    event_loop.advance_time(0);
    assert!(!ran.get());

    event_loop.next_frame();
    assert!(ran.get());
}

#[test]
fn test_if_leave_transition_removes_after_finishing() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ on: true }">
            <template x-if="on"><b x-transition:leave="fading"></b></template>
            <button @click="on = false"></button>
        </div>"#,
    );
    let b = find(&dom, "b");
    dom.click(find(&dom, "button"));
    event_loop.run_microtasks();
    assert!(dom.is_connected(b));
    assert!(dom.has_class(b, "fading"));

    event_loop.run_until_idle();
    assert!(dom.query_selector(dom.document(), "b").unwrap().is_none());
}
