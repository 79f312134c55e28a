use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tendril_common::EventLoop;
use tendril_reactivity::{graph_stats, release, ArrayRef, ObjectRef, Scheduler, Value};

fn scheduler_on(event_loop: &EventLoop) -> Scheduler {
    let event_loop = event_loop.clone();
    Scheduler::new(move |task| event_loop.queue_microtask(task))
}

#[test]
fn test_effect_runs_once_per_flush() {
    let event_loop = EventLoop::new();
    let scheduler = scheduler_on(&event_loop);
    let state = ObjectRef::from_entries([("x", 0)]);
    let runs = Rc::new(Cell::new(0));

    let (state_clone, runs_clone) = (state.clone(), runs.clone());
    let handle = scheduler.effect(move || {
        let _ = state_clone.get("x");
        runs_clone.set(runs_clone.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    state.set("x", Value::from(1));
    state.set("x", Value::from(2));
    state.set("x", Value::from(3));
    assert_eq!(runs.get(), 1);

    event_loop.run_microtasks();
    assert_eq!(runs.get(), 2);

    // Equal write: nothing is queued
    state.set("x", Value::from(3));
    event_loop.run_microtasks();
    assert_eq!(runs.get(), 2);
    release(handle);
}

#[test]
fn test_released_effect_queued_before_release_does_not_run() {
    let event_loop = EventLoop::new();
    let scheduler = scheduler_on(&event_loop);
    let state = ObjectRef::from_entries([("x", 0)]);
    let runs = Rc::new(Cell::new(0));

    let (state_clone, runs_clone) = (state.clone(), runs.clone());
    let handle = scheduler.effect(move || {
        let _ = state_clone.get("x");
        runs_clone.set(runs_clone.get() + 1);
    });

    state.set("x", Value::from(1));
    release(handle);
    release(handle);
    event_loop.run_microtasks();
    assert_eq!(runs.get(), 1);
}

#[test]
fn test_effects_flush_in_registration_order() {
    let event_loop = EventLoop::new();
    let scheduler = scheduler_on(&event_loop);
    let state = ObjectRef::from_entries([("n", 0)]);
    let log = Rc::new(RefCell::new(Vec::new()));

    let handles: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|name| {
            let (state, log) = (state.clone(), log.clone());
            scheduler.effect(move || {
                let _ = state.get("n");
                log.borrow_mut().push(name);
            })
        })
        .collect();
    log.borrow_mut().clear();

    state.set("n", Value::from(1));
    event_loop.run_microtasks();
    assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    handles.into_iter().for_each(release);
}

#[test]
fn test_nested_effects_leave_no_residue() {
    let before = graph_stats();
    let items = ArrayRef::from_vec(vec![Value::from("a"), Value::from("b")]);
    let inner_handles = Rc::new(RefCell::new(Vec::new()));

    let (items_clone, inner_clone) = (items.clone(), inner_handles.clone());
    let outer = tendril_reactivity::effect(move || {
        for handle in inner_clone.borrow_mut().drain(..) {
            release(handle);
        }
        for index in 0..items_clone.len() {
            let items = items_clone.clone();
            let handle = tendril_reactivity::effect(move || {
                let _ = items.get(index);
            });
            inner_clone.borrow_mut().push(handle);
        }
    });

    for _ in 0..5 {
        items.push(Value::from("c"));
        items.pop();
    }
    assert_eq!(inner_handles.borrow().len(), 2);

    for handle in inner_handles.borrow_mut().drain(..) {
        release(handle);
    }
    release(outer);
    assert_eq!(graph_stats(), before);
}
