use crate::{Config, DiagnosticKind, DirectiveContext, Tendril, TendrilError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tendril_common::EventLoop;
use tendril_dom::{Dom, NodeId};
use tendril_evaluator::PathEvaluator;
use tendril_reactivity::{ObjectRef, Value};

fn setup(html: &str) -> (Tendril, Dom, EventLoop) {
    let dom = Dom::new();
    let event_loop = EventLoop::new();
    dom.set_inner_html(dom.body(), html).unwrap();
    let tendril = Tendril::new(dom.clone(), event_loop.clone());
    (tendril, dom, event_loop)
}

fn find(dom: &Dom, selector: &str) -> NodeId {
    dom.query_selector(dom.document(), selector).unwrap().unwrap()
}

#[test]
fn test_start_twice_warns() {
    let (tendril, _dom, _event_loop) = setup("<div x-data></div>");
    tendril.start();
    tendril.start();
    assert!(tendril.is_started());
    assert_eq!(tendril.diagnostics().count(DiagnosticKind::AlreadyStarted), 1);
}

#[test]
fn test_added_component_is_initialized() {
    let (tendril, dom, event_loop) = setup("<main></main>");
    tendril.start();
    event_loop.run_until_idle();

    dom.append_html(find(&dom, "main"), r#"<div x-data="{ n: 3 }"><span x-text="n * 2"></span></div>"#)
        .unwrap();
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "6");
}

#[test]
fn test_removed_component_runs_destroy() {
    let (tendril, dom, event_loop) = setup(r#"<div x-data="{ destroy() { $store.log.push('gone') } }"></div>"#);
    tendril.set_store("log", Value::from(Vec::<Value>::new()));
    tendril.start();
    event_loop.run_until_idle();

    dom.remove(find(&dom, "div"));
    event_loop.run_until_idle();
    let log = tendril.store("log");
    assert_eq!(log.get("length"), Value::from(1.0));
}

#[test]
fn test_attribute_added_and_removed_after_start() {
    let (tendril, dom, event_loop) = setup(r#"<div x-data="{ word: 'late' }"><span></span></div>"#);
    tendril.start();
    event_loop.run_until_idle();

    let span = find(&dom, "span");
    dom.set_attribute(span, "x-text", "word");
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(span), "late");

    dom.set_attribute(span, "x-on:click", "word = 'clicked'");
    event_loop.run_until_idle();
    dom.remove_attribute(span, "x-on:click");
    event_loop.run_until_idle();
    dom.click(span);
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(span), "late");
}

#[test]
fn test_own_writes_are_not_observed() {
    let (tendril, dom, event_loop) = setup("<main></main>");
    tendril.start();
    event_loop.run_until_idle();
    assert!(tendril.is_observing());

    let inserted = tendril.mutate_dom(|| {
        assert!(!tendril.is_observing());
        dom.append_html(find(&dom, "main"), r#"<div x-data><b x-text="'set'"></b></div>"#)
            .unwrap()
    });
    event_loop.run_until_idle();
    assert_eq!(inserted.len(), 1);
    assert_eq!(dom.text_content(find(&dom, "b")), "");
}

#[test]
fn test_defer_batch_skips_transient_nodes() {
    let (tendril, dom, event_loop) = setup("<main x-data></main>");
    let initialized = Rc::new(Cell::new(0));
    let seen = initialized.clone();
    tendril.register_directive("probe", move |_cx: &DirectiveContext| seen.set(seen.get() + 1));
    tendril.start();
    event_loop.run_until_idle();

    let main = find(&dom, "main");
    tendril.defer_batch(|| {
        let nodes = dom.append_html(main, r#"<i x-probe></i>"#).unwrap();
        dom.remove(nodes[0]);
    });
    event_loop.run_until_idle();
    assert_eq!(initialized.get(), 0);
}

#[test]
fn test_custom_directive_and_magic() {
    let (tendril, dom, event_loop) = setup(r#"<div x-data><p x-upper="'hey'"></p><i x-text="$answer"></i></div>"#);
    tendril
        .register_directive("upper", |cx: &DirectiveContext| {
            let el = cx.el();
            let dom = cx.dom().clone();
            let evaluation = cx.evaluate_later();
            cx.effect(move || {
                let dom = dom.clone();
                evaluation.run(move |value| dom.set_text_content(el, &value.to_display_string().to_uppercase()));
            });
        })
        .before("bind");
    tendril.register_magic("answer", |_| Value::from(42.0));
    tendril.start();
    event_loop.run_until_idle();

    assert_eq!(dom.text_content(find(&dom, "p")), "HEY");
    assert_eq!(dom.text_content(find(&dom, "i")), "42");
    let order = tendril.inner.registry.borrow().order().to_vec();
    let upper = order.iter().position(|name| name == "upper").unwrap();
    let bind = order.iter().position(|name| name == "bind").unwrap();
    assert!(upper < bind);
}

#[test]
fn test_missing_plugin_directive_warns() {
    let (tendril, _dom, event_loop) = setup(r#"<div x-data><p x-intersect="seen = true"></p><i x-text="$persist"></i></div>"#);
    tendril.start();
    event_loop.run_until_idle();
    assert_eq!(tendril.diagnostics().count(DiagnosticKind::MissingPlugin), 2);
}

#[test]
fn test_custom_prefix() {
    let dom = Dom::new();
    let event_loop = EventLoop::new();
    dom.set_inner_html(dom.body(), r#"<div v-data="{ a: 'b' }"><span v-text="a"></span></div>"#)
        .unwrap();
    let config = Config {
        prefix: "v-".to_string(),
        ..Config::default()
    };
    let tendril = Tendril::with_config(dom.clone(), event_loop.clone(), config);
    tendril.start();
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "b");
}

#[test]
fn test_data_provider_with_arguments() {
    let (tendril, dom, event_loop) = setup(r#"<div x-data="counter(5)"><span x-text="count"></span></div>"#);
    tendril.register_data_provider("counter", |args| {
        let start = args.first().cloned().unwrap_or(Value::from(0.0));
        Value::Object(ObjectRef::from_entries([("count", start)]))
    });
    tendril.start();
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "5");
}

#[test]
fn test_dispatch_and_watch() {
    let (tendril, dom, event_loop) = setup(
        r#"<div x-data="{ n: 0, log: [] }" x-init="$watch('n', (now, before) => log.push(before + '>' + now))"
             @bump="n = n + $event.detail.by">
            <button @click="$dispatch('bump', { by: 2 })"></button>
            <span x-text="log.join(',')"></span>
        </div>"#,
    );
    tendril.start();
    event_loop.run_until_idle();

    let button = find(&dom, "button");
    dom.click(button);
    event_loop.run_until_idle();
    dom.click(button);
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "0>2,2>4");
}

#[test]
fn test_next_tick_runs_after_updates() {
    let (tendril, dom, event_loop) = setup(
        r#"<div x-data="{ n: 1, seen: '' }">
            <span x-text="n"></span>
            <button @click="n = 2; $nextTick(() => { seen = $refs.out.textContent })"></button>
            <b x-ref="out" x-text="n"></b>
            <i x-text="seen"></i>
        </div>"#,
    );
    tendril.start();
    event_loop.run_until_idle();

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "i")), "2");
}

#[test]
fn test_store_is_shared() {
    let (tendril, dom, event_loop) = setup(
        r#"<div x-data><button @click="$store.cart.count++"></button></div>
        <div x-data><span x-text="$store.cart.count"></span></div>"#,
    );
    tendril.set_store("cart", ObjectRef::from_entries([("count", 0.0)]));
    tendril.start();
    event_loop.run_until_idle();

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "1");
}

#[test]
fn test_path_evaluator_rejects_operators() {
    let (tendril, dom, event_loop) = setup(r#"<div x-data="{ user: { name: 'kim' } }"><span></span><i></i></div>"#);
    tendril.start();
    event_loop.run_until_idle();

    tendril.set_evaluator(Rc::new(PathEvaluator));
    dom.set_attribute(find(&dom, "span"), "x-text", "user.name");
    dom.set_attribute(find(&dom, "i"), "x-text", "1 + 1");
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "kim");
    assert_eq!(dom.text_content(find(&dom, "i")), "");
    assert_eq!(tendril.diagnostics().count(DiagnosticKind::Expression), 1);
}

#[test]
fn test_error_hook_receives_rethrown_errors() {
    let (tendril, _dom, event_loop) = setup(r#"<div x-data><span x-text="missing.deep"></span></div>"#);
    let errors: Rc<RefCell<Vec<TendrilError>>> = Rc::default();
    let sink = errors.clone();
    tendril.on_error(move |err| sink.borrow_mut().push(err.clone()));
    tendril.start();
    event_loop.run_until_idle();
    assert_eq!(errors.borrow().len(), 1);
    assert!(matches!(errors.borrow()[0], TendrilError::Eval(_)));
}

#[test]
fn test_evaluate_reads_component_scope() {
    let (tendril, dom, _event_loop) = setup(r#"<div x-data="{ a: 2 }"><p></p></div>"#);
    tendril.start();
    let p = find(&dom, "p");
    assert_eq!(tendril.evaluate(p, "a + 1").unwrap(), Value::from(3.0));
    assert!(matches!(tendril.evaluate(p, "a."), Err(TendrilError::Eval(_))));
    tendril.assign(p, "a", Value::from(5.0)).unwrap();
    assert_eq!(tendril.data(p).get("a"), Value::from(5.0));
}
