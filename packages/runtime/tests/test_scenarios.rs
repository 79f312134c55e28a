use std::cell::Cell;
use std::rc::Rc;
use tendril::{DirectiveContext, Tendril};
use tendril_common::EventLoop;
use tendril_dom::{Dom, NodeId};
use tendril_reactivity::graph_stats;

struct Page {
    tendril: Tendril,
    dom: Dom,
    event_loop: EventLoop,
}

impl Page {
    fn new(html: &str) -> Self {
        let dom = Dom::new();
        let event_loop = EventLoop::new();
        dom.set_inner_html(dom.body(), html).unwrap();
        let tendril = Tendril::new(dom.clone(), event_loop.clone());
        Self { tendril, dom, event_loop }
    }

    fn start(&self) {
        self.tendril.start();
        self.event_loop.run_until_idle();
    }

    fn find(&self, selector: &str) -> NodeId {
        self.dom.query_selector(self.dom.document(), selector).unwrap().unwrap()
    }

    fn all(&self, selector: &str) -> Vec<NodeId> {
        self.dom.query_selector_all(self.dom.document(), selector).unwrap()
    }

    fn texts(&self, selector: &str) -> Vec<String> {
        self.all(selector).into_iter().map(|el| self.dom.text_content(el)).collect()
    }

    fn click(&self, selector: &str) {
        self.dom.click(self.find(selector));
        self.event_loop.run_until_idle();
    }
}

/// Counts how many elements a `track` directive was bound to and released from
fn register_tracker(page: &Page) -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let created = Rc::new(Cell::new(0));
    let destroyed = Rc::new(Cell::new(0));
    let (on_create, on_destroy) = (created.clone(), destroyed.clone());
    page.tendril.register_directive("track", move |cx: &DirectiveContext| {
        on_create.set(on_create.get() + 1);
        let on_destroy = on_destroy.clone();
        cx.cleanup(move || on_destroy.set(on_destroy.get() + 1));
    });
    (created, destroyed)
}

#[test]
fn test_keyed_reorder_reaches_new_order() {
    let page = Page::new(
        r#"<ul x-data="{ keys: ['a', 'b', 'c', 'd'] }">
            <template x-for="key in keys" :key="key"><li x-text="key"></li></template>
            <button @click="keys = ['a', 'c', 'b', 'e']"></button>
        </ul>"#,
    );
    page.start();
    let before = page.all("li");

    page.click("button");
    assert_eq!(page.texts("li"), vec!["a", "c", "b", "e"]);
    let after = page.all("li");
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], before[2]);
    assert_eq!(after[2], before[1]);
    assert!(!before.contains(&after[3]));
    assert!(!page.dom.is_connected(before[3]));
}

#[test]
fn test_duplicate_keys_leave_one_clone() {
    let page = Page::new(
        r#"<ul x-data="{ items: [{ k: 'x', v: 1 }, { k: 'x', v: 2 }] }">
            <template x-for="item in items" :key="item.k"><li x-text="item.v"></li></template>
        </ul>"#,
    );
    page.start();
    assert_eq!(page.texts("li"), vec!["1"]);
    assert_eq!(page.tendril.diagnostics().count(tendril::DiagnosticKind::DuplicateKey), 1);
}

#[test]
fn test_if_round_trip_releases_effects() {
    let page = Page::new(
        r#"<div x-data="{ on: false, label: 'x' }">
            <template x-if="on"><p :title="label" x-text="label"></p></template>
            <button @click="on = !on"></button>
        </div>"#,
    );
    page.start();
    let container = page.find("div");
    let hidden = page.dom.inner_html(container);

    page.click("button");
    let shown = page.dom.inner_html(container);
    page.click("button");
    assert_eq!(page.dom.inner_html(container), hidden);
    let baseline = graph_stats();

    for _ in 0..5 {
        page.click("button");
        assert_eq!(page.dom.inner_html(container), shown);
        page.click("button");
        assert_eq!(page.dom.inner_html(container), hidden);
    }
    assert_eq!(graph_stats(), baseline);
}

#[test]
fn test_number_model_coercion() {
    let page = Page::new(
        r#"<div x-data="{ qty: 1 }">
            <input x-model.number="qty">
            <span x-text="qty === null ? 'null' : typeof qty + ':' + qty"></span>
        </div>"#,
    );
    page.start();
    let input = page.find("input");

    page.dom.input(input, "42");
    page.event_loop.run_until_idle();
    assert_eq!(page.texts("span"), vec!["number:42"]);

    page.dom.input(input, "");
    page.event_loop.run_until_idle();
    assert_eq!(page.texts("span"), vec!["null"]);

    page.dom.input(input, "4x");
    page.event_loop.run_until_idle();
    assert_eq!(page.texts("span"), vec!["number:4"]);

    page.dom.input(input, "abc");
    page.event_loop.run_until_idle();
    assert_eq!(page.texts("span"), vec!["string:abc"]);
}

#[test]
fn test_bound_attribute_writes_do_not_reinitialize() {
    let page = Page::new(
        r#"<div x-data="{ n: 1 }">
            <p x-track :data-n="n" :class="'n-' + n"></p>
            <button @click="n++"></button>
        </div>"#,
    );
    let (created, destroyed) = register_tracker(&page);
    page.start();
    assert_eq!(created.get(), 1);

    page.click("button");
    page.click("button");
    let p = page.find("p");
    assert_eq!(page.dom.get_attribute(p, "data-n").as_deref(), Some("3"));
    assert!(page.dom.has_class(p, "n-3"));
    assert_eq!(created.get(), 1);
    assert_eq!(destroyed.get(), 0);
}

#[test]
fn test_list_update_keeps_surviving_rows() {
    let page = Page::new(
        r#"<ul x-data="{ items: [{ id: 1, name: 'a' }, { id: 2, name: 'b' }] }">
            <template x-for="item in items" :key="item.id"><li x-track x-text="item.name"></li></template>
            <button @click="items.splice(0, 1); items.push({ id: 3, name: 'c' })"></button>
        </ul>"#,
    );
    let (created, destroyed) = register_tracker(&page);
    page.start();
    assert_eq!(created.get(), 2);
    let second = page.all("li")[1];

    page.click("button");
    assert_eq!(page.texts("li"), vec!["b", "c"]);
    assert_eq!(page.all("li")[0], second);
    assert_eq!(created.get(), 3);
    assert_eq!(destroyed.get(), 1);
}

#[test]
fn test_show_hide_then_show_ends_fully_shown() {
    let page = Page::new(
        r#"<div x-data="{ open: true }">
            <p x-show="open" x-transition.duration.500ms></p>
            <button @click="open = !open"></button>
        </div>"#,
    );
    page.start();
    let p = page.find("p");

    page.dom.click(page.find("button"));
    page.event_loop.next_frame();
    page.event_loop.advance_time(100);
    page.dom.click(page.find("button"));
    page.event_loop.run_until_idle();

    assert!(page.dom.is_displayed(p));
    assert!(!page.dom.has_attribute(p, "style"));
}

#[test]
fn test_toggles_and_swaps_do_not_grow_the_document() {
    let page = Page::new(
        r#"<div x-data="{ on: false, keys: ['a', 'b', 'c'] }">
            <template x-if="on"><p :title="keys[0]"><b x-text="keys.length"></b></p></template>
            <template x-for="key in keys" :key="key"><li x-text="key"></li></template>
            <button id="toggle" @click="on = !on"></button>
            <button id="swap" @click="keys = [keys[2], keys[1], keys[0]]"></button>
        </div>"#,
    );
    page.start();
    let baseline = page.dom.node_count();

    for _ in 0..10 {
        page.click("#toggle");
        assert!(page.dom.node_count() > baseline);
        page.click("#toggle");
        assert_eq!(page.dom.node_count(), baseline);
    }
    for _ in 0..10 {
        page.click("#swap");
        assert_eq!(page.dom.node_count(), baseline);
    }
    assert_eq!(page.texts("li"), vec!["a", "b", "c"]);
}
