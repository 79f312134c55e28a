use crate::{DiagnosticKind, Tendril};
use tendril_common::EventLoop;
use tendril_dom::{Dom, KeyModifiers, NodeId};

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
    dom.query_selector(dom.document(), selector)
        .unwrap()
        .unwrap_or_else(|| panic!("no element matches {selector}"))
}

fn find_all(dom: &Dom, selector: &str) -> Vec<NodeId> {
    dom.query_selector_all(dom.document(), selector).unwrap()
}

fn texts(dom: &Dom, selector: &str) -> Vec<String> {
    find_all(dom, selector).into_iter().map(|el| dom.text_content(el)).collect()
}

#[test]
fn test_text_follows_state() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ count: 1 }">
            <button @click="count++">+</button>
            <span x-text="count"></span>
        </div>"#,
    );
    let span = find(&dom, "span");
    assert_eq!(dom.text_content(span), "1");

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(span), "2");
}

#[test]
fn test_show_toggles_display() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ open: false }">
            <p x-show="open">hello</p>
            <button @click="open = !open"></button>
        </div>"#,
    );
    let p = find(&dom, "p");
    assert!(!dom.is_displayed(p));

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert!(dom.is_displayed(p));
    assert!(!dom.has_attribute(p, "style"));

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert!(!dom.is_displayed(p));
}

#[test]
fn test_if_inserts_and_removes_clone() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ on: true }">
            <template x-if="on"><b x-text="'yes'"></b></template>
            <button @click="on = false"></button>
        </div>"#,
    );
    let b = find(&dom, "b");
    assert_eq!(dom.text_content(b), "yes");
    let template = find(&dom, "template");
    assert_eq!(dom.next_element_sibling(template), Some(b));

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert!(find_all(&dom, "b").is_empty());
}

#[test]
fn test_for_reorders_keyed_rows_in_place() {
    let (_tendril, dom, event_loop) = mount(
        r#"<ul x-data="{ items: [{ id: 1, n: 'a' }, { id: 2, n: 'b' }, { id: 3, n: 'c' }] }">
            <template x-for="item in items" :key="item.id"><li x-text="item.n"></li></template>
            <button @click="items = [items[2], items[1], items[0]]"></button>
            <button class="add" @click="items.push({ id: 4, n: 'd' })"></button>
        </ul>"#,
    );
    assert_eq!(texts(&dom, "li"), vec!["a", "b", "c"]);
    let before = find_all(&dom, "li");

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert_eq!(texts(&dom, "li"), vec!["c", "b", "a"]);
    let after = find_all(&dom, "li");
    assert_eq!(after, vec![before[2], before[1], before[0]]);

    dom.click(find(&dom, ".add"));
    event_loop.run_until_idle();
    assert_eq!(texts(&dom, "li"), vec!["c", "b", "a", "d"]);
}

#[test]
fn test_for_range_and_index() {
    let (_tendril, dom, _event_loop) = mount(
        r#"<div x-data>
            <template x-for="(n, i) in 3"><i x-text="i + ':' + n"></i></template>
        </div>"#,
    );
    assert_eq!(texts(&dom, "i"), vec!["0:1", "1:2", "2:3"]);
}

#[test]
fn test_for_duplicate_keys_keep_first() {
    let (tendril, dom, _event_loop) = mount(
        r#"<div x-data="{ items: [1, 1, 2] }">
            <template x-for="i in items" :key="i"><li x-text="i"></li></template>
        </div>"#,
    );
    assert_eq!(texts(&dom, "li"), vec!["1", "2"]);
    assert_eq!(tendril.diagnostics().count(DiagnosticKind::DuplicateKey), 1);
}

#[test]
fn test_model_text_round_trip() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ name: 'ada' }">
            <input x-model="name">
            <span x-text="name"></span>
            <button @click="name = 'grace'"></button>
        </div>"#,
    );
    let input = find(&dom, "input");
    let span = find(&dom, "span");
    assert_eq!(dom.value(input), "ada");

    dom.input(input, "bob");
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(span), "bob");

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert_eq!(dom.value(input), "grace");
}

#[test]
fn test_model_number_modifier() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ qty: 1 }">
            <input x-model.number="qty">
            <span x-text="typeof qty + ':' + qty"></span>
        </div>"#,
    );
    dom.input(find(&dom, "input"), "12");
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "number:12");
}

#[test]
fn test_model_checkbox_array() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ picked: ['b'] }">
            <input type="checkbox" value="a" x-model="picked">
            <input type="checkbox" value="b" x-model="picked">
            <span x-text="picked.join(',')"></span>
        </div>"#,
    );
    let boxes = find_all(&dom, "input");
    assert!(!dom.checked(boxes[0]));
    assert!(dom.checked(boxes[1]));

    dom.click(boxes[0]);
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "b,a");

    dom.click(boxes[1]);
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "a");
}

#[test]
fn test_bind_class_object_keeps_static_classes() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ active: false }">
            <p class="base" :class="{ 'is-active': active }"></p>
            <button @click="active = true"></button>
        </div>"#,
    );
    let p = find(&dom, "p");
    assert!(dom.has_class(p, "base"));
    assert!(!dom.has_class(p, "is-active"));

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert!(dom.has_class(p, "base"));
    assert!(dom.has_class(p, "is-active"));
}

#[test]
fn test_bind_boolean_attribute() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ busy: true }">
            <button x-bind:disabled="busy" @click="busy = false"></button>
            <input :aria-checked="false">
        </div>"#,
    );
    let button = find(&dom, "button");
    assert_eq!(dom.get_attribute(button, "disabled").as_deref(), Some("disabled"));
    assert_eq!(dom.get_attribute(find(&dom, "input"), "aria-checked").as_deref(), Some("false"));

    dom.click(button);
    event_loop.run_until_idle();
    assert!(!dom.has_attribute(button, "disabled"));
}

#[test]
fn test_on_once_and_self() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ once: 0, own: 0 }">
            <button class="once" @click.once="once++"></button>
            <section @click.self="own++"><em>child</em></section>
            <span class="counts" x-text="once + '/' + own"></span>
        </div>"#,
    );
    let button = find(&dom, ".once");
    dom.click(button);
    dom.click(button);
    dom.click(find(&dom, "em"));
    dom.click(find(&dom, "section"));
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, ".counts")), "1/1");
}

#[test]
fn test_on_key_modifiers_filter() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ hits: [] }">
            <input @keydown.enter="hits.push('enter')" @keydown.ctrl.s="hits.push('save')">
            <span x-text="hits.join(',')"></span>
        </div>"#,
    );
    let input = find(&dom, "input");
    dom.keydown(input, "a", KeyModifiers::default());
    dom.keydown(input, "Enter", KeyModifiers::default());
    dom.keydown(input, "s", KeyModifiers::default());
    dom.keydown(
        input,
        "s",
        KeyModifiers {
            ctrl: true,
            ..KeyModifiers::default()
        },
    );
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "enter,save");
}

#[test]
fn test_on_debounce_waits_for_quiet() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ calls: 0 }">
            <input @input.debounce.100ms="calls++">
            <span x-text="calls"></span>
        </div>"#,
    );
    let input = find(&dom, "input");
    dom.input(input, "a");
    event_loop.advance_time(50);
    dom.input(input, "ab");
    event_loop.advance_time(50);
    assert_eq!(dom.text_content(find(&dom, "span")), "0");

    event_loop.advance_time(100);
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "1");
}

#[test]
fn test_refs_and_ids() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ label: '' }" x-id="['field']">
            <input x-ref="field" :id="$id('field')">
            <label :for="$id('field')"></label>
            <button @click="label = $refs.field.tagName"></button>
            <span x-text="label"></span>
        </div>"#,
    );
    let input = find(&dom, "input");
    let id = dom.get_attribute(input, "id").unwrap();
    assert_eq!(id, "field-1");
    assert_eq!(dom.get_attribute(find(&dom, "label"), "for"), Some(id));

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "INPUT");
}

#[test]
fn test_html_initializes_inserted_markup() {
    let (_tendril, dom, _event_loop) = mount(
        r#"<div x-data="{ markup: '<em x-text=&quot;word&quot;></em>', word: 'hi' }">
            <section x-html="markup"></section>
        </div>"#,
    );
    assert_eq!(dom.text_content(find(&dom, "em")), "hi");
}

#[test]
fn test_ignore_skips_subtree() {
    let (_tendril, dom, _event_loop) = mount(
        r#"<div x-data="{ word: 'bound' }">
            <section x-ignore><span class="inner" x-text="word">raw</span></section>
            <section x-ignore.self x-text="word"><span class="self" x-text="word">raw</span></section>
        </div>"#,
    );
    assert_eq!(dom.text_content(find(&dom, ".inner")), "raw");
    assert_eq!(dom.text_content(find(&dom, ".self")), "bound");
}

#[test]
fn test_cloak_is_removed() {
    let (_tendril, dom, _event_loop) = mount(r#"<div x-data x-cloak></div>"#);
    assert!(!dom.has_attribute(find(&dom, "div"), "x-cloak"));
}

#[test]
fn test_init_and_effect() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ n: 1, seen: 0 }" x-init="n = 5">
            <i x-effect="seen = n * 2"></i>
            <button @click="n = 10"></button>
            <span x-text="seen"></span>
        </div>"#,
    );
    assert_eq!(dom.text_content(find(&dom, "span")), "10");

    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "20");
}

#[test]
fn test_teleport_moves_clone_and_forwards_events() {
    let (_tendril, dom, event_loop) = mount(
        r##"<div id="modals"></div>
        <div x-data="{ clicks: 0 }">
            <template x-teleport="#modals" @ping="clicks++"><p x-text="clicks"></p></template>
        </div>"##,
    );
    let modals = find(&dom, "#modals");
    let p = find(&dom, "p");
    assert_eq!(dom.parent(p), Some(modals));
    assert_eq!(dom.get_attribute(p, "data-teleport-target").as_deref(), Some("true"));
    assert_eq!(dom.text_content(p), "0");

    dom.dispatch_custom(p, "ping", None);
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(p), "1");
}

#[test]
fn test_teleport_missing_target_reports() {
    let (tendril, dom, _event_loop) = mount(
        r##"<div x-data><template x-teleport="#nowhere"><p></p></template></div>"##,
    );
    assert!(find_all(&dom, "p").is_empty());
    assert_eq!(tendril.diagnostics().count(DiagnosticKind::Misuse), 1);
}

#[test]
fn test_modelable_entangles_parent_state() {
    let (_tendril, dom, event_loop) = mount(
        r#"<div x-data="{ outer: 'a' }">
            <div x-data="{ inner: '' }" x-modelable="inner" x-model="outer">
                <button @click="inner = 'b'"></button>
            </div>
            <span x-text="outer"></span>
        </div>"#,
    );
    event_loop.run_until_idle();
    dom.click(find(&dom, "button"));
    event_loop.run_until_idle();
    assert_eq!(dom.text_content(find(&dom, "span")), "b");
}

#[test]
fn test_if_on_non_template_warns() {
    let (tendril, _dom, _event_loop) = mount(r#"<div x-data><p x-if="true"></p></div>"#);
    assert_eq!(tendril.diagnostics().count(DiagnosticKind::Misuse), 1);
}

#[test]
fn test_oversized_values_report_instead_of_aborting() {
    let (tendril, dom, _event_loop) = mount(
        r#"<div x-data="{ s: 'ab', a: [1, 2] }" x-init="a.length = 1e13">
            <span x-text="s.repeat(1e300)"></span>
            <ul><template x-for="i in 1e13"><li></li></template></ul>
            <b x-text="a.length"></b>
        </div>"#,
    );
    assert_eq!(tendril.diagnostics().count(DiagnosticKind::Expression), 3);
    assert_eq!(dom.text_content(find(&dom, "span")), "");
    assert!(find_all(&dom, "li").is_empty());
    assert_eq!(dom.text_content(find(&dom, "b")), "2");
}
