/// Expression-level behavior of the interpreter
use crate::*;
use tendril_reactivity::{effect, ObjectRef, Value};

fn scope(entries: Vec<(&str, Value)>) -> ObjectRef {
    ObjectRef::from_entries(entries)
}

fn eval_in(source: &str, scope: &ObjectRef) -> Value {
    let env = Env::new(ScopeChain::new().with_scope(scope.clone()));
    Interpreter::new().evaluate(source, &env).unwrap()
}

fn eval(source: &str) -> Value {
    eval_in(source, &ObjectRef::new())
}

#[test]
fn test_arithmetic_and_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Value::from(7.0));
    assert_eq!(eval("(1 + 2) * 3"), Value::from(9.0));
    assert_eq!(eval("7 % 4"), Value::from(3.0));
    assert_eq!(eval("-2 + +'3'"), Value::from(1.0));
}

#[test]
fn test_string_concatenation_coerces() {
    assert_eq!(eval("'n' + 1"), Value::from("n1"));
    assert_eq!(eval("1 + 2 + 'px'"), Value::from("3px"));
    assert_eq!(eval("`${1 + 1} items`"), Value::from("2 items"));
    assert_eq!(eval("[1, 2] + ''"), Value::from("1,2"));
}

#[test]
fn test_equality_flavors() {
    assert_eq!(eval("1 == '1'"), Value::Bool(true));
    assert_eq!(eval("1 === '1'"), Value::Bool(false));
    assert_eq!(eval("null == undefined"), Value::Bool(true));
    assert_eq!(eval("null === undefined"), Value::Bool(false));
    assert_eq!(eval("'b' > 'a'"), Value::Bool(true));
    assert_eq!(eval("'10' < 9"), Value::Bool(false));
}

#[test]
fn test_logical_operators_short_circuit() {
    let state = scope(vec![("count", Value::from(0.0))]);
    assert_eq!(eval_in("false && count++", &state), Value::Bool(false));
    assert_eq!(eval_in("true || count++", &state), Value::Bool(true));
    assert_eq!(eval_in("null ?? 'fallback'", &state), Value::from("fallback"));
    assert_eq!(eval_in("0 ?? 'fallback'", &state), Value::from(0.0));
    assert_eq!(state.get("count"), Value::from(0.0));
}

#[test]
fn test_unresolved_identifiers_are_undefined() {
    assert_eq!(eval("missing"), Value::Undefined);
    assert_eq!(eval("typeof missing"), Value::from("undefined"));
}

#[test]
fn test_member_access_and_optional_chaining() {
    let user = scope(vec![("name", Value::from("Ada")), ("tags", Value::from(vec!["x", "y"]))]);
    let state = scope(vec![("user", Value::Object(user)), ("nobody", Value::Null)]);
    assert_eq!(eval_in("user.name", &state), Value::from("Ada"));
    assert_eq!(eval_in("user['name'].length", &state), Value::from(3.0));
    assert_eq!(eval_in("user.tags[1]", &state), Value::from("y"));
    assert_eq!(eval_in("nobody?.name.first", &state), Value::Undefined);
    assert_eq!(eval_in("nobody?.greet()", &state), Value::Undefined);

    let env = Env::new(ScopeChain::new().with_scope(state));
    let err = Interpreter::new().evaluate("nobody.name", &env).unwrap_err();
    assert!(matches!(err, EvalError::Type { .. }));
}

#[test]
fn test_assignment_writes_to_owning_scope() {
    let outer = scope(vec![("count", Value::from(1.0))]);
    let inner = scope(vec![("item", Value::from("a"))]);
    let env = Env::new(ScopeChain::new().with_scope(outer.clone()).with_scope(inner.clone()));
    let interpreter = Interpreter::new();

    interpreter.evaluate("count += 2", &env).unwrap();
    interpreter.evaluate("count++", &env).unwrap();
    assert_eq!(outer.get("count"), Value::from(4.0));
    assert!(!inner.has_untracked("count"));

    interpreter.evaluate("label ||= 'default'", &env).unwrap();
    assert_eq!(outer.get("label"), Value::from("default"));
}

#[test]
fn test_arrow_functions_and_array_methods() {
    let state = scope(vec![("items", Value::from(vec![1, 2, 3, 4]))]);
    assert_eq!(
        eval_in("items.filter(n => n % 2 === 0).map(n => n * 10).join(',')", &state),
        Value::from("20,40")
    );
    assert_eq!(eval_in("items.reduce((sum, n) => sum + n, 0)", &state), Value::from(10.0));
    assert_eq!(eval_in("items.find(n => n > 2)", &state), Value::from(3.0));
}

#[test]
fn test_methods_receive_their_object_as_this() {
    let state = scope(vec![]);
    let counter = eval_in("({ count: 1, bump() { this.count++; return this.count } })", &state);
    let bump = counter.get("bump");
    let result = bump.as_function().unwrap().call(counter.clone(), Vec::new()).unwrap();
    assert_eq!(result, Value::from(2.0));
    assert_eq!(counter.get("count"), Value::from(2.0));
}

#[test]
fn test_bare_calls_see_the_merged_scope_as_this() {
    let state = eval("({ open: false, toggle() { this.open = !this.open } })");
    let Value::Object(state) = state else {
        panic!("expected an object");
    };
    eval_in("toggle()", &state);
    assert_eq!(state.get("open"), Value::Bool(true));
}

#[test]
fn test_object_literal_features() {
    let state = scope(vec![("key", Value::from("dynamic")), ("base", Value::Object(scope(vec![("a", Value::from(1.0))])))]);
    let object = eval_in("({ ...base, [key]: 2, key, get double() { return this.a * 2 } })", &state);
    assert_eq!(object.get("a"), Value::from(1.0));
    assert_eq!(object.get("dynamic"), Value::from(2.0));
    assert_eq!(object.get("key"), Value::from("dynamic"));
    assert_eq!(object.get("double"), Value::from(2.0));
}

#[test]
fn test_calling_a_non_function_names_the_callee() {
    let state = scope(vec![("user", Value::Object(ObjectRef::new()))]);
    let env = Env::new(ScopeChain::new().with_scope(state));
    let err = Interpreter::new().evaluate("user.save()", &env).unwrap_err();
    assert_eq!(err.to_string(), "user.save is not a function");
}

#[test]
fn test_evaluation_tracks_scope_reads() {
    use std::cell::Cell;
    use std::rc::Rc;

    let state = scope(vec![("count", Value::from(1.0))]);
    let env = Env::new(ScopeChain::new().with_scope(state.clone()));
    let interpreter = Rc::new(Interpreter::new());
    let seen = Rc::new(Cell::new(0.0));

    let (reader, sink) = (interpreter.clone(), seen.clone());
    let _handle = effect(move || {
        let value = reader.evaluate("count * 2", &env).unwrap();
        sink.set(value.to_number());
    });
    assert_eq!(seen.get(), 2.0);
    state.set("count", Value::from(5.0));
    assert_eq!(seen.get(), 10.0);
}

#[test]
fn test_runaway_recursion_is_an_error() {
    let state = scope(vec![]);
    let env = Env::new(ScopeChain::new().with_scope(state));
    let err = Interpreter::new()
        .evaluate("const loop = (n) => loop(n + 1); loop(0)", &env)
        .unwrap_err();
    assert!(matches!(
        err,
        EvalError::Call(tendril_reactivity::CallError::DepthExceeded { .. })
    ));
}
