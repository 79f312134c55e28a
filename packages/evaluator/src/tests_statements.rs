/// Multi-statement programs: declarations, branches and returns
use crate::*;
use tendril_reactivity::{ObjectRef, Value};

fn run(source: &str, scope: &ObjectRef) -> EvalResult<Value> {
    let env = Env::new(ScopeChain::new().with_scope(scope.clone()));
    Interpreter::new().evaluate(source, &env)
}

#[test]
fn test_program_value_is_last_expression() {
    let scope = ObjectRef::new();
    assert_eq!(run("let a = 2; let b = 3; a * b", &scope).unwrap(), Value::from(6.0));
    assert_eq!(run("let a = 2", &scope).unwrap(), Value::Undefined);
}

#[test]
fn test_locals_do_not_leak_into_scope() {
    let scope = ObjectRef::from_entries([("total", 0.0)]);
    run("let step = 5; total = total + step", &scope).unwrap();
    assert_eq!(scope.get("total"), Value::from(5.0));
    assert!(!scope.has_untracked("step"));
}

#[test]
fn test_const_cannot_be_reassigned() {
    let err = run("const a = 1; a = 2", &ObjectRef::new()).unwrap_err();
    assert_eq!(err, EvalError::type_error("Assignment to constant variable."));
}

#[test]
fn test_if_else_branches() {
    let scope = ObjectRef::from_entries([("open", true)]);
    run("if (open) { label = 'shown' } else { label = 'hidden' }", &scope).unwrap();
    assert_eq!(scope.get("label"), Value::from("shown"));
    scope.set("open", Value::Bool(false));
    run("if (open) { label = 'shown' } else { label = 'hidden' }", &scope).unwrap();
    assert_eq!(scope.get("label"), Value::from("hidden"));
}

#[test]
fn test_return_inside_function_body() {
    let source = "const sign = (n) => { if (n < 0) { return -1 } return n === 0 ? 0 : 1 }; [sign(-4), sign(0), sign(9)].join(' ')";
    assert_eq!(run(source, &ObjectRef::new()).unwrap(), Value::from("-1 0 1"));
}

#[test]
fn test_destructuring_declarations() {
    let scope = ObjectRef::new();
    let value = run("const { id, tags: [first] } = { id: 7, tags: ['new', 'sale'] }; `${id}:${first}`", &scope).unwrap();
    assert_eq!(value, Value::from("7:new"));
}

#[test]
fn test_closures_capture_locals() {
    let scope = ObjectRef::new();
    let value = run("let base = 10; const add = (n) => base + n; base = 20; add(1)", &scope).unwrap();
    assert_eq!(value, Value::from(21.0));
}

#[test]
fn test_syntax_errors_carry_the_expression() {
    let err = run("open &&", &ObjectRef::new()).unwrap_err();
    match err {
        EvalError::Syntax { expression, .. } => assert_eq!(expression, "open &&"),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn test_assign_through_evaluator_seam() {
    let form = ObjectRef::new();
    let scope = ObjectRef::from_entries([("form", Value::Object(form.clone()))]);
    let env = Env::new(ScopeChain::new().with_scope(scope));
    let interpreter = Interpreter::new();

    interpreter.assign("form.email", Value::from("a@b.c"), &env).unwrap();
    assert_eq!(form.get("email"), Value::from("a@b.c"));
    assert!(matches!(
        interpreter.assign("form.email + 1", Value::Null, &env),
        Err(EvalError::InvalidAssignment { .. })
    ));
}

#[test]
fn test_destructure_helper_matches_iteration_patterns() {
    let header = tendril_parser::parse_iteration("({ id, name }, index) in items").unwrap();
    let item = Value::Object(ObjectRef::from_entries([("id", Value::from(3.0)), ("name", Value::from("c"))]));
    let bindings = destructure(&header.item, &item).unwrap();
    assert_eq!(
        bindings,
        vec![("id".to_string(), Value::from(3.0)), ("name".to_string(), Value::from("c"))]
    );
}
