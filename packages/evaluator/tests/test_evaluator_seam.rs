//! Swapping evaluators behind the shared trait object

use std::cell::RefCell;
use std::rc::Rc;
use tendril_common::EventLoop;
use tendril_evaluator::{
    Binding, Delivery, Env, EvalError, Interpreter, MagicResolver, PathEvaluator, ScopeChain, SharedEvaluator,
};
use tendril_reactivity::{ObjectRef, PromiseValue, Value};

struct Store(ObjectRef);

impl MagicResolver for Store {
    fn resolve(&self, name: &str) -> Option<Value> {
        (name == "$store").then(|| Value::Object(self.0.clone()))
    }
}

fn env() -> (Env, ObjectRef) {
    let cart = ObjectRef::from_entries([("count", 2.0)]);
    let store = ObjectRef::from_entries([("cart", Value::Object(cart))]);
    let scope = ObjectRef::from_entries([("open", Value::Bool(false))]);
    let env = Env::new(ScopeChain::new().with_scope(scope.clone())).with_magics(Rc::new(Store(store)));
    (env, scope)
}

#[test]
fn test_both_evaluators_agree_on_paths() {
    let (env, _) = env();
    let evaluators: Vec<SharedEvaluator> = vec![Rc::new(Interpreter::new()), Rc::new(PathEvaluator)];
    for evaluator in evaluators {
        assert_eq!(
            evaluator.evaluate("$store.cart.count", &env).unwrap(),
            Value::from(2.0),
            "{} evaluator",
            evaluator.name()
        );
        assert_eq!(evaluator.evaluate("!open", &env).unwrap(), Value::Bool(true));
    }
}

#[test]
fn test_delivery_reports_rejections() {
    let event_loop = EventLoop::new();
    let errors: Rc<RefCell<Vec<EvalError>>> = Rc::default();
    let sink = errors.clone();
    let delivery = Delivery::new(event_loop.clone(), Rc::new(move |err: EvalError| sink.borrow_mut().push(err)));

    let (env, scope) = env();
    scope.set("failing", Value::Promise(PromiseValue::rejected(Value::from("offline"))));
    let delivered = Rc::new(RefCell::new(false));
    let flag = delivered.clone();
    delivery.run(&Interpreter::new(), &Binding::from("failing"), &env, move |_| *flag.borrow_mut() = true);
    event_loop.run_until_idle();

    assert!(!*delivered.borrow());
    assert_eq!(
        errors.borrow().as_slice(),
        &[EvalError::Rejected {
            reason: "offline".to_string()
        }]
    );
}

#[test]
fn test_promise_chains_resolve_through_the_event_loop() {
    let event_loop = EventLoop::new();
    let delivery = Delivery::new(event_loop.clone(), Rc::new(|_: EvalError| {}));
    let (promise, resolver) = PromiseValue::deferred();
    let (env, scope) = env();
    scope.set("request", Value::Promise(promise));

    let result = Rc::new(RefCell::new(Value::Undefined));
    let slot = result.clone();
    delivery.run(
        &Interpreter::new(),
        &Binding::from("request.then(n => n * 2)"),
        &env,
        move |value| *slot.borrow_mut() = value,
    );
    resolver.resolve(Value::from(21.0));
    event_loop.run_until_idle();
    assert_eq!(*result.borrow(), Value::from(42.0));
}
