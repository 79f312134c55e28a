//! The swappable evaluator seam and result delivery
//!
//! Directives never call an evaluator directly. They go through a
//! [`Delivery`], which runs the binding, auto-calls function results with the
//! call-site arguments, and unwraps promises. Synchronous and already-settled
//! results reach the receiver before [`Delivery::run`] returns; pending
//! promises deliver from a spawned local task once they settle.

use crate::env::Env;
use crate::error::{EvalError, EvalResult};
use std::rc::Rc;
use tendril_common::EventLoop;
use tendril_reactivity::{FunctionRef, Value};

/// Function results are auto-called at most this many levels deep
const MAX_AUTO_CALL_DEPTH: usize = 16;

pub trait Evaluator {
    fn name(&self) -> &str;

    /// Evaluate `source` against `env`
    fn evaluate(&self, source: &str, env: &Env) -> EvalResult<Value>;

    /// Write `value` to the location named by `target` (used by two-way bindings)
    fn assign(&self, target: &str, value: Value, env: &Env) -> EvalResult<()>;
}

pub type SharedEvaluator = Rc<dyn Evaluator>;

/// What a directive evaluates: expression text or a function supplied from Rust
#[derive(Clone, Debug)]
pub enum Binding {
    Source(Rc<str>),
    Function(FunctionRef),
}

impl Binding {
    pub fn source(&self) -> Option<&str> {
        match self {
            Binding::Source(source) => Some(source),
            Binding::Function(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Binding::Source(source) if source.trim().is_empty())
    }
}

impl From<&str> for Binding {
    fn from(source: &str) -> Self {
        Binding::Source(Rc::from(source))
    }
}

impl From<FunctionRef> for Binding {
    fn from(function: FunctionRef) -> Self {
        Binding::Function(function)
    }
}

pub type ErrorSink = Rc<dyn Fn(EvalError)>;

/// Runs bindings and hands their settled results to receivers
#[derive(Clone)]
pub struct Delivery {
    event_loop: EventLoop,
    args: Rc<Vec<Value>>,
    auto_call: bool,
    on_error: ErrorSink,
}

impl Delivery {
    pub fn new(event_loop: EventLoop, on_error: ErrorSink) -> Self {
        Self {
            event_loop,
            args: Rc::new(Vec::new()),
            auto_call: true,
            on_error,
        }
    }

    /// Arguments passed when a function result is auto-called
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = Rc::new(args);
        self
    }

    /// Deliver function results as values instead of calling them
    pub fn without_auto_call(mut self) -> Self {
        self.auto_call = false;
        self
    }

    pub fn run(&self, evaluator: &dyn Evaluator, binding: &Binding, env: &Env, receiver: impl FnOnce(Value) + 'static) {
        let this = env.this_value();
        let result = match binding {
            Binding::Source(source) => evaluator.evaluate(source, env),
            Binding::Function(function) => function
                .call(this.clone(), self.args.as_ref().clone())
                .map_err(EvalError::from),
        };
        match result {
            Ok(value) => self.deliver(value, this, Box::new(receiver), 0),
            Err(err) => (self.on_error)(err),
        }
    }

    fn deliver(&self, value: Value, this: Value, receiver: Box<dyn FnOnce(Value)>, depth: usize) {
        match value {
            Value::Function(function) if self.auto_call && depth < MAX_AUTO_CALL_DEPTH => {
                match function.call(this.clone(), self.args.as_ref().clone()) {
                    Ok(result) => self.deliver(result, this, receiver, depth + 1),
                    Err(err) => (self.on_error)(err.into()),
                }
            }
            Value::Promise(promise) => match promise.now_or_never() {
                Some(Ok(value)) => self.deliver(value, this, receiver, depth + 1),
                Some(Err(reason)) => (self.on_error)(rejected(&reason)),
                None => {
                    let delivery = self.clone();
                    self.event_loop.spawn_local(async move {
                        match promise.settled().await {
                            Ok(value) => delivery.deliver(value, this, receiver, depth + 1),
                            Err(reason) => (delivery.on_error)(rejected(&reason)),
                        }
                    });
                }
            },
            other => receiver(other),
        }
    }
}

fn rejected(reason: &Value) -> EvalError {
    EvalError::Rejected {
        reason: reason.to_display_string(),
    }
}
