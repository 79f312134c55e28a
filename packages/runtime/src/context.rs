//! What directive handlers and magics get to work with

use crate::directive::Directive;
use crate::nodes::Cleanups;
use crate::runtime::{Tendril, WeakTendril};
use std::rc::Rc;
use tendril_dom::{Dom, NodeId};
use tendril_evaluator::{Binding, Delivery};
use tendril_reactivity::{release, EffectHandle, Value};

/// A deferred evaluation of one binding against one element's scope.
///
/// Holds the runtime weakly: once the instance is gone, runs are no-ops.
#[derive(Clone)]
pub struct Evaluation {
    tendril: WeakTendril,
    el: NodeId,
    binding: Binding,
    auto_call: bool,
}

impl Evaluation {
    pub(crate) fn new(tendril: &Tendril, el: NodeId, binding: Binding) -> Self {
        Self {
            tendril: tendril.downgrade(),
            el,
            binding,
            auto_call: true,
        }
    }

    /// Deliver function results as values instead of calling them
    pub fn without_auto_call(mut self) -> Self {
        self.auto_call = false;
        self
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn run(&self, receiver: impl FnOnce(Value) + 'static) {
        self.run_with(Vec::new(), Vec::new(), receiver)
    }

    /// Run with call-site names (`$event`, `__placeholder`) and the arguments
    /// an auto-called function result receives
    pub fn run_with(&self, extras: Vec<(&str, Value)>, args: Vec<Value>, receiver: impl FnOnce(Value) + 'static) {
        let Some(tendril) = self.tendril.upgrade() else {
            return;
        };
        if self.binding.is_empty() {
            receiver(Value::Undefined);
            return;
        }
        let mut env = tendril.env(self.el);
        for (name, value) in extras {
            env = env.with_extra(name, value);
        }

        let sink_tendril = self.tendril.clone();
        let el = self.el;
        let expression: Rc<str> = Rc::from(self.binding.source().unwrap_or("<function>"));
        let mut delivery = Delivery::new(
            tendril.event_loop().clone(),
            Rc::new(move |err| {
                if let Some(tendril) = sink_tendril.upgrade() {
                    tendril.report_eval(el, &expression, err);
                }
            }),
        )
        .with_args(args);
        if !self.auto_call {
            delivery = delivery.without_auto_call();
        }
        let evaluator = tendril.evaluator();
        delivery.run(evaluator.as_ref(), &self.binding, &env, receiver);
    }

    /// The synchronously delivered result, `undefined` if none arrived
    pub fn value(&self) -> Value {
        self.value_with(Vec::new())
    }

    pub fn value_with(&self, extras: Vec<(&str, Value)>) -> Value {
        let slot = Rc::new(std::cell::RefCell::new(Value::Undefined));
        let writer = slot.clone();
        self.run_with(extras, Vec::new(), move |value| *writer.borrow_mut() = value);
        let value = slot.borrow().clone();
        value
    }
}

/// Handed to a directive handler for one directive on one element
#[derive(Clone)]
pub struct DirectiveContext {
    tendril: Tendril,
    el: NodeId,
    directive: Rc<Directive>,
    cleanups: Cleanups,
}

impl DirectiveContext {
    pub(crate) fn new(tendril: Tendril, el: NodeId, directive: Directive, cleanups: Cleanups) -> Self {
        Self {
            tendril,
            el,
            directive: Rc::new(directive),
            cleanups,
        }
    }

    pub fn tendril(&self) -> &Tendril {
        &self.tendril
    }

    pub fn dom(&self) -> &Dom {
        self.tendril.dom()
    }

    pub fn el(&self) -> NodeId {
        self.el
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    pub fn value(&self) -> &str {
        self.directive.value()
    }

    pub fn has_modifier(&self, name: &str) -> bool {
        self.directive.has_modifier(name)
    }

    /// Evaluation of this directive's own expression
    pub fn evaluate_later(&self) -> Evaluation {
        self.tendril.evaluate_later(self.el, self.directive.expression.clone())
    }

    pub fn evaluate_source_later(&self, source: &str) -> Evaluation {
        self.tendril.evaluate_later(self.el, source)
    }

    /// Synchronous result of this directive's expression
    pub fn evaluate(&self) -> Value {
        self.evaluate_later().value()
    }

    /// A scheduled effect released when the directive is cleaned up
    pub fn effect(&self, f: impl Fn() + 'static) -> EffectHandle {
        let handle = self.tendril.scheduler().effect(f);
        self.cleanups.push(move || release(handle));
        handle
    }

    pub fn cleanup(&self, f: impl FnOnce() + 'static) {
        self.cleanups.push(f);
    }

    pub fn cleanups(&self) -> &Cleanups {
        &self.cleanups
    }
}

/// Handed to a magic each time an expression reads it
pub struct MagicContext {
    tendril: Tendril,
    el: NodeId,
}

impl MagicContext {
    pub(crate) fn new(tendril: &Tendril, el: NodeId) -> Self {
        Self {
            tendril: tendril.clone(),
            el,
        }
    }

    pub fn tendril(&self) -> &Tendril {
        &self.tendril
    }

    pub fn dom(&self) -> &Dom {
        self.tendril.dom()
    }

    pub fn el(&self) -> NodeId {
        self.el
    }

    /// Runs when the element is destroyed
    pub fn cleanup(&self, f: impl FnOnce() + 'static) {
        self.tendril.nodes().element_cleanups(self.el).push(f);
    }

    pub fn evaluate_later(&self, binding: impl Into<Binding>) -> Evaluation {
        self.tendril.evaluate_later(self.el, binding)
    }
}
