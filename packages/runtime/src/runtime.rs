//! # Runtime Instance
//!
//! [`Tendril`] owns everything one page needs: the document, the host event
//! loop, the registry, the current evaluator, the effect scheduler and the
//! per-element state. Handles are cheap clones of one shared instance.
//!
//! Closures the runtime leaves behind in long-lived places (DOM listeners,
//! the mutation hook, evaluation handles) hold a [`WeakTendril`], so dropping
//! the last handle releases the instance.

use crate::bridge::BridgeState;
use crate::config::Config;
use crate::context::{Evaluation, MagicContext};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{TendrilError, TendrilResult};
use crate::nodes::NodeStore;
use crate::registry::{DirectiveHandler, Registry};
use crate::ticks::NextTicks;
use crate::{directives, magics};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tendril_common::EventLoop;
use tendril_dom::{Dom, NodeId};
use tendril_evaluator::{Binding, Env, EvalError, Interpreter, MagicResolver, PathEvaluator, ScopeChain, SharedEvaluator};
use tendril_reactivity::{FunctionRef, ObjectRef, Scheduler, Value};
use tracing::{debug, info};

pub type ErrorHook = Rc<dyn Fn(&TendrilError)>;

pub(crate) struct Inner {
    pub dom: Dom,
    pub event_loop: EventLoop,
    pub config: Config,
    pub registry: RefCell<Registry>,
    pub evaluator: RefCell<SharedEvaluator>,
    pub scheduler: Scheduler,
    pub nodes: NodeStore,
    pub stores: ObjectRef,
    pub diagnostics: Diagnostics,
    pub bridge: BridgeState,
    pub ticks: NextTicks,
    /// Directive handlers deferred by the tree walks in progress
    pub handler_queues: RefCell<Vec<Vec<Box<dyn FnOnce()>>>>,
    pub error_hooks: RefCell<Vec<ErrorHook>>,
    pub started: Cell<bool>,
    pub next_marker: Cell<u64>,
    pub id_counters: RefCell<HashMap<String, u64>>,
    /// Detached container that receives teleports whose target is missing
    pub scratch: NodeId,
}

#[derive(Clone)]
pub struct Tendril {
    pub(crate) inner: Rc<Inner>,
}

#[derive(Clone)]
pub struct WeakTendril(Weak<Inner>);

impl WeakTendril {
    pub fn upgrade(&self) -> Option<Tendril> {
        self.0.upgrade().map(|inner| Tendril { inner })
    }
}

/// Returned by [`Tendril::register_directive`] to adjust execution order
pub struct DirectiveOrder<'a> {
    tendril: &'a Tendril,
    name: String,
}

impl DirectiveOrder<'_> {
    /// Run this directive right before `other` on the same element
    pub fn before(self, other: &str) {
        self.tendril.inner.registry.borrow_mut().order_before(&self.name, other);
    }
}

impl Tendril {
    pub fn new(dom: Dom, event_loop: EventLoop) -> Self {
        Self::with_config(dom, event_loop, Config::default())
    }

    pub fn with_config(dom: Dom, event_loop: EventLoop, config: Config) -> Self {
        let evaluator: SharedEvaluator = if config.strict_evaluator {
            Rc::new(PathEvaluator)
        } else {
            Rc::new(Interpreter::new())
        };
        let post = event_loop.clone();
        let scheduler = Scheduler::new(move |flush| post.queue_microtask(flush));
        let scratch = dom.create_element("div");

        let tendril = Self {
            inner: Rc::new(Inner {
                dom,
                event_loop,
                config,
                registry: RefCell::new(Registry::new()),
                evaluator: RefCell::new(evaluator),
                scheduler,
                nodes: NodeStore::default(),
                stores: ObjectRef::new(),
                diagnostics: Diagnostics::new(),
                bridge: BridgeState::default(),
                ticks: NextTicks::default(),
                handler_queues: RefCell::new(Vec::new()),
                error_hooks: RefCell::new(Vec::new()),
                started: Cell::new(false),
                next_marker: Cell::new(1),
                id_counters: RefCell::new(HashMap::new()),
                scratch,
            }),
        };
        directives::register_builtins(&tendril);
        magics::register_builtins(&tendril);
        info!(prefix = %tendril.inner.config.prefix, evaluator = tendril.evaluator().name(), "Tendril created");
        tendril
    }

    pub fn downgrade(&self) -> WeakTendril {
        WeakTendril(Rc::downgrade(&self.inner))
    }

    pub fn dom(&self) -> &Dom {
        &self.inner.dom
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.event_loop
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub(crate) fn nodes(&self) -> &NodeStore {
        &self.inner.nodes
    }

    /// Full attribute name for a directive kind under the configured prefix
    pub fn attribute_name(&self, kind: &str) -> String {
        self.inner.config.attribute(kind)
    }

    // Extension surface

    pub fn register_directive(&self, name: &str, handler: impl DirectiveHandler + 'static) -> DirectiveOrder<'_> {
        self.inner.registry.borrow_mut().add_directive(name, Rc::new(handler));
        DirectiveOrder {
            tendril: self,
            name: name.to_string(),
        }
    }

    pub fn register_magic(&self, name: &str, magic: impl Fn(&MagicContext) -> Value + 'static) {
        self.inner.registry.borrow_mut().add_magic(name, Rc::new(magic));
    }

    /// A named scope factory callable from `data` expressions
    pub fn register_data_provider(&self, name: &str, provider: impl Fn(Vec<Value>) -> Value + 'static) {
        self.inner.registry.borrow_mut().add_data_provider(name, Rc::new(provider));
    }

    /// A named bindings-object factory usable as `bind="name"`
    pub fn register_binding(&self, name: &str, provider: impl Fn(NodeId, Vec<Value>) -> Value + 'static) {
        self.inner.registry.borrow_mut().add_binding(name, Rc::new(provider));
    }

    pub fn evaluator(&self) -> SharedEvaluator {
        self.inner.evaluator.borrow().clone()
    }

    /// Swap the expression evaluator; later evaluations use the new one
    pub fn set_evaluator(&self, evaluator: SharedEvaluator) {
        debug!(evaluator = evaluator.name(), "Evaluator replaced");
        *self.inner.evaluator.borrow_mut() = evaluator;
    }

    /// Observe errors rethrown asynchronously by directive handlers
    pub fn on_error(&self, hook: impl Fn(&TendrilError) + 'static) {
        self.inner.error_hooks.borrow_mut().push(Rc::new(hook));
    }

    // Error reporting

    /// Log an expression failure and rethrow it on the next microtask
    pub(crate) fn report_eval(&self, el: NodeId, expression: &str, err: EvalError) {
        self.inner.diagnostics.warn(
            DiagnosticKind::Expression,
            format!("Expression error: {err}"),
            Some(el),
            Some(expression),
        );
        self.rethrow(TendrilError::Eval(err));
    }

    pub(crate) fn warn(&self, kind: DiagnosticKind, message: impl Into<String>, el: Option<NodeId>) {
        self.inner.diagnostics.warn(kind, message, el, None);
    }

    /// Log a structural failure and rethrow it on the next microtask
    pub(crate) fn report(&self, el: Option<NodeId>, err: TendrilError) {
        let kind = match &err {
            TendrilError::DuplicateKey { .. } => DiagnosticKind::DuplicateKey,
            TendrilError::Eval(_) => DiagnosticKind::Expression,
            _ => DiagnosticKind::Misuse,
        };
        self.inner.diagnostics.warn(kind, err.to_string(), el, None);
        self.rethrow(err);
    }

    fn rethrow(&self, err: TendrilError) {
        let hooks: Vec<ErrorHook> = self.inner.error_hooks.borrow().clone();
        if hooks.is_empty() {
            return;
        }
        self.inner.event_loop.queue_microtask(move || {
            for hook in hooks {
                hook(&err);
            }
        });
    }

    // Evaluation

    /// Scope chain an element's expressions resolve against
    pub fn scope(&self, el: NodeId) -> ScopeChain {
        self.inner.nodes.closest_chain(&self.inner.dom, el)
    }

    /// Scope chain plus the element's magics
    pub fn env(&self, el: NodeId) -> Env {
        Env::new(self.scope(el)).with_magics(Rc::new(ElementMagics {
            tendril: self.downgrade(),
            el,
        }))
    }

    pub fn evaluate_later(&self, el: NodeId, binding: impl Into<Binding>) -> Evaluation {
        Evaluation::new(self, el, binding.into())
    }

    /// Evaluate synchronously. Pending promises yield `undefined`.
    pub fn evaluate(&self, el: NodeId, expression: &str) -> TendrilResult<Value> {
        if !self.dom().exists(el) {
            return Err(TendrilError::Detached(el));
        }
        let evaluator = self.evaluator();
        let value = evaluator.evaluate(expression, &self.env(el))?;
        Ok(match value {
            Value::Promise(promise) => match promise.now_or_never() {
                Some(Ok(value)) => value,
                Some(Err(reason)) => {
                    return Err(EvalError::Rejected {
                        reason: reason.to_display_string(),
                    }
                    .into())
                }
                None => Value::Undefined,
            },
            other => other,
        })
    }

    /// Write through an assignable expression, as two-way bindings do
    pub fn assign(&self, el: NodeId, target: &str, value: Value) -> TendrilResult<()> {
        let evaluator = self.evaluator();
        evaluator.assign(target, value, &self.env(el))?;
        Ok(())
    }

    /// The element's merged scope as a value (`$data`)
    pub fn data(&self, el: NodeId) -> Value {
        Env::new(self.scope(el)).this_value()
    }

    pub(crate) fn next_marker(&self) -> u64 {
        let marker = self.inner.next_marker.get();
        self.inner.next_marker.set(marker + 1);
        marker
    }

    /// Wrap a Rust closure as an expression-callable function value
    pub fn function(name: &str, f: impl Fn(Vec<Value>) -> Value + 'static) -> Value {
        Value::Function(FunctionRef::named(name, move |_, args| Ok(f(args))))
    }

    /// Detail payload for custom events
    pub fn event_detail(value: Value) -> Option<Rc<dyn Any>> {
        Some(Rc::new(value))
    }
}

impl std::fmt::Debug for Tendril {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tendril")
            .field("prefix", &self.inner.config.prefix)
            .field("started", &self.inner.started.get())
            .field("nodes", &self.inner.nodes.len())
            .finish()
    }
}

/// Resolves `$name` through the registry for one element
struct ElementMagics {
    tendril: WeakTendril,
    el: NodeId,
}

impl MagicResolver for ElementMagics {
    fn resolve(&self, name: &str) -> Option<Value> {
        let tendril = self.tendril.upgrade()?;
        let magic = tendril.inner.registry.borrow().magic(name)?;
        let cx = MagicContext::new(&tendril, self.el);
        Some(magic(&cx))
    }
}
