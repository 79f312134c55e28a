//! Tree-walking interpreter for binding expressions
//!
//! Programs are parsed once through the [`AstCache`] and evaluated against an
//! [`Env`]. Identifiers resolve through lexical locals, the environment
//! (call-site extras, magics and the scope chain) and finally the builtins.
//! Anything still unresolved is `undefined`.

use crate::builtins;
use crate::cache::{AstCache, Parsed};
use crate::env::Env;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tendril_parser::{
    AssignOp, BinaryOp, DeclarationKind, Element, Expression, FunctionBody, FunctionExpr, Literal,
    LogicalOp, MemberProperty, Pattern, Program, Property, PropertyKey, Span, Statement, TemplatePart,
    UnaryOp, UpdateOp,
};
use tendril_reactivity::{format_number, CallError, CallResult, Callable, FunctionRef, ObjectRef, Value};
use tracing::instrument;

pub const MAX_CALL_DEPTH: usize = 64;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> CallResult<Self> {
        DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(CallError::DepthExceeded {
                    limit: MAX_CALL_DEPTH,
                });
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

struct Local {
    value: Value,
    mutable: bool,
}

/// Lexical bindings introduced by declarations and function parameters
#[derive(Default)]
struct Frame {
    vars: RefCell<IndexMap<String, Local>>,
    parent: Option<Rc<Frame>>,
}

impl Frame {
    fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn child(parent: &Rc<Frame>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::default(),
            parent: Some(parent.clone()),
        })
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(local) = self.vars.borrow().get(name) {
            return Some(local.value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), Local { value, mutable });
    }

    /// `None` when no frame declares `name`
    fn assign(&self, name: &str, value: Value) -> Option<EvalResult<()>> {
        if let Some(local) = self.vars.borrow_mut().get_mut(name) {
            if !local.mutable {
                return Some(Err(EvalError::type_error("Assignment to constant variable.")));
            }
            local.value = value;
            return Some(Ok(()));
        }
        self.parent.as_ref().and_then(|parent| parent.assign(name, value))
    }
}

enum Flow {
    Normal(Option<Value>),
    Return(Value),
}

#[derive(Clone)]
struct Context {
    env: Env,
    frame: Rc<Frame>,
    this: Value,
    source: Rc<str>,
}

impl Context {
    fn with_frame(&self, frame: Rc<Frame>) -> Self {
        Self {
            frame,
            ..self.clone()
        }
    }

    fn text(&self, span: Span) -> &str {
        self.source.get(span.start..span.end).map_or("expression", str::trim)
    }
}

/// A writable location resolved once so compound assignments evaluate the
/// target's object only once
enum Place {
    Name(String),
    Property(Value, String),
}

/// The default evaluator
#[derive(Default)]
pub struct Interpreter {
    cache: AstCache,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &AstCache {
        &self.cache
    }

    /// Run an already parsed program
    pub fn run(&self, parsed: &Parsed, env: &Env) -> EvalResult<Value> {
        let ctx = Context {
            env: env.clone(),
            frame: Frame::root(),
            this: env.this_value(),
            source: parsed.source.clone(),
        };
        run_program(&parsed.program, &ctx)
    }
}

impl Evaluator for Interpreter {
    fn name(&self) -> &str {
        "interpreter"
    }

    #[instrument(level = "trace", skip(self, env))]
    fn evaluate(&self, source: &str, env: &Env) -> EvalResult<Value> {
        let parsed = self.cache.get_or_parse(source)?;
        self.run(&parsed, env)
    }

    fn assign(&self, target: &str, value: Value, env: &Env) -> EvalResult<()> {
        let parsed = self.cache.get_or_parse(target)?;
        let expr = parsed
            .program
            .as_single_expression()
            .filter(|expr| expr.is_assignable())
            .ok_or_else(|| EvalError::InvalidAssignment {
                target: target.to_string(),
            })?;
        let ctx = Context {
            env: env.clone(),
            frame: Frame::root(),
            this: env.this_value(),
            source: parsed.source.clone(),
        };
        let place = resolve_place(expr, &ctx)?;
        write_place(&place, value, &ctx)
    }
}

fn run_program(program: &Program, ctx: &Context) -> EvalResult<Value> {
    match exec_block(&program.body, ctx)? {
        Flow::Return(value) | Flow::Normal(Some(value)) => Ok(value),
        Flow::Normal(None) => Ok(Value::Undefined),
    }
}

fn exec_block(body: &[Statement], ctx: &Context) -> EvalResult<Flow> {
    let mut last = None;
    for statement in body {
        match exec(statement, ctx)? {
            Flow::Return(value) => return Ok(Flow::Return(value)),
            Flow::Normal(Some(value)) => last = Some(value),
            Flow::Normal(None) => {}
        }
    }
    Ok(Flow::Normal(last))
}

fn exec(statement: &Statement, ctx: &Context) -> EvalResult<Flow> {
    match statement {
        Statement::Expression(expr) => Ok(Flow::Normal(Some(eval(expr, ctx)?))),
        Statement::Declaration {
            kind, pattern, init, ..
        } => {
            let value = match init {
                Some(init) => eval(init, ctx)?,
                None => Value::Undefined,
            };
            let mutable = *kind != DeclarationKind::Const;
            for (name, value) in destructure(pattern, &value)? {
                ctx.frame.declare(&name, value, mutable);
            }
            Ok(Flow::Normal(None))
        }
        Statement::If {
            test,
            consequent,
            alternate,
            ..
        } => {
            let branch = if eval(test, ctx)?.is_truthy() {
                Some(consequent)
            } else {
                alternate.as_ref()
            };
            match branch {
                Some(body) => exec_block(body, &ctx.with_frame(Frame::child(&ctx.frame))),
                None => Ok(Flow::Normal(None)),
            }
        }
        Statement::Return { argument, .. } => {
            let value = match argument {
                Some(argument) => eval(argument, ctx)?,
                None => Value::Undefined,
            };
            Ok(Flow::Return(value))
        }
        Statement::Block { body, .. } => exec_block(body, &ctx.with_frame(Frame::child(&ctx.frame))),
    }
}

/// Bindings produced by matching `value` against `pattern`
pub fn destructure(pattern: &Pattern, value: &Value) -> EvalResult<Vec<(String, Value)>> {
    let mut bindings = Vec::new();
    bind_pattern(pattern, value, &mut bindings)?;
    Ok(bindings)
}

fn bind_pattern(pattern: &Pattern, value: &Value, out: &mut Vec<(String, Value)>) -> EvalResult<()> {
    match pattern {
        Pattern::Identifier(name) => out.push((name.clone(), value.clone())),
        Pattern::Array(items) => {
            if value.is_nullish() {
                return Err(EvalError::type_error(format!(
                    "{} is not iterable",
                    value.to_display_string()
                )));
            }
            for (index, item) in items.iter().enumerate() {
                if let Some(item) = item {
                    bind_pattern(item, &value.get(&index.to_string()), out)?;
                }
            }
        }
        Pattern::Object(entries) => {
            if value.is_nullish() {
                return Err(EvalError::type_error(format!(
                    "Cannot destructure '{}' as it is {}.",
                    value.to_display_string(),
                    value.to_display_string()
                )));
            }
            for (key, item) in entries {
                bind_pattern(item, &value.get(key), out)?;
            }
        }
    }
    Ok(())
}

fn lookup(name: &str, ctx: &Context) -> Value {
    if let Some(value) = ctx.frame.lookup(name) {
        return value;
    }
    if let Some(value) = ctx.env.resolve(name) {
        return value;
    }
    builtins::global(name).unwrap_or_default()
}

fn eval(expr: &Expression, ctx: &Context) -> EvalResult<Value> {
    match expr {
        Expression::Literal { value, .. } => Ok(match value {
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::string(s),
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
            Literal::Undefined => Value::Undefined,
        }),
        Expression::Template { parts, .. } => {
            let mut out = String::new();
            for part in parts {
                match part {
                    TemplatePart::Literal(text) => out.push_str(text),
                    TemplatePart::Expression(expr) => out.push_str(&eval(expr, ctx)?.to_display_string()),
                }
            }
            Ok(Value::from(out))
        }
        Expression::Identifier { name, .. } => Ok(lookup(name, ctx)),
        Expression::This { .. } => Ok(ctx.this.clone()),
        Expression::Array { elements, .. } => Ok(Value::from(eval_elements(elements, ctx)?)),
        Expression::Object { properties, .. } => eval_object(properties, ctx),
        Expression::Member { .. } | Expression::Call { .. } => Ok(eval_chain(expr, ctx)?.unwrap_or_default()),
        Expression::Unary {
            operator, argument, ..
        } => {
            let value = eval(argument, ctx)?;
            Ok(match operator {
                UnaryOp::Not => Value::Bool(!value.is_truthy()),
                UnaryOp::Negate => Value::Number(-value.to_number()),
                UnaryOp::Plus => Value::Number(value.to_number()),
                UnaryOp::Typeof => Value::from(value.type_of()),
            })
        }
        Expression::Update {
            operator,
            prefix,
            target,
            ..
        } => {
            let place = resolve_place(target, ctx)?;
            let old = read_place(&place, ctx)?.to_number();
            let new = match operator {
                UpdateOp::Increment => old + 1.0,
                UpdateOp::Decrement => old - 1.0,
            };
            write_place(&place, Value::Number(new), ctx)?;
            Ok(Value::Number(if *prefix { new } else { old }))
        }
        Expression::Binary {
            left, operator, right, ..
        } => {
            let left = eval(left, ctx)?;
            let right = eval(right, ctx)?;
            binary(*operator, left, right)
        }
        Expression::Logical {
            left, operator, right, ..
        } => {
            let left = eval(left, ctx)?;
            let short_circuits = match operator {
                LogicalOp::And => !left.is_truthy(),
                LogicalOp::Or => left.is_truthy(),
                LogicalOp::Nullish => !left.is_nullish(),
            };
            if short_circuits {
                Ok(left)
            } else {
                eval(right, ctx)
            }
        }
        Expression::Conditional {
            test,
            consequent,
            alternate,
            ..
        } => {
            if eval(test, ctx)?.is_truthy() {
                eval(consequent, ctx)
            } else {
                eval(alternate, ctx)
            }
        }
        Expression::Assignment {
            target,
            operator,
            value,
            ..
        } => eval_assignment(target, *operator, value, ctx),
        Expression::Function(function) => Ok(make_closure(function, ctx)),
    }
}

fn make_closure(function: &Rc<FunctionExpr>, ctx: &Context) -> Value {
    Value::Function(FunctionRef::new(Closure {
        function: function.clone(),
        env: ctx.env.clone(),
        frame: ctx.frame.clone(),
        this: ctx.this.clone(),
        source: ctx.source.clone(),
    }))
}

fn eval_elements(elements: &[Element], ctx: &Context) -> EvalResult<Vec<Value>> {
    let mut values = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            Element::Item(expr) => values.push(eval(expr, ctx)?),
            Element::Spread(expr) => match eval(expr, ctx)?.unwrap_ref() {
                Value::Array(array) => values.extend(array.snapshot()),
                Value::String(s) => values.extend(s.chars().map(|c| Value::from(c.to_string()))),
                other => {
                    return Err(EvalError::type_error(format!(
                        "{} is not iterable",
                        other.to_display_string()
                    )))
                }
            },
        }
    }
    Ok(values)
}

fn property_key(key: &PropertyKey, ctx: &Context) -> EvalResult<String> {
    match key {
        PropertyKey::Named(name) => Ok(name.clone()),
        PropertyKey::Computed(expr) => Ok(key_string(&eval(expr, ctx)?)),
    }
}

fn key_string(value: &Value) -> String {
    match value {
        Value::Number(n) => format_number(*n),
        other => other.to_display_string(),
    }
}

fn eval_object(properties: &[Property], ctx: &Context) -> EvalResult<Value> {
    let object = ObjectRef::new();
    for property in properties {
        match property {
            Property::KeyValue { key, value } => {
                let key = property_key(key, ctx)?;
                object.set(&key, eval(value, ctx)?);
            }
            Property::Shorthand(name) => {
                object.set(name, lookup(name, ctx));
            }
            Property::Method { key, function } => {
                let key = property_key(key, ctx)?;
                object.set(&key, make_closure(function, ctx));
            }
            Property::Getter { key, function } => {
                let key = property_key(key, ctx)?;
                if let Value::Function(getter) = make_closure(function, ctx) {
                    object.define_getter(&key, getter);
                }
            }
            Property::Spread(expr) => match eval(expr, ctx)?.unwrap_ref() {
                Value::Object(source) => {
                    for (key, value) in source.entries() {
                        object.set(&key, value);
                    }
                }
                Value::Array(array) => {
                    for (index, value) in array.snapshot().into_iter().enumerate() {
                        object.set(&index.to_string(), value);
                    }
                }
                _ => {}
            },
        }
    }
    Ok(Value::Object(object))
}

fn member_key(property: &MemberProperty, ctx: &Context) -> EvalResult<String> {
    match property {
        MemberProperty::Named(name) => Ok(name.clone()),
        MemberProperty::Computed(expr) => Ok(key_string(&eval(expr, ctx)?)),
    }
}

/// Evaluate a member/call chain. `None` means an optional link short-circuited
/// and the whole chain is `undefined`.
fn eval_chain(expr: &Expression, ctx: &Context) -> EvalResult<Option<Value>> {
    match expr {
        Expression::Member {
            object,
            property,
            optional,
            ..
        } => {
            let Some(target) = eval_chain(object, ctx)? else {
                return Ok(None);
            };
            let target = target.unwrap_ref();
            if target.is_nullish() {
                if *optional {
                    return Ok(None);
                }
                let key = member_key(property, ctx)?;
                return Err(EvalError::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target.to_display_string(),
                    key
                )));
            }
            let key = member_key(property, ctx)?;
            Ok(Some(get_member(&target, &key)))
        }
        Expression::Call {
            callee,
            arguments,
            optional,
            ..
        } => {
            let Some((this, function)) = eval_callee(callee, ctx)? else {
                return Ok(None);
            };
            if *optional && function.is_nullish() {
                return Ok(None);
            }
            let args = eval_elements(arguments, ctx)?;
            match function.unwrap_ref() {
                Value::Function(f) => Ok(Some(f.call(this, args)?)),
                _ => Err(CallError::not_callable(ctx.text(callee.span())).into()),
            }
        }
        other => Ok(Some(eval(other, ctx)?)),
    }
}

/// Resolve a callee to its receiver and function value
fn eval_callee(callee: &Expression, ctx: &Context) -> EvalResult<Option<(Value, Value)>> {
    match callee {
        Expression::Member {
            object,
            property,
            optional,
            ..
        } => {
            let Some(target) = eval_chain(object, ctx)? else {
                return Ok(None);
            };
            let target = target.unwrap_ref();
            if target.is_nullish() {
                if *optional {
                    return Ok(None);
                }
                let key = member_key(property, ctx)?;
                return Err(EvalError::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target.to_display_string(),
                    key
                )));
            }
            let key = member_key(property, ctx)?;
            let function = get_member(&target, &key);
            Ok(Some((target, function)))
        }
        Expression::Identifier { name, .. } if ctx.frame.lookup(name).is_none() => {
            Ok(Some((ctx.env.this_value(), lookup(name, ctx))))
        }
        other => Ok(eval_chain(other, ctx)?.map(|function| (Value::Undefined, function))),
    }
}

/// Property read including built-in methods of arrays, strings, numbers and promises
pub fn get_member(target: &Value, key: &str) -> Value {
    match target {
        Value::Object(object) => {
            let value = object.get(key);
            if value.is_undefined() && !object.has(key) {
                if let Some(method) = builtins::method(target, key) {
                    return Value::Function(method);
                }
            }
            value
        }
        Value::Array(_) | Value::String(_) => {
            if key == "length" || key.parse::<usize>().is_ok() {
                return target.get(key);
            }
            builtins::method(target, key).map_or(Value::Undefined, Value::Function)
        }
        Value::Function(function) if key == "name" => Value::from(function.name().unwrap_or_default()),
        Value::Host(_) => target.get(key),
        Value::Ref(cell) => get_member(&cell.get(), key),
        other => builtins::method(other, key).map_or(Value::Undefined, Value::Function),
    }
}

fn resolve_place(target: &Expression, ctx: &Context) -> EvalResult<Place> {
    match target {
        Expression::Identifier { name, .. } => Ok(Place::Name(name.clone())),
        Expression::Member {
            object,
            property,
            optional: false,
            ..
        } => {
            let object = eval(object, ctx)?.unwrap_ref();
            let key = member_key(property, ctx)?;
            if object.is_nullish() {
                return Err(EvalError::type_error(format!(
                    "Cannot set properties of {} (setting '{}')",
                    object.to_display_string(),
                    key
                )));
            }
            Ok(Place::Property(object, key))
        }
        other => Err(EvalError::InvalidAssignment {
            target: ctx.text(other.span()).to_string(),
        }),
    }
}

fn read_place(place: &Place, ctx: &Context) -> EvalResult<Value> {
    Ok(match place {
        Place::Name(name) => lookup(name, ctx),
        Place::Property(object, key) => get_member(object, key),
    })
}

fn write_place(place: &Place, value: Value, ctx: &Context) -> EvalResult<()> {
    match place {
        Place::Name(name) => {
            if let Some(result) = ctx.frame.assign(name, value.clone()) {
                return result;
            }
            if ctx.env.assign(name, value) {
                Ok(())
            } else {
                Err(EvalError::InvalidAssignment { target: name.clone() })
            }
        }
        Place::Property(object, key) => {
            object.try_set(key, value)?;
            Ok(())
        }
    }
}

fn eval_assignment(target: &Expression, operator: AssignOp, value: &Expression, ctx: &Context) -> EvalResult<Value> {
    if !target.is_assignable() {
        return Err(EvalError::InvalidAssignment {
            target: ctx.text(target.span()).to_string(),
        });
    }
    let place = resolve_place(target, ctx)?;
    let result = match operator {
        AssignOp::Assign => eval(value, ctx)?,
        AssignOp::Or | AssignOp::And | AssignOp::Nullish => {
            let current = read_place(&place, ctx)?;
            let keep = match operator {
                AssignOp::Or => current.is_truthy(),
                AssignOp::And => !current.is_truthy(),
                _ => !current.is_nullish(),
            };
            if keep {
                return Ok(current);
            }
            eval(value, ctx)?
        }
        AssignOp::Add | AssignOp::Subtract | AssignOp::Multiply | AssignOp::Divide => {
            let current = read_place(&place, ctx)?;
            let operand = eval(value, ctx)?;
            let op = match operator {
                AssignOp::Add => BinaryOp::Add,
                AssignOp::Subtract => BinaryOp::Subtract,
                AssignOp::Multiply => BinaryOp::Multiply,
                _ => BinaryOp::Divide,
            };
            binary(op, current, operand)?
        }
    };
    write_place(&place, result.clone(), ctx)?;
    Ok(result)
}

fn to_primitive(value: Value) -> Value {
    match value.unwrap_ref() {
        composite @ (Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Host(_) | Value::Promise(_)) => {
            Value::from(composite.to_display_string())
        }
        other => other,
    }
}

fn binary(operator: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    let (left, right) = (left.unwrap_ref(), right.unwrap_ref());
    Ok(match operator {
        BinaryOp::Add => {
            let (left, right) = (to_primitive(left), to_primitive(right));
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                Value::from(format!("{}{}", left.to_display_string(), right.to_display_string()))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Equals => Value::Bool(left.loose_equals(&right)),
        BinaryOp::NotEquals => Value::Bool(!left.loose_equals(&right)),
        BinaryOp::StrictEquals => Value::Bool(left.strict_equals(&right)),
        BinaryOp::StrictNotEquals => Value::Bool(!left.strict_equals(&right)),
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => Value::Bool(compare(operator, to_primitive(left), to_primitive(right))),
        BinaryOp::In => {
            let key = key_string(&left);
            Value::Bool(match &right {
                Value::Object(object) => object.has(&key),
                Value::Array(array) => key == "length" || key.parse::<usize>().is_ok_and(|index| index < array.len()),
                Value::Host(host) => host.keys().iter().any(|k| *k == key),
                other => {
                    return Err(EvalError::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        other.to_display_string()
                    )))
                }
            })
        }
    })
}

fn compare(operator: BinaryOp, left: Value, right: Value) -> bool {
    let ordering = match (&left, &right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match operator {
        BinaryOp::LessThan => ordering.is_lt(),
        BinaryOp::LessThanOrEqual => ordering.is_le(),
        BinaryOp::GreaterThan => ordering.is_gt(),
        _ => ordering.is_ge(),
    }
}

/// A function defined inside an expression
struct Closure {
    function: Rc<FunctionExpr>,
    env: Env,
    frame: Rc<Frame>,
    /// `this` at the definition site; used by arrow functions
    this: Value,
    source: Rc<str>,
}

impl Callable for Closure {
    fn call(&self, this: Value, args: Vec<Value>) -> CallResult<Value> {
        let _guard = DepthGuard::enter()?;
        let this = if self.function.is_arrow {
            self.this.clone()
        } else if this.is_undefined() {
            self.env.this_value()
        } else {
            this
        };

        let frame = Frame::child(&self.frame);
        for (index, param) in self.function.params.iter().enumerate() {
            let arg = args.get(index).cloned().unwrap_or_default();
            for (name, value) in destructure(param, &arg)? {
                frame.declare(&name, value, true);
            }
        }

        let ctx = Context {
            env: self.env.clone(),
            frame,
            this,
            source: self.source.clone(),
        };
        match &self.function.body {
            FunctionBody::Expression(expr) => Ok(eval(expr, &ctx)?),
            FunctionBody::Block(body) => match exec_block(body, &ctx)? {
                Flow::Return(value) => Ok(value),
                Flow::Normal(_) => Ok(Value::Undefined),
            },
        }
    }

    fn name(&self) -> Option<&str> {
        self.function.name.as_deref()
    }
}
