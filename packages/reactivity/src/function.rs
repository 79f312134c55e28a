use crate::error::CallResult;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Anything that can be invoked from an expression
pub trait Callable {
    fn call(&self, this: Value, args: Vec<Value>) -> CallResult<Value>;

    fn name(&self) -> Option<&str> {
        None
    }
}

struct NativeFunction<F> {
    name: Option<String>,
    f: F,
}

impl<F> Callable for NativeFunction<F>
where
    F: Fn(Value, Vec<Value>) -> CallResult<Value>,
{
    fn call(&self, this: Value, args: Vec<Value>) -> CallResult<Value> {
        (self.f)(this, args)
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Shared handle to a callable; equality is identity
#[derive(Clone)]
pub struct FunctionRef(Rc<dyn Callable>);

impl FunctionRef {
    pub fn new(callable: impl Callable + 'static) -> Self {
        Self(Rc::new(callable))
    }

    /// Wrap a Rust closure receiving `this` and the argument list
    pub fn native(f: impl Fn(Value, Vec<Value>) -> CallResult<Value> + 'static) -> Self {
        Self::new(NativeFunction { name: None, f })
    }

    pub fn named(name: &str, f: impl Fn(Value, Vec<Value>) -> CallResult<Value> + 'static) -> Self {
        Self::new(NativeFunction {
            name: Some(name.to_string()),
            f,
        })
    }

    pub fn call(&self, this: Value, args: Vec<Value>) -> CallResult<Value> {
        self.0.call(this, args)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name()
    }

    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        std::ptr::eq(Rc::as_ptr(&self.0) as *const (), Rc::as_ptr(&other.0) as *const ())
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function {}]", self.name().unwrap_or("anonymous"))
    }
}
