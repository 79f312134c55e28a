use crate::array::{checked_length, ArrayRef};
use crate::error::CallResult;
use crate::function::FunctionRef;
use crate::host::{same_host, HostRef};
use crate::object::ObjectRef;
use crate::promise::PromiseValue;
use crate::tracked::Tracked;
use std::fmt;
use std::rc::Rc;

/// A reactive reference stored inside a container; unwrapped on property reads
pub type RefValue = Rc<Tracked<Value>>;

/// Dynamic value flowing through expressions, scopes and directive results
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
    Ref(RefValue),
    Host(HostRef),
    Promise(PromiseValue),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn new_ref(value: Value) -> Self {
        Value::Ref(Rc::new(Tracked::new(value)))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Ref(r) => r.get().is_truthy(),
            _ => true,
        }
    }

    /// Follow a reactive reference one level
    pub fn unwrap_ref(self) -> Value {
        match self {
            Value::Ref(r) => r.get(),
            other => other,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostRef> {
        match self {
            Value::Host(h) => Some(h),
            _ => None,
        }
    }

    /// Numeric conversion following the usual dynamic-language coercions
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(a) => match a.snapshot().as_slice() {
                [] => 0.0,
                [single] => parse_number(&single.to_display_string()),
                _ => f64::NAN,
            },
            Value::Ref(r) => r.get().to_number(),
            _ => f64::NAN,
        }
    }

    /// String conversion as used by text bindings and concatenation
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(a) => a
                .snapshot()
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::Ref(r) => r.get().to_display_string(),
            Value::Host(h) => h.display(),
            Value::Promise(_) => "[object Promise]".to_string(),
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Ref(r) => r.get().type_of(),
            _ => "object",
        }
    }

    /// `===`: like `PartialEq` except NaN is never equal to itself
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// `==`: null and undefined match each other; primitives coerce to numbers
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::String(_), Value::Number(_))
            | (Value::Number(_), Value::String(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                let (a, b) = (self.to_number(), other.to_number());
                a == b
            }
            (Value::Ref(r), b) => r.get().loose_equals(b),
            (a, Value::Ref(r)) => a.loose_equals(&r.get()),
            _ => self.strict_equals(other),
        }
    }

    /// Property read with container semantics (tracked for reactive containers)
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(o) => o.get(key),
            Value::Array(a) => match key {
                "length" => Value::Number(a.len() as f64),
                _ => match key.parse::<usize>() {
                    Ok(index) => a.get(index),
                    Err(_) => Value::Undefined,
                },
            },
            Value::String(s) => match key {
                "length" => Value::Number(s.encode_utf16().count() as f64),
                _ => match key.parse::<usize>() {
                    Ok(index) => s
                        .chars()
                        .nth(index)
                        .map_or(Value::Undefined, |c| Value::string(c.to_string())),
                    Err(_) => Value::Undefined,
                },
            },
            Value::Host(h) => h.get(key),
            Value::Ref(r) => r.get().get(key),
            _ => Value::Undefined,
        }
    }

    /// Property write; returns false when the target cannot hold properties
    /// or the write was rejected
    pub fn set(&self, key: &str, value: Value) -> bool {
        self.try_set(key, value).unwrap_or(false)
    }

    /// Property write that reports invalid array lengths and indices
    pub fn try_set(&self, key: &str, value: Value) -> CallResult<bool> {
        match self {
            Value::Object(o) => Ok(o.set(key, value)),
            Value::Array(a) => match key {
                "length" => {
                    a.set_len(checked_length(value.to_number())?)?;
                    Ok(true)
                }
                _ => match key.parse::<usize>() {
                    Ok(index) => {
                        a.set(index, value)?;
                        Ok(true)
                    }
                    Err(_) => Ok(false),
                },
            },
            Value::Host(h) => Ok(h.set(key, value)),
            Value::Ref(r) => r.get().try_set(key, value),
            _ => Ok(false),
        }
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Render a number the way scripts print it (`3`, not `3.0`)
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{}", n)
    }
}

/// Change detection used before triggering: identity for containers, NaN equals NaN
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => same_host(a, b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(a) => write!(f, "{:?}", a),
            Value::Object(o) => write!(f, "{:?}", o),
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Ref(r) => write!(f, "Ref({:?})", r.get_untracked()),
            Value::Host(h) => f.write_str(&h.display()),
            Value::Promise(p) => write!(f, "{:?}", p),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Value::Array(a)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<FunctionRef> for Value {
    fn from(f: FunctionRef) -> Self {
        Value::Function(f)
    }
}

impl From<PromiseValue> for Value {
    fn from(p: PromiseValue) -> Self {
        Value::Promise(p)
    }
}

impl From<HostRef> for Value {
    fn from(h: HostRef) -> Self {
        Value::Host(h)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(ArrayRef::from_vec(items.into_iter().map(Into::into).collect()))
    }
}
