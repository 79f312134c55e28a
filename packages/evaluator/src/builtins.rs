//! Global functions and the methods of built-in value types
//!
//! Methods receive their receiver as `this`, so a method value read from one
//! array can be called on another.

use indexmap::IndexMap;
use serde::Serialize;
use std::cell::Cell;
use tendril_reactivity::{
    checked_length, from_json, to_json, ArrayRef, CallError, CallResult, FunctionRef, ObjectRef, PromiseValue, Value,
};
use tracing::{debug, error, info, warn};

type NativeFn = fn(Value, Vec<Value>) -> CallResult<Value>;

/// Longest string a builtin will produce
const MAX_STRING_LENGTH: usize = (1 << 29) - 24;

fn checked_string_length(len: f64) -> CallResult<usize> {
    if len > MAX_STRING_LENGTH as f64 {
        return Err(CallError::range_error("Invalid string length"));
    }
    Ok(len as usize)
}

thread_local! {
    static GLOBALS: IndexMap<&'static str, Value> = build_globals();
    static RANDOM_STATE: Cell<u64> = const { Cell::new(0x2545_f491_4f6c_dd1d) };
}

/// A global binding such as `Math` or `parseInt`
pub fn global(name: &str) -> Option<Value> {
    GLOBALS.with(|globals| globals.get(name).cloned())
}

pub fn global_names() -> Vec<&'static str> {
    GLOBALS.with(|globals| globals.keys().copied().collect())
}

/// Built-in method `name` for the type of `target`
pub fn method(target: &Value, name: &str) -> Option<FunctionRef> {
    let f: NativeFn = match target {
        Value::Array(_) => array_method(name)?,
        Value::String(_) => string_method(name)?,
        Value::Number(_) => match name {
            "toFixed" => number_to_fixed,
            "toString" => to_string,
            _ => return None,
        },
        Value::Promise(_) => match name {
            "then" => promise_then,
            "catch" => promise_catch,
            "finally" => promise_finally,
            _ => return None,
        },
        Value::Object(_) => match name {
            "hasOwnProperty" => object_has_own,
            "toString" => to_string,
            _ => return None,
        },
        Value::Bool(_) => match name {
            "toString" => to_string,
            _ => return None,
        },
        _ => return None,
    };
    Some(FunctionRef::named(name, f))
}

fn native(name: &str, f: NativeFn) -> Value {
    Value::Function(FunctionRef::named(name, f))
}

fn namespace(entries: Vec<(&str, Value)>) -> Value {
    Value::Object(ObjectRef::from_entries(entries).readonly())
}

fn build_globals() -> IndexMap<&'static str, Value> {
    let mut globals = IndexMap::new();
    globals.insert("NaN", Value::Number(f64::NAN));
    globals.insert("Infinity", Value::Number(f64::INFINITY));
    globals.insert("parseInt", native("parseInt", parse_int));
    globals.insert("parseFloat", native("parseFloat", parse_float));
    globals.insert("isNaN", native("isNaN", is_nan));
    globals.insert("Number", native("Number", |_, args| Ok(Value::Number(arg(&args, 0).to_number()))));
    globals.insert(
        "String",
        native("String", |_, args| Ok(Value::string(arg(&args, 0).to_display_string()))),
    );
    globals.insert("Boolean", native("Boolean", |_, args| Ok(Value::Bool(arg(&args, 0).is_truthy()))));
    globals.insert(
        "Math",
        namespace(vec![
            ("PI", Value::Number(std::f64::consts::PI)),
            ("E", Value::Number(std::f64::consts::E)),
            ("abs", native("abs", |_, args| unary_math(&args, f64::abs))),
            ("floor", native("floor", |_, args| unary_math(&args, f64::floor))),
            ("ceil", native("ceil", |_, args| unary_math(&args, f64::ceil))),
            ("round", native("round", |_, args| unary_math(&args, |n| (n + 0.5).floor()))),
            ("trunc", native("trunc", |_, args| unary_math(&args, f64::trunc))),
            ("sqrt", native("sqrt", |_, args| unary_math(&args, f64::sqrt))),
            ("sign", native("sign", |_, args| unary_math(&args, math_sign))),
            (
                "pow",
                native("pow", |_, args| Ok(Value::Number(arg(&args, 0).to_number().powf(arg(&args, 1).to_number())))),
            ),
            ("min", native("min", |_, args| Ok(Value::Number(fold_numbers(&args, f64::INFINITY, f64::min))))),
            ("max", native("max", |_, args| Ok(Value::Number(fold_numbers(&args, f64::NEG_INFINITY, f64::max))))),
            ("random", native("random", |_, _| Ok(Value::Number(next_random())))),
        ]),
    );
    globals.insert(
        "Object",
        namespace(vec![
            ("keys", native("keys", object_keys)),
            ("values", native("values", object_values)),
            ("entries", native("entries", object_entries)),
            ("assign", native("assign", object_assign)),
            ("fromEntries", native("fromEntries", object_from_entries)),
        ]),
    );
    globals.insert(
        "Array",
        namespace(vec![
            (
                "isArray",
                native("isArray", |_, args| Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_))))),
            ),
            ("from", native("from", array_from)),
        ]),
    );
    globals.insert(
        "JSON",
        namespace(vec![
            ("stringify", native("stringify", json_stringify)),
            ("parse", native("parse", json_parse)),
        ]),
    );
    globals.insert(
        "Promise",
        namespace(vec![
            (
                "resolve",
                native("resolve", |_, args| Ok(Value::Promise(PromiseValue::resolved(arg(&args, 0))))),
            ),
            (
                "reject",
                native("reject", |_, args| Ok(Value::Promise(PromiseValue::rejected(arg(&args, 0))))),
            ),
        ]),
    );
    globals.insert(
        "console",
        namespace(vec![
            ("log", native("log", console_log)),
            ("info", native("info", console_log)),
            ("debug", native("debug", console_debug)),
            ("warn", native("warn", console_warn)),
            ("error", native("error", console_error)),
        ]),
    );
    globals
}

// Argument helpers

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default().unwrap_ref()
}

fn callback(args: &[Value], index: usize) -> CallResult<FunctionRef> {
    match arg(args, index) {
        Value::Function(f) => Ok(f),
        other => Err(CallError::type_error(format!(
            "{} is not a function",
            other.to_display_string()
        ))),
    }
}

fn this_array(this: &Value) -> CallResult<ArrayRef> {
    match this.clone().unwrap_ref() {
        Value::Array(array) => Ok(array),
        _ => Err(CallError::type_error("receiver is not an array")),
    }
}

fn this_string(this: &Value) -> String {
    this.clone().unwrap_ref().to_display_string()
}

/// Integer argument with relative (negative) indexing clamped to `0..=len`
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn join_messages(args: &[Value]) -> String {
    args.iter()
        .map(|value| match value {
            Value::String(s) => s.to_string(),
            other => format!("{:?}", other),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// Numbers

fn unary_math(args: &[Value], f: impl Fn(f64) -> f64) -> CallResult<Value> {
    Ok(Value::Number(f(arg(args, 0).to_number())))
}

fn math_sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

fn fold_numbers(args: &[Value], init: f64, f: impl Fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, n);
    }
    acc
}

fn next_random() -> f64 {
    RANDOM_STATE.with(|state| {
        let mut x = state.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        (x >> 11) as f64 / (1u64 << 53) as f64
    })
}

pub fn parse_int_str(text: &str, radix: Option<u32>) -> f64 {
    let text = text.trim_start();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, text) = match radix {
        None | Some(16) if text.starts_with("0x") || text.starts_with("0X") => (16, &text[2..]),
        None => (10, text),
        Some(radix) => (radix, text),
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: Vec<u32> = text.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits.iter().fold(0.0, |acc, digit| acc * radix as f64 + *digit as f64);
    if negative {
        -value
    } else {
        value
    }
}

fn parse_int(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let radix = match arg(&args, 1) {
        Value::Undefined => None,
        value => {
            let n = value.to_number();
            (!n.is_nan() && n != 0.0).then_some(n as u32)
        }
    };
    Ok(Value::Number(parse_int_str(&arg(&args, 0).to_display_string(), radix)))
}

pub fn parse_float_str(text: &str) -> f64 {
    let text = text.trim_start();
    for (prefix, value) in [("Infinity", f64::INFINITY), ("+Infinity", f64::INFINITY), ("-Infinity", f64::NEG_INFINITY)] {
        if text.starts_with(prefix) {
            return value;
        }
    }
    let candidate: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .collect();
    let mut end = candidate.len();
    while end > 0 {
        if let Ok(value) = candidate[..end].parse::<f64>() {
            return value;
        }
        end -= 1;
    }
    f64::NAN
}

fn parse_float(_: Value, args: Vec<Value>) -> CallResult<Value> {
    Ok(Value::Number(parse_float_str(&arg(&args, 0).to_display_string())))
}

fn is_nan(_: Value, args: Vec<Value>) -> CallResult<Value> {
    Ok(Value::Bool(arg(&args, 0).to_number().is_nan()))
}

fn number_to_fixed(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let digits = arg(&args, 0).to_number();
    let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
    let n = this.to_number();
    if !n.is_finite() {
        return Ok(Value::string(this.to_display_string()));
    }
    Ok(Value::string(format!("{:.*}", digits, n)))
}

fn to_string(this: Value, _: Vec<Value>) -> CallResult<Value> {
    Ok(Value::string(this.to_display_string()))
}

// Objects

fn object_has_own(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let key = arg(&args, 0).to_display_string();
    Ok(Value::Bool(this.as_object().is_some_and(|object| object.has(&key))))
}

fn own_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(object) => object.keys().iter().map(|key| key.to_string()).collect(),
        Value::Array(array) => (0..array.len()).map(|index| index.to_string()).collect(),
        Value::String(s) => (0..s.chars().count()).map(|index| index.to_string()).collect(),
        Value::Host(host) => host.keys(),
        _ => Vec::new(),
    }
}

fn object_keys(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let keys: Vec<Value> = own_keys(&arg(&args, 0)).into_iter().map(Value::from).collect();
    Ok(Value::from(keys))
}

fn object_values(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let target = arg(&args, 0);
    let values: Vec<Value> = own_keys(&target).iter().map(|key| target.get(key)).collect();
    Ok(Value::from(values))
}

fn object_entries(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let target = arg(&args, 0);
    let entries: Vec<Value> = own_keys(&target)
        .into_iter()
        .map(|key| {
            let value = target.get(&key);
            Value::from(vec![Value::from(key), value])
        })
        .collect();
    Ok(Value::from(entries))
}

fn object_assign(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let target = arg(&args, 0);
    let Value::Object(object) = &target else {
        return Err(CallError::type_error("Object.assign target must be an object"));
    };
    for source in args.iter().skip(1) {
        if let Value::Object(source) = source {
            object.assign(source);
        }
    }
    Ok(target)
}

fn object_from_entries(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let entries = this_array(&arg(&args, 0))?;
    let object = ObjectRef::new();
    for entry in entries.snapshot() {
        object.set(&entry.get("0").to_display_string(), entry.get("1"));
    }
    Ok(Value::Object(object))
}

// JSON

fn json_stringify(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let value = arg(&args, 0);
    if matches!(value, Value::Undefined | Value::Function(_)) {
        return Ok(Value::Undefined);
    }
    let json = integral_numbers(to_json(&value)?);
    let indent = match arg(&args, 2) {
        Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&json)
    } else {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        json.serialize(&mut serializer)
            .map(|_| String::from_utf8_lossy(&out).into_owned())
    };
    text.map(Value::from)
        .map_err(|err| CallError::type_error(err.to_string()))
}

/// Whole floats print without a fraction, as scripts expect (`1`, not `1.0`)
fn integral_numbers(json: serde_json::Value) -> serde_json::Value {
    match json {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => serde_json::Value::from(f as i64),
            _ => serde_json::Value::Number(n),
        },
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(integral_numbers).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, integral_numbers(value)))
                .collect(),
        ),
        other => other,
    }
}

fn json_parse(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let text = arg(&args, 0).to_display_string();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|json| from_json(&json))
        .map_err(|err| CallError::thrown(format!("SyntaxError: {}", err)))
}

// Console

fn console_log(_: Value, args: Vec<Value>) -> CallResult<Value> {
    info!(target: "tendril::console", "{}", join_messages(&args));
    Ok(Value::Undefined)
}

fn console_debug(_: Value, args: Vec<Value>) -> CallResult<Value> {
    debug!(target: "tendril::console", "{}", join_messages(&args));
    Ok(Value::Undefined)
}

fn console_warn(_: Value, args: Vec<Value>) -> CallResult<Value> {
    warn!(target: "tendril::console", "{}", join_messages(&args));
    Ok(Value::Undefined)
}

fn console_error(_: Value, args: Vec<Value>) -> CallResult<Value> {
    error!(target: "tendril::console", "{}", join_messages(&args));
    Ok(Value::Undefined)
}

// Arrays

fn array_method(name: &str) -> Option<NativeFn> {
    let f: NativeFn = match name {
        "push" => array_push,
        "pop" => |this, _| Ok(this_array(&this)?.pop()),
        "shift" => |this, _| {
            let array = this_array(&this)?;
            Ok(if array.is_empty() { Value::Undefined } else { array.remove(0) })
        },
        "unshift" => array_unshift,
        "splice" => array_splice,
        "slice" => array_slice,
        "concat" => array_concat,
        "join" => array_join,
        "indexOf" => array_index_of,
        "includes" => array_includes,
        "find" => array_find,
        "findIndex" => array_find_index,
        "filter" => array_filter,
        "map" => array_map,
        "forEach" => array_for_each,
        "some" => array_some,
        "every" => array_every,
        "reduce" => array_reduce,
        "reverse" => array_reverse,
        "sort" => array_sort,
        "at" => array_at,
        "toString" => to_string,
        _ => return None,
    };
    Some(f)
}

fn array_push(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let array = this_array(&this)?;
    let mut len = array.len();
    for value in args {
        len = array.push(value);
    }
    Ok(Value::from(len))
}

fn array_unshift(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let array = this_array(&this)?;
    array.splice(0, 0, args);
    Ok(Value::from(array.len()))
}

fn array_splice(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let array = this_array(&this)?;
    let len = array.len();
    let start = relative_index(&arg(&args, 0), len, 0);
    let delete_count = match args.get(1) {
        None => len - start,
        Some(count) => {
            let n = count.to_number();
            if n.is_nan() || n < 0.0 {
                0
            } else {
                (n as usize).min(len - start)
            }
        }
    };
    let items = args.into_iter().skip(2).collect();
    Ok(Value::from(array.splice(start, delete_count, items)))
}

fn array_slice(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let items = this_array(&this)?.snapshot();
    let start = relative_index(&arg(&args, 0), items.len(), 0);
    let end = relative_index(&arg(&args, 1), items.len(), items.len());
    Ok(Value::from(items.get(start..end.max(start)).unwrap_or_default().to_vec()))
}

fn array_concat(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let mut items = this_array(&this)?.snapshot();
    for value in args {
        match value {
            Value::Array(other) => items.extend(other.snapshot()),
            other => items.push(other),
        }
    }
    Ok(Value::from(items))
}

fn array_join(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let separator = match arg(&args, 0) {
        Value::Undefined => ",".to_string(),
        other => other.to_display_string(),
    };
    let joined = this_array(&this)?
        .snapshot()
        .iter()
        .map(|item| match item {
            Value::Undefined | Value::Null => String::new(),
            other => other.to_display_string(),
        })
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::from(joined))
}

fn array_index_of(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let needle = arg(&args, 0);
    let position = this_array(&this)?
        .snapshot()
        .iter()
        .position(|item| item.strict_equals(&needle));
    Ok(Value::Number(position.map_or(-1.0, |index| index as f64)))
}

fn array_includes(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let needle = arg(&args, 0);
    Ok(Value::Bool(this_array(&this)?.snapshot().iter().any(|item| *item == needle)))
}

/// Call `f(item, index, array)` for each item until `visit` returns `Some`
fn scan<T>(
    this: &Value,
    args: &[Value],
    mut visit: impl FnMut(usize, &Value, Value) -> Option<T>,
) -> CallResult<Option<T>> {
    let array = this_array(this)?;
    let f = callback(args, 0)?;
    for (index, item) in array.snapshot().into_iter().enumerate() {
        let result = f.call(Value::Undefined, vec![item.clone(), Value::from(index), this.clone()])?;
        if let Some(found) = visit(index, &item, result) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn array_find(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let found = scan(&this, &args, |_, item, result| result.is_truthy().then(|| item.clone()))?;
    Ok(found.unwrap_or_default())
}

fn array_find_index(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let found = scan(&this, &args, |index, _, result| result.is_truthy().then_some(index))?;
    Ok(Value::Number(found.map_or(-1.0, |index| index as f64)))
}

fn array_filter(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let mut kept = Vec::new();
    scan(&this, &args, |_, item, result| {
        if result.is_truthy() {
            kept.push(item.clone());
        }
        None::<()>
    })?;
    Ok(Value::from(kept))
}

fn array_map(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let mut mapped = Vec::new();
    scan(&this, &args, |_, _, result| {
        mapped.push(result);
        None::<()>
    })?;
    Ok(Value::from(mapped))
}

fn array_for_each(this: Value, args: Vec<Value>) -> CallResult<Value> {
    scan(&this, &args, |_, _, _| None::<()>)?;
    Ok(Value::Undefined)
}

fn array_some(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let found = scan(&this, &args, |_, _, result| result.is_truthy().then_some(()))?;
    Ok(Value::Bool(found.is_some()))
}

fn array_every(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let failed = scan(&this, &args, |_, _, result| (!result.is_truthy()).then_some(()))?;
    Ok(Value::Bool(failed.is_none()))
}

fn array_reduce(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let array = this_array(&this)?;
    let f = callback(&args, 0)?;
    let mut items = array.snapshot().into_iter().enumerate();
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match items.next() {
            Some((_, first)) => first,
            None => return Err(CallError::type_error("Reduce of empty array with no initial value")),
        },
    };
    for (index, item) in items {
        acc = f.call(Value::Undefined, vec![acc, item, Value::from(index), this.clone()])?;
    }
    Ok(acc)
}

fn array_reverse(this: Value, _: Vec<Value>) -> CallResult<Value> {
    let array = this_array(&this)?;
    let mut items = array.snapshot_untracked();
    items.reverse();
    array.replace(items);
    Ok(this)
}

fn array_sort(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let array = this_array(&this)?;
    let mut items = array.snapshot_untracked();
    let comparator = match arg(&args, 0) {
        Value::Function(f) => Some(f),
        _ => None,
    };
    let mut failure: Option<CallError> = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return std::cmp::Ordering::Equal;
        }
        match &comparator {
            Some(f) => match f.call(Value::Undefined, vec![a.clone(), b.clone()]) {
                Ok(result) => result
                    .to_number()
                    .partial_cmp(&0.0)
                    .unwrap_or(std::cmp::Ordering::Equal),
                Err(err) => {
                    failure = Some(err);
                    std::cmp::Ordering::Equal
                }
            },
            None => match (a.is_undefined(), b.is_undefined()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                _ => a.to_display_string().cmp(&b.to_display_string()),
            },
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    array.replace(items);
    Ok(this)
}

fn array_at(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let array = this_array(&this)?;
    let len = array.len() as f64;
    let n = arg(&args, 0).to_number().trunc();
    let index = if n < 0.0 { len + n } else { n };
    if index.is_nan() || index < 0.0 || index >= len {
        return Ok(Value::Undefined);
    }
    Ok(array.get(index as usize))
}

fn array_from(_: Value, args: Vec<Value>) -> CallResult<Value> {
    let source = arg(&args, 0);
    let items: Vec<Value> = match &source {
        Value::Array(array) => array.snapshot(),
        Value::String(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
        Value::Object(object) => {
            let len = object.get("length").to_number();
            let len = if len.is_nan() || len < 0.0 { 0 } else { checked_length(len.trunc())? };
            (0..len).map(|index| object.get(&index.to_string())).collect()
        }
        _ => Vec::new(),
    };
    let items = match arg(&args, 1) {
        Value::Function(f) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| f.call(Value::Undefined, vec![item, Value::from(index)]))
            .collect::<CallResult<Vec<_>>>()?,
        _ => items,
    };
    Ok(Value::from(items))
}

// Strings

fn string_method(name: &str) -> Option<NativeFn> {
    let f: NativeFn = match name {
        "toUpperCase" => |this, _| Ok(Value::from(this_string(&this).to_uppercase())),
        "toLowerCase" => |this, _| Ok(Value::from(this_string(&this).to_lowercase())),
        "trim" => |this, _| Ok(Value::from(this_string(&this).trim())),
        "trimStart" => |this, _| Ok(Value::from(this_string(&this).trim_start())),
        "trimEnd" => |this, _| Ok(Value::from(this_string(&this).trim_end())),
        "includes" => |this, args| {
            Ok(Value::Bool(this_string(&this).contains(arg(&args, 0).to_display_string().as_str())))
        },
        "startsWith" => |this, args| {
            Ok(Value::Bool(this_string(&this).starts_with(arg(&args, 0).to_display_string().as_str())))
        },
        "endsWith" => |this, args| {
            Ok(Value::Bool(this_string(&this).ends_with(arg(&args, 0).to_display_string().as_str())))
        },
        "indexOf" => string_index_of,
        "slice" => string_slice,
        "substring" => string_substring,
        "split" => string_split,
        "replace" => |this, args| string_replace(this, args, false),
        "replaceAll" => |this, args| string_replace(this, args, true),
        "padStart" => |this, args| string_pad(this, args, true),
        "padEnd" => |this, args| string_pad(this, args, false),
        "repeat" => |this, args| {
            let count = arg(&args, 0).to_number();
            if count.is_nan() || count < 0.0 || count.is_infinite() {
                return Err(CallError::range_error("Invalid count value"));
            }
            let text = this_string(&this);
            if text.is_empty() {
                return Ok(Value::from(text));
            }
            let count = checked_string_length(count)?;
            checked_string_length(text.len() as f64 * count as f64)?;
            Ok(Value::from(text.repeat(count)))
        },
        "charAt" => |this, args| {
            let index = arg(&args, 0).to_number();
            let index = if index.is_nan() { 0 } else { index as usize };
            Ok(Value::from(
                this_string(&this).chars().nth(index).map(String::from).unwrap_or_default(),
            ))
        },
        "at" => |this, args| {
            let chars: Vec<char> = this_string(&this).chars().collect();
            let n = arg(&args, 0).to_number().trunc();
            let index = if n < 0.0 { chars.len() as f64 + n } else { n };
            if index.is_nan() || index < 0.0 || index >= chars.len() as f64 {
                return Ok(Value::Undefined);
            }
            Ok(Value::from(chars[index as usize].to_string()))
        },
        "concat" => |this, args| {
            let mut out = this_string(&this);
            for value in args {
                out.push_str(&value.to_display_string());
            }
            Ok(Value::from(out))
        },
        "toString" => to_string,
        _ => return None,
    };
    Some(f)
}

fn string_index_of(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let haystack = this_string(&this);
    let needle = arg(&args, 0).to_display_string();
    let index = haystack
        .find(&needle)
        .map(|byte| haystack[..byte].chars().count() as f64);
    Ok(Value::Number(index.unwrap_or(-1.0)))
}

fn string_slice(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let chars: Vec<char> = this_string(&this).chars().collect();
    let start = relative_index(&arg(&args, 0), chars.len(), 0);
    let end = relative_index(&arg(&args, 1), chars.len(), chars.len());
    Ok(Value::from(chars[start..end.max(start)].iter().collect::<String>()))
}

fn string_substring(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let chars: Vec<char> = this_string(&this).chars().collect();
    let clamp = |value: Value, default: usize| {
        if value.is_undefined() {
            return default;
        }
        let n = value.to_number();
        if n.is_nan() || n < 0.0 {
            0
        } else {
            (n as usize).min(chars.len())
        }
    };
    let a = clamp(arg(&args, 0), 0);
    let b = clamp(arg(&args, 1), chars.len());
    let (start, end) = (a.min(b), a.max(b));
    Ok(Value::from(chars[start..end].iter().collect::<String>()))
}

fn string_split(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let text = this_string(&this);
    let parts: Vec<Value> = match arg(&args, 0) {
        Value::Undefined => vec![Value::from(text)],
        separator => {
            let separator = separator.to_display_string();
            if separator.is_empty() {
                text.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                text.split(separator.as_str()).map(Value::from).collect()
            }
        }
    };
    let parts = match arg(&args, 1) {
        Value::Undefined => parts,
        limit => parts.into_iter().take(limit.to_number().max(0.0) as usize).collect(),
    };
    Ok(Value::from(parts))
}

fn string_replace(this: Value, args: Vec<Value>, all: bool) -> CallResult<Value> {
    let text = this_string(&this);
    let pattern = arg(&args, 0).to_display_string();
    let replacement = arg(&args, 1);
    let replace_with = |matched: &str| -> CallResult<String> {
        match &replacement {
            Value::Function(f) => Ok(f.call(Value::Undefined, vec![Value::from(matched)])?.to_display_string()),
            other => Ok(other.to_display_string()),
        }
    };
    if all {
        let mut out = String::new();
        let mut rest = text.as_str();
        if pattern.is_empty() {
            return Ok(Value::from(text.clone()));
        }
        while let Some(index) = rest.find(&pattern) {
            out.push_str(&rest[..index]);
            out.push_str(&replace_with(&pattern)?);
            rest = &rest[index + pattern.len()..];
        }
        out.push_str(rest);
        return Ok(Value::from(out));
    }
    match text.find(&pattern) {
        Some(index) => Ok(Value::from(format!(
            "{}{}{}",
            &text[..index],
            replace_with(&pattern)?,
            &text[index + pattern.len()..]
        ))),
        None => Ok(Value::from(text)),
    }
}

fn string_pad(this: Value, args: Vec<Value>, start: bool) -> CallResult<Value> {
    let text = this_string(&this);
    let target = arg(&args, 0).to_number();
    let fill = match arg(&args, 1) {
        Value::Undefined => " ".to_string(),
        other => other.to_display_string(),
    };
    let current = text.chars().count();
    if target.is_nan() || target <= current as f64 || fill.is_empty() {
        return Ok(Value::from(text));
    }
    let target = checked_string_length(target)?;
    let padding: String = fill.chars().cycle().take(target - current).collect();
    Ok(Value::from(if start {
        format!("{}{}", padding, text)
    } else {
        format!("{}{}", text, padding)
    }))
}

// Promises

fn this_promise(this: &Value) -> CallResult<PromiseValue> {
    match this {
        Value::Promise(promise) => Ok(promise.clone()),
        _ => Err(CallError::type_error("receiver is not a promise")),
    }
}

fn optional_callback(args: &[Value], index: usize) -> Option<FunctionRef> {
    match arg(args, index) {
        Value::Function(f) => Some(f),
        _ => None,
    }
}

/// Chain a promise: handlers may return plain values or further promises
pub fn chain_promise(
    source: PromiseValue,
    on_fulfilled: Option<FunctionRef>,
    on_rejected: Option<FunctionRef>,
) -> PromiseValue {
    PromiseValue::from_future(async move {
        let handled = match source.settled().await {
            Ok(value) => match on_fulfilled {
                Some(f) => f.call(Value::Undefined, vec![value]),
                None => return Ok(value),
            },
            Err(reason) => match on_rejected {
                Some(f) => f.call(Value::Undefined, vec![reason]),
                None => return Err(reason),
            },
        };
        match handled {
            Ok(Value::Promise(next)) => next.settled().await,
            Ok(value) => Ok(value),
            Err(err) => Err(Value::from(err.to_string())),
        }
    })
}

fn promise_then(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let source = this_promise(&this)?;
    Ok(Value::Promise(chain_promise(
        source,
        optional_callback(&args, 0),
        optional_callback(&args, 1),
    )))
}

fn promise_catch(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let source = this_promise(&this)?;
    Ok(Value::Promise(chain_promise(source, None, optional_callback(&args, 0))))
}

fn promise_finally(this: Value, args: Vec<Value>) -> CallResult<Value> {
    let source = this_promise(&this)?;
    let handler = optional_callback(&args, 0);
    Ok(Value::Promise(PromiseValue::from_future(async move {
        let settled = source.settled().await;
        if let Some(f) = handler {
            if let Err(err) = f.call(Value::Undefined, Vec::new()) {
                return Err(Value::from(err.to_string()));
            }
        }
        settled
    })))
}
