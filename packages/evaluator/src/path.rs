//! Restricted evaluator for environments that forbid general expressions
//!
//! Accepts property paths (`open`, `$store.cart.count`), an optional leading
//! `!`, a trailing argument-less call (`toggle()`), and the literals `true`,
//! `false`, `null` and numbers. Everything else is rejected with
//! [`EvalError::Unsupported`].

use crate::builtins;
use crate::env::Env;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::interpreter::get_member;
use tendril_reactivity::Value;

const NAME: &str = "path";

#[derive(Debug, Default, Clone, Copy)]
pub struct PathEvaluator;

#[derive(Debug, PartialEq)]
struct PathExpr<'a> {
    negated: bool,
    segments: Vec<&'a str>,
    call: bool,
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn parse_path(source: &str) -> Option<PathExpr<'_>> {
    let mut text = source.trim();
    let negated = match text.strip_prefix('!') {
        Some(rest) => {
            text = rest.trim_start();
            true
        }
        None => false,
    };
    let call = match text.strip_suffix("()") {
        Some(rest) => {
            text = rest;
            true
        }
        None => false,
    };
    let segments: Vec<&str> = text.split('.').map(str::trim).collect();
    segments
        .iter()
        .all(|segment| is_identifier(segment))
        .then_some(PathExpr {
            negated,
            segments,
            call,
        })
}

fn literal(source: &str) -> Option<Value> {
    match source.trim() {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "undefined" => Some(Value::Undefined),
        text => text.parse::<f64>().ok().map(Value::Number),
    }
}

fn resolve_root(name: &str, env: &Env) -> Value {
    env.resolve(name)
        .or_else(|| builtins::global(name))
        .unwrap_or_default()
}

impl Evaluator for PathEvaluator {
    fn name(&self) -> &str {
        NAME
    }

    fn evaluate(&self, source: &str, env: &Env) -> EvalResult<Value> {
        if let Some(value) = literal(source) {
            return Ok(value);
        }
        let path = parse_path(source).ok_or_else(|| EvalError::unsupported(NAME, source))?;

        let (first, rest) = path
            .segments
            .split_first()
            .ok_or_else(|| EvalError::unsupported(NAME, source))?;
        let mut receiver = env.this_value();
        let mut value = resolve_root(first, env);
        for segment in rest {
            if value.is_nullish() {
                return Err(EvalError::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    value.to_display_string(),
                    segment
                )));
            }
            receiver = value.clone();
            value = get_member(&value, segment);
        }

        if path.call {
            value = match value {
                Value::Function(f) => f.call(receiver, Vec::new())?,
                _ => return Err(tendril_reactivity::CallError::not_callable(source.trim()).into()),
            };
        }
        Ok(if path.negated {
            Value::Bool(!value.is_truthy())
        } else {
            value
        })
    }

    fn assign(&self, target: &str, value: Value, env: &Env) -> EvalResult<()> {
        let path = parse_path(target)
            .filter(|path| !path.negated && !path.call)
            .ok_or_else(|| EvalError::InvalidAssignment {
                target: target.to_string(),
            })?;
        let Some((last, parents)) = path.segments.split_last() else {
            return Err(EvalError::InvalidAssignment {
                target: target.to_string(),
            });
        };
        if parents.is_empty() {
            return if env.assign(last, value) {
                Ok(())
            } else {
                Err(EvalError::InvalidAssignment {
                    target: target.to_string(),
                })
            };
        }
        let object = self.evaluate(&parents.join("."), env)?;
        if object.is_nullish() {
            return Err(EvalError::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                object.to_display_string(),
                last
            )));
        }
        object.try_set(last, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeChain;
    use tendril_reactivity::{FunctionRef, ObjectRef};

    fn env_with(scope: ObjectRef) -> Env {
        Env::new(ScopeChain::new().with_scope(scope))
    }

    #[test]
    fn test_parse_path_shapes() {
        assert_eq!(
            parse_path("!$store.cart.open"),
            Some(PathExpr {
                negated: true,
                segments: vec!["$store", "cart", "open"],
                call: false,
            })
        );
        assert!(parse_path("toggle()").is_some_and(|path| path.call));
        assert_eq!(parse_path("count + 1"), None);
        assert_eq!(parse_path("items[0]"), None);
    }

    #[test]
    fn test_reads_paths_and_calls_methods() {
        let user = ObjectRef::from_entries([("name", "Ada")]);
        let scope = ObjectRef::from_entries([("user", Value::Object(user)), ("open", Value::Bool(false))]);
        scope.set(
            "toggle",
            Value::Function(FunctionRef::native(|this, _| {
                let open = this.get("open").is_truthy();
                this.set("open", Value::Bool(!open));
                Ok(Value::Undefined)
            })),
        );
        let env = env_with(scope.clone());

        assert_eq!(PathEvaluator.evaluate("user.name", &env).unwrap(), Value::from("Ada"));
        assert_eq!(PathEvaluator.evaluate("!open", &env).unwrap(), Value::Bool(true));
        PathEvaluator.evaluate("toggle()", &env).unwrap();
        assert_eq!(scope.get("open"), Value::Bool(true));
        assert_eq!(PathEvaluator.evaluate("42", &env).unwrap(), Value::from(42.0));
    }

    #[test]
    fn test_rejects_general_expressions() {
        let env = env_with(ObjectRef::new());
        assert!(matches!(
            PathEvaluator.evaluate("a + b", &env),
            Err(EvalError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_assigns_to_paths() {
        let form = ObjectRef::new();
        let scope = ObjectRef::from_entries([("form", Value::Object(form.clone())), ("count", Value::from(0.0))]);
        let env = env_with(scope.clone());
        PathEvaluator.assign("form.email", Value::from("a@b.c"), &env).unwrap();
        PathEvaluator.assign("count", Value::from(3.0), &env).unwrap();
        assert_eq!(form.get("email"), Value::from("a@b.c"));
        assert_eq!(scope.get("count"), Value::from(3.0));
        assert!(PathEvaluator.assign("toggle()", Value::Null, &env).is_err());
    }
}
