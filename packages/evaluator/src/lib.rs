pub mod builtins;
pub mod cache;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod path;
pub mod scope;

#[cfg(test)]
mod tests_expressions;

#[cfg(test)]
mod tests_statements;

pub use cache::{AstCache, Parsed};
pub use env::{Env, MagicResolver, ScopeProxy};
pub use error::{EvalError, EvalResult};
pub use evaluator::{Binding, Delivery, ErrorSink, Evaluator, SharedEvaluator};
pub use interpreter::{destructure, get_member, Interpreter, MAX_CALL_DEPTH};
pub use path::PathEvaluator;
pub use scope::ScopeChain;
